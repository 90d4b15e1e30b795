use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::gauge;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{error, info};

pub type DbPool = DatabaseConnection;

/// Pool options derived from the application config
pub fn connect_options(cfg: &AppConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);
    opt
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    gauge!("storefront_db.max_connections", f64::from(cfg.db_max_connections));
    info!(max_connections = cfg.db_max_connections, "Connecting to database");

    let pool = Database::connect(connect_options(cfg)).await.map_err(|e| {
        error!(error = %e, "Database connection failed");
        ServiceError::DatabaseError(e)
    })?;
    Ok(pool)
}

/// Applies every pending embedded migration
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match crate::migrator::Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "Database migrations applied");
            Ok(())
        }
        Err(e) => {
            error!(elapsed = ?started.elapsed(), error = %e, "Database migrations failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    pool.ping().await.map_err(ServiceError::DatabaseError)
}

/// True when the storage layer rejected a write because of a UNIQUE constraint.
///
/// Both race-tolerant inserts (orders by checkout session, promotion codes by
/// literal code) rely on this classification.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&DbErr::Custom("duplicate".into())));
        assert!(!is_unique_violation(&DbErr::RecordNotFound("orders".into())));
    }

    #[tokio::test]
    async fn duplicate_checkout_session_is_a_unique_violation() {
        use crate::entities::order::{self, OrderStatus};
        use chrono::Utc;
        use sea_orm::{ActiveModelTrait, Set};
        use uuid::Uuid;

        let mut cfg = AppConfig::new("sqlite::memory:".into(), "127.0.0.1".into(), 0, "test".into());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        let pool = establish_connection_from_app_config(&cfg).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let row = || order::ActiveModel {
            id: Set(Uuid::new_v4()),
            checkout_session_id: Set("cs_dup".into()),
            cart_session_id: Set(None),
            user_id: Set(None),
            customer_id: Set(None),
            customer_email: Set(None),
            customer_name: Set(None),
            shipping_name: Set(None),
            shipping_address: Set(None),
            billing_address: Set(None),
            currency: Set("usd".into()),
            subtotal_cents: Set(1000),
            tax_cents: Set(0),
            shipping_cents: Set(0),
            total_cents: Set(1000),
            original_subtotal_cents: Set(None),
            discount_cents: Set(None),
            promotion_code_id: Set(None),
            promotion_code: Set(None),
            payment_intent_id: Set(None),
            status: Set(OrderStatus::Received),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        row().insert(&pool).await.unwrap();
        let err = row().insert(&pool).await.unwrap_err();
        assert!(is_unique_violation(&err), "unexpected error: {err}");
    }
}
