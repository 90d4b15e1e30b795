//! Order emails delivered through a bounded background worker pool.
//!
//! Submitting a message never blocks or fails the caller: a full or closed
//! queue drops the message with a warning, and send failures are only logged.

use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::entities::{OrderItemModel, OrderModel};

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// A rendered email plus the structured order data it was rendered from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub content_type: String,
    pub order_data: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail relay transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
}

/// Outbound email capability
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        info!(to = %message.to, subject = %message.subject, "Email (log only)");
        debug!(body = %message.body, "Email body");
        Ok(())
    }
}

/// Hands messages to an HTTP relay as JSON
#[derive(Clone)]
pub struct HttpRelayMailer {
    http: reqwest::Client,
    url: String,
}

impl HttpRelayMailer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MailerError> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    #[instrument(skip_all, fields(to = %message.to))]
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let response = self.http.post(&self.url).json(message).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(MailerError::Rejected(response.status().as_u16()))
        }
    }
}

/// Picks the mailer implied by the configuration
pub fn mailer_from_config(config: &AppConfig) -> Result<Arc<dyn Mailer>, MailerError> {
    match config.mail_relay_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Ok(Arc::new(HttpRelayMailer::new(
            url,
            config.payment_request_timeout(),
        )?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

/// Bounded queue in front of a mailer
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<EmailMessage>,
    from: String,
    store_name: String,
    admin_email: Option<String>,
}

impl NotificationDispatcher {
    /// Starts the worker loop. The returned handle completes once every
    /// dispatcher clone is dropped and in-flight sends have finished.
    pub fn spawn(mailer: Arc<dyn Mailer>, config: &AppConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.notification_queue_capacity.max(1));
        let workers = config.notification_workers.max(1);
        let handle = tokio::spawn(run_workers(receiver, mailer, workers));

        let dispatcher = Self {
            sender,
            from: config.mail_from.clone(),
            store_name: config.store_name.clone(),
            admin_email: config
                .admin_notification_email
                .clone()
                .filter(|e| !e.trim().is_empty()),
        };
        (dispatcher, handle)
    }

    /// Queues a message without waiting. Returns false when it was dropped.
    pub fn submit(&self, message: EmailMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(to = %message.to, "Notification queue full; dropping email");
                counter!("storefront_notifications.dropped", 1, "reason" => "full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                warn!(to = %message.to, "Notification queue closed; dropping email");
                counter!("storefront_notifications.dropped", 1, "reason" => "closed");
                false
            }
        }
    }

    /// Queues the customer confirmation and the admin notice for a new order
    pub fn order_finalized(&self, order: &OrderModel, items: &[OrderItemModel]) {
        let order_data = order_data(order, items);

        match order.customer_email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(to) => {
                self.submit(EmailMessage {
                    to: to.to_string(),
                    from: self.from.clone(),
                    subject: format!("{}: order confirmation", self.store_name),
                    body: render_customer_confirmation(&self.store_name, order, items),
                    content_type: CONTENT_TYPE_TEXT.to_string(),
                    order_data: order_data.clone(),
                });
            }
            None => debug!(order_id = %order.id, "No customer email on order; skipping confirmation"),
        }

        if let Some(admin) = &self.admin_email {
            self.submit(EmailMessage {
                to: admin.clone(),
                from: self.from.clone(),
                subject: format!(
                    "New order {} ({})",
                    short_id(order),
                    format_money(order.total_cents, &order.currency)
                ),
                body: render_admin_notification(order, items),
                content_type: CONTENT_TYPE_TEXT.to_string(),
                order_data,
            });
        }
    }
}

async fn run_workers(
    mut receiver: mpsc::Receiver<EmailMessage>,
    mailer: Arc<dyn Mailer>,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(message) = receiver.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let mailer = mailer.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match mailer.send(&message).await {
                Ok(()) => {
                    counter!("storefront_notifications.sent", 1);
                }
                Err(e) => {
                    warn!(to = %message.to, subject = %message.subject, error = %e, "Failed to send email");
                    counter!("storefront_notifications.failed", 1);
                }
            }
        });
    }

    // wait for in-flight sends
    let _ = permits.acquire_many(workers as u32).await;
    debug!("Notification workers stopped");
}

fn short_id(order: &OrderModel) -> String {
    order.id.simple().to_string()[..8].to_uppercase()
}

pub fn format_money(cents: i64, currency: &str) -> String {
    format!("{} {}", Decimal::new(cents, 2), currency.to_uppercase())
}

fn order_data(order: &OrderModel, items: &[OrderItemModel]) -> serde_json::Value {
    json!({
        "order_id": order.id,
        "checkout_session_id": order.checkout_session_id,
        "customer_email": order.customer_email,
        "customer_name": order.customer_name,
        "currency": order.currency,
        "subtotal_cents": order.subtotal_cents,
        "tax_cents": order.tax_cents,
        "shipping_cents": order.shipping_cents,
        "discount_cents": order.discount_cents,
        "total_cents": order.total_cents,
        "promotion_code": order.promotion_code,
        "items": items.iter().map(|item| json!({
            "product_id": item.product_id,
            "product_name": item.product_name,
            "sku": item.sku,
            "quantity": item.quantity,
            "unit_price_cents": item.unit_price_cents,
            "line_total_cents": item.line_total_cents,
        })).collect::<Vec<_>>(),
    })
}

fn render_lines(order: &OrderModel, items: &[OrderItemModel], out: &mut String) {
    for item in items {
        out.push_str(&format!(
            "  {} x {} @ {} = {}\n",
            item.quantity,
            item.product_name,
            format_money(item.unit_price_cents, &order.currency),
            format_money(item.line_total_cents, &order.currency)
        ));
    }
    out.push('\n');
    if let (Some(original), Some(discount)) = (order.original_subtotal_cents, order.discount_cents) {
        out.push_str(&format!("Items:     {}\n", format_money(original, &order.currency)));
        match &order.promotion_code {
            Some(code) => out.push_str(&format!(
                "Discount:  -{} ({})\n",
                format_money(discount, &order.currency),
                code
            )),
            None => out.push_str(&format!(
                "Discount:  -{}\n",
                format_money(discount, &order.currency)
            )),
        }
    }
    out.push_str(&format!("Subtotal:  {}\n", format_money(order.subtotal_cents, &order.currency)));
    out.push_str(&format!("Shipping:  {}\n", format_money(order.shipping_cents, &order.currency)));
    out.push_str(&format!("Tax:       {}\n", format_money(order.tax_cents, &order.currency)));
    out.push_str(&format!("Total:     {}\n", format_money(order.total_cents, &order.currency)));
}

pub fn render_customer_confirmation(
    store_name: &str,
    order: &OrderModel,
    items: &[OrderItemModel],
) -> String {
    let greeting = order
        .customer_name
        .as_deref()
        .map(|name| format!("Hi {},", name))
        .unwrap_or_else(|| "Hi,".to_string());

    let mut body = format!(
        "{}\n\nThanks for your order from {}! We've received order {} and will let you know when it ships.\n\n",
        greeting,
        store_name,
        short_id(order)
    );
    render_lines(order, items, &mut body);
    body
}

pub fn render_admin_notification(order: &OrderModel, items: &[OrderItemModel]) -> String {
    let mut body = format!(
        "Order {}\nCheckout session: {}\nCustomer: {} <{}>\n\n",
        order.id,
        order.checkout_session_id,
        order.customer_name.as_deref().unwrap_or("-"),
        order.customer_email.as_deref().unwrap_or("-"),
    );
    render_lines(order, items, &mut body);
    if order.shipping_cents == 0 {
        body.push_str("\nNo validated shipping quote was attached to this order.\n");
    }
    body
}
