use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_promotion_tables::Migration),
            Box::new(m20240601_000002_create_orders_table::Migration),
            Box::new(m20240601_000003_create_order_items_table::Migration),
            Box::new(m20240601_000004_create_shipping_selection_tables::Migration),
            Box::new(m20240601_000005_create_cart_items_table::Migration),
        ]
    }
}

mod m20240601_000001_create_promotion_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_promotion_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PromotionCampaigns::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromotionCampaigns::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromotionCampaigns::Name).string().not_null())
                        .col(
                            ColumnDef::new(PromotionCampaigns::DiscountType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromotionCampaigns::PercentOff).integer().null())
                        .col(
                            ColumnDef::new(PromotionCampaigns::AmountOffCents)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PromotionCampaigns::ExternalCouponId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PromotionCampaigns::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Campaign names are a lookup key, deliberately not UNIQUE
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_promotion_campaigns_name")
                        .table(PromotionCampaigns::Table)
                        .col(PromotionCampaigns::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PromotionCodes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromotionCodes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromotionCodes::CampaignId).uuid().not_null())
                        .col(
                            ColumnDef::new(PromotionCodes::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PromotionCodes::ExternalId).string().null())
                        .col(
                            ColumnDef::new(PromotionCodes::IsExternal)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PromotionCodes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_promotion_codes_campaign_id")
                                .from(PromotionCodes::Table, PromotionCodes::CampaignId)
                                .to(PromotionCampaigns::Table, PromotionCampaigns::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PromotionCodes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PromotionCampaigns::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PromotionCampaigns {
        Table,
        Id,
        Name,
        DiscountType,
        PercentOff,
        AmountOffCents,
        ExternalCouponId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum PromotionCodes {
        Table,
        Id,
        CampaignId,
        Code,
        ExternalId,
        IsExternal,
        CreatedAt,
    }
}

mod m20240601_000002_create_orders_table {
    use sea_orm_migration::prelude::*;

    use super::m20240601_000001_create_promotion_tables::PromotionCodes;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::CheckoutSessionId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CartSessionId).string().null())
                        .col(ColumnDef::new(Orders::UserId).uuid().null())
                        .col(ColumnDef::new(Orders::CustomerId).string().null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().null())
                        .col(ColumnDef::new(Orders::CustomerName).string().null())
                        .col(ColumnDef::new(Orders::ShippingName).string().null())
                        .col(ColumnDef::new(Orders::ShippingAddress).text().null())
                        .col(ColumnDef::new(Orders::BillingAddress).text().null())
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::SubtotalCents).big_integer().not_null())
                        .col(ColumnDef::new(Orders::TaxCents).big_integer().not_null())
                        .col(ColumnDef::new(Orders::ShippingCents).big_integer().not_null())
                        .col(ColumnDef::new(Orders::TotalCents).big_integer().not_null())
                        .col(
                            ColumnDef::new(Orders::OriginalSubtotalCents)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::DiscountCents).big_integer().null())
                        .col(ColumnDef::new(Orders::PromotionCodeId).uuid().null())
                        .col(ColumnDef::new(Orders::PromotionCode).string().null())
                        .col(ColumnDef::new(Orders::PaymentIntentId).string().null())
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string_len(20)
                                .not_null()
                                .default("received"),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_promotion_code_id")
                                .from(Orders::Table, Orders::PromotionCodeId)
                                .to(PromotionCodes::Table, PromotionCodes::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_email")
                        .table(Orders::Table)
                        .col(Orders::CustomerEmail)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        CheckoutSessionId,
        CartSessionId,
        UserId,
        CustomerId,
        CustomerEmail,
        CustomerName,
        ShippingName,
        ShippingAddress,
        BillingAddress,
        Currency,
        SubtotalCents,
        TaxCents,
        ShippingCents,
        TotalCents,
        OriginalSubtotalCents,
        DiscountCents,
        PromotionCodeId,
        PromotionCode,
        PaymentIntentId,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_order_items_table {
    use sea_orm_migration::prelude::*;

    use super::m20240601_000002_create_orders_table::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Sku).string().null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPriceCents)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotalCents)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Sku,
        Quantity,
        UnitPriceCents,
        LineTotalCents,
        CreatedAt,
    }
}

mod m20240601_000004_create_shipping_selection_tables {
    use sea_orm_migration::prelude::*;

    use super::m20240601_000002_create_orders_table::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_shipping_selection_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SessionShippingSelections::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SessionShippingSelections::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::SessionId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::RateId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::Carrier)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::Service)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::ShippingCents)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::DeliveryDays)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::CartSnapshot)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::Status)
                                .string_len(20)
                                .not_null()
                                .default("quoted"),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionShippingSelections::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderShippingSelections::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderShippingSelections::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::SourceSelectionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::RateId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::Carrier)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::Service)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::ShippingCents)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::DeliveryDays)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderShippingSelections::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_shipping_selections_order_id")
                                .from(
                                    OrderShippingSelections::Table,
                                    OrderShippingSelections::OrderId,
                                )
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderShippingSelections::Table).to_owned())
                .await?;
            manager
                .drop_table(
                    Table::drop()
                        .table(SessionShippingSelections::Table)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SessionShippingSelections {
        Table,
        Id,
        SessionId,
        RateId,
        Carrier,
        Service,
        ShippingCents,
        DeliveryDays,
        CartSnapshot,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderShippingSelections {
        Table,
        Id,
        OrderId,
        SourceSelectionId,
        RateId,
        Carrier,
        Service,
        ShippingCents,
        DeliveryDays,
        CreatedAt,
    }
}

mod m20240601_000005_create_cart_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_cart_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::SessionId).string().not_null())
                        .col(ColumnDef::new(CartItems::UserId).uuid().null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CartItems::UnitPriceCents)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_session_id")
                        .table(CartItems::Table)
                        .col(CartItems::SessionId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_user_id")
                        .table(CartItems::Table)
                        .col(CartItems::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        SessionId,
        UserId,
        ProductId,
        Quantity,
        UnitPriceCents,
        CreatedAt,
        UpdatedAt,
    }
}
