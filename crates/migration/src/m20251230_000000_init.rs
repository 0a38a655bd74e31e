//! Initial schema.
//!
//! - `users`: ledger owners
//! - `accounts`: money locations with their cached balance
//! - `transactions`: the append-only ledger, amendments kept as JSON history
//! - `budgets`: per-category spending ceilings and their alert state
//! - `goals`: savings targets
//! - `insights`: advisory findings of the insight engine
//!
//! Ids are UUID strings, amounts are `i64` minor units.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    Name,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Name,
    AccountType,
    Currency,
    Active,
    BalanceMinor,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    AccountId,
    TransactionType,
    TransferDirection,
    AmountMinor,
    Currency,
    Category,
    Description,
    OccurredAt,
    Recurrence,
    Tags,
    Sequence,
    Revision,
    History,
    TransferId,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    UserId,
    Name,
    Category,
    LimitMinor,
    Currency,
    Period,
    StartDate,
    EndDate,
    #[iden = "alert_50"]
    Alert50,
    #[iden = "alert_75"]
    Alert75,
    #[iden = "alert_90"]
    Alert90,
    Active,
    AlertWindowStart,
    AlertedState,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Goals {
    Table,
    Id,
    UserId,
    Title,
    Description,
    TargetMinor,
    CurrentMinor,
    Currency,
    TargetDate,
    Category,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Insights {
    Table,
    Id,
    UserId,
    InsightType,
    Title,
    Description,
    Category,
    Impact,
    Confidence,
    Data,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Users::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Tombstoned users keep their email, so this is not unique.
        manager
            .create_index(
                Index::create()
                    .name("idx-users-email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::UserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::AccountType).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Currency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(ColumnDef::new(Accounts::Active).boolean().not_null())
                    .col(
                        ColumnDef::new(Accounts::BalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Accounts::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-user_id")
                            .from(Accounts::Table, Accounts::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-user_id")
                    .table(Accounts::Table)
                    .col(Accounts::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::AccountId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::TransferDirection).string())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Currency).string().not_null())
                    .col(ColumnDef::new(Transactions::Category).string().not_null())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Recurrence).string())
                    .col(
                        ColumnDef::new(Transactions::Tags)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Transactions::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Revision)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Transactions::History)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Transactions::TransferId).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-account_id")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-user_id")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-account_id-sequence")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .col(Transactions::Sequence)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-transfer_id")
                    .table(Transactions::Table)
                    .col(Transactions::TransferId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Budgets::UserId).string().not_null())
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(ColumnDef::new(Budgets::Category).string().not_null())
                    .col(ColumnDef::new(Budgets::LimitMinor).big_integer().not_null())
                    .col(ColumnDef::new(Budgets::Currency).string().not_null())
                    .col(ColumnDef::new(Budgets::Period).string().not_null())
                    .col(ColumnDef::new(Budgets::StartDate).date().not_null())
                    .col(ColumnDef::new(Budgets::EndDate).date())
                    .col(
                        ColumnDef::new(Budgets::Alert50)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Budgets::Alert75)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Budgets::Alert90)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Budgets::Active).boolean().not_null())
                    .col(ColumnDef::new(Budgets::AlertWindowStart).date())
                    .col(ColumnDef::new(Budgets::AlertedState).string())
                    .col(
                        ColumnDef::new(Budgets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Budgets::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-user_id")
                            .from(Budgets::Table, Budgets::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-user_id-category")
                    .table(Budgets::Table)
                    .col(Budgets::UserId)
                    .col(Budgets::Category)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Goals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Goals::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Goals::UserId).string().not_null())
                    .col(ColumnDef::new(Goals::Title).string().not_null())
                    .col(ColumnDef::new(Goals::Description).string())
                    .col(ColumnDef::new(Goals::TargetMinor).big_integer().not_null())
                    .col(ColumnDef::new(Goals::CurrentMinor).big_integer().not_null())
                    .col(ColumnDef::new(Goals::Currency).string().not_null())
                    .col(ColumnDef::new(Goals::TargetDate).date().not_null())
                    .col(ColumnDef::new(Goals::Category).string().not_null())
                    .col(
                        ColumnDef::new(Goals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Goals::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-goals-user_id")
                            .from(Goals::Table, Goals::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Insights::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Insights::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Insights::UserId).string().not_null())
                    .col(ColumnDef::new(Insights::InsightType).string().not_null())
                    .col(ColumnDef::new(Insights::Title).string().not_null())
                    .col(ColumnDef::new(Insights::Description).text().not_null())
                    .col(ColumnDef::new(Insights::Category).string())
                    .col(ColumnDef::new(Insights::Impact).string().not_null())
                    .col(ColumnDef::new(Insights::Confidence).double().not_null())
                    .col(
                        ColumnDef::new(Insights::Data)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Insights::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-insights-user_id")
                            .from(Insights::Table, Insights::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-insights-user_id-created_at")
                    .table(Insights::Table)
                    .col(Insights::UserId)
                    .col(Insights::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Insights::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Goals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
