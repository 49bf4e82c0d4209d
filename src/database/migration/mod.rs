use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20250815_000001_create_users_table;
mod m20250815_000002_create_refresh_tokens_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250815_000001_create_users_table::Migration),
            Box::new(m20250815_000002_create_refresh_tokens_table::Migration),
        ]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    DisplayName,
    CreatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    FamilyId,
    TokenHash,
    PreviousTokenHash,
    Generation,
    DeviceId,
    IssuedAt,
    ExpiresAt,
    UsedAt,
    RevokeReason,
}
