pub use sea_orm_migration::prelude::*;

mod m20260601_000001_create_profiles_table;
mod m20260601_000002_create_products_table;
mod m20260601_000003_create_chat_messages_table;
mod m20260601_000004_create_notifications_table;
mod m20260614_000001_add_chat_perf_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260601_000001_create_profiles_table::Migration),
            Box::new(m20260601_000002_create_products_table::Migration),
            Box::new(m20260601_000003_create_chat_messages_table::Migration),
            Box::new(m20260601_000004_create_notifications_table::Migration),
            Box::new(m20260614_000001_add_chat_perf_indexes::Migration),
        ]
    }
}
