pub use sea_orm_migration::prelude::*;

mod m0001_create_categories;
mod m0002_create_players;
mod m0003_create_player_category;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_categories::Migration),
            Box::new(m0002_create_players::Migration),
            Box::new(m0003_create_player_category::Migration),
        ]
    }
}
