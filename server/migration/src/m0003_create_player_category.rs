use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlayerCategory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PlayerCategory::PlayerId).integer().not_null())
                    .col(
                        ColumnDef::new(PlayerCategory::CategoryId)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PlayerCategory::PlayerId)
                            .col(PlayerCategory::CategoryId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_player_category_player")
                            .from(PlayerCategory::Table, PlayerCategory::PlayerId)
                            .to(Players::Table, Players::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_player_category_category")
                            .from(PlayerCategory::Table, PlayerCategory::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;
        // reverse lookups: players in a category
        manager
            .create_index(
                Index::create()
                    .name("idx_player_category_category")
                    .table(PlayerCategory::Table)
                    .col(PlayerCategory::CategoryId)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlayerCategory::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum PlayerCategory {
    Table,
    PlayerId,
    CategoryId,
}

#[derive(Iden)]
enum Players {
    Table,
    Id,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
}
