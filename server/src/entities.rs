use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub mod categories {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "categories")]
    #[serde(rename_all = "camelCase")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub logo_url: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::player_category::Entity")]
        PlayerCategory,
    }

    impl Related<super::player_category::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::PlayerCategory.def()
        }
    }

    impl Related<super::players::Entity> for Entity {
        fn to() -> RelationDef {
            super::player_category::Relation::Player.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::player_category::Relation::Category.def().rev())
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod players {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "players")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub logo_url: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::player_category::Entity")]
        PlayerCategory,
    }

    impl Related<super::player_category::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::PlayerCategory.def()
        }
    }

    impl Related<super::categories::Entity> for Entity {
        fn to() -> RelationDef {
            super::player_category::Relation::Category.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::player_category::Relation::Player.def().rev())
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Join table between players and categories. A row has no identity beyond
/// the pair of keys.
pub mod player_category {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "player_category")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub player_id: i32,
        #[sea_orm(primary_key, auto_increment = false)]
        pub category_id: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::players::Entity",
            from = "Column::PlayerId",
            to = "super::players::Column::Id",
            on_delete = "Cascade"
        )]
        Player,
        #[sea_orm(
            belongs_to = "super::categories::Entity",
            from = "Column::CategoryId",
            to = "super::categories::Column::Id",
            on_delete = "Restrict"
        )]
        Category,
    }

    impl Related<super::players::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Player.def()
        }
    }

    impl Related<super::categories::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Category.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}
