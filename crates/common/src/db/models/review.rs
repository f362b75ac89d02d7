//! Reviewer response entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub packet_article_id: i64,

    pub reviewer: i64,

    pub posted: DateTimeWithTimeZone,

    #[sea_orm(column_type = "JsonBinary")]
    pub dispositions: Json,

    #[sea_orm(column_type = "JsonBinary")]
    pub reasons: Json,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    pub recorded_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::packet_article::Entity",
        from = "Column::PacketArticleId",
        to = "super::packet_article::Column::Id"
    )]
    PacketArticle,
}

impl Related<super::packet_article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PacketArticle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
