//! Reviewer packet entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub topic_id: i64,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    pub created: DateTimeWithTimeZone,

    pub created_by: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub reviewers: Json,

    #[sea_orm(column_type = "JsonBinary")]
    pub summaries: Json,

    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::packet_article::Entity")]
    PacketArticles,
}

impl Related<super::packet_article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PacketArticles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
