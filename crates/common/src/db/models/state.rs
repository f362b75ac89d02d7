//! State history entity
//!
//! Rows are append-only. The only permitted mutation is flipping `current`
//! from true to false when a newer row supersedes this one; a partial unique
//! index keeps at most one current row per article-topic pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "states")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub article_id: i64,

    pub topic_id: i64,

    /// Denormalized from the topic for board-wide queue queries
    pub board_id: i64,

    /// State text id, e.g. `passed_bm_review`
    #[sea_orm(column_type = "Text")]
    pub value: String,

    pub current: bool,

    pub entered: DateTimeWithTimeZone,

    pub actor: i64,

    /// Comments, board decisions, deciders and meetings
    #[sea_orm(column_type = "JsonBinary")]
    pub extra: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::topic::Entity",
        from = "Column::TopicId",
        to = "super::topic::Column::Id"
    )]
    Topic,
}

impl Related<super::topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topic.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
