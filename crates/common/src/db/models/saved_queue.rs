//! Saved review queue entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "saved_queues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub queue_type: String,

    pub owner: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub filters: Json,

    #[sea_orm(column_type = "JsonBinary")]
    pub display: Json,

    /// Pending decisions, `[{article_id, topic_id, decision}]`
    #[sea_orm(column_type = "JsonBinary")]
    pub staged: Json,

    pub created: DateTimeWithTimeZone,

    pub retired: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
