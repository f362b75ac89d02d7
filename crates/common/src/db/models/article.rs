//! Article entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// PubMed id
    #[sea_orm(column_type = "Text")]
    pub source_id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Author search names, in citation order
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    #[sea_orm(column_type = "Text")]
    pub journal_title: String,

    #[sea_orm(column_type = "Text")]
    pub brief_journal_title: String,

    #[sea_orm(column_type = "Text")]
    pub source_journal_id: String,

    pub core_journal: bool,

    pub year: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub full_text_file: Option<String>,

    pub full_text_retrieved: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,

    pub imported: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
