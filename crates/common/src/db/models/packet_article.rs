//! Packet membership entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packet_articles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub packet_id: i64,

    pub article_id: i64,

    pub dropped: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::packet::Entity",
        from = "Column::PacketId",
        to = "super::packet::Column::Id"
    )]
    Packet,

    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::packet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Packet.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
