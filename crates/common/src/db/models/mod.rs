//! SeaORM entity models
//!
//! Database entities for the EBMS review core

mod article;
mod article_topic;
mod board;
mod journal_exclusion;
mod packet;
mod packet_article;
mod review;
mod saved_queue;
mod state;
mod topic;

pub use board::{
    Entity as BoardEntity,
    Model as BoardRow,
    ActiveModel as BoardActiveModel,
    Column as BoardColumn,
};

pub use topic::{
    Entity as TopicEntity,
    Model as TopicRow,
    ActiveModel as TopicActiveModel,
    Column as TopicColumn,
};

pub use article::{
    Entity as ArticleEntity,
    Model as ArticleRow,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
};

pub use article_topic::{
    Entity as ArticleTopicEntity,
    Model as ArticleTopicRow,
    ActiveModel as ArticleTopicActiveModel,
    Column as ArticleTopicColumn,
};

pub use journal_exclusion::{
    Entity as JournalExclusionEntity,
    ActiveModel as JournalExclusionActiveModel,
    Column as JournalExclusionColumn,
};

pub use state::{
    Entity as StateEntity,
    Model as StateRow,
    ActiveModel as StateActiveModel,
    Column as StateColumn,
};

pub use saved_queue::{
    Entity as SavedQueueEntity,
    Model as SavedQueueRow,
    ActiveModel as SavedQueueActiveModel,
    Column as SavedQueueColumn,
};

pub use packet::{
    Entity as PacketEntity,
    Model as PacketRow,
    ActiveModel as PacketActiveModel,
    Column as PacketColumn,
};

pub use packet_article::{
    Entity as PacketArticleEntity,
    Model as PacketArticleRow,
    ActiveModel as PacketArticleActiveModel,
    Column as PacketArticleColumn,
};

pub use review::{
    Entity as ReviewEntity,
    Model as ReviewRow,
    ActiveModel as ReviewActiveModel,
    Column as ReviewColumn,
};
