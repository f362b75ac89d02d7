//! Boards, topics, articles and their topic assignments

use super::ids::{ArticleId, BoardId, Cycle, PairKey, TagId, TopicId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub board_id: BoardId,
    pub name: String,
    /// Designated specialist reviewer for abstract review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nci_reviewer: Option<UserId>,
}

/// Retrieved full-text document for an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullText {
    pub file: String,
    pub retrieved: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    /// PubMed id
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub journal_title: String,
    pub brief_journal_title: String,
    /// NLM journal id, used by the journal exclusion rule
    pub source_journal_id: String,
    #[serde(default)]
    pub core_journal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<FullText>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub imported: DateTime<Utc>,
}

impl Article {
    pub fn has_full_text(&self) -> bool {
        self.full_text.is_some()
    }

    /// Search name of the first author, used for sorting
    pub fn first_author(&self) -> &str {
        self.authors.first().map(String::as_str).unwrap_or("")
    }
}

/// One article tracked for one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTopic {
    pub article_id: ArticleId,
    pub topic_id: TopicId,
    pub cycle: Cycle,
    #[serde(default)]
    pub tags: Vec<TagId>,
}

impl ArticleTopic {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.article_id, self.topic_id)
    }
}

/// Journal on a board's "not list"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalExclusion {
    pub board_id: BoardId,
    pub source_journal_id: String,
}
