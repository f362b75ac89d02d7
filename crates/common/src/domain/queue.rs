//! Saved review queue definitions and their pending-decision cache

use super::decision::{Decision, QueueType};
use super::ids::{BoardId, Cycle, PairKey, QueueId, TagId, TopicId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFilters {
    #[serde(default)]
    pub board: Option<BoardId>,
    #[serde(default)]
    pub topics: Vec<TopicId>,
    #[serde(default)]
    pub cycle: Option<Cycle>,
    #[serde(default)]
    pub tag: Option<TagId>,
    /// Title fragment, librarian queue only
    #[serde(default)]
    pub title: Option<String>,
    /// Brief journal title fragment, librarian queue only
    #[serde(default)]
    pub journal: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    EbmsId,
    Pmid,
    Author,
    Title,
    Journal,
    PublicationDate,
    /// Core journals first, then journal title, then article title
    CoreJournals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    #[default]
    Brief,
    Abstract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub sort: SortKey,
    pub format: DisplayFormat,
    pub per_page: usize,
}

/// Staged decision for one pair, as exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedDecision {
    #[serde(flatten)]
    pub pair: PairKey,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDefinition {
    pub id: QueueId,
    pub queue_type: QueueType,
    pub owner: UserId,
    pub filters: QueueFilters,
    pub display: DisplayOptions,
    #[serde(with = "staged_list")]
    pub staged: BTreeMap<PairKey, Decision>,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired: Option<DateTime<Utc>>,
}

impl QueueDefinition {
    pub fn is_retired(&self) -> bool {
        self.retired.is_some()
    }

    pub fn staged_list(&self) -> Vec<StagedDecision> {
        self.staged
            .iter()
            .map(|(pair, decision)| StagedDecision {
                pair: *pair,
                decision: *decision,
            })
            .collect()
    }
}

/// JSON maps need string keys, so the cache travels as a list
mod staged_list {
    use super::{Decision, PairKey, StagedDecision};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        staged: &BTreeMap<PairKey, Decision>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<StagedDecision> = staged
            .iter()
            .map(|(pair, decision)| StagedDecision {
                pair: *pair,
                decision: *decision,
            })
            .collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<PairKey, Decision>, D::Error> {
        let list = Vec::<StagedDecision>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|s| (s.pair, s.decision)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArticleId, TopicId};

    #[test]
    fn test_staged_cache_serializes_as_list() {
        let mut staged = BTreeMap::new();
        staged.insert(PairKey::new(ArticleId(5), TopicId(2)), Decision::Fyi);
        let queue = QueueDefinition {
            id: uuid::Uuid::new_v4(),
            queue_type: QueueType::FullTextReview,
            owner: UserId(1),
            filters: QueueFilters::default(),
            display: DisplayOptions {
                sort: SortKey::default(),
                format: DisplayFormat::default(),
                per_page: 10,
            },
            staged,
            created: Utc::now(),
            retired: None,
        };

        let json = serde_json::to_value(&queue).unwrap();
        assert_eq!(
            json["staged"],
            serde_json::json!([{"article_id": 5, "topic_id": 2, "decision": 3}])
        );
        let back: QueueDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, queue);
    }
}
