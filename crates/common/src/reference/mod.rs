//! Display names for the identifiers the core stores

use crate::domain::{BoardId, Decision, Disposition, QueueType, StateValue, TopicId};
use crate::errors::Result;
use crate::store::CatalogStore;
use std::collections::HashMap;

/// Resolves opaque identifiers to display names
pub trait ReferenceData: Send + Sync {
    fn state_name(&self, state: StateValue) -> String;

    fn decision_name(&self, queue: QueueType, decision: Decision) -> String;

    fn disposition_name(&self, disposition: Disposition) -> String;

    fn board_name(&self, board: BoardId) -> Option<String>;

    fn topic_name(&self, topic: TopicId) -> Option<String>;
}

/// In-memory lookup tables
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceData {
    boards: HashMap<BoardId, String>,
    topics: HashMap<TopicId, String>,
}

impl StaticReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(mut self, board: BoardId, name: impl Into<String>) -> Self {
        self.boards.insert(board, name.into());
        self
    }

    pub fn with_topic(mut self, topic: TopicId, name: impl Into<String>) -> Self {
        self.topics.insert(topic, name.into());
        self
    }

    /// Snapshot board and topic names from the catalog
    pub async fn load<S>(catalog: &S, boards: &[BoardId]) -> Result<Self>
    where
        S: CatalogStore + ?Sized,
    {
        let mut data = Self::new();
        for id in boards {
            if let Some(board) = catalog.board(*id).await? {
                data.boards.insert(board.id, board.name);
            }
            for topic in catalog.topics_for_board(*id).await? {
                data.topics.insert(topic.id, topic.name);
            }
        }
        tracing::debug!(
            boards = data.boards.len(),
            topics = data.topics.len(),
            "Reference data loaded"
        );
        Ok(data)
    }
}

impl ReferenceData for StaticReferenceData {
    fn state_name(&self, state: StateValue) -> String {
        let name = match state {
            StateValue::ReadyInitReview => "Ready for initial review",
            StateValue::RejectJournalTitle => "Rejected by NOT list",
            StateValue::RejectInitReview => "Rejected in initial review",
            StateValue::PassedInitReview => "Passed initial review",
            StateValue::Published => "Published",
            StateValue::RejectBmReview => "Rejected by Board Manager",
            StateValue::PassedBmReview => "Passed Board Manager",
            StateValue::RejectFullReview => "Rejected after full text review",
            StateValue::OnHold => "On Hold",
            StateValue::Fyi => "Flagged as FYI",
            StateValue::PassedFullReview => "Passed full text review",
            StateValue::OnAgenda => "On agenda",
            StateValue::FinalBoardDecision => "Editorial Board decision",
            StateValue::FullEnd => "Processing complete",
        };
        name.to_string()
    }

    fn decision_name(&self, queue: QueueType, decision: Decision) -> String {
        match queue.next_state(decision) {
            Some(next) => format!("{} ({})", decision.label(), self.state_name(next)),
            None => decision.label().to_string(),
        }
    }

    fn disposition_name(&self, disposition: Disposition) -> String {
        disposition.label().to_string()
    }

    fn board_name(&self, board: BoardId) -> Option<String> {
        self.boards.get(&board).cloned()
    }

    fn topic_name(&self, topic: TopicId) -> Option<String> {
        self.topics.get(&topic).cloned()
    }
}
