//! Queue types and the decision table that drives transitions

use super::state::StateValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decision codes as submitted by the review UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Decision {
    /// Clears a staged decision
    None,
    Approve,
    Reject,
    Fyi,
    OnHold,
}

impl Decision {
    pub fn code(&self) -> u8 {
        match self {
            Decision::None => 0,
            Decision::Approve => 1,
            Decision::Reject => 2,
            Decision::Fyi => 3,
            Decision::OnHold => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::None => "None",
            Decision::Approve => "Approve",
            Decision::Reject => "Reject",
            Decision::Fyi => "FYI",
            Decision::OnHold => "On Hold",
        }
    }

    /// Past-tense verb used when describing staged decisions
    pub fn verb(&self) -> &'static str {
        match self {
            Decision::None => "unqueued",
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
            Decision::Fyi => "marked as FYI",
            Decision::OnHold => "placed on hold",
        }
    }
}

impl TryFrom<u8> for Decision {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Decision::None),
            1 => Ok(Decision::Approve),
            2 => Ok(Decision::Reject),
            3 => Ok(Decision::Fyi),
            4 => Ok(Decision::OnHold),
            other => Err(format!("unknown decision code {other}")),
        }
    }
}

impl From<Decision> for u8 {
    fn from(decision: Decision) -> Self {
        decision.code()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Review queue flavours, each operating on exactly one source state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueType {
    LibrarianReview,
    Publishing,
    AbstractReview,
    FullTextReview,
    OnHoldReview,
}

impl QueueType {
    pub const ALL: [QueueType; 5] = [
        QueueType::LibrarianReview,
        QueueType::Publishing,
        QueueType::AbstractReview,
        QueueType::FullTextReview,
        QueueType::OnHoldReview,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QueueType::LibrarianReview => "Librarian Review",
            QueueType::Publishing => "Publishing",
            QueueType::AbstractReview => "Abstract Review",
            QueueType::FullTextReview => "Full Text Review",
            QueueType::OnHoldReview => "On Hold Review",
        }
    }

    /// State a pair must currently occupy to appear in this queue
    pub fn source_state(&self) -> StateValue {
        match self {
            QueueType::LibrarianReview => StateValue::ReadyInitReview,
            QueueType::Publishing => StateValue::PassedInitReview,
            QueueType::AbstractReview => StateValue::Published,
            QueueType::FullTextReview => StateValue::PassedBmReview,
            QueueType::OnHoldReview => StateValue::OnHold,
        }
    }

    /// Next state for a decision, or `None` if the queue does not accept it
    pub fn next_state(&self, decision: Decision) -> Option<StateValue> {
        match (self, decision) {
            (QueueType::LibrarianReview, Decision::Approve) => Some(StateValue::PassedInitReview),
            (QueueType::LibrarianReview, Decision::Reject) => Some(StateValue::RejectInitReview),
            (QueueType::Publishing, Decision::Approve) => Some(StateValue::Published),
            (QueueType::AbstractReview, Decision::Approve) => Some(StateValue::PassedBmReview),
            (QueueType::AbstractReview, Decision::Reject) => Some(StateValue::RejectBmReview),
            (QueueType::FullTextReview, Decision::Approve) => Some(StateValue::PassedFullReview),
            (QueueType::FullTextReview, Decision::Reject) => Some(StateValue::RejectFullReview),
            (QueueType::FullTextReview, Decision::Fyi) => Some(StateValue::Fyi),
            (QueueType::FullTextReview, Decision::OnHold) => Some(StateValue::OnHold),
            (QueueType::OnHoldReview, Decision::Approve) => Some(StateValue::PassedFullReview),
            (QueueType::OnHoldReview, Decision::Reject) => Some(StateValue::RejectFullReview),
            _ => None,
        }
    }

    /// Decisions offered by this queue, excluding `None`
    pub fn decisions(&self) -> Vec<Decision> {
        [Decision::Approve, Decision::Reject, Decision::Fyi, Decision::OnHold]
            .into_iter()
            .filter(|d| self.next_state(*d).is_some())
            .collect()
    }

    /// Whether decisions in this queue are scoped to the reviewer's topics
    pub fn is_topic_scoped(&self) -> bool {
        !matches!(self, QueueType::LibrarianReview | QueueType::Publishing)
    }

    /// Queue permission name checked by the authorizer
    pub fn permission(&self) -> &'static str {
        match self {
            QueueType::LibrarianReview => "perform initial article review",
            QueueType::Publishing => "publish articles",
            QueueType::AbstractReview => "perform abstract review",
            QueueType::FullTextReview => "perform full text review",
            QueueType::OnHoldReview => "perform full text review",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueueType {
    type Err = String;

    /// Accepts either the display name or the snake_case id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('_', " ");
        QueueType::ALL
            .iter()
            .copied()
            .find(|q| q.name().to_ascii_lowercase() == needle)
            .ok_or_else(|| format!("unknown queue type '{s}'"))
    }
}
