//! Article-topic states and their history rows

use super::ids::{ArticleId, BoardId, MeetingId, PairKey, StateId, TopicId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing state an article-topic pair can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    ReadyInitReview,
    RejectJournalTitle,
    RejectInitReview,
    PassedInitReview,
    Published,
    RejectBmReview,
    PassedBmReview,
    RejectFullReview,
    OnHold,
    Fyi,
    PassedFullReview,
    OnAgenda,
    FinalBoardDecision,
    FullEnd,
}

impl StateValue {
    pub const ALL: [StateValue; 14] = [
        StateValue::ReadyInitReview,
        StateValue::RejectJournalTitle,
        StateValue::RejectInitReview,
        StateValue::PassedInitReview,
        StateValue::Published,
        StateValue::RejectBmReview,
        StateValue::PassedBmReview,
        StateValue::RejectFullReview,
        StateValue::OnHold,
        StateValue::Fyi,
        StateValue::PassedFullReview,
        StateValue::OnAgenda,
        StateValue::FinalBoardDecision,
        StateValue::FullEnd,
    ];

    /// Stable machine id, as persisted
    pub fn text_id(&self) -> &'static str {
        match self {
            StateValue::ReadyInitReview => "ready_init_review",
            StateValue::RejectJournalTitle => "reject_journal_title",
            StateValue::RejectInitReview => "reject_init_review",
            StateValue::PassedInitReview => "passed_init_review",
            StateValue::Published => "published",
            StateValue::RejectBmReview => "reject_bm_review",
            StateValue::PassedBmReview => "passed_bm_review",
            StateValue::RejectFullReview => "reject_full_review",
            StateValue::OnHold => "on_hold",
            StateValue::Fyi => "fyi",
            StateValue::PassedFullReview => "passed_full_review",
            StateValue::OnAgenda => "on_agenda",
            StateValue::FinalBoardDecision => "final_board_decision",
            StateValue::FullEnd => "full_end",
        }
    }

    /// Position in the processing pipeline
    pub fn sequence(&self) -> u16 {
        match self {
            StateValue::ReadyInitReview => 10,
            StateValue::RejectJournalTitle => 20,
            StateValue::RejectInitReview => 30,
            StateValue::PassedInitReview => 40,
            StateValue::Published => 50,
            StateValue::RejectBmReview => 60,
            StateValue::PassedBmReview => 70,
            StateValue::RejectFullReview => 80,
            StateValue::OnHold => 85,
            StateValue::Fyi => 88,
            StateValue::PassedFullReview => 90,
            StateValue::OnAgenda => 100,
            StateValue::FinalBoardDecision => 110,
            StateValue::FullEnd => 120,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StateValue::RejectJournalTitle
                | StateValue::RejectInitReview
                | StateValue::RejectBmReview
                | StateValue::RejectFullReview
                | StateValue::FullEnd
        )
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text_id())
    }
}

impl FromStr for StateValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateValue::ALL
            .iter()
            .copied()
            .find(|value| value.text_id() == s)
            .ok_or_else(|| format!("unknown state '{s}'"))
    }
}

/// Decision recorded by the board when a pair reaches `final_board_decision`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardDecision {
    Cited,
    CitedCitationOnly,
    CitedLegacy,
    NotCited,
    TextApproved,
    TextNeedsRevision,
    HoldForDiscussion,
    FurtherReviewRequired,
}

impl BoardDecision {
    pub fn label(&self) -> &'static str {
        match self {
            BoardDecision::Cited => "Cited",
            BoardDecision::CitedCitationOnly => "Cited (citation only)",
            BoardDecision::CitedLegacy => "Cited (legacy)",
            BoardDecision::NotCited => "Not cited",
            BoardDecision::TextApproved => "Text approved",
            BoardDecision::TextNeedsRevision => "Text needs to be revised",
            BoardDecision::HoldForDiscussion => "Hold for further discussion",
            BoardDecision::FurtherReviewRequired => "Further review required",
        }
    }
}

/// One board decision attached to a state row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDecisionEntry {
    pub decision: BoardDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub discussed: bool,
}

/// Free-text note attached to a state row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateComment {
    pub user: UserId,
    pub entered: DateTime<Utc>,
    pub body: String,
}

/// Side data carried by some states
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateExtra {
    #[serde(default)]
    pub comments: Vec<StateComment>,
    #[serde(default)]
    pub decisions: Vec<BoardDecisionEntry>,
    #[serde(default)]
    pub deciders: Vec<UserId>,
    #[serde(default)]
    pub meetings: Vec<MeetingId>,
}

/// One row of an article-topic's state history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: StateId,
    pub article_id: ArticleId,
    pub topic_id: TopicId,
    pub board_id: BoardId,
    pub value: StateValue,
    pub current: bool,
    pub entered: DateTime<Utc>,
    pub actor: UserId,
    #[serde(flatten)]
    pub extra: StateExtra,
}

impl StateRecord {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.article_id, self.topic_id)
    }

    /// Human-readable summary for states past full-text review
    pub fn later_state_description(&self) -> Option<String> {
        if self.value.sequence() <= StateValue::PassedFullReview.sequence() {
            return None;
        }
        let description = match self.value {
            StateValue::FinalBoardDecision => {
                let mut labels: Vec<&str> =
                    self.extra.decisions.iter().map(|d| d.decision.label()).collect();
                labels.sort_unstable();
                if labels.is_empty() {
                    "Editorial Board Decision (NO DECISION RECORDED)".to_string()
                } else {
                    format!("Editorial Board Decision ({})", labels.join("; "))
                }
            }
            StateValue::OnAgenda if self.extra.meetings.is_empty() => {
                "On Agenda (NO MEETINGS RECORDED)".to_string()
            }
            StateValue::OnAgenda => {
                let meetings: Vec<String> =
                    self.extra.meetings.iter().map(|m| format!("meeting {m}")).collect();
                format!("On Agenda ({})", meetings.join("; "))
            }
            other => format!("Board Manager Action ({other})"),
        };
        Some(description)
    }
}

/// Everything the store needs to append a new current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewState {
    pub article_id: ArticleId,
    pub topic_id: TopicId,
    pub board_id: BoardId,
    pub value: StateValue,
    pub actor: UserId,
    pub entered: DateTime<Utc>,
    pub extra: StateExtra,
}

impl NewState {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.article_id, self.topic_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_ids_round_trip_through_from_str() {
        for value in StateValue::ALL {
            assert_eq!(value.text_id().parse::<StateValue>().unwrap(), value);
        }
        assert!("passed".parse::<StateValue>().is_err());
    }

    #[test]
    fn test_sequence_is_strictly_increasing() {
        let mut previous = 0;
        for value in StateValue::ALL {
            assert!(value.sequence() > previous, "{value} out of order");
            previous = value.sequence();
        }
    }

    #[test]
    fn test_rejection_states() {
        assert!(StateValue::RejectJournalTitle.is_rejection());
        assert!(StateValue::RejectFullReview.is_rejection());
        assert!(!StateValue::OnHold.is_rejection());
        assert!(!StateValue::Fyi.is_rejection());
    }

    #[test]
    fn test_later_state_description() {
        let mut record = StateRecord {
            id: StateId(1),
            article_id: ArticleId(1),
            topic_id: TopicId(1),
            board_id: BoardId(1),
            value: StateValue::FinalBoardDecision,
            current: true,
            entered: Utc::now(),
            actor: UserId(1),
            extra: StateExtra::default(),
        };
        assert_eq!(
            record.later_state_description().as_deref(),
            Some("Editorial Board Decision (NO DECISION RECORDED)")
        );

        record.extra.decisions = vec![
            BoardDecisionEntry {
                decision: BoardDecision::TextApproved,
                notes: None,
                discussed: true,
            },
            BoardDecisionEntry {
                decision: BoardDecision::Cited,
                notes: None,
                discussed: true,
            },
        ];
        assert_eq!(
            record.later_state_description().as_deref(),
            Some("Editorial Board Decision (Cited; Text approved)")
        );

        record.value = StateValue::PassedFullReview;
        assert_eq!(record.later_state_description(), None);
    }
}
