//! Reviewer packets, memberships and reviews

use super::ids::{ArticleId, PacketArticleId, PacketId, ReasonId, ReviewId, TopicId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A reviewer's categorical judgement on an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    WarrantsNoChanges,
    DeservesCitation,
    MeritsRevision,
    MeritsDiscussion,
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::WarrantsNoChanges => "Warrants no changes to the summary",
            Disposition::DeservesCitation => "Deserves citation in the summary",
            Disposition::MeritsRevision => "Merits revision of the text",
            Disposition::MeritsDiscussion => "Merits discussion",
        }
    }

    /// "No changes warranted" doubles as the reviewer's rejection signal
    pub fn is_rejection(&self) -> bool {
        matches!(self, Disposition::WarrantsNoChanges)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub topic_id: TopicId,
    pub name: String,
    pub created: DateTime<Utc>,
    pub created_by: UserId,
    pub reviewers: Vec<UserId>,
    #[serde(default)]
    pub summaries: Vec<String>,
    pub active: bool,
}

/// Membership of an article in a packet; never deleted, only dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketArticle {
    pub id: PacketArticleId,
    pub packet_id: PacketId,
    pub article_id: ArticleId,
    pub dropped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub packet_article_id: PacketArticleId,
    pub reviewer: UserId,
    pub posted: DateTime<Utc>,
    pub dispositions: Vec<Disposition>,
    #[serde(default)]
    pub reasons: Vec<ReasonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    /// Staff member who entered the review on the reviewer's behalf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPacket {
    pub topic_id: TopicId,
    pub name: String,
    pub reviewers: Vec<UserId>,
    pub articles: Vec<ArticleId>,
    #[serde(default)]
    pub summaries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub reviewer: UserId,
    pub dispositions: Vec<Disposition>,
    #[serde(default)]
    pub reasons: Vec<ReasonId>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub assigned: usize,
    pub completed: usize,
}

impl ResponseStatus {
    pub fn is_complete(&self) -> bool {
        self.assigned > 0 && self.completed >= self.assigned
    }
}

/// Aggregated dispositions for one article within a packet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionSummary {
    pub counts: BTreeMap<Disposition, usize>,
    pub respondents: usize,
    pub unanimous_rejection: bool,
}

impl DispositionSummary {
    pub fn from_reviews<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        let mut counts = BTreeMap::new();
        let mut respondents = std::collections::BTreeSet::new();
        for review in reviews {
            respondents.insert(review.reviewer);
            for disposition in &review.dispositions {
                *counts.entry(*disposition).or_insert(0) += 1;
            }
        }
        let unanimous_rejection = !respondents.is_empty()
            && !counts.is_empty()
            && counts.keys().all(Disposition::is_rejection);
        Self {
            counts,
            respondents: respondents.len(),
            unanimous_rejection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(reviewer: i64, dispositions: Vec<Disposition>) -> Review {
        Review {
            id: ReviewId(reviewer),
            packet_article_id: PacketArticleId(1),
            reviewer: UserId(reviewer),
            posted: Utc::now(),
            dispositions,
            reasons: vec![ReasonId(1)],
            comments: None,
            recorded_by: None,
        }
    }

    #[test]
    fn test_unanimous_rejection_requires_only_no_changes() {
        let reviews = vec![
            review(1, vec![Disposition::WarrantsNoChanges]),
            review(2, vec![Disposition::WarrantsNoChanges]),
        ];
        let summary = DispositionSummary::from_reviews(&reviews);
        assert!(summary.unanimous_rejection);
        assert_eq!(summary.respondents, 2);
        assert_eq!(summary.counts[&Disposition::WarrantsNoChanges], 2);

        let mixed = vec![
            review(1, vec![Disposition::WarrantsNoChanges]),
            review(2, vec![Disposition::MeritsDiscussion]),
        ];
        assert!(!DispositionSummary::from_reviews(&mixed).unanimous_rejection);
    }

    #[test]
    fn test_empty_summary_is_not_a_rejection() {
        let summary = DispositionSummary::from_reviews(&[]);
        assert!(!summary.unanimous_rejection);
        assert_eq!(summary.respondents, 0);
    }

    #[test]
    fn test_response_status_completion() {
        assert!(ResponseStatus { assigned: 2, completed: 2 }.is_complete());
        assert!(!ResponseStatus { assigned: 3, completed: 2 }.is_complete());
        assert!(!ResponseStatus { assigned: 0, completed: 0 }.is_complete());
    }
}
