//! Strongly typed identifiers

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

id_type!(
    /// Imported bibliographic record
    ArticleId
);
id_type!(
    /// Reviewable subject area, owned by one board
    TopicId
);
id_type!(
    /// PDQ editorial board
    BoardId
);
id_type!(
    /// CMS user account
    UserId
);
id_type!(
    /// Row in the state history table
    StateId
);
id_type!(PacketId);
id_type!(PacketArticleId);
id_type!(ReviewId);
id_type!(MeetingId);
id_type!(
    /// Article tag vocabulary term
    TagId
);
id_type!(
    /// Rejection reason vocabulary term
    ReasonId
);

/// Saved review queue definitions are addressed by UUID
pub type QueueId = uuid::Uuid;

/// The unit of review: one article tracked for one topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub article_id: ArticleId,
    pub topic_id: TopicId,
}

impl PairKey {
    pub fn new(article_id: ArticleId, topic_id: TopicId) -> Self {
        Self {
            article_id,
            topic_id,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "article {} / topic {}", self.article_id, self.topic_id)
    }
}

/// Monthly review period, stored as the first day of the month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct Cycle(NaiveDate);

impl Cycle {
    /// Cycle for a given year and month; `None` for an impossible month
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// Default cycle for a newly assigned topic: the month after `entered`
    pub fn following(entered: DateTime<Utc>) -> Self {
        let (year, month) = match entered.month() {
            12 => (entered.year() + 1, 1),
            m => (entered.year(), m + 1),
        };
        // First-of-month always exists for months 1..=12
        Self(NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl TryFrom<NaiveDate> for Cycle {
    type Error = String;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        if date.day() != 1 {
            return Err(format!("cycle {date} does not start on the first of the month"));
        }
        Ok(Self(date))
    }
}

impl From<Cycle> for NaiveDate {
    fn from(cycle: Cycle) -> Self {
        cycle.0
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%B %Y"))
    }
}

impl FromStr for Cycle {
    type Err = String;

    /// Accepts `YYYY-MM` or `YYYY-MM-01`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = if s.len() == 7 { format!("{s}-01") } else { s.to_string() };
        let date = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
            .map_err(|e| format!("invalid cycle '{s}': {e}"))?;
        Cycle::try_from(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_following_cycle_rolls_over_year() {
        let entered = Utc.with_ymd_and_hms(2023, 12, 14, 9, 30, 0).unwrap();
        assert_eq!(Cycle::following(entered), Cycle::month(2024, 1).unwrap());

        let entered = Utc.with_ymd_and_hms(2023, 5, 31, 23, 59, 59).unwrap();
        assert_eq!(Cycle::following(entered), Cycle::month(2023, 6).unwrap());
    }

    #[test]
    fn test_cycle_parsing() {
        assert_eq!("2024-03".parse::<Cycle>().unwrap(), Cycle::month(2024, 3).unwrap());
        assert_eq!("2024-03-01".parse::<Cycle>().unwrap(), Cycle::month(2024, 3).unwrap());
        assert!("2024-03-15".parse::<Cycle>().is_err());
        assert_eq!(Cycle::month(2024, 3).unwrap().to_string(), "March 2024");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let pair = PairKey::new(ArticleId(10), TopicId(2));
        let json = serde_json::to_value(pair).unwrap();
        assert_eq!(json, serde_json::json!({"article_id": 10, "topic_id": 2}));
    }
}
