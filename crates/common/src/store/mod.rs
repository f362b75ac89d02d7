//! Storage seams for the review core
//!
//! Services hold an `Arc<dyn ReviewStore>`; production wires in the SeaORM
//! implementation from [`crate::db`], tests and local runs use [`MemoryStore`].

mod memory;

pub use memory::MemoryStore;

use crate::domain::{
    Article, ArticleId, ArticleTopic, Board, BoardId, Cycle, NewPacket, NewReview, NewState,
    Packet, PacketArticle, PacketArticleId, PacketId, PairKey, QueueDefinition, QueueId, Review,
    StateId, StateRecord, StateValue, Topic, TopicId, UserId,
};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Optional narrowing for state counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateScope {
    pub board: Option<BoardId>,
    pub topic: Option<TopicId>,
    pub cycle: Option<Cycle>,
}

/// Reference records the review core reads
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn board(&self, id: BoardId) -> Result<Option<Board>>;

    async fn topic(&self, id: TopicId) -> Result<Option<Topic>>;

    /// Topics owned by a board, ordered by id
    async fn topics_for_board(&self, board: BoardId) -> Result<Vec<Topic>>;

    async fn article(&self, id: ArticleId) -> Result<Option<Article>>;

    /// Bulk article lookup; missing ids are skipped
    async fn articles(&self, ids: &[ArticleId]) -> Result<Vec<Article>>;

    async fn article_topic(&self, pair: PairKey) -> Result<Option<ArticleTopic>>;

    async fn save_board(&self, board: Board) -> Result<()>;

    async fn save_topic(&self, topic: Topic) -> Result<()>;

    /// Insert or replace an article record
    async fn save_article(&self, article: Article) -> Result<()>;

    /// Create the assignment; fails with `Validation` if the pair already exists
    async fn insert_article_topic(&self, assignment: ArticleTopic) -> Result<()>;

    async fn set_cycle(&self, pair: PairKey, cycle: Cycle) -> Result<()>;

    async fn journal_excluded(&self, board: BoardId, source_journal_id: &str) -> Result<bool>;

    async fn exclude_journal(&self, board: BoardId, source_journal_id: &str) -> Result<()>;
}

/// Append-only state history with the current-flag invariant
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The row with `current = true`, if the pair was ever processed
    async fn current_state(&self, pair: PairKey) -> Result<Option<StateRecord>>;

    /// Append a new current row, retiring `expected` in the same atomic step.
    ///
    /// `expected` must name the row that is current right now (or be `None`
    /// for a pair with no history); otherwise the write is refused with
    /// `ConcurrentModification`. The stored `entered` is never earlier than
    /// the retired row's.
    async fn append_state(&self, state: NewState, expected: Option<StateId>)
        -> Result<StateRecord>;

    /// All rows for the pair, oldest first
    async fn history(&self, pair: PairKey) -> Result<Vec<StateRecord>>;

    async fn count_by_state_and_scope(&self, value: StateValue, scope: StateScope) -> Result<u64>;

    /// Current rows in a state, limited to the given topics (or the board when
    /// no topics are given), ordered by article then topic
    async fn current_in_state(
        &self,
        value: StateValue,
        board: Option<BoardId>,
        topics: &[TopicId],
    ) -> Result<Vec<StateRecord>>;

    /// Current-state counts per topic of a board
    async fn count_current_by_topic(
        &self,
        value: StateValue,
        board: BoardId,
    ) -> Result<BTreeMap<TopicId, u64>>;
}

/// Saved queue definitions
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn insert_queue(&self, queue: QueueDefinition) -> Result<()>;

    async fn queue(&self, id: QueueId) -> Result<Option<QueueDefinition>>;

    /// Replace a stored definition; fails with `NotFound` for unknown ids
    async fn update_queue(&self, queue: QueueDefinition) -> Result<()>;
}

/// Packets, their memberships and the reviews posted against them
#[async_trait]
pub trait PacketStore: Send + Sync {
    async fn insert_packet(
        &self,
        packet: NewPacket,
        created_by: UserId,
        created: DateTime<Utc>,
    ) -> Result<(Packet, Vec<PacketArticle>)>;

    async fn packet(&self, id: PacketId) -> Result<Option<Packet>>;

    async fn packets_for_topic(&self, topic: TopicId) -> Result<Vec<Packet>>;

    /// Memberships of a packet, dropped ones included
    async fn packet_articles(&self, packet: PacketId) -> Result<Vec<PacketArticle>>;

    async fn set_dropped(
        &self,
        packet: PacketId,
        article: ArticleId,
        dropped: bool,
    ) -> Result<PacketArticle>;

    async fn insert_review(
        &self,
        packet_article: PacketArticleId,
        review: NewReview,
        posted: DateTime<Utc>,
    ) -> Result<Review>;

    async fn reviews(&self, packet_article: PacketArticleId) -> Result<Vec<Review>>;
}

/// Everything the review services need from storage
pub trait ReviewStore: CatalogStore + StateStore + QueueStore + PacketStore + Send + Sync {}

impl<T> ReviewStore for T where
    T: CatalogStore + StateStore + QueueStore + PacketStore + Send + Sync
{
}
