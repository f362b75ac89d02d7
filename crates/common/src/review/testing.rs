//! Shared fixtures for the service unit tests

use super::{ReviewContext, ReviewServices, StateMachine};
use crate::activity::CollectingNotifier;
use crate::auth::Actor;
use crate::domain::{
    Article, ArticleId, ArticleTopic, Board, BoardId, Cycle, FullText, NewPacket, NewReview,
    NewState, Packet, PacketArticle, PacketArticleId, PacketId, PairKey, QueueDefinition, QueueId,
    QueueType, Review, StateExtra, StateId, StateRecord, StateValue, Topic, TopicId, UserId,
};
use crate::errors::{AppError, Result};
use crate::store::{CatalogStore, MemoryStore, PacketStore, QueueStore, StateScope, StateStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub(crate) const BOARD: BoardId = BoardId(1);
pub(crate) const TOPIC: TopicId = TopicId(10);
pub(crate) const ARTICLE: ArticleId = ArticleId(100);
pub(crate) const SPECIALIST: UserId = UserId(42);

pub(crate) struct Fixture {
    pub store: Arc<MemoryStore>,
    pub activity: Arc<CollectingNotifier>,
    pub services: ReviewServices,
    pub machine: Arc<StateMachine>,
    pub pair: PairKey,
}

pub(crate) fn article(id: ArticleId, retrieved_year: Option<i32>) -> Article {
    Article {
        id,
        source_id: format!("{}", 30_000_000 + id.0),
        title: format!("Article {id}"),
        authors: vec![format!("Author{id} A")],
        journal_title: "Journal of Clinical Oncology".into(),
        brief_journal_title: "J Clin Oncol".into(),
        source_journal_id: "8309333".into(),
        core_journal: id.0 % 2 == 0,
        year: Some(2020),
        full_text: retrieved_year.map(|year| FullText {
            file: format!("{id}.pdf"),
            retrieved: Utc.with_ymd_and_hms(year, 6, 1, 12, 0, 0).unwrap(),
        }),
        tags: Vec::new(),
        imported: Utc::now(),
    }
}

/// Track `article` for `topic`, entering the pair directly in `value`
pub(crate) async fn add_pair(
    store: &MemoryStore,
    article_id: ArticleId,
    topic_id: TopicId,
    value: StateValue,
) -> PairKey {
    if store.article(article_id).await.unwrap().is_none() {
        store.save_article(article(article_id, Some(2020))).await.unwrap();
    }
    let pair = PairKey::new(article_id, topic_id);
    store
        .insert_article_topic(ArticleTopic {
            article_id,
            topic_id,
            cycle: Cycle::month(2024, 1).unwrap(),
            tags: Vec::new(),
        })
        .await
        .unwrap();
    let board_id = store.topic(topic_id).await.unwrap().unwrap().board_id;
    store
        .append_state(
            NewState {
                article_id,
                topic_id,
                board_id,
                value,
                actor: UserId(1),
                entered: Utc::now(),
                extra: StateExtra::default(),
            },
            None,
        )
        .await
        .unwrap();
    pair
}

/// One board, one topic and one article-topic pair sitting in `value`
pub(crate) async fn seed(value: StateValue) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store
        .save_board(Board {
            id: BOARD,
            name: "Adult Treatment".into(),
            manager: Some(UserId(2)),
        })
        .await
        .unwrap();
    store
        .save_topic(Topic {
            id: TOPIC,
            board_id: BOARD,
            name: "Breast Cancer".into(),
            nci_reviewer: Some(SPECIALIST),
        })
        .await
        .unwrap();
    let pair = add_pair(&store, ARTICLE, TOPIC, value).await;

    let activity = Arc::new(CollectingNotifier::new());
    let context = ReviewContext::new(store.clone()).with_activity(activity.clone());
    let services = ReviewServices::new(context);
    Fixture {
        machine: services.machine.clone(),
        store,
        activity,
        services,
        pair,
    }
}

/// Board member holding the queue's permission
pub(crate) fn actor_for(queue: QueueType) -> Actor {
    let mut actor = Actor::new(UserId(7));
    actor.permissions = vec![queue.permission().to_string()];
    actor.boards = vec![BOARD];
    actor.review_all_topics = true;
    actor
}

/// `MemoryStore` that loses compare-and-swaps and cycle updates on request
pub(crate) struct FaultyStore {
    inner: Arc<MemoryStore>,
    lost_appends: Mutex<HashMap<PairKey, u32>>,
    fail_cycle_updates: bool,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            lost_appends: Mutex::new(HashMap::new()),
            fail_cycle_updates: false,
        }
    }

    /// The next `times` appends for `pair` fail as if another writer got there first
    pub fn lose_appends(self, pair: PairKey, times: u32) -> Self {
        self.lost_appends.lock().unwrap().insert(pair, times);
        self
    }

    pub fn failing_cycle_updates(mut self) -> Self {
        self.fail_cycle_updates = true;
        self
    }
}

#[async_trait]
impl CatalogStore for FaultyStore {
    async fn board(&self, id: BoardId) -> Result<Option<Board>> {
        self.inner.board(id).await
    }

    async fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        self.inner.topic(id).await
    }

    async fn topics_for_board(&self, board: BoardId) -> Result<Vec<Topic>> {
        self.inner.topics_for_board(board).await
    }

    async fn article(&self, id: ArticleId) -> Result<Option<Article>> {
        self.inner.article(id).await
    }

    async fn articles(&self, ids: &[ArticleId]) -> Result<Vec<Article>> {
        self.inner.articles(ids).await
    }

    async fn article_topic(&self, pair: PairKey) -> Result<Option<ArticleTopic>> {
        self.inner.article_topic(pair).await
    }

    async fn save_board(&self, board: Board) -> Result<()> {
        self.inner.save_board(board).await
    }

    async fn save_topic(&self, topic: Topic) -> Result<()> {
        self.inner.save_topic(topic).await
    }

    async fn save_article(&self, article: Article) -> Result<()> {
        self.inner.save_article(article).await
    }

    async fn insert_article_topic(&self, assignment: ArticleTopic) -> Result<()> {
        self.inner.insert_article_topic(assignment).await
    }

    async fn set_cycle(&self, pair: PairKey, cycle: Cycle) -> Result<()> {
        if self.fail_cycle_updates {
            return Err(AppError::DatabaseConnection {
                message: "connection reset".into(),
            });
        }
        self.inner.set_cycle(pair, cycle).await
    }

    async fn journal_excluded(&self, board: BoardId, source_journal_id: &str) -> Result<bool> {
        self.inner.journal_excluded(board, source_journal_id).await
    }

    async fn exclude_journal(&self, board: BoardId, source_journal_id: &str) -> Result<()> {
        self.inner.exclude_journal(board, source_journal_id).await
    }
}

#[async_trait]
impl StateStore for FaultyStore {
    async fn current_state(&self, pair: PairKey) -> Result<Option<StateRecord>> {
        self.inner.current_state(pair).await
    }

    async fn append_state(
        &self,
        state: NewState,
        expected: Option<StateId>,
    ) -> Result<StateRecord> {
        let pair = state.pair();
        {
            let mut lost = self.lost_appends.lock().unwrap();
            if let Some(remaining) = lost.get_mut(&pair).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(AppError::ConcurrentModification { pair });
            }
        }
        self.inner.append_state(state, expected).await
    }

    async fn history(&self, pair: PairKey) -> Result<Vec<StateRecord>> {
        self.inner.history(pair).await
    }

    async fn count_by_state_and_scope(&self, value: StateValue, scope: StateScope) -> Result<u64> {
        self.inner.count_by_state_and_scope(value, scope).await
    }

    async fn current_in_state(
        &self,
        value: StateValue,
        board: Option<BoardId>,
        topics: &[TopicId],
    ) -> Result<Vec<StateRecord>> {
        self.inner.current_in_state(value, board, topics).await
    }

    async fn count_current_by_topic(
        &self,
        value: StateValue,
        board: BoardId,
    ) -> Result<BTreeMap<TopicId, u64>> {
        self.inner.count_current_by_topic(value, board).await
    }
}

#[async_trait]
impl QueueStore for FaultyStore {
    async fn insert_queue(&self, queue: QueueDefinition) -> Result<()> {
        self.inner.insert_queue(queue).await
    }

    async fn queue(&self, id: QueueId) -> Result<Option<QueueDefinition>> {
        self.inner.queue(id).await
    }

    async fn update_queue(&self, queue: QueueDefinition) -> Result<()> {
        self.inner.update_queue(queue).await
    }
}

#[async_trait]
impl PacketStore for FaultyStore {
    async fn insert_packet(
        &self,
        packet: NewPacket,
        created_by: UserId,
        created: DateTime<Utc>,
    ) -> Result<(Packet, Vec<PacketArticle>)> {
        self.inner.insert_packet(packet, created_by, created).await
    }

    async fn packet(&self, id: PacketId) -> Result<Option<Packet>> {
        self.inner.packet(id).await
    }

    async fn packets_for_topic(&self, topic: TopicId) -> Result<Vec<Packet>> {
        self.inner.packets_for_topic(topic).await
    }

    async fn packet_articles(&self, packet: PacketId) -> Result<Vec<PacketArticle>> {
        self.inner.packet_articles(packet).await
    }

    async fn set_dropped(
        &self,
        packet: PacketId,
        article: ArticleId,
        dropped: bool,
    ) -> Result<PacketArticle> {
        self.inner.set_dropped(packet, article, dropped).await
    }

    async fn insert_review(
        &self,
        packet_article: PacketArticleId,
        review: NewReview,
        posted: DateTime<Utc>,
    ) -> Result<Review> {
        self.inner.insert_review(packet_article, review, posted).await
    }

    async fn reviews(&self, packet_article: PacketArticleId) -> Result<Vec<Review>> {
        self.inner.reviews(packet_article).await
    }
}

/// Services over a `FaultyStore` wrapping the fixture's store
pub(crate) fn services_over(store: FaultyStore) -> ReviewServices {
    ReviewServices::new(ReviewContext::new(Arc::new(store)))
}
