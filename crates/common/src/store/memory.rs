//! In-memory store for development and testing

use super::{CatalogStore, PacketStore, QueueStore, StateScope, StateStore};
use crate::domain::{
    Article, ArticleId, ArticleTopic, Board, BoardId, Cycle, NewPacket, NewReview, NewState,
    Packet, PacketArticle, PacketArticleId, PacketId, PairKey, QueueDefinition, QueueId, Review,
    ReviewId, StateId, StateRecord, StateValue, Topic, TopicId, UserId,
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Sharded in-memory storage.
///
/// State histories live in one map entry per pair, so the compare-and-swap in
/// [`StateStore::append_state`] only ever locks the shard holding that pair.
#[derive(Debug, Default)]
pub struct MemoryStore {
    boards: DashMap<BoardId, Board>,
    topics: DashMap<TopicId, Topic>,
    articles: DashMap<ArticleId, Article>,
    article_topics: DashMap<PairKey, ArticleTopic>,
    exclusions: DashSet<(BoardId, String)>,
    states: DashMap<PairKey, Vec<StateRecord>>,
    queues: DashMap<QueueId, QueueDefinition>,
    packets: DashMap<PacketId, Packet>,
    packet_articles: DashMap<PacketArticleId, PacketArticle>,
    reviews: DashMap<PacketArticleId, Vec<Review>>,
    state_seq: AtomicI64,
    packet_seq: AtomicI64,
    packet_article_seq: AtomicI64,
    review_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn cycle_of(&self, pair: &PairKey) -> Option<Cycle> {
        self.article_topics.get(pair).map(|at| at.cycle)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn board(&self, id: BoardId) -> Result<Option<Board>> {
        Ok(self.boards.get(&id).map(|b| b.clone()))
    }

    async fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self.topics.get(&id).map(|t| t.clone()))
    }

    async fn topics_for_board(&self, board: BoardId) -> Result<Vec<Topic>> {
        let mut topics: Vec<Topic> = self
            .topics
            .iter()
            .filter(|t| t.board_id == board)
            .map(|t| t.clone())
            .collect();
        topics.sort_by_key(|t| t.id);
        Ok(topics)
    }

    async fn article(&self, id: ArticleId) -> Result<Option<Article>> {
        Ok(self.articles.get(&id).map(|a| a.clone()))
    }

    async fn articles(&self, ids: &[ArticleId]) -> Result<Vec<Article>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.articles.get(id).map(|a| a.clone()))
            .collect())
    }

    async fn article_topic(&self, pair: PairKey) -> Result<Option<ArticleTopic>> {
        Ok(self.article_topics.get(&pair).map(|at| at.clone()))
    }

    async fn save_board(&self, board: Board) -> Result<()> {
        self.boards.insert(board.id, board);
        Ok(())
    }

    async fn save_topic(&self, topic: Topic) -> Result<()> {
        self.topics.insert(topic.id, topic);
        Ok(())
    }

    async fn save_article(&self, article: Article) -> Result<()> {
        self.articles.insert(article.id, article);
        Ok(())
    }

    async fn insert_article_topic(&self, assignment: ArticleTopic) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.article_topics.entry(assignment.pair()) {
            Entry::Occupied(_) => Err(AppError::validation(
                "topic_id",
                format!("{} is already assigned", assignment.pair()),
            )),
            Entry::Vacant(slot) => {
                slot.insert(assignment);
                Ok(())
            }
        }
    }

    async fn set_cycle(&self, pair: PairKey, cycle: Cycle) -> Result<()> {
        let mut assignment = self
            .article_topics
            .get_mut(&pair)
            .ok_or_else(|| AppError::not_found("article_topic", pair))?;
        assignment.cycle = cycle;
        Ok(())
    }

    async fn journal_excluded(&self, board: BoardId, source_journal_id: &str) -> Result<bool> {
        Ok(self
            .exclusions
            .contains(&(board, source_journal_id.to_string())))
    }

    async fn exclude_journal(&self, board: BoardId, source_journal_id: &str) -> Result<()> {
        self.exclusions.insert((board, source_journal_id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn current_state(&self, pair: PairKey) -> Result<Option<StateRecord>> {
        Ok(self
            .states
            .get(&pair)
            .and_then(|history| history.iter().find(|s| s.current).cloned()))
    }

    async fn append_state(
        &self,
        state: NewState,
        expected: Option<StateId>,
    ) -> Result<StateRecord> {
        let pair = state.pair();
        // The entry guard holds the shard write lock for the whole swap
        let mut history = self.states.entry(pair).or_default();
        let current = history.iter().position(|s| s.current);

        let mut entered = state.entered;
        match (expected, current) {
            (None, None) => {}
            (Some(id), Some(index)) if history[index].id == id => {
                entered = entered.max(history[index].entered);
                history[index].current = false;
            }
            _ => return Err(AppError::ConcurrentModification { pair }),
        }

        let record = StateRecord {
            id: StateId(Self::next(&self.state_seq)),
            article_id: state.article_id,
            topic_id: state.topic_id,
            board_id: state.board_id,
            value: state.value,
            current: true,
            entered,
            actor: state.actor,
            extra: state.extra,
        };
        history.push(record.clone());
        Ok(record)
    }

    async fn history(&self, pair: PairKey) -> Result<Vec<StateRecord>> {
        Ok(self
            .states
            .get(&pair)
            .map(|history| history.clone())
            .unwrap_or_default())
    }

    async fn count_by_state_and_scope(&self, value: StateValue, scope: StateScope) -> Result<u64> {
        let matching: Vec<PairKey> = self
            .states
            .iter()
            .filter_map(|entry| {
                let current = entry.value().iter().find(|s| s.current)?;
                let in_scope = current.value == value
                    && scope.board.map_or(true, |b| current.board_id == b)
                    && scope.topic.map_or(true, |t| current.topic_id == t);
                in_scope.then(|| *entry.key())
            })
            .collect();

        let count = match scope.cycle {
            None => matching.len(),
            Some(cycle) => matching
                .iter()
                .filter(|pair| self.cycle_of(pair) == Some(cycle))
                .count(),
        };
        Ok(count as u64)
    }

    async fn current_in_state(
        &self,
        value: StateValue,
        board: Option<BoardId>,
        topics: &[TopicId],
    ) -> Result<Vec<StateRecord>> {
        let mut rows: Vec<StateRecord> = self
            .states
            .iter()
            .filter_map(|entry| entry.value().iter().find(|s| s.current).cloned())
            .filter(|s| s.value == value)
            .filter(|s| {
                if topics.is_empty() {
                    board.map_or(true, |b| s.board_id == b)
                } else {
                    topics.contains(&s.topic_id)
                }
            })
            .collect();
        rows.sort_by_key(|s| (s.article_id, s.topic_id));
        Ok(rows)
    }

    async fn count_current_by_topic(
        &self,
        value: StateValue,
        board: BoardId,
    ) -> Result<BTreeMap<TopicId, u64>> {
        let mut counts = BTreeMap::new();
        for entry in self.states.iter() {
            if let Some(current) = entry.value().iter().find(|s| s.current) {
                if current.value == value && current.board_id == board {
                    *counts.entry(current.topic_id).or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn insert_queue(&self, queue: QueueDefinition) -> Result<()> {
        self.queues.insert(queue.id, queue);
        Ok(())
    }

    async fn queue(&self, id: QueueId) -> Result<Option<QueueDefinition>> {
        Ok(self.queues.get(&id).map(|q| q.clone()))
    }

    async fn update_queue(&self, queue: QueueDefinition) -> Result<()> {
        let mut slot = self
            .queues
            .get_mut(&queue.id)
            .ok_or_else(|| AppError::not_found("queue", queue.id))?;
        *slot = queue;
        Ok(())
    }
}

#[async_trait]
impl PacketStore for MemoryStore {
    async fn insert_packet(
        &self,
        packet: NewPacket,
        created_by: UserId,
        created: DateTime<Utc>,
    ) -> Result<(Packet, Vec<PacketArticle>)> {
        let id = PacketId(Self::next(&self.packet_seq));
        let memberships: Vec<PacketArticle> = packet
            .articles
            .iter()
            .map(|article_id| PacketArticle {
                id: PacketArticleId(Self::next(&self.packet_article_seq)),
                packet_id: id,
                article_id: *article_id,
                dropped: false,
            })
            .collect();
        let stored = Packet {
            id,
            topic_id: packet.topic_id,
            name: packet.name,
            created,
            created_by,
            reviewers: packet.reviewers,
            summaries: packet.summaries,
            active: true,
        };
        for membership in &memberships {
            self.packet_articles.insert(membership.id, membership.clone());
        }
        self.packets.insert(id, stored.clone());
        Ok((stored, memberships))
    }

    async fn packet(&self, id: PacketId) -> Result<Option<Packet>> {
        Ok(self.packets.get(&id).map(|p| p.clone()))
    }

    async fn packets_for_topic(&self, topic: TopicId) -> Result<Vec<Packet>> {
        let mut packets: Vec<Packet> = self
            .packets
            .iter()
            .filter(|p| p.topic_id == topic)
            .map(|p| p.clone())
            .collect();
        packets.sort_by_key(|p| p.id);
        Ok(packets)
    }

    async fn packet_articles(&self, packet: PacketId) -> Result<Vec<PacketArticle>> {
        let mut rows: Vec<PacketArticle> = self
            .packet_articles
            .iter()
            .filter(|pa| pa.packet_id == packet)
            .map(|pa| pa.clone())
            .collect();
        rows.sort_by_key(|pa| pa.id);
        Ok(rows)
    }

    async fn set_dropped(
        &self,
        packet: PacketId,
        article: ArticleId,
        dropped: bool,
    ) -> Result<PacketArticle> {
        let mut membership = self
            .packet_articles
            .iter_mut()
            .find(|pa| pa.packet_id == packet && pa.article_id == article)
            .ok_or_else(|| {
                AppError::not_found("packet_article", format!("{packet}/{article}"))
            })?;
        membership.dropped = dropped;
        Ok(membership.clone())
    }

    async fn insert_review(
        &self,
        packet_article: PacketArticleId,
        review: NewReview,
        posted: DateTime<Utc>,
    ) -> Result<Review> {
        let stored = Review {
            id: ReviewId(Self::next(&self.review_seq)),
            packet_article_id: packet_article,
            reviewer: review.reviewer,
            posted,
            dispositions: review.dispositions,
            reasons: review.reasons,
            comments: review.comments,
            recorded_by: review.recorded_by,
        };
        self.reviews
            .entry(packet_article)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn reviews(&self, packet_article: PacketArticleId) -> Result<Vec<Review>> {
        Ok(self
            .reviews
            .get(&packet_article)
            .map(|r| r.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StateExtra;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_state(value: StateValue, entered: DateTime<Utc>) -> NewState {
        NewState {
            article_id: ArticleId(1),
            topic_id: TopicId(1),
            board_id: BoardId(1),
            value,
            actor: UserId(9),
            entered,
            extra: StateExtra::default(),
        }
    }

    #[tokio::test]
    async fn test_append_state_swaps_current_flag() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = store
            .append_state(new_state(StateValue::ReadyInitReview, now), None)
            .await
            .unwrap();
        let second = store
            .append_state(new_state(StateValue::PassedInitReview, now), Some(first.id))
            .await
            .unwrap();

        let history = store.history(second.pair()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].current);
        assert!(history[1].current);
        assert_eq!(
            store.current_state(second.pair()).await.unwrap().unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn test_stale_expectation_is_refused() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = store
            .append_state(new_state(StateValue::ReadyInitReview, now), None)
            .await
            .unwrap();
        store
            .append_state(new_state(StateValue::PassedInitReview, now), Some(first.id))
            .await
            .unwrap();

        let err = store
            .append_state(new_state(StateValue::RejectInitReview, now), Some(first.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConcurrentModification { .. }));

        let err = store
            .append_state(new_state(StateValue::ReadyInitReview, now), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.history(first.pair()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_entered_never_goes_backwards() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = store
            .append_state(new_state(StateValue::ReadyInitReview, now), None)
            .await
            .unwrap();
        let second = store
            .append_state(
                new_state(StateValue::PassedInitReview, now - Duration::hours(1)),
                Some(first.id),
            )
            .await
            .unwrap();
        assert_eq!(second.entered, now);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_swaps_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let first = store
            .append_state(new_state(StateValue::PassedBmReview, Utc::now()), None)
            .await
            .unwrap();
        let expected = first.id;

        let mut handles = Vec::new();
        for value in [StateValue::PassedFullReview, StateValue::RejectFullReview] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_state(new_state(value, Utc::now()), Some(expected))
                    .await
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        let history = store.history(first.pair()).await.unwrap();
        assert_eq!(history.iter().filter(|s| s.current).count(), 1);
    }

    #[tokio::test]
    async fn test_counts_respect_scope() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (article, topic, board) in [(1, 1, 1), (2, 1, 1), (3, 2, 1), (4, 3, 2)] {
            let state = NewState {
                article_id: ArticleId(article),
                topic_id: TopicId(topic),
                board_id: BoardId(board),
                ..new_state(StateValue::Published, now)
            };
            store.append_state(state, None).await.unwrap();
        }

        let all = store
            .count_by_state_and_scope(StateValue::Published, StateScope::default())
            .await
            .unwrap();
        assert_eq!(all, 4);
        let board = StateScope {
            board: Some(BoardId(1)),
            ..Default::default()
        };
        assert_eq!(
            store
                .count_by_state_and_scope(StateValue::Published, board)
                .await
                .unwrap(),
            3
        );
        let per_topic = store
            .count_current_by_topic(StateValue::Published, BoardId(1))
            .await
            .unwrap();
        assert_eq!(per_topic.get(&TopicId(1)), Some(&2));
        assert_eq!(per_topic.get(&TopicId(2)), Some(&1));
        assert_eq!(per_topic.get(&TopicId(3)), None);
    }
}
