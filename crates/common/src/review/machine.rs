//! Validated state transitions for single article-topic pairs
//!
//! Every write goes through [`StateStore::append_state`] with the id of the row
//! this machine observed as current, so a pair moved by someone else between
//! the read and the write is refused by the store rather than overwritten.
//!
//! [`StateStore::append_state`]: crate::store::StateStore::append_state

use super::ReviewContext;
use crate::auth::{Actor, IMPORT_PERMISSION};
use crate::domain::{
    Article, ArticleId, ArticleTopic, BoardDecisionEntry, Cycle, Decision, MeetingId, NewState,
    PairKey, QueueType, StateComment, StateExtra, StateId, StateRecord, StateValue, Topic,
    TopicId, UserId,
};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::store::StateScope;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How the first state of a new assignment is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    /// Import rule: `reject_journal_title` for excluded journals, otherwise
    /// `ready_init_review`
    Import,
    ReadyInitReview,
    /// Manager adds the topic straight into abstract review
    Published,
}

/// Request to start tracking an article for a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicAssignment {
    pub article_id: ArticleId,
    pub topic_id: TopicId,
    #[serde(default)]
    pub cycle: Option<Cycle>,
    pub initial: InitialState,
    #[serde(default)]
    pub comment: Option<String>,
}

pub struct StateMachine {
    context: Arc<ReviewContext>,
}

impl StateMachine {
    pub fn new(context: Arc<ReviewContext>) -> Self {
        Self { context }
    }

    /// Apply one queue decision to a pair.
    ///
    /// Checks run in a fixed order: decision code, referenced records, FYI
    /// provenance, caller scope, then the pair's current state. A `cycle`
    /// re-targets the assignment's review cycle once the transition is stored.
    #[instrument(
        skip(self, actor),
        fields(
            article_id = %pair.article_id,
            topic_id = %pair.topic_id,
            queue_type = queue.name(),
            user_id = %actor.user_id
        )
    )]
    pub async fn apply_decision(
        &self,
        pair: PairKey,
        queue: QueueType,
        decision: Decision,
        actor: &Actor,
        cycle: Option<Cycle>,
    ) -> Result<StateRecord> {
        let outcome = self.decide(pair, queue, decision, actor, cycle).await;
        match &outcome {
            Ok(record) => {
                metrics::record_decision(queue.name(), "applied");
                info!(state = %record.value, state_id = %record.id, "Decision applied");
            }
            Err(e) => {
                metrics::record_decision(queue.name(), &format!("{:?}", e.code()));
                debug!(error = %e, "Decision refused");
            }
        }
        outcome
    }

    async fn decide(
        &self,
        pair: PairKey,
        queue: QueueType,
        decision: Decision,
        actor: &Actor,
        cycle: Option<Cycle>,
    ) -> Result<StateRecord> {
        let next = queue
            .next_state(decision)
            .ok_or_else(|| invalid_code(queue, decision))?;

        let topic = self.context.require_topic(pair.topic_id).await?;
        let article = self.context.require_article(pair.article_id).await?;
        let assignment = self
            .context
            .store
            .article_topic(pair)
            .await?
            .ok_or_else(|| AppError::not_found("article_topic", pair))?;

        if decision == Decision::Fyi && !self.fyi_allowed(&article) {
            return Err(invalid_code(queue, decision));
        }

        if !self.context.authorizer.can_decide(actor, &topic, queue) {
            return Err(AppError::Unauthorized {
                message: format!(
                    "user {} may not make {} decisions for topic {}",
                    actor.user_id,
                    queue.name(),
                    topic.id
                ),
            });
        }

        let current = self.expect_current(pair, &[queue.source_state()]).await?;
        let record = self
            .append(next_state(&topic, pair, next, actor.user_id), Some(current.id))
            .await?;

        // The state row is already committed; a failed re-target is only logged
        if let Some(cycle) = cycle.filter(|c| *c != assignment.cycle) {
            match self.context.store.set_cycle(pair, cycle).await {
                Ok(()) => debug!(%cycle, "Review cycle re-targeted"),
                Err(e) => warn!(%cycle, error = %e, "Review cycle left unchanged"),
            }
        }

        Ok(record)
    }

    /// Full text retrieved before the FYI cutover predates the FYI workflow
    pub fn fyi_allowed(&self, article: &Article) -> bool {
        article
            .full_text
            .as_ref()
            .is_some_and(|ft| ft.retrieved.date_naive() >= self.context.config.fyi_cutover)
    }

    /// Start tracking an article for a topic and record its first state
    #[instrument(
        skip(self, actor),
        fields(
            article_id = %assignment.article_id,
            topic_id = %assignment.topic_id,
            user_id = %actor.user_id
        )
    )]
    pub async fn assign_topic(
        &self,
        assignment: TopicAssignment,
        actor: &Actor,
    ) -> Result<StateRecord> {
        let article = self.context.require_article(assignment.article_id).await?;
        let topic = self.context.require_topic(assignment.topic_id).await?;

        let permitted = match assignment.initial {
            InitialState::Import => {
                actor.has_permission(IMPORT_PERMISSION)
                    || self.context.authorizer.can_manage_board(actor, topic.board_id)
            }
            InitialState::ReadyInitReview | InitialState::Published => {
                self.context.authorizer.can_manage_board(actor, topic.board_id)
            }
        };
        if !permitted {
            return Err(AppError::Unauthorized {
                message: format!(
                    "user {} may not assign topics for board {}",
                    actor.user_id, topic.board_id
                ),
            });
        }

        let value = match assignment.initial {
            InitialState::Import => {
                let excluded = self
                    .context
                    .store
                    .journal_excluded(topic.board_id, &article.source_journal_id)
                    .await?;
                if excluded {
                    info!(
                        journal = %article.source_journal_id,
                        "Journal is on the board's not list"
                    );
                    StateValue::RejectJournalTitle
                } else {
                    StateValue::ReadyInitReview
                }
            }
            InitialState::ReadyInitReview => StateValue::ReadyInitReview,
            InitialState::Published => StateValue::Published,
        };

        let now = Utc::now();
        let pair = PairKey::new(article.id, topic.id);
        self.context
            .store
            .insert_article_topic(ArticleTopic {
                article_id: article.id,
                topic_id: topic.id,
                cycle: assignment.cycle.unwrap_or_else(|| Cycle::following(now)),
                tags: Vec::new(),
            })
            .await?;

        let mut state = next_state(&topic, pair, value, actor.user_id);
        state.extra.comments = comment(actor.user_id, assignment.comment);
        self.append(state, None).await
    }

    /// Move a pair onto one or more board meeting agendas
    #[instrument(
        skip(self, actor),
        fields(article_id = %pair.article_id, topic_id = %pair.topic_id)
    )]
    pub async fn place_on_agenda(
        &self,
        pair: PairKey,
        meetings: Vec<MeetingId>,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<StateRecord> {
        if meetings.is_empty() {
            return Err(AppError::validation("meetings", "at least one meeting is required"));
        }
        let topic = self.managed_topic(pair.topic_id, actor).await?;
        let current = self
            .expect_current(pair, &[StateValue::PassedFullReview, StateValue::OnAgenda])
            .await?;

        let mut state = next_state(&topic, pair, StateValue::OnAgenda, actor.user_id);
        state.extra.meetings = meetings;
        state.extra.comments = comment(actor.user_id, note);
        self.append(state, Some(current.id)).await
    }

    /// Record the board's final decision for a pair
    #[instrument(
        skip(self, decisions, actor),
        fields(article_id = %pair.article_id, topic_id = %pair.topic_id)
    )]
    pub async fn record_board_decision(
        &self,
        pair: PairKey,
        decisions: Vec<BoardDecisionEntry>,
        deciders: Vec<UserId>,
        actor: &Actor,
    ) -> Result<StateRecord> {
        if decisions.is_empty() {
            return Err(AppError::validation(
                "decisions",
                "at least one board decision is required",
            ));
        }
        let topic = self.managed_topic(pair.topic_id, actor).await?;
        let current = self
            .expect_current(pair, &[StateValue::PassedFullReview, StateValue::OnAgenda])
            .await?;

        let mut state = next_state(&topic, pair, StateValue::FinalBoardDecision, actor.user_id);
        state.extra.decisions = decisions;
        state.extra.deciders = deciders;
        self.append(state, Some(current.id)).await
    }

    pub async fn current_state(&self, pair: PairKey) -> Result<Option<StateRecord>> {
        self.context.store.current_state(pair).await
    }

    pub async fn history(&self, pair: PairKey) -> Result<Vec<StateRecord>> {
        self.context.store.history(pair).await
    }

    pub async fn count_by_state_and_scope(
        &self,
        value: StateValue,
        scope: StateScope,
    ) -> Result<u64> {
        self.context.store.count_by_state_and_scope(value, scope).await
    }

    async fn managed_topic(&self, topic: TopicId, actor: &Actor) -> Result<Topic> {
        let topic = self.context.require_topic(topic).await?;
        if !self.context.authorizer.can_manage_board(actor, topic.board_id) {
            return Err(AppError::Unauthorized {
                message: format!("user {} does not manage board {}", actor.user_id, topic.board_id),
            });
        }
        Ok(topic)
    }

    async fn expect_current(&self, pair: PairKey, allowed: &[StateValue]) -> Result<StateRecord> {
        match self.context.store.current_state(pair).await? {
            Some(current) if allowed.contains(&current.value) => Ok(current),
            other => Err(AppError::InvalidTransition {
                pair,
                expected: allowed
                    .iter()
                    .map(StateValue::text_id)
                    .collect::<Vec<_>>()
                    .join(" or "),
                actual: other
                    .map(|s| s.value.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            }),
        }
    }

    async fn append(&self, state: NewState, expected: Option<StateId>) -> Result<StateRecord> {
        let pair = state.pair();
        let value = state.value;
        match self.context.store.append_state(state, expected).await {
            Ok(record) => {
                metrics::record_state_append(value.text_id());
                info!(
                    article_id = %pair.article_id,
                    topic_id = %pair.topic_id,
                    state = %value,
                    state_id = %record.id,
                    "State appended"
                );
                Ok(record)
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(%pair, state = %value, "Lost the race for the current state");
                }
                Err(e)
            }
        }
    }
}

fn next_state(topic: &Topic, pair: PairKey, value: StateValue, actor: UserId) -> NewState {
    NewState {
        article_id: pair.article_id,
        topic_id: pair.topic_id,
        board_id: topic.board_id,
        value,
        actor,
        entered: Utc::now(),
        extra: StateExtra::default(),
    }
}

fn comment(user: UserId, body: Option<String>) -> Vec<StateComment> {
    body.map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .map(|body| StateComment {
            user,
            entered: Utc::now(),
            body,
        })
        .into_iter()
        .collect()
}

fn invalid_code(queue: QueueType, decision: Decision) -> AppError {
    AppError::InvalidDecisionCode {
        queue: queue.name().to_string(),
        code: decision.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ADMIN_PERMISSION;
    use crate::domain::{BoardDecision, BoardId};
    use crate::review::testing::{actor_for, seed, services_over, FaultyStore, Fixture};
    use crate::store::{CatalogStore, StateStore};

    #[tokio::test]
    async fn test_librarian_approve_moves_pair_forward() {
        let Fixture { machine, store, pair, .. } = seed(StateValue::ReadyInitReview).await;
        let actor = actor_for(QueueType::LibrarianReview);

        let record = machine
            .apply_decision(pair, QueueType::LibrarianReview, Decision::Approve, &actor, None)
            .await
            .unwrap();

        assert_eq!(record.value, StateValue::PassedInitReview);
        let history = store.history(pair).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].current);
        assert_eq!(history[1].id, record.id);
    }

    #[tokio::test]
    async fn test_decision_not_offered_by_queue() {
        let Fixture { machine, pair, .. } = seed(StateValue::ReadyInitReview).await;
        let actor = actor_for(QueueType::LibrarianReview);

        let err = machine
            .apply_decision(pair, QueueType::LibrarianReview, Decision::OnHold, &actor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidDecisionCode { .. }));
    }

    #[tokio::test]
    async fn test_stale_source_state_is_invalid_transition() {
        let Fixture { machine, pair, .. } = seed(StateValue::Published).await;
        let actor = actor_for(QueueType::FullTextReview);

        let err = machine
            .apply_decision(pair, QueueType::FullTextReview, Decision::Approve, &actor, None)
            .await
            .unwrap_err();
        match err {
            AppError::InvalidTransition { expected, actual, .. } => {
                assert_eq!(expected, "passed_bm_review");
                assert_eq!(actual, "published");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_out_of_scope_reviewer_is_refused() {
        let Fixture { machine, pair, .. } = seed(StateValue::Published).await;
        let mut actor = actor_for(QueueType::AbstractReview);
        actor.boards = vec![BoardId(99)];
        actor.review_all_topics = false;

        let err = machine
            .apply_decision(pair, QueueType::AbstractReview, Decision::Approve, &actor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_cycle_is_retargeted() {
        let Fixture { machine, store, pair, .. } = seed(StateValue::PassedBmReview).await;
        let actor = actor_for(QueueType::FullTextReview);
        let cycle = Cycle::month(2031, 4).unwrap();

        machine
            .apply_decision(pair, QueueType::FullTextReview, Decision::OnHold, &actor, Some(cycle))
            .await
            .unwrap();
        assert_eq!(store.article_topic(pair).await.unwrap().unwrap().cycle, cycle);
    }

    #[tokio::test]
    async fn test_failed_cycle_update_keeps_stored_transition() {
        let Fixture { store, pair, .. } = seed(StateValue::PassedBmReview).await;
        let services = services_over(FaultyStore::new(store.clone()).failing_cycle_updates());
        let actor = actor_for(QueueType::FullTextReview);
        let cycle = Cycle::month(2031, 4).unwrap();

        let record = services
            .machine
            .apply_decision(pair, QueueType::FullTextReview, Decision::OnHold, &actor, Some(cycle))
            .await
            .unwrap();
        assert_eq!(record.value, StateValue::OnHold);
        assert_eq!(store.current_state(pair).await.unwrap().unwrap().id, record.id);
        assert_ne!(store.article_topic(pair).await.unwrap().unwrap().cycle, cycle);
    }

    #[tokio::test]
    async fn test_import_applies_journal_not_list() {
        let Fixture { machine, store, pair, .. } = seed(StateValue::ReadyInitReview).await;
        let topic = store.topic(pair.topic_id).await.unwrap().unwrap();
        let article = store.article(pair.article_id).await.unwrap().unwrap();
        store
            .exclude_journal(topic.board_id, &article.source_journal_id)
            .await
            .unwrap();
        let second_topic = Topic {
            id: TopicId(pair.topic_id.0 + 1),
            board_id: topic.board_id,
            name: "Second".into(),
            nci_reviewer: None,
        };
        store.save_topic(second_topic.clone()).await.unwrap();

        let mut importer = Actor::new(UserId(500));
        importer.permissions = vec![IMPORT_PERMISSION.to_string()];
        let record = machine
            .assign_topic(
                TopicAssignment {
                    article_id: article.id,
                    topic_id: second_topic.id,
                    cycle: None,
                    initial: InitialState::Import,
                    comment: Some("from import batch".into()),
                },
                &importer,
            )
            .await
            .unwrap();

        assert_eq!(record.value, StateValue::RejectJournalTitle);
        assert_eq!(record.extra.comments.len(), 1);
        let assignment = store
            .article_topic(PairKey::new(article.id, second_topic.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.cycle, Cycle::following(record.entered));
    }

    #[tokio::test]
    async fn test_reassigning_a_pair_fails() {
        let Fixture { machine, pair, .. } = seed(StateValue::ReadyInitReview).await;
        let mut admin = Actor::new(UserId(1));
        admin.permissions = vec![ADMIN_PERMISSION.to_string()];

        let err = machine
            .assign_topic(
                TopicAssignment {
                    article_id: pair.article_id,
                    topic_id: pair.topic_id,
                    cycle: None,
                    initial: InitialState::Published,
                    comment: None,
                },
                &admin,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_agenda_then_board_decision() {
        let Fixture { machine, pair, .. } = seed(StateValue::PassedFullReview).await;
        let mut admin = Actor::new(UserId(1));
        admin.permissions = vec![ADMIN_PERMISSION.to_string()];

        let agenda = machine
            .place_on_agenda(pair, vec![MeetingId(3)], &admin, None)
            .await
            .unwrap();
        assert_eq!(agenda.value, StateValue::OnAgenda);

        let decided = machine
            .record_board_decision(
                pair,
                vec![BoardDecisionEntry {
                    decision: BoardDecision::Cited,
                    notes: None,
                    discussed: true,
                }],
                vec![UserId(8)],
                &admin,
            )
            .await
            .unwrap();
        assert_eq!(decided.value, StateValue::FinalBoardDecision);

        let err = machine
            .place_on_agenda(pair, vec![MeetingId(4)], &admin, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }
}
