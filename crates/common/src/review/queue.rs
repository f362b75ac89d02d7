//! Saved review queues and their staged-decision cache
//!
//! A queue is a saved filter over the pairs currently sitting in one state.
//! Operators stage tentative decisions against it and commit them as a
//! best-effort batch: each pair is applied independently through the state
//! machine, and a failed pair never undoes its siblings.

use super::{ReviewContext, StateMachine};
use crate::activity::ActivityEvent;
use crate::auth::Actor;
use crate::domain::{
    Article, ArticleId, ArticleTopic, BoardId, Cycle, Decision, DisplayFormat, DisplayOptions,
    PairKey, QueueDefinition, QueueFilters, QueueId, QueueType, SortKey, StagedDecision, StateId,
    StateRecord, StateValue, Topic, TopicId,
};
use crate::errors::{AppError, ErrorCode, Result};
use crate::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSuccess {
    #[serde(flatten)]
    pub pair: PairKey,
    pub state_id: StateId,
    pub value: StateValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFailure {
    #[serde(flatten)]
    pub pair: PairKey,
    pub decision: Decision,
    pub code: ErrorCode,
    pub message: String,
}

/// Per-pair outcome of a queue commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub queue_id: QueueId,
    pub succeeded: Vec<CommitSuccess>,
    pub failed: Vec<CommitFailure>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One topic of an article as shown on a queue page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRowTopic {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub state_id: StateId,
    pub entered: DateTime<Utc>,
    pub cycle: Cycle,
    pub can_decide: bool,
    pub staged: Option<Decision>,
}

/// One article with every in-scope topic awaiting this queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRow {
    pub article: Article,
    pub topics: Vec<QueueRowTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePage {
    pub queue_id: QueueId,
    pub queue_type: QueueType,
    pub format: DisplayFormat,
    /// Zero-based
    pub page: usize,
    pub per_page: usize,
    pub total_articles: usize,
    pub rows: Vec<QueueRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic_id: TopicId,
    pub name: String,
    pub count: u64,
}

/// Per-topic counts of pairs awaiting a queue.
///
/// For abstract review, when the caller is the specialist for some but not all
/// of the board's topics, `topics` holds theirs and `other_topics` the rest;
/// otherwise everything is in `topics`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCounts {
    pub topics: Vec<TopicCount>,
    pub other_topics: Vec<TopicCount>,
}

pub struct QueueService {
    context: Arc<ReviewContext>,
    machine: Arc<StateMachine>,
}

impl QueueService {
    pub fn new(context: Arc<ReviewContext>, machine: Arc<StateMachine>) -> Self {
        Self { context, machine }
    }

    /// Save a new queue definition for the caller
    #[instrument(
        skip(self, filters, actor),
        fields(queue_type = queue_type.name(), user_id = %actor.user_id)
    )]
    pub async fn open_queue(
        &self,
        queue_type: QueueType,
        filters: QueueFilters,
        actor: &Actor,
    ) -> Result<QueueDefinition> {
        if !self.context.authorizer.can_open_queue(actor, queue_type) {
            return Err(AppError::Unauthorized {
                message: format!("user {} may not open the {} queue", actor.user_id, queue_type),
            });
        }

        let filters = self.sanitize_filters(queue_type, filters).await?;
        let queue = QueueDefinition {
            id: Uuid::new_v4(),
            queue_type,
            owner: actor.user_id,
            filters,
            display: DisplayOptions {
                sort: SortKey::default(),
                format: DisplayFormat::default(),
                per_page: self.context.config.default_page_size,
            },
            staged: BTreeMap::new(),
            created: Utc::now(),
            retired: None,
        };
        self.context.store.insert_queue(queue.clone()).await?;

        info!(queue_id = %queue.id, "Queue opened");
        Ok(queue)
    }

    async fn sanitize_filters(
        &self,
        queue_type: QueueType,
        mut filters: QueueFilters,
    ) -> Result<QueueFilters> {
        if queue_type.is_topic_scoped() && filters.board.is_none() && filters.topics.is_empty() {
            return Err(AppError::validation("board", "a board or a topic selection is required"));
        }
        if queue_type != QueueType::LibrarianReview
            && (filters.title.is_some() || filters.journal.is_some())
        {
            return Err(AppError::validation(
                "title",
                "title and journal fragments only apply to the librarian queue",
            ));
        }
        if let Some(board) = filters.board {
            if self.context.store.board(board).await?.is_none() {
                return Err(AppError::not_found("board", board));
            }
            let mut foreign = None;
            for topic in &filters.topics {
                let belongs = self
                    .context
                    .store
                    .topic(*topic)
                    .await?
                    .is_some_and(|t| t.board_id == board);
                if !belongs {
                    foreign = Some(*topic);
                    break;
                }
            }
            if let Some(topic_id) = foreign {
                debug!(%topic_id, "Topic outside the selected board; clearing topic filter");
                filters.topics.clear();
            }
        }
        filters.topics.sort_unstable();
        filters.topics.dedup();
        filters.title = filters.title.filter(|t| !t.trim().is_empty());
        filters.journal = filters.journal.filter(|j| !j.trim().is_empty());
        Ok(filters)
    }

    async fn owned_queue(&self, id: QueueId, actor: &Actor) -> Result<QueueDefinition> {
        let queue = self
            .context
            .store
            .queue(id)
            .await?
            .ok_or_else(|| AppError::not_found("queue", id))?;
        if queue.owner != actor.user_id {
            return Err(AppError::Unauthorized {
                message: format!("queue {} belongs to another user", id),
            });
        }
        Ok(queue)
    }

    async fn active_queue(&self, id: QueueId, actor: &Actor) -> Result<QueueDefinition> {
        let queue = self.owned_queue(id, actor).await?;
        if queue.is_retired() {
            return Err(AppError::validation("queue", format!("queue {} has been reset", id)));
        }
        Ok(queue)
    }

    pub async fn queue(&self, id: QueueId, actor: &Actor) -> Result<QueueDefinition> {
        self.owned_queue(id, actor).await
    }

    /// Stage a decision for a pair, replacing any earlier one; `None` unstages
    #[instrument(
        skip(self, actor),
        fields(article_id = %pair.article_id, topic_id = %pair.topic_id)
    )]
    pub async fn stage_decision(
        &self,
        id: QueueId,
        pair: PairKey,
        decision: Decision,
        actor: &Actor,
    ) -> Result<()> {
        let mut queue = self.active_queue(id, actor).await?;
        if decision == Decision::None {
            queue.staged.remove(&pair);
        } else {
            if queue.queue_type.next_state(decision).is_none() {
                return Err(AppError::InvalidDecisionCode {
                    queue: queue.queue_type.name().to_string(),
                    code: decision.label().to_string(),
                });
            }
            queue.staged.insert(pair, decision);
        }
        debug!(
            decision = decision.label(),
            staged = queue.staged.len(),
            "Staged decisions updated"
        );
        self.context.store.update_queue(queue).await
    }

    pub async fn unstage_decision(&self, id: QueueId, pair: PairKey, actor: &Actor) -> Result<()> {
        self.stage_decision(id, pair, Decision::None, actor).await
    }

    pub async fn list_staged(&self, id: QueueId, actor: &Actor) -> Result<Vec<StagedDecision>> {
        Ok(self.owned_queue(id, actor).await?.staged_list())
    }

    /// Staged decisions as display lines, e.g. "Article 12 approved for Breast Cancer"
    pub async fn describe_staged(&self, id: QueueId, actor: &Actor) -> Result<Vec<String>> {
        let queue = self.owned_queue(id, actor).await?;
        Ok(queue
            .staged
            .iter()
            .map(|(pair, decision)| {
                format!(
                    "Article {} {} for {}",
                    pair.article_id,
                    decision.verb(),
                    self.context.topic_label(*pair)
                )
            })
            .collect())
    }

    /// Apply every staged decision, then clear the cache.
    ///
    /// A lost compare-and-swap is retried after re-reading the pair; any other
    /// failure is final for that pair and does not affect the others.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn commit_queue(&self, id: QueueId, actor: &Actor) -> Result<CommitReport> {
        let start = Instant::now();
        let mut queue = self.active_queue(id, actor).await?;
        let queue_type = queue.queue_type;

        let mut report = CommitReport {
            queue_id: id,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        for (pair, decision) in &queue.staged {
            match self.apply_with_retry(*pair, queue_type, *decision, actor).await {
                Ok(record) => report.succeeded.push(CommitSuccess {
                    pair: *pair,
                    state_id: record.id,
                    value: record.value,
                }),
                Err(e) => {
                    warn!(%pair, error = %e, "Staged decision failed");
                    report.failed.push(CommitFailure {
                        pair: *pair,
                        decision: *decision,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        queue.staged.clear();
        self.context.store.update_queue(queue.clone()).await?;

        metrics::record_commit(
            start.elapsed().as_secs_f64(),
            queue_type.name(),
            report.succeeded.len(),
            report.failed.len(),
        );
        self.context.activity.notify(ActivityEvent::QueueCommitted {
            queue_id: id,
            queue_type,
            actor: actor.user_id,
            board: queue.filters.board,
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
            at: Utc::now(),
        });
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Queue committed"
        );
        Ok(report)
    }

    async fn apply_with_retry(
        &self,
        pair: PairKey,
        queue_type: QueueType,
        decision: Decision,
        actor: &Actor,
    ) -> Result<StateRecord> {
        let mut attempts = 0;
        loop {
            match self
                .machine
                .apply_decision(pair, queue_type, decision, actor, None)
                .await
            {
                Err(e) if e.is_retryable() && attempts < self.context.config.commit_retries => {
                    attempts += 1;
                    debug!(%pair, attempts, "Retrying after concurrent modification");
                }
                outcome => return outcome,
            }
        }
    }

    /// Retire the queue and open a fresh one with the same filters and display
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn reset_queue(&self, id: QueueId, actor: &Actor) -> Result<QueueDefinition> {
        let mut old = self.active_queue(id, actor).await?;
        let now = Utc::now();

        let fresh = QueueDefinition {
            id: Uuid::new_v4(),
            staged: BTreeMap::new(),
            created: now,
            retired: None,
            ..old.clone()
        };
        old.retired = Some(now);
        self.context.store.update_queue(old).await?;
        self.context.store.insert_queue(fresh.clone()).await?;

        info!(new_queue_id = %fresh.id, "Queue reset");
        Ok(fresh)
    }

    pub async fn set_display_options(
        &self,
        id: QueueId,
        display: DisplayOptions,
        actor: &Actor,
    ) -> Result<QueueDefinition> {
        if !self.context.config.is_allowed_page_size(display.per_page) {
            return Err(AppError::validation(
                "per_page",
                format!("page size must be one of {:?}", self.context.config.page_sizes),
            ));
        }
        let mut queue = self.active_queue(id, actor).await?;
        queue.display = display;
        self.context.store.update_queue(queue.clone()).await?;
        Ok(queue)
    }

    /// One page of the queue, grouped by article
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn page(&self, id: QueueId, page: usize, actor: &Actor) -> Result<QueuePage> {
        let queue = self.owned_queue(id, actor).await?;
        let source = queue.queue_type.source_state();
        let filters = &queue.filters;

        let records = self
            .context
            .store
            .current_in_state(source, filters.board, &filters.topics)
            .await?;

        let mut assignments: HashMap<PairKey, ArticleTopic> = HashMap::new();
        for record in &records {
            if let Some(at) = self.context.store.article_topic(record.pair()).await? {
                assignments.insert(record.pair(), at);
            }
        }

        let article_ids: Vec<ArticleId> = {
            let mut ids: Vec<ArticleId> = records.iter().map(|r| r.article_id).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        let articles: HashMap<ArticleId, Article> = self
            .context
            .store
            .articles(&article_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut grouped: BTreeMap<ArticleId, Vec<(&StateRecord, &ArticleTopic)>> = BTreeMap::new();
        for record in &records {
            let (Some(article), Some(assignment)) =
                (articles.get(&record.article_id), assignments.get(&record.pair()))
            else {
                continue;
            };
            if matches_filters(queue.queue_type, filters, article, assignment) {
                grouped.entry(article.id).or_default().push((record, assignment));
            }
        }

        let mut ordered: Vec<&Article> = grouped.keys().filter_map(|id| articles.get(id)).collect();
        ordered.sort_by(|a, b| compare_articles(queue.display.sort, a, b));

        let per_page = queue.display.per_page.max(1);
        let total_articles = ordered.len();
        let mut topics: HashMap<TopicId, Option<Topic>> = HashMap::new();
        let mut rows = Vec::new();

        for article in ordered
            .into_iter()
            .skip(page.saturating_mul(per_page))
            .take(per_page)
        {
            let mut row = QueueRow {
                article: article.clone(),
                topics: Vec::new(),
            };
            for (record, assignment) in grouped.get(&article.id).into_iter().flatten() {
                if !topics.contains_key(&record.topic_id) {
                    let topic = self.context.store.topic(record.topic_id).await?;
                    topics.insert(record.topic_id, topic);
                }
                let Some(topic) = topics.get(&record.topic_id).and_then(Option::as_ref) else {
                    continue;
                };
                row.topics.push(QueueRowTopic {
                    topic_id: topic.id,
                    topic_name: topic.name.clone(),
                    state_id: record.id,
                    entered: record.entered,
                    cycle: assignment.cycle,
                    can_decide: self.context.authorizer.can_decide(actor, topic, queue.queue_type),
                    staged: queue.staged.get(&record.pair()).copied(),
                });
            }
            rows.push(row);
        }

        Ok(QueuePage {
            queue_id: queue.id,
            queue_type: queue.queue_type,
            format: queue.display.format,
            page,
            per_page,
            total_articles,
            rows,
        })
    }

    /// Count pairs awaiting the queue for each topic of a board
    pub async fn topic_counts(
        &self,
        board: BoardId,
        queue_type: QueueType,
        actor: &Actor,
    ) -> Result<TopicCounts> {
        let board_topics = self.context.store.topics_for_board(board).await?;
        let source = queue_type.source_state();

        let counts: BTreeMap<TopicId, u64> = if queue_type == QueueType::FullTextReview {
            let records = self.context.store.current_in_state(source, Some(board), &[]).await?;
            let mut ids: Vec<ArticleId> = records.iter().map(|r| r.article_id).collect();
            ids.sort();
            ids.dedup();
            let with_text: Vec<ArticleId> = self
                .context
                .store
                .articles(&ids)
                .await?
                .into_iter()
                .filter(Article::has_full_text)
                .map(|a| a.id)
                .collect();
            let mut counts = BTreeMap::new();
            for record in records.iter().filter(|r| with_text.contains(&r.article_id)) {
                *counts.entry(record.topic_id).or_insert(0) += 1;
            }
            counts
        } else {
            self.context.store.count_current_by_topic(source, board).await?
        };

        let specialist_for = board_topics
            .iter()
            .filter(|t| actor.is_specialist_for(t))
            .count();
        let partition = queue_type == QueueType::AbstractReview
            && specialist_for > 0
            && specialist_for < board_topics.len();

        let mut result = TopicCounts::default();
        for topic in &board_topics {
            let count = counts.get(&topic.id).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            let entry = TopicCount {
                topic_id: topic.id,
                name: topic.name.clone(),
                count,
            };
            if partition && !actor.is_specialist_for(topic) {
                result.other_topics.push(entry);
            } else {
                result.topics.push(entry);
            }
        }
        Ok(result)
    }
}

fn matches_filters(
    queue_type: QueueType,
    filters: &QueueFilters,
    article: &Article,
    assignment: &ArticleTopic,
) -> bool {
    if queue_type == QueueType::FullTextReview && !article.has_full_text() {
        return false;
    }
    if let Some(cycle) = filters.cycle {
        if assignment.cycle != cycle {
            return false;
        }
    }
    if let Some(tag) = filters.tag {
        if !article.tags.contains(&tag) && !assignment.tags.contains(&tag) {
            return false;
        }
    }
    if let Some(fragment) = &filters.title {
        if !contains_ignore_case(&article.title, fragment) {
            return false;
        }
    }
    if let Some(fragment) = &filters.journal {
        if !contains_ignore_case(&article.brief_journal_title, fragment) {
            return false;
        }
    }
    true
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(&needle.trim().to_lowercase())
}

fn compare_articles(sort: SortKey, a: &Article, b: &Article) -> Ordering {
    let primary = match sort {
        SortKey::EbmsId => Ordering::Equal,
        SortKey::Pmid => (a.source_id.len(), &a.source_id).cmp(&(b.source_id.len(), &b.source_id)),
        SortKey::Author => a
            .first_author()
            .to_lowercase()
            .cmp(&b.first_author().to_lowercase()),
        SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortKey::Journal => a.journal_title.cmp(&b.journal_title),
        // Unknown years last
        SortKey::PublicationDate => match (a.year, b.year) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::CoreJournals => b
            .core_journal
            .cmp(&a.core_journal)
            .then_with(|| a.journal_title.cmp(&b.journal_title))
            .then_with(|| a.title.cmp(&b.title)),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}
