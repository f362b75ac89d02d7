//! SeaORM-backed implementation of the review store traits
//!
//! The compare-and-swap on the current flag runs inside a transaction that
//! touches only the pair being transitioned: a conditional update on the prior
//! row followed by the insert of the new one. The partial unique index on
//! `(article_id, topic_id) WHERE current` backs it up for first states.

use crate::db::models::*;
use crate::db::DbPool;
use crate::domain::{
    Article, ArticleId, ArticleTopic, Board, BoardId, Cycle, Decision, DisplayOptions, FullText,
    NewPacket, NewReview, NewState, Packet, PacketArticle, PacketArticleId, PacketId, PairKey,
    QueueDefinition, QueueFilters, QueueId, QueueType, Review, ReviewId, StagedDecision, StateId,
    StateRecord, StateValue, Topic, TopicId, UserId,
};
use crate::errors::{AppError, Result};
use crate::store::{CatalogStore, PacketStore, QueueStore, StateScope, StateStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, NotSet, QueryFilter, QueryOrder, Set, SqlErr, Statement, TransactionTrait,
    Value,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Review store over Postgres
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct SeaOrmStore {
    pool: DbPool,
}

impl SeaOrmStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(Into::into)
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(Into::into)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn utc(ts: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

// ============================================================================
// Row conversions
// ============================================================================

fn board_from_row(row: BoardRow) -> Board {
    Board {
        id: BoardId(row.id),
        name: row.name,
        manager: row.manager.map(UserId),
    }
}

fn topic_from_row(row: TopicRow) -> Topic {
    Topic {
        id: TopicId(row.id),
        board_id: BoardId(row.board_id),
        name: row.name,
        nci_reviewer: row.nci_reviewer.map(UserId),
    }
}

fn article_from_row(row: ArticleRow) -> Result<Article> {
    let full_text = match (row.full_text_file, row.full_text_retrieved) {
        (Some(file), Some(retrieved)) => Some(FullText {
            file,
            retrieved: utc(retrieved),
        }),
        _ => None,
    };
    Ok(Article {
        id: ArticleId(row.id),
        source_id: row.source_id,
        title: row.title,
        authors: from_json(row.authors)?,
        journal_title: row.journal_title,
        brief_journal_title: row.brief_journal_title,
        source_journal_id: row.source_journal_id,
        core_journal: row.core_journal,
        year: row.year,
        full_text,
        tags: from_json(row.tags)?,
        imported: utc(row.imported),
    })
}

fn article_topic_from_row(row: ArticleTopicRow) -> Result<ArticleTopic> {
    let cycle = Cycle::try_from(row.cycle).map_err(|message| AppError::Internal { message })?;
    Ok(ArticleTopic {
        article_id: ArticleId(row.article_id),
        topic_id: TopicId(row.topic_id),
        cycle,
        tags: from_json(row.tags)?,
    })
}

fn state_from_row(row: StateRow) -> Result<StateRecord> {
    let value: StateValue = row
        .value
        .parse()
        .map_err(|message| AppError::Internal { message })?;
    Ok(StateRecord {
        id: StateId(row.id),
        article_id: ArticleId(row.article_id),
        topic_id: TopicId(row.topic_id),
        board_id: BoardId(row.board_id),
        value,
        current: row.current,
        entered: utc(row.entered),
        actor: UserId(row.actor),
        extra: from_json(row.extra)?,
    })
}

fn queue_from_row(row: SavedQueueRow) -> Result<QueueDefinition> {
    let queue_type: QueueType = row
        .queue_type
        .parse()
        .map_err(|message| AppError::Internal { message })?;
    let filters: QueueFilters = from_json(row.filters)?;
    let display: DisplayOptions = from_json(row.display)?;
    let staged: Vec<StagedDecision> = from_json(row.staged)?;
    Ok(QueueDefinition {
        id: row.id,
        queue_type,
        owner: UserId(row.owner),
        filters,
        display,
        staged: staged
            .into_iter()
            .map(|s| (s.pair, s.decision))
            .collect::<BTreeMap<PairKey, Decision>>(),
        created: utc(row.created),
        retired: row.retired.map(utc),
    })
}

fn queue_to_model(queue: &QueueDefinition) -> Result<SavedQueueActiveModel> {
    Ok(SavedQueueActiveModel {
        id: Set(queue.id),
        queue_type: Set(queue.queue_type.name().to_string()),
        owner: Set(queue.owner.0),
        filters: Set(to_json(&queue.filters)?),
        display: Set(to_json(&queue.display)?),
        staged: Set(to_json(&queue.staged_list())?),
        created: Set(queue.created.into()),
        retired: Set(queue.retired.map(Into::into)),
    })
}

fn packet_from_row(row: PacketRow) -> Result<Packet> {
    Ok(Packet {
        id: PacketId(row.id),
        topic_id: TopicId(row.topic_id),
        name: row.name,
        created: utc(row.created),
        created_by: UserId(row.created_by),
        reviewers: from_json(row.reviewers)?,
        summaries: from_json(row.summaries)?,
        active: row.active,
    })
}

fn packet_article_from_row(row: PacketArticleRow) -> PacketArticle {
    PacketArticle {
        id: PacketArticleId(row.id),
        packet_id: PacketId(row.packet_id),
        article_id: ArticleId(row.article_id),
        dropped: row.dropped,
    }
}

fn review_from_row(row: ReviewRow) -> Result<Review> {
    Ok(Review {
        id: ReviewId(row.id),
        packet_article_id: PacketArticleId(row.packet_article_id),
        reviewer: UserId(row.reviewer),
        posted: utc(row.posted),
        dispositions: from_json(row.dispositions)?,
        reasons: from_json(row.reasons)?,
        comments: row.comments,
        recorded_by: row.recorded_by.map(UserId),
    })
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl CatalogStore for SeaOrmStore {
    async fn board(&self, id: BoardId) -> Result<Option<Board>> {
        let row = BoardEntity::find_by_id(id.0).one(self.read_conn()).await?;
        Ok(row.map(board_from_row))
    }

    async fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        let row = TopicEntity::find_by_id(id.0).one(self.read_conn()).await?;
        Ok(row.map(topic_from_row))
    }

    async fn topics_for_board(&self, board: BoardId) -> Result<Vec<Topic>> {
        let rows = TopicEntity::find()
            .filter(TopicColumn::BoardId.eq(board.0))
            .order_by_asc(TopicColumn::Id)
            .all(self.read_conn())
            .await?;
        Ok(rows.into_iter().map(topic_from_row).collect())
    }

    async fn article(&self, id: ArticleId) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id.0)
            .one(self.read_conn())
            .await?
            .map(article_from_row)
            .transpose()
    }

    async fn articles(&self, ids: &[ArticleId]) -> Result<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = ArticleEntity::find()
            .filter(ArticleColumn::Id.is_in(ids.iter().map(|id| id.0)))
            .all(self.read_conn())
            .await?;
        rows.into_iter().map(article_from_row).collect()
    }

    async fn article_topic(&self, pair: PairKey) -> Result<Option<ArticleTopic>> {
        ArticleTopicEntity::find_by_id((pair.article_id.0, pair.topic_id.0))
            .one(self.read_conn())
            .await?
            .map(article_topic_from_row)
            .transpose()
    }

    async fn save_board(&self, board: Board) -> Result<()> {
        let model = BoardActiveModel {
            id: Set(board.id.0),
            name: Set(board.name),
            manager: Set(board.manager.map(|m| m.0)),
        };
        BoardEntity::insert(model)
            .on_conflict(
                OnConflict::column(BoardColumn::Id)
                    .update_columns([BoardColumn::Name, BoardColumn::Manager])
                    .to_owned(),
            )
            .exec_without_returning(self.write_conn())
            .await?;
        Ok(())
    }

    async fn save_topic(&self, topic: Topic) -> Result<()> {
        let model = TopicActiveModel {
            id: Set(topic.id.0),
            board_id: Set(topic.board_id.0),
            name: Set(topic.name),
            nci_reviewer: Set(topic.nci_reviewer.map(|u| u.0)),
        };
        TopicEntity::insert(model)
            .on_conflict(
                OnConflict::column(TopicColumn::Id)
                    .update_columns([
                        TopicColumn::BoardId,
                        TopicColumn::Name,
                        TopicColumn::NciReviewer,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.write_conn())
            .await?;
        Ok(())
    }

    async fn save_article(&self, article: Article) -> Result<()> {
        let (full_text_file, full_text_retrieved) = match &article.full_text {
            Some(ft) => (Some(ft.file.clone()), Some(ft.retrieved.into())),
            None => (None, None),
        };
        let model = ArticleActiveModel {
            id: Set(article.id.0),
            source_id: Set(article.source_id.clone()),
            title: Set(article.title.clone()),
            authors: Set(to_json(&article.authors)?),
            journal_title: Set(article.journal_title.clone()),
            brief_journal_title: Set(article.brief_journal_title.clone()),
            source_journal_id: Set(article.source_journal_id.clone()),
            core_journal: Set(article.core_journal),
            year: Set(article.year),
            full_text_file: Set(full_text_file),
            full_text_retrieved: Set(full_text_retrieved),
            tags: Set(to_json(&article.tags)?),
            imported: Set(article.imported.into()),
        };
        ArticleEntity::insert(model)
            .on_conflict(
                OnConflict::column(ArticleColumn::Id)
                    .update_columns([
                        ArticleColumn::SourceId,
                        ArticleColumn::Title,
                        ArticleColumn::Authors,
                        ArticleColumn::JournalTitle,
                        ArticleColumn::BriefJournalTitle,
                        ArticleColumn::SourceJournalId,
                        ArticleColumn::CoreJournal,
                        ArticleColumn::Year,
                        ArticleColumn::FullTextFile,
                        ArticleColumn::FullTextRetrieved,
                        ArticleColumn::Tags,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.write_conn())
            .await?;
        Ok(())
    }

    async fn insert_article_topic(&self, assignment: ArticleTopic) -> Result<()> {
        let pair = assignment.pair();
        let model = ArticleTopicActiveModel {
            article_id: Set(assignment.article_id.0),
            topic_id: Set(assignment.topic_id.0),
            cycle: Set(assignment.cycle.date()),
            tags: Set(to_json(&assignment.tags)?),
        };
        match ArticleTopicEntity::insert(model)
            .exec_without_returning(self.write_conn())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AppError::validation(
                "topic_id",
                format!("{pair} is already assigned"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_cycle(&self, pair: PairKey, cycle: Cycle) -> Result<()> {
        let result = ArticleTopicEntity::update_many()
            .col_expr(ArticleTopicColumn::Cycle, Expr::value(cycle.date()))
            .filter(ArticleTopicColumn::ArticleId.eq(pair.article_id.0))
            .filter(ArticleTopicColumn::TopicId.eq(pair.topic_id.0))
            .exec(self.write_conn())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::not_found("article_topic", pair));
        }
        Ok(())
    }

    async fn journal_excluded(&self, board: BoardId, source_journal_id: &str) -> Result<bool> {
        let row = JournalExclusionEntity::find_by_id((board.0, source_journal_id.to_string()))
            .one(self.read_conn())
            .await?;
        Ok(row.is_some())
    }

    async fn exclude_journal(&self, board: BoardId, source_journal_id: &str) -> Result<()> {
        let model = JournalExclusionActiveModel {
            board_id: Set(board.0),
            source_journal_id: Set(source_journal_id.to_string()),
        };
        JournalExclusionEntity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    JournalExclusionColumn::BoardId,
                    JournalExclusionColumn::SourceJournalId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.write_conn())
            .await?;
        Ok(())
    }
}

// ============================================================================
// State history
// ============================================================================

#[async_trait]
impl StateStore for SeaOrmStore {
    async fn current_state(&self, pair: PairKey) -> Result<Option<StateRecord>> {
        // Primary, not replica: a lagging read would make every decision look stale
        StateEntity::find()
            .filter(StateColumn::ArticleId.eq(pair.article_id.0))
            .filter(StateColumn::TopicId.eq(pair.topic_id.0))
            .filter(StateColumn::Current.eq(true))
            .one(self.write_conn())
            .await?
            .map(state_from_row)
            .transpose()
    }

    async fn append_state(
        &self,
        state: NewState,
        expected: Option<StateId>,
    ) -> Result<StateRecord> {
        let pair = state.pair();
        let txn = self.write_conn().begin().await?;
        let mut entered = state.entered;

        if let Some(prior) = expected {
            let flipped = StateEntity::update_many()
                .col_expr(StateColumn::Current, Expr::value(false))
                .filter(StateColumn::Id.eq(prior.0))
                .filter(StateColumn::ArticleId.eq(pair.article_id.0))
                .filter(StateColumn::TopicId.eq(pair.topic_id.0))
                .filter(StateColumn::Current.eq(true))
                .exec(&txn)
                .await?;
            if flipped.rows_affected != 1 {
                debug!(%pair, prior = %prior, "Current flag already moved");
                return Err(AppError::ConcurrentModification { pair });
            }
            if let Some(row) = StateEntity::find_by_id(prior.0).one(&txn).await? {
                entered = entered.max(utc(row.entered));
            }
        }

        let model = StateActiveModel {
            id: NotSet,
            article_id: Set(state.article_id.0),
            topic_id: Set(state.topic_id.0),
            board_id: Set(state.board_id.0),
            value: Set(state.value.text_id().to_string()),
            current: Set(true),
            entered: Set(entered.into()),
            actor: Set(state.actor.0),
            extra: Set(to_json(&state.extra)?),
        };
        let inserted = match model.insert(&txn).await {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                debug!(%pair, "Another current row was inserted first");
                return Err(AppError::ConcurrentModification { pair });
            }
            Err(e) => return Err(e.into()),
        };
        txn.commit().await?;

        state_from_row(inserted)
    }

    async fn history(&self, pair: PairKey) -> Result<Vec<StateRecord>> {
        let rows = StateEntity::find()
            .filter(StateColumn::ArticleId.eq(pair.article_id.0))
            .filter(StateColumn::TopicId.eq(pair.topic_id.0))
            .order_by_asc(StateColumn::Entered)
            .order_by_asc(StateColumn::Id)
            // Primary, so the last row always agrees with current_state
            .all(self.write_conn())
            .await?;
        rows.into_iter().map(state_from_row).collect()
    }

    async fn count_by_state_and_scope(&self, value: StateValue, scope: StateScope) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) AS count FROM states s");
        if scope.cycle.is_some() {
            sql.push_str(
                " JOIN article_topics at \
                 ON at.article_id = s.article_id AND at.topic_id = s.topic_id",
            );
        }
        sql.push_str(" WHERE s.value = $1 AND s.current");

        let mut values: Vec<Value> = vec![value.text_id().into()];
        if let Some(board) = scope.board {
            values.push(board.0.into());
            sql.push_str(&format!(" AND s.board_id = ${}", values.len()));
        }
        if let Some(topic) = scope.topic {
            values.push(topic.0.into());
            sql.push_str(&format!(" AND s.topic_id = ${}", values.len()));
        }
        if let Some(cycle) = scope.cycle {
            values.push(cycle.date().into());
            sql.push_str(&format!(" AND at.cycle = ${}", values.len()));
        }

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let row = self.read_conn().query_one(stmt).await?;
        let count: i64 = match row {
            Some(row) => row.try_get("", "count")?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn current_in_state(
        &self,
        value: StateValue,
        board: Option<BoardId>,
        topics: &[TopicId],
    ) -> Result<Vec<StateRecord>> {
        let mut query = StateEntity::find()
            .filter(StateColumn::Value.eq(value.text_id()))
            .filter(StateColumn::Current.eq(true));
        if !topics.is_empty() {
            query = query.filter(StateColumn::TopicId.is_in(topics.iter().map(|t| t.0)));
        } else if let Some(board) = board {
            query = query.filter(StateColumn::BoardId.eq(board.0));
        }
        let rows = query
            .order_by_asc(StateColumn::ArticleId)
            .order_by_asc(StateColumn::TopicId)
            .all(self.read_conn())
            .await?;
        rows.into_iter().map(state_from_row).collect()
    }

    async fn count_current_by_topic(
        &self,
        value: StateValue,
        board: BoardId,
    ) -> Result<BTreeMap<TopicId, u64>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT topic_id, COUNT(*) AS count FROM states \
             WHERE value = $1 AND current AND board_id = $2 GROUP BY topic_id",
            [value.text_id().into(), board.0.into()],
        );
        let rows = self.read_conn().query_all(stmt).await?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let topic: i64 = row.try_get("", "topic_id")?;
            let count: i64 = row.try_get("", "count")?;
            counts.insert(TopicId(topic), count.max(0) as u64);
        }
        Ok(counts)
    }
}

// ============================================================================
// Saved queues
// ============================================================================

#[async_trait]
impl QueueStore for SeaOrmStore {
    async fn insert_queue(&self, queue: QueueDefinition) -> Result<()> {
        queue_to_model(&queue)?.insert(self.write_conn()).await?;
        Ok(())
    }

    async fn queue(&self, id: QueueId) -> Result<Option<QueueDefinition>> {
        SavedQueueEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .map(queue_from_row)
            .transpose()
    }

    async fn update_queue(&self, queue: QueueDefinition) -> Result<()> {
        match queue_to_model(&queue)?.update(self.write_conn()).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(AppError::not_found("queue", queue.id)),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Packets and reviews
// ============================================================================

#[async_trait]
impl PacketStore for SeaOrmStore {
    async fn insert_packet(
        &self,
        packet: NewPacket,
        created_by: UserId,
        created: DateTime<Utc>,
    ) -> Result<(Packet, Vec<PacketArticle>)> {
        let txn = self.write_conn().begin().await?;

        let row = PacketActiveModel {
            id: NotSet,
            topic_id: Set(packet.topic_id.0),
            name: Set(packet.name.clone()),
            created: Set(created.into()),
            created_by: Set(created_by.0),
            reviewers: Set(to_json(&packet.reviewers)?),
            summaries: Set(to_json(&packet.summaries)?),
            active: Set(true),
        }
        .insert(&txn)
        .await?;

        let mut memberships = Vec::with_capacity(packet.articles.len());
        for article in &packet.articles {
            let membership = PacketArticleActiveModel {
                id: NotSet,
                packet_id: Set(row.id),
                article_id: Set(article.0),
                dropped: Set(false),
            }
            .insert(&txn)
            .await?;
            memberships.push(packet_article_from_row(membership));
        }

        txn.commit().await?;
        Ok((packet_from_row(row)?, memberships))
    }

    async fn packet(&self, id: PacketId) -> Result<Option<Packet>> {
        PacketEntity::find_by_id(id.0)
            .one(self.read_conn())
            .await?
            .map(packet_from_row)
            .transpose()
    }

    async fn packets_for_topic(&self, topic: TopicId) -> Result<Vec<Packet>> {
        let rows = PacketEntity::find()
            .filter(PacketColumn::TopicId.eq(topic.0))
            .order_by_asc(PacketColumn::Id)
            .all(self.read_conn())
            .await?;
        rows.into_iter().map(packet_from_row).collect()
    }

    async fn packet_articles(&self, packet: PacketId) -> Result<Vec<PacketArticle>> {
        let rows = PacketArticleEntity::find()
            .filter(PacketArticleColumn::PacketId.eq(packet.0))
            .order_by_asc(PacketArticleColumn::Id)
            .all(self.read_conn())
            .await?;
        Ok(rows.into_iter().map(packet_article_from_row).collect())
    }

    async fn set_dropped(
        &self,
        packet: PacketId,
        article: ArticleId,
        dropped: bool,
    ) -> Result<PacketArticle> {
        let row = PacketArticleEntity::find()
            .filter(PacketArticleColumn::PacketId.eq(packet.0))
            .filter(PacketArticleColumn::ArticleId.eq(article.0))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("packet_article", format!("{packet}/{article}")))?;

        let mut model: PacketArticleActiveModel = row.into();
        model.dropped = Set(dropped);
        let updated = model.update(self.write_conn()).await?;
        Ok(packet_article_from_row(updated))
    }

    async fn insert_review(
        &self,
        packet_article: PacketArticleId,
        review: NewReview,
        posted: DateTime<Utc>,
    ) -> Result<Review> {
        let row = ReviewActiveModel {
            id: NotSet,
            packet_article_id: Set(packet_article.0),
            reviewer: Set(review.reviewer.0),
            posted: Set(posted.into()),
            dispositions: Set(to_json(&review.dispositions)?),
            reasons: Set(to_json(&review.reasons)?),
            comments: Set(review.comments),
            recorded_by: Set(review.recorded_by.map(|u| u.0)),
        }
        .insert(self.write_conn())
        .await?;
        debug!(review_id = row.id, recorded_by = ?row.recorded_by, "Review stored");
        review_from_row(row)
    }

    async fn reviews(&self, packet_article: PacketArticleId) -> Result<Vec<Review>> {
        let rows = ReviewEntity::find()
            .filter(ReviewColumn::PacketArticleId.eq(packet_article.0))
            .order_by_asc(ReviewColumn::Id)
            .all(self.read_conn())
            .await?;
        rows.into_iter().map(review_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StateExtra;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn row(id: i64, value: &str, current: bool) -> StateRow {
        StateRow {
            id,
            article_id: 7,
            topic_id: 3,
            board_id: 1,
            value: value.to_string(),
            current,
            entered: Utc.with_ymd_and_hms(2024, 5, 1, 9, id as u32, 0).unwrap().into(),
            actor: 42,
            extra: to_json(&StateExtra::default()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_history_agrees_with_current_state_despite_lagging_replica() {
        let primary = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                row(1, "ready_init_review", false),
                row(2, "passed_init_review", true),
            ]])
            .append_query_results([vec![row(2, "passed_init_review", true)]])
            .into_connection();
        let replica = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(1, "ready_init_review", true)]])
            .into_connection();
        let store = SeaOrmStore::new(DbPool { primary, replica: Some(replica) });
        let pair = PairKey { article_id: ArticleId(7), topic_id: TopicId(3) };

        let history = store.history(pair).await.unwrap();
        let current = store.current_state(pair).await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.last(), current.as_ref());
        assert_eq!(history[1].value, StateValue::PassedInitReview);
    }
}
