//! Review queue handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validated;
use crate::AppState;
use ebms_common::{
    auth::Actor,
    domain::{
        ArticleId, BoardId, Decision, DisplayOptions, PairKey, QueueDefinition, QueueFilters,
        QueueType, StagedDecision, TopicId,
    },
    errors::Result,
    review::{CommitReport, QueuePage, TopicCounts},
};

/// Longest free-text title or journal fragment a queue may filter on
const MAX_FILTER_FRAGMENT: usize = 255;

#[derive(Debug, Deserialize, Validate)]
pub struct OpenQueueRequest {
    pub queue_type: QueueType,
    #[serde(default)]
    #[validate(custom(function = "check_fragments"))]
    pub filters: QueueFilters,
}

fn check_fragments(filters: &QueueFilters) -> std::result::Result<(), ValidationError> {
    let too_long = [&filters.title, &filters.journal]
        .into_iter()
        .flatten()
        .any(|fragment| fragment.chars().count() > MAX_FILTER_FRAGMENT);
    if too_long {
        let mut error = ValidationError::new("length");
        error.message = Some(
            format!("title and journal fragments are limited to {MAX_FILTER_FRAGMENT} characters")
                .into(),
        );
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub article_id: ArticleId,
    pub topic_id: TopicId,
    pub decision: Decision,
}

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub article_id: ArticleId,
    pub topic_id: TopicId,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: usize,
}

#[derive(Debug, Deserialize)]
pub struct TopicCountQuery {
    pub queue_type: QueueType,
}

#[derive(Debug, Serialize)]
pub struct StagedResponse {
    pub queue_id: Uuid,
    pub decisions: Vec<StagedDecision>,
    /// Human-readable lines for the confirmation screen
    pub summary: Vec<String>,
}

/// Open a new queue for the caller
pub async fn open_queue(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<OpenQueueRequest>,
) -> Result<(StatusCode, Json<QueueDefinition>)> {
    let request = validated(request)?;
    let queue = state
        .services
        .queues
        .open_queue(request.queue_type, request.filters, &actor)
        .await?;

    tracing::info!(
        queue_id = %queue.id,
        queue_type = queue.queue_type.name(),
        user_id = %actor.user_id,
        "Queue opened"
    );
    Ok((StatusCode::CREATED, Json(queue)))
}

pub async fn get_queue(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueDefinition>> {
    Ok(Json(state.services.queues.queue(id, &actor).await?))
}

/// One page of queue rows, zero-based
pub async fn page(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<QueuePage>> {
    Ok(Json(state.services.queues.page(id, query.page, &actor).await?))
}

pub async fn list_staged(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<StagedResponse>> {
    let queues = &state.services.queues;
    let decisions = queues.list_staged(id, &actor).await?;
    let summary = queues.describe_staged(id, &actor).await?;
    Ok(Json(StagedResponse {
        queue_id: id,
        decisions,
        summary,
    }))
}

/// Stage a decision; decision code 0 clears it
pub async fn stage_decision(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<StageRequest>,
) -> Result<StatusCode> {
    state
        .services
        .queues
        .stage_decision(
            id,
            PairKey::new(request.article_id, request.topic_id),
            request.decision,
            &actor,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unstage_decision(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<PairQuery>,
) -> Result<StatusCode> {
    state
        .services
        .queues
        .unstage_decision(id, PairKey::new(query.article_id, query.topic_id), &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply every staged decision; per-pair failures are reported, not raised
pub async fn commit(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<CommitReport>> {
    let report = state.services.queues.commit_queue(id, &actor).await?;
    if !report.is_clean() {
        tracing::warn!(
            queue_id = %id,
            failed = report.failed.len(),
            "Queue commit finished with failures"
        );
    }
    Ok(Json(report))
}

pub async fn reset(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueDefinition>> {
    Ok(Json(state.services.queues.reset_queue(id, &actor).await?))
}

pub async fn set_display(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(display): Json<DisplayOptions>,
) -> Result<Json<QueueDefinition>> {
    let queue = state
        .services
        .queues
        .set_display_options(id, display, &actor)
        .await?;
    Ok(Json(queue))
}

/// Per-topic counts for the queue picker
pub async fn topic_counts(
    State(state): State<AppState>,
    actor: Actor,
    Path(board): Path<i64>,
    Query(query): Query<TopicCountQuery>,
) -> Result<Json<TopicCounts>> {
    let counts = state
        .services
        .queues
        .topic_counts(BoardId(board), query.queue_type, &actor)
        .await?;
    Ok(Json(counts))
}
