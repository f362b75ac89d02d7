//! Article-topic state handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validated;
use crate::AppState;
use ebms_common::{
    auth::Actor,
    domain::{
        ArticleId, BoardDecisionEntry, BoardId, Cycle, Decision, MeetingId, PairKey, QueueType,
        StateRecord, StateValue, TopicId, UserId,
    },
    errors::{AppError, Result},
    review::{InitialState, TopicAssignment},
    store::StateScope,
};

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub queue_type: QueueType,
    pub decision: Decision,
    /// Moves the assignment to another review cycle
    #[serde(default)]
    pub cycle: Option<Cycle>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignTopicRequest {
    pub topic_id: TopicId,
    pub initial: InitialState,
    #[serde(default)]
    pub cycle: Option<Cycle>,
    #[validate(length(min = 1, max = 4000))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AgendaRequest {
    #[validate(length(min = 1))]
    pub meetings: Vec<MeetingId>,
    #[validate(length(max = 4000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BoardDecisionRequest {
    #[validate(length(min = 1))]
    pub decisions: Vec<BoardDecisionEntry>,
    #[serde(default)]
    pub deciders: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub value: StateValue,
    pub board: Option<BoardId>,
    pub topic: Option<TopicId>,
    pub cycle: Option<Cycle>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub value: StateValue,
    pub count: u64,
}

fn pair(article: i64, topic: i64) -> PairKey {
    PairKey::new(ArticleId(article), TopicId(topic))
}

/// Current state of a pair
pub async fn current_state(
    State(state): State<AppState>,
    _actor: Actor,
    Path((article, topic)): Path<(i64, i64)>,
) -> Result<Json<StateRecord>> {
    let pair = pair(article, topic);
    state
        .services
        .machine
        .current_state(pair)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("state", pair))
}

/// Full state history of a pair, oldest first
pub async fn history(
    State(state): State<AppState>,
    _actor: Actor,
    Path((article, topic)): Path<(i64, i64)>,
) -> Result<Json<Vec<StateRecord>>> {
    let history = state.services.machine.history(pair(article, topic)).await?;
    Ok(Json(history))
}

/// Apply one queue decision immediately
pub async fn apply_decision(
    State(state): State<AppState>,
    actor: Actor,
    Path((article, topic)): Path<(i64, i64)>,
    Json(request): Json<DecisionRequest>,
) -> Result<(StatusCode, Json<StateRecord>)> {
    let record = state
        .services
        .machine
        .apply_decision(
            pair(article, topic),
            request.queue_type,
            request.decision,
            &actor,
            request.cycle,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Start tracking an article for a topic
pub async fn assign_topic(
    State(state): State<AppState>,
    actor: Actor,
    Path(article): Path<i64>,
    Json(request): Json<AssignTopicRequest>,
) -> Result<(StatusCode, Json<StateRecord>)> {
    let request = validated(request)?;
    let record = state
        .services
        .machine
        .assign_topic(
            TopicAssignment {
                article_id: ArticleId(article),
                topic_id: request.topic_id,
                cycle: request.cycle,
                initial: request.initial,
                comment: request.comment,
            },
            &actor,
        )
        .await?;

    tracing::info!(
        article_id = article,
        topic_id = %request.topic_id,
        state = record.value.text_id(),
        "Topic assigned"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn place_on_agenda(
    State(state): State<AppState>,
    actor: Actor,
    Path((article, topic)): Path<(i64, i64)>,
    Json(request): Json<AgendaRequest>,
) -> Result<(StatusCode, Json<StateRecord>)> {
    let request = validated(request)?;
    let record = state
        .services
        .machine
        .place_on_agenda(pair(article, topic), request.meetings, &actor, request.note)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn record_board_decision(
    State(state): State<AppState>,
    actor: Actor,
    Path((article, topic)): Path<(i64, i64)>,
    Json(request): Json<BoardDecisionRequest>,
) -> Result<(StatusCode, Json<StateRecord>)> {
    let request = validated(request)?;
    let record = state
        .services
        .machine
        .record_board_decision(pair(article, topic), request.decisions, request.deciders, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Count pairs whose current state is `value`
pub async fn count(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<CountQuery>,
) -> Result<Json<CountResponse>> {
    let scope = StateScope {
        board: query.board,
        topic: query.topic,
        cycle: query.cycle,
    };
    let count = state
        .services
        .machine
        .count_by_state_and_scope(query.value, scope)
        .await?;
    Ok(Json(CountResponse {
        value: query.value,
        count,
    }))
}
