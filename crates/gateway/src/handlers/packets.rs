//! Reviewer packet handlers

use axum::{
    extract::{Path, State},
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
        ArticleId, Disposition, DispositionSummary, NewPacket, NewReview, Packet, PacketArticle,
        PacketId, ReasonId, ResponseStatus, Review, TopicId, UserId,
    },
    errors::Result,
    review::PacketCandidate,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePacketRequest {
    pub topic_id: TopicId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub reviewers: Vec<UserId>,
    #[validate(length(min = 1))]
    pub articles: Vec<ArticleId>,
    #[serde(default)]
    pub summaries: Vec<String>,
}

#[derive(Serialize)]
pub struct CreatePacketResponse {
    pub packet: Packet,
    pub articles: Vec<PacketArticle>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    /// Defaults to the caller
    pub reviewer: Option<UserId>,
    #[validate(length(min = 1))]
    pub dispositions: Vec<Disposition>,
    #[serde(default)]
    pub reasons: Vec<ReasonId>,
    #[validate(length(max = 10000))]
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuickRejectRequest {
    pub reviewer: Option<UserId>,
    #[validate(length(min = 1))]
    pub reasons: Vec<ReasonId>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: ResponseStatus,
    pub complete: bool,
}

#[derive(Serialize)]
pub struct ArticleList {
    pub packet_id: PacketId,
    pub articles: Vec<ArticleId>,
}

/// Articles eligible for a new packet on the topic
pub async fn candidates(
    State(state): State<AppState>,
    actor: Actor,
    Path(topic): Path<i64>,
) -> Result<Json<Vec<PacketCandidate>>> {
    let candidates = state
        .services
        .packets
        .packet_candidates(TopicId(topic), &actor)
        .await?;
    Ok(Json(candidates))
}

pub async fn create_packet(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreatePacketRequest>,
) -> Result<(StatusCode, Json<CreatePacketResponse>)> {
    let request = validated(request)?;
    let (packet, articles) = state
        .services
        .packets
        .create_packet(
            NewPacket {
                topic_id: request.topic_id,
                name: request.name,
                reviewers: request.reviewers,
                articles: request.articles,
                summaries: request.summaries,
            },
            &actor,
        )
        .await?;

    tracing::info!(
        packet_id = %packet.id,
        topic_id = %packet.topic_id,
        articles = articles.len(),
        "Packet created"
    );
    Ok((StatusCode::CREATED, Json(CreatePacketResponse { packet, articles })))
}

pub async fn drop_article(
    State(state): State<AppState>,
    actor: Actor,
    Path((packet, article)): Path<(i64, i64)>,
) -> Result<Json<PacketArticle>> {
    let membership = state
        .services
        .packets
        .drop_article(PacketId(packet), ArticleId(article), &actor)
        .await?;
    Ok(Json(membership))
}

pub async fn restore_article(
    State(state): State<AppState>,
    actor: Actor,
    Path((packet, article)): Path<(i64, i64)>,
) -> Result<Json<PacketArticle>> {
    let membership = state
        .services
        .packets
        .restore_article(PacketId(packet), ArticleId(article), &actor)
        .await?;
    Ok(Json(membership))
}

/// Post a reviewer response, possibly recorded by staff on the reviewer's behalf
pub async fn submit_review(
    State(state): State<AppState>,
    actor: Actor,
    Path((packet, article)): Path<(i64, i64)>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let request = validated(request)?;
    let review = state
        .services
        .packets
        .submit_review(
            PacketId(packet),
            ArticleId(article),
            NewReview {
                reviewer: request.reviewer.unwrap_or(actor.user_id),
                dispositions: request.dispositions,
                reasons: request.reasons,
                comments: request.comments,
                recorded_by: None,
            },
            &actor,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn quick_reject(
    State(state): State<AppState>,
    actor: Actor,
    Path((packet, article)): Path<(i64, i64)>,
    Json(request): Json<QuickRejectRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let request = validated(request)?;
    let reviewer = request.reviewer.unwrap_or(actor.user_id);
    let review = state
        .services
        .packets
        .quick_reject(PacketId(packet), ArticleId(article), reviewer, request.reasons, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn response_status(
    State(state): State<AppState>,
    _actor: Actor,
    Path((packet, article)): Path<(i64, i64)>,
) -> Result<Json<StatusResponse>> {
    let status = state
        .services
        .packets
        .response_status(PacketId(packet), ArticleId(article))
        .await?;
    Ok(Json(StatusResponse {
        complete: status.is_complete(),
        status,
    }))
}

pub async fn disposition_summary(
    State(state): State<AppState>,
    _actor: Actor,
    Path((packet, article)): Path<(i64, i64)>,
) -> Result<Json<DispositionSummary>> {
    let summary = state
        .services
        .packets
        .disposition_summary(PacketId(packet), ArticleId(article))
        .await?;
    Ok(Json(summary))
}

/// Articles every assigned reviewer has answered, all with rejections
pub async fn rejection_candidates(
    State(state): State<AppState>,
    _actor: Actor,
    Path(packet): Path<i64>,
) -> Result<Json<ArticleList>> {
    let articles = state
        .services
        .packets
        .rejection_candidates(PacketId(packet))
        .await?;
    Ok(Json(ArticleList {
        packet_id: PacketId(packet),
        articles,
    }))
}

pub async fn articles_without_responses(
    State(state): State<AppState>,
    _actor: Actor,
    Path(packet): Path<i64>,
) -> Result<Json<ArticleList>> {
    let articles = state
        .services
        .packets
        .articles_without_responses(PacketId(packet))
        .await?;
    Ok(Json(ArticleList {
        packet_id: PacketId(packet),
        articles,
    }))
}
