//! Reviewer packets and the responses posted against them

use super::ReviewContext;
use crate::activity::ActivityEvent;
use crate::auth::Actor;
use crate::domain::{
    Article, ArticleId, Disposition, DispositionSummary, NewPacket, NewReview, Packet,
    PacketArticle, PacketId, ReasonId, ResponseStatus, Review, StateRecord, StateValue, Topic,
    TopicId, UserId,
};
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};

/// Article-topic eligible for a new packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketCandidate {
    pub article: Article,
    pub state: StateRecord,
}

pub struct PacketService {
    context: Arc<ReviewContext>,
}

impl PacketService {
    pub fn new(context: Arc<ReviewContext>) -> Self {
        Self { context }
    }

    async fn managed_topic(&self, topic: TopicId, actor: &Actor) -> Result<Topic> {
        let topic = self.context.require_topic(topic).await?;
        if !self.context.authorizer.can_manage_board(actor, topic.board_id) {
            return Err(AppError::Unauthorized {
                message: format!(
                    "user {} does not manage packets for board {}",
                    actor.user_id, topic.board_id
                ),
            });
        }
        Ok(topic)
    }

    async fn require_packet(&self, id: PacketId) -> Result<Packet> {
        self.context
            .store
            .packet(id)
            .await?
            .ok_or_else(|| AppError::not_found("packet", id))
    }

    async fn membership(&self, packet: PacketId, article: ArticleId) -> Result<PacketArticle> {
        self.context
            .store
            .packet_articles(packet)
            .await?
            .into_iter()
            .find(|pa| pa.article_id == article)
            .ok_or_else(|| AppError::not_found("packet_article", format!("{packet}/{article}")))
    }

    /// Pairs ready for a packet: passed full text review (or FYI since the
    /// cutover), with full text on file, and not already in another packet
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn packet_candidates(
        &self,
        topic: TopicId,
        actor: &Actor,
    ) -> Result<Vec<PacketCandidate>> {
        let topic = self.managed_topic(topic, actor).await?;
        self.candidates(&topic).await
    }

    async fn candidates(&self, topic: &Topic) -> Result<Vec<PacketCandidate>> {
        let store = &self.context.store;
        let cutover = self.context.config.fyi_cutover;

        let mut states = store
            .current_in_state(StateValue::PassedFullReview, None, &[topic.id])
            .await?;
        states.extend(
            store
                .current_in_state(StateValue::Fyi, None, &[topic.id])
                .await?
                .into_iter()
                .filter(|s| s.entered.date_naive() >= cutover),
        );

        let mut packed = HashSet::new();
        for packet in store.packets_for_topic(topic.id).await? {
            for membership in store.packet_articles(packet.id).await? {
                if !membership.dropped {
                    packed.insert(membership.article_id);
                }
            }
        }
        states.retain(|s| !packed.contains(&s.article_id));

        let ids: Vec<ArticleId> = states.iter().map(|s| s.article_id).collect();
        let mut articles = store.articles(&ids).await?;
        articles.retain(Article::has_full_text);

        let mut candidates: Vec<PacketCandidate> = states
            .into_iter()
            .filter_map(|state| {
                let article = articles.iter().find(|a| a.id == state.article_id)?.clone();
                Some(PacketCandidate { article, state })
            })
            .collect();
        candidates.sort_by_key(|c| c.article.id);
        Ok(candidates)
    }

    /// Bundle candidate articles for a set of reviewers
    #[instrument(
        skip(self, packet, actor),
        fields(topic_id = %packet.topic_id, user_id = %actor.user_id)
    )]
    pub async fn create_packet(
        &self,
        mut packet: NewPacket,
        actor: &Actor,
    ) -> Result<(Packet, Vec<PacketArticle>)> {
        packet.name = packet.name.trim().to_string();
        if packet.name.is_empty() {
            return Err(AppError::validation("name", "packet name is required"));
        }
        dedup(&mut packet.reviewers);
        dedup(&mut packet.articles);
        if packet.reviewers.is_empty() {
            return Err(AppError::validation("reviewers", "at least one reviewer is required"));
        }
        if packet.articles.is_empty() {
            return Err(AppError::validation("articles", "at least one article is required"));
        }

        let topic = self.managed_topic(packet.topic_id, actor).await?;
        let eligible: HashSet<ArticleId> = self
            .candidates(&topic)
            .await?
            .into_iter()
            .map(|c| c.article.id)
            .collect();
        if let Some(article) = packet.articles.iter().find(|a| !eligible.contains(a)) {
            return Err(AppError::validation(
                "articles",
                format!("article {article} is not ready for a packet on topic {}", topic.id),
            ));
        }

        let (stored, memberships) = self
            .context
            .store
            .insert_packet(packet, actor.user_id, Utc::now())
            .await?;

        metrics::record_packet_created(memberships.len());
        self.context.activity.notify(ActivityEvent::PacketCreated {
            packet_id: stored.id,
            topic_id: stored.topic_id,
            actor: actor.user_id,
            articles: memberships.len(),
            reviewers: stored.reviewers.len(),
            at: stored.created,
        });
        info!(packet_id = %stored.id, articles = memberships.len(), "Packet created");
        Ok((stored, memberships))
    }

    pub async fn drop_article(
        &self,
        packet: PacketId,
        article: ArticleId,
        actor: &Actor,
    ) -> Result<PacketArticle> {
        self.set_dropped(packet, article, true, actor).await
    }

    pub async fn restore_article(
        &self,
        packet: PacketId,
        article: ArticleId,
        actor: &Actor,
    ) -> Result<PacketArticle> {
        self.set_dropped(packet, article, false, actor).await
    }

    async fn set_dropped(
        &self,
        packet: PacketId,
        article: ArticleId,
        dropped: bool,
        actor: &Actor,
    ) -> Result<PacketArticle> {
        let stored = self.require_packet(packet).await?;
        self.managed_topic(stored.topic_id, actor).await?;
        let membership = self
            .context
            .store
            .set_dropped(packet, article, dropped)
            .await?;
        info!(packet_id = %packet, article_id = %article, dropped, "Packet membership updated");
        Ok(membership)
    }

    /// Record a reviewer's response; staff may record on a reviewer's behalf
    #[instrument(
        skip(self, review, actor),
        fields(reviewer = %review.reviewer, user_id = %actor.user_id)
    )]
    pub async fn submit_review(
        &self,
        packet: PacketId,
        article: ArticleId,
        mut review: NewReview,
        actor: &Actor,
    ) -> Result<Review> {
        dedup(&mut review.dispositions);
        if review.dispositions.is_empty() {
            return Err(AppError::validation(
                "dispositions",
                "at least one disposition is required",
            ));
        }
        let only_no_changes = review.dispositions == [Disposition::WarrantsNoChanges];
        if only_no_changes && review.reasons.is_empty() {
            return Err(AppError::validation(
                "reasons",
                "a rejection reason is required when no changes are warranted",
            ));
        }

        let stored = self.require_packet(packet).await?;
        if !stored.active {
            return Err(AppError::validation("packet", format!("packet {packet} is archived")));
        }
        if !stored.reviewers.contains(&review.reviewer) {
            return Err(AppError::validation(
                "reviewer",
                format!("user {} is not assigned to packet {packet}", review.reviewer),
            ));
        }
        if actor.user_id == review.reviewer {
            review.recorded_by = None;
        } else {
            self.managed_topic(stored.topic_id, actor).await?;
            review.recorded_by = Some(actor.user_id);
        }

        let membership = self.membership(packet, article).await?;
        if membership.dropped {
            return Err(AppError::validation(
                "article",
                format!("article {article} was dropped from packet {packet}"),
            ));
        }

        let posted = self
            .context
            .store
            .insert_review(membership.id, review, Utc::now())
            .await?;

        metrics::record_review_posted(only_no_changes);
        self.context.activity.notify(ActivityEvent::ReviewPosted {
            packet_id: packet,
            article_id: article,
            reviewer: posted.reviewer,
            at: posted.posted,
        });
        info!(packet_id = %packet, article_id = %article, review_id = %posted.id, "Review posted");
        Ok(posted)
    }

    /// One-click "no changes warranted" response
    pub async fn quick_reject(
        &self,
        packet: PacketId,
        article: ArticleId,
        reviewer: UserId,
        reasons: Vec<ReasonId>,
        actor: &Actor,
    ) -> Result<Review> {
        let review = NewReview {
            reviewer,
            dispositions: vec![Disposition::WarrantsNoChanges],
            reasons,
            comments: None,
            recorded_by: None,
        };
        self.submit_review(packet, article, review, actor).await
    }

    pub async fn response_status(
        &self,
        packet: PacketId,
        article: ArticleId,
    ) -> Result<ResponseStatus> {
        let stored = self.require_packet(packet).await?;
        let membership = self.membership(packet, article).await?;
        let reviews = self.context.store.reviews(membership.id).await?;
        Ok(status(&stored, &reviews))
    }

    pub async fn disposition_summary(
        &self,
        packet: PacketId,
        article: ArticleId,
    ) -> Result<DispositionSummary> {
        let membership = self.membership(packet, article).await?;
        let reviews = self.context.store.reviews(membership.id).await?;
        Ok(DispositionSummary::from_reviews(&reviews))
    }

    /// Active articles every assigned reviewer answered with "no changes"
    /// and nothing else. Advisory only; nothing transitions automatically.
    pub async fn rejection_candidates(&self, packet: PacketId) -> Result<Vec<ArticleId>> {
        let stored = self.require_packet(packet).await?;
        let mut candidates = Vec::new();
        for membership in self.context.store.packet_articles(packet).await? {
            if membership.dropped {
                continue;
            }
            let reviews = self.context.store.reviews(membership.id).await?;
            if status(&stored, &reviews).is_complete()
                && DispositionSummary::from_reviews(&reviews).unanimous_rejection
            {
                candidates.push(membership.article_id);
            }
        }
        Ok(candidates)
    }

    pub async fn articles_without_responses(&self, packet: PacketId) -> Result<Vec<ArticleId>> {
        self.require_packet(packet).await?;
        let mut waiting = Vec::new();
        for membership in self.context.store.packet_articles(packet).await? {
            if !membership.dropped && self.context.store.reviews(membership.id).await?.is_empty() {
                waiting.push(membership.article_id);
            }
        }
        Ok(waiting)
    }
}

fn status(packet: &Packet, reviews: &[Review]) -> ResponseStatus {
    let assigned: BTreeSet<UserId> = packet.reviewers.iter().copied().collect();
    let completed: BTreeSet<UserId> = reviews.iter().map(|r| r.reviewer).collect();
    ResponseStatus {
        assigned: assigned.len(),
        completed: completed.len(),
    }
}

fn dedup<T: Ord>(items: &mut Vec<T>) {
    items.sort();
    items.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ADMIN_PERMISSION;
    use crate::domain::ReasonId;
    use crate::review::testing::{add_pair, article, seed, Fixture, TOPIC};
    use crate::store::CatalogStore;

    fn manager() -> Actor {
        let mut actor = Actor::new(UserId(2));
        actor.permissions = vec![ADMIN_PERMISSION.to_string()];
        actor
    }

    fn new_packet(articles: Vec<ArticleId>, reviewers: Vec<i64>) -> NewPacket {
        NewPacket {
            topic_id: TOPIC,
            name: "June packet".into(),
            reviewers: reviewers.into_iter().map(UserId).collect(),
            articles,
            summaries: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_candidates_need_full_text_and_no_packet() {
        let Fixture { services, store, pair, .. } = seed(StateValue::PassedFullReview).await;
        store.save_article(article(ArticleId(201), None)).await.unwrap();
        add_pair(&store, ArticleId(201), TOPIC, StateValue::PassedFullReview).await;
        add_pair(&store, ArticleId(202), TOPIC, StateValue::Fyi).await;
        add_pair(&store, ArticleId(203), TOPIC, StateValue::OnHold).await;

        let ids: Vec<ArticleId> = services
            .packets
            .packet_candidates(TOPIC, &manager())
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.article.id)
            .collect();
        assert_eq!(ids, vec![pair.article_id, ArticleId(202)]);

        services
            .packets
            .create_packet(new_packet(vec![pair.article_id], vec![5]), &manager())
            .await
            .unwrap();
        let remaining = services.packets.packet_candidates(TOPIC, &manager()).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_create_packet_rejects_ineligible_articles() {
        let Fixture { services, store, .. } = seed(StateValue::PassedFullReview).await;
        add_pair(&store, ArticleId(204), TOPIC, StateValue::Published).await;

        let err = services
            .packets
            .create_packet(new_packet(vec![ArticleId(204)], vec![5]), &manager())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_review_validation() {
        let Fixture { services, pair, .. } = seed(StateValue::PassedFullReview).await;
        let (packet, _) = services
            .packets
            .create_packet(new_packet(vec![pair.article_id], vec![5, 6]), &manager())
            .await
            .unwrap();
        let reviewer = Actor::new(UserId(5));

        let no_reason = NewReview {
            reviewer: UserId(5),
            dispositions: vec![Disposition::WarrantsNoChanges],
            reasons: Vec::new(),
            comments: None,
            recorded_by: None,
        };
        let err = services
            .packets
            .submit_review(packet.id, pair.article_id, no_reason, &reviewer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let stranger = Actor::new(UserId(9));
        let err = services
            .packets
            .quick_reject(packet.id, pair.article_id, UserId(9), vec![ReasonId(1)], &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        services
            .packets
            .drop_article(packet.id, pair.article_id, &manager())
            .await
            .unwrap();
        let err = services
            .packets
            .quick_reject(packet.id, pair.article_id, UserId(5), vec![ReasonId(1)], &reviewer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_unanimous_rejection_becomes_candidate() {
        let Fixture { services, activity, pair, .. } = seed(StateValue::PassedFullReview).await;
        let (packet, _) = services
            .packets
            .create_packet(new_packet(vec![pair.article_id], vec![5, 6]), &manager())
            .await
            .unwrap();

        services
            .packets
            .quick_reject(
                packet.id,
                pair.article_id,
                UserId(5),
                vec![ReasonId(1)],
                &Actor::new(UserId(5)),
            )
            .await
            .unwrap();
        assert!(services.packets.rejection_candidates(packet.id).await.unwrap().is_empty());

        let on_behalf = services
            .packets
            .quick_reject(packet.id, pair.article_id, UserId(6), vec![ReasonId(2)], &manager())
            .await
            .unwrap();
        assert_eq!(on_behalf.recorded_by, Some(UserId(2)));

        assert_eq!(
            services.packets.rejection_candidates(packet.id).await.unwrap(),
            vec![pair.article_id]
        );
        let summary = services
            .packets
            .disposition_summary(packet.id, pair.article_id)
            .await
            .unwrap();
        assert!(summary.unanimous_rejection);
        assert_eq!(summary.respondents, 2);

        let kinds: Vec<&str> = activity.events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["packet_created", "review_posted", "review_posted"]);
    }
}
