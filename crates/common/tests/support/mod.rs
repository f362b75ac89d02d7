#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use ebms_common::activity::CollectingNotifier;
use ebms_common::auth::{Actor, IMPORT_PERMISSION};
use ebms_common::domain::{
    Article, ArticleId, Board, BoardId, Decision, FullText, PairKey, QueueType, Topic, TopicId,
    UserId,
};
use ebms_common::review::{InitialState, TopicAssignment};
use ebms_common::store::CatalogStore;
use ebms_common::{MemoryStore, ReviewContext, ReviewServices};
use std::sync::Arc;

pub const BOARD: BoardId = BoardId(1);
pub const TOPIC: TopicId = TopicId(10);

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub activity: Arc<CollectingNotifier>,
    pub services: ReviewServices,
}

impl Harness {
    pub async fn new() -> Self {
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
                nci_reviewer: None,
            })
            .await
            .unwrap();

        let activity = Arc::new(CollectingNotifier::new());
        let context = ReviewContext::new(store.clone()).with_activity(activity.clone());
        Self {
            store,
            activity,
            services: ReviewServices::new(context),
        }
    }

    /// Import an article for the topic; full text retrieved in the given year
    pub async fn import(&self, id: i64, full_text_year: Option<i32>) -> PairKey {
        self.store
            .save_article(Article {
                id: ArticleId(id),
                source_id: format!("{}", 35_000_000 + id),
                title: format!("Outcomes study {id}"),
                authors: vec!["Smith J".into()],
                journal_title: "The Lancet. Oncology".into(),
                brief_journal_title: "Lancet Oncol".into(),
                source_journal_id: "100957246".into(),
                core_journal: true,
                year: Some(2021),
                full_text: full_text_year.map(|year| FullText {
                    file: format!("{id}.pdf"),
                    retrieved: Utc.with_ymd_and_hms(year, 3, 15, 0, 0, 0).unwrap(),
                }),
                tags: Vec::new(),
                imported: Utc::now(),
            })
            .await
            .unwrap();

        let mut importer = Actor::new(UserId(900));
        importer.permissions = vec![IMPORT_PERMISSION.to_string()];
        self.services
            .machine
            .assign_topic(
                TopicAssignment {
                    article_id: ArticleId(id),
                    topic_id: TOPIC,
                    cycle: None,
                    initial: InitialState::Import,
                    comment: None,
                },
                &importer,
            )
            .await
            .unwrap();
        PairKey::new(ArticleId(id), TOPIC)
    }

    /// Walk a freshly imported pair up to the source state of `queue`
    pub async fn advance_to(&self, pair: PairKey, queue: QueueType) {
        let steps = [
            (QueueType::LibrarianReview, Decision::Approve),
            (QueueType::Publishing, Decision::Approve),
            (QueueType::AbstractReview, Decision::Approve),
            (QueueType::FullTextReview, Decision::OnHold),
        ];
        for (step, decision) in steps {
            if step == queue {
                return;
            }
            self.services
                .machine
                .apply_decision(pair, step, decision, &reviewer(step, 1), None)
                .await
                .unwrap();
        }
    }
}

/// Board member holding the queue's permission
pub fn reviewer(queue: QueueType, user: i64) -> Actor {
    let mut actor = Actor::new(UserId(user));
    actor.permissions = vec![queue.permission().to_string()];
    actor.boards = vec![BOARD];
    actor
}
