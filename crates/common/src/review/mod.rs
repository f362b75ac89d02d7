//! Review workflow services
//!
//! - [`StateMachine`]: validated transitions for single article-topic pairs
//! - [`QueueService`]: saved queues, staged decisions and batch commits
//! - [`PacketService`]: reviewer packets, responses and their aggregates
//!
//! All three share one [`ReviewContext`] holding the store and the outbound
//! collaborators.

mod machine;
mod packets;
mod queue;

#[cfg(test)]
mod testing;

pub use machine::{InitialState, StateMachine, TopicAssignment};
pub use packets::{PacketCandidate, PacketService};
pub use queue::{
    CommitFailure, CommitReport, CommitSuccess, QueuePage, QueueRow, QueueRowTopic,
    QueueService, TopicCount, TopicCounts,
};

use crate::activity::{ActivityNotifier, TracingNotifier};
use crate::auth::{Authorizer, ScopeAuthorizer};
use crate::config::ReviewConfig;
use crate::domain::{Article, ArticleId, PairKey, Topic, TopicId};
use crate::errors::{AppError, Result};
use crate::reference::{ReferenceData, StaticReferenceData};
use crate::store::ReviewStore;
use std::sync::Arc;

/// Shared dependencies of the review services
#[derive(Clone)]
pub struct ReviewContext {
    pub store: Arc<dyn ReviewStore>,
    pub authorizer: Arc<dyn Authorizer>,
    pub activity: Arc<dyn ActivityNotifier>,
    pub reference: Arc<dyn ReferenceData>,
    pub config: ReviewConfig,
}

impl ReviewContext {
    /// Context with the default collaborators: scope-based authorization,
    /// log-only activity and empty reference tables
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self {
            store,
            authorizer: Arc::new(ScopeAuthorizer),
            activity: Arc::new(TracingNotifier),
            reference: Arc::new(StaticReferenceData::new()),
            config: ReviewConfig::default(),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_activity(mut self, activity: Arc<dyn ActivityNotifier>) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_reference(mut self, reference: Arc<dyn ReferenceData>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_config(mut self, config: ReviewConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) async fn require_topic(&self, id: TopicId) -> Result<Topic> {
        self.store
            .topic(id)
            .await?
            .ok_or_else(|| AppError::not_found("topic", id))
    }

    pub(crate) async fn require_article(&self, id: ArticleId) -> Result<Article> {
        self.store
            .article(id)
            .await?
            .ok_or_else(|| AppError::not_found("article", id))
    }

    pub(crate) fn topic_label(&self, pair: PairKey) -> String {
        self.reference
            .topic_name(pair.topic_id)
            .unwrap_or_else(|| format!("topic {}", pair.topic_id))
    }
}

/// The three services wired over one context
#[derive(Clone)]
pub struct ReviewServices {
    pub machine: Arc<StateMachine>,
    pub queues: Arc<QueueService>,
    pub packets: Arc<PacketService>,
}

impl ReviewServices {
    pub fn new(context: ReviewContext) -> Self {
        let context = Arc::new(context);
        let machine = Arc::new(StateMachine::new(context.clone()));
        let queues = Arc::new(QueueService::new(context.clone(), machine.clone()));
        let packets = Arc::new(PacketService::new(context));
        Self {
            machine,
            queues,
            packets,
        }
    }
}
