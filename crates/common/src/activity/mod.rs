//! Activity events for the home-page feed
//!
//! Publishing is fire-and-forget: a failed publish is logged and never
//! surfaces to the caller whose operation produced the event.

use crate::domain::{ArticleId, BoardId, PacketId, QueueId, QueueType, TopicId, UserId};
use crate::errors::{AppError, Result};
use aws_sdk_sqs::Client as SqsClient;
use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something interesting happened in the review workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEvent {
    QueueCommitted {
        queue_id: QueueId,
        queue_type: QueueType,
        actor: UserId,
        board: Option<BoardId>,
        succeeded: usize,
        failed: usize,
        at: DateTime<Utc>,
    },
    PacketCreated {
        packet_id: PacketId,
        topic_id: TopicId,
        actor: UserId,
        articles: usize,
        reviewers: usize,
        at: DateTime<Utc>,
    },
    ReviewPosted {
        packet_id: PacketId,
        article_id: ArticleId,
        reviewer: UserId,
        at: DateTime<Utc>,
    },
}

impl ActivityEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityEvent::QueueCommitted { .. } => "queue_committed",
            ActivityEvent::PacketCreated { .. } => "packet_created",
            ActivityEvent::ReviewPosted { .. } => "review_posted",
        }
    }
}

/// Outbound activity collaborator
pub trait ActivityNotifier: Send + Sync {
    fn notify(&self, event: ActivityEvent);
}

/// Logs events only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl ActivityNotifier for TracingNotifier {
    fn notify(&self, event: ActivityEvent) {
        info!(kind = event.kind(), event = ?event, "Activity");
    }
}

/// Keeps events in memory; handy for local runs and tests
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    events: Mutex<Vec<ActivityEvent>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ActivityNotifier for CollectingNotifier {
    fn notify(&self, event: ActivityEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Publishes events as JSON messages to an SQS queue
pub struct SqsNotifier {
    client: SqsClient,
    queue_url: String,
    max_elapsed: Duration,
}

impl SqsNotifier {
    /// Create a notifier using the default AWS configuration chain
    pub async fn new(queue_url: impl Into<String>, max_elapsed: Duration) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::with_client(SqsClient::new(&aws_config), queue_url, max_elapsed)
    }

    /// Create with an existing SQS client
    pub fn with_client(
        client: SqsClient,
        queue_url: impl Into<String>,
        max_elapsed: Duration,
    ) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            max_elapsed,
        }
    }

    /// Send one event, retrying transient failures with exponential backoff
    pub async fn publish(&self, event: &ActivityEvent) -> Result<String> {
        let body = serde_json::to_string(event)?;
        publish_body(self.client.clone(), self.queue_url.clone(), body, self.max_elapsed).await
    }
}

async fn publish_body(
    client: SqsClient,
    queue_url: String,
    body: String,
    max_elapsed: Duration,
) -> Result<String> {
    let policy = ExponentialBackoff {
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    };

    retry(policy, || {
        let client = client.clone();
        let queue_url = queue_url.clone();
        let body = body.clone();
        async move {
            let sent = client
                .send_message()
                .queue_url(queue_url)
                .message_body(body)
                .send()
                .await
                .map_err(|e| backoff::Error::<String>::transient(e.to_string()))?;
            Ok::<_, backoff::Error<String>>(sent.message_id.unwrap_or_default())
        }
    })
    .await
    .map_err(|message| AppError::ActivityError {
        message: format!("Failed to publish activity: {}", message),
    })
}

impl ActivityNotifier for SqsNotifier {
    fn notify(&self, event: ActivityEvent) {
        let body = match serde_json::to_string(&event) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, kind = event.kind(), "Failed to serialize activity");
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(kind = event.kind(), "No runtime available, activity dropped");
            return;
        };

        let client = self.client.clone();
        let queue_url = self.queue_url.clone();
        let max_elapsed = self.max_elapsed;
        let kind = event.kind();
        runtime.spawn(async move {
            match publish_body(client, queue_url, body, max_elapsed).await {
                Ok(message_id) => debug!(message_id = %message_id, kind, "Activity published"),
                Err(e) => warn!(error = %e, kind, "Activity dropped"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = ActivityEvent::ReviewPosted {
            packet_id: PacketId(4),
            article_id: ArticleId(99),
            reviewer: UserId(12),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "review_posted");
        assert_eq!(json["article_id"], 99);

        let parsed: ActivityEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_collecting_notifier() {
        let notifier = CollectingNotifier::new();
        notifier.notify(ActivityEvent::PacketCreated {
            packet_id: PacketId(1),
            topic_id: TopicId(2),
            actor: UserId(3),
            articles: 4,
            reviewers: 2,
            at: Utc::now(),
        });
        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "packet_created");
    }

    #[tokio::test]
    async fn test_unreachable_queue_surfaces_activity_error() {
        use aws_sdk_sqs::config::{retry::RetryConfig, BehaviorVersion, Credentials, Region};

        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .endpoint_url("http://127.0.0.1:1")
            .retry_config(RetryConfig::disabled())
            .build();
        let notifier = SqsNotifier::with_client(
            SqsClient::from_conf(config),
            "http://127.0.0.1:1/000000000000/activity",
            Duration::ZERO,
        );

        let err = notifier
            .publish(&ActivityEvent::PacketCreated {
                packet_id: PacketId(1),
                topic_id: TopicId(2),
                actor: UserId(3),
                articles: 1,
                reviewers: 1,
                at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ActivityError { .. }));
    }
}
