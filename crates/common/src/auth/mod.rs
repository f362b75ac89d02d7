//! Authentication and authorization utilities
//!
//! Provides:
//! - The resolved `Actor` scope carried by every request
//! - The `Authorizer` capability check consulted by the review services
//! - JWT token generation and validation
//! - An axum extractor that turns a bearer token into an `Actor`

use crate::domain::{BoardId, QueueType, Topic, TopicId, UserId};
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Permission granting every capability
pub const ADMIN_PERMISSION: &str = "administer ebms";

/// Permission held by the import job that assigns topics to new articles
pub const IMPORT_PERMISSION: &str = "import articles";

/// Caller identity and scope, already resolved by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,

    /// Boards the user sits on
    #[serde(default)]
    pub boards: Vec<BoardId>,

    /// Topics the user is the specialist reviewer for
    #[serde(default)]
    pub topics: Vec<TopicId>,

    /// Queue and workflow permissions
    #[serde(default)]
    pub permissions: Vec<String>,

    /// May review every topic regardless of assignment
    #[serde(default)]
    pub review_all_topics: bool,

    /// May create packets and record board actions
    #[serde(default)]
    pub manage_packets: bool,
}

impl Actor {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Check if the actor holds a permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == permission || p == ADMIN_PERMISSION)
    }

    /// Specialist for the topic, either by assignment or as its NCI reviewer
    pub fn is_specialist_for(&self, topic: &Topic) -> bool {
        self.topics.contains(&topic.id) || topic.nci_reviewer == Some(self.user_id)
    }
}

/// Capability checks injected into the review services
pub trait Authorizer: Send + Sync {
    fn can_open_queue(&self, actor: &Actor, queue: QueueType) -> bool;

    fn can_decide(&self, actor: &Actor, topic: &Topic, queue: QueueType) -> bool;

    fn can_manage_board(&self, actor: &Actor, board: BoardId) -> bool;
}

/// Default authorizer: a pure function of the actor's resolved scope
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeAuthorizer;

impl Authorizer for ScopeAuthorizer {
    fn can_open_queue(&self, actor: &Actor, queue: QueueType) -> bool {
        actor.has_permission(queue.permission())
    }

    fn can_decide(&self, actor: &Actor, topic: &Topic, queue: QueueType) -> bool {
        if !actor.has_permission(queue.permission()) {
            return false;
        }
        if !queue.is_topic_scoped() {
            return true;
        }
        actor.review_all_topics
            || actor.has_permission(ADMIN_PERMISSION)
            || actor.is_specialist_for(topic)
            || actor.boards.contains(&topic.board_id)
    }

    fn can_manage_board(&self, actor: &Actor, board: BoardId) -> bool {
        if actor.has_permission(ADMIN_PERMISSION) {
            return true;
        }
        actor.manage_packets && (actor.review_all_topics || actor.boards.contains(&board))
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Resolved scope
    #[serde(flatten)]
    pub actor: Actor,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token carrying the actor's scope
    pub fn generate_token(&self, actor: &Actor) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: actor.user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            actor: actor.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthenticated {
                    message: "Invalid bearer token".to_string(),
                },
            })
    }
}

/// Extract the token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Axum extractor for the calling actor
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthenticated {
            message: "Authorization header is not a bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;
        tracing::debug!(user_id = %claims.actor.user_id, "Authenticated request");
        Ok(claims.actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: i64, board: i64, reviewer: Option<i64>) -> Topic {
        Topic {
            id: TopicId(id),
            board_id: BoardId(board),
            name: format!("Topic {id}"),
            nci_reviewer: reviewer.map(UserId),
        }
    }

    fn reviewer() -> Actor {
        Actor {
            permissions: vec![QueueType::FullTextReview.permission().to_string()],
            ..Actor::new(UserId(5))
        }
    }

    #[test]
    fn test_topic_scoped_queue_needs_scope() {
        let auth = ScopeAuthorizer;
        let t = topic(3, 1, None);
        let mut actor = reviewer();
        assert!(auth.can_open_queue(&actor, QueueType::FullTextReview));
        assert!(!auth.can_decide(&actor, &t, QueueType::FullTextReview));

        actor.boards = vec![BoardId(1)];
        assert!(auth.can_decide(&actor, &t, QueueType::FullTextReview));

        let mut specialist = reviewer();
        specialist.topics = vec![TopicId(3)];
        assert!(auth.can_decide(&specialist, &t, QueueType::FullTextReview));

        let mut manager = reviewer();
        manager.review_all_topics = true;
        assert!(auth.can_decide(&manager, &t, QueueType::FullTextReview));
    }

    #[test]
    fn test_librarian_queue_needs_only_permission() {
        let auth = ScopeAuthorizer;
        let t = topic(3, 1, None);
        let mut librarian = Actor::new(UserId(2));
        assert!(!auth.can_decide(&librarian, &t, QueueType::LibrarianReview));
        librarian.permissions = vec![QueueType::LibrarianReview.permission().to_string()];
        assert!(auth.can_decide(&librarian, &t, QueueType::LibrarianReview));
        assert!(!auth.can_decide(&librarian, &t, QueueType::FullTextReview));
    }

    #[test]
    fn test_nci_reviewer_is_specialist() {
        let actor = Actor::new(UserId(8));
        assert!(actor.is_specialist_for(&topic(1, 1, Some(8))));
        assert!(!actor.is_specialist_for(&topic(1, 1, Some(9))));
    }

    #[test]
    fn test_board_management() {
        let auth = ScopeAuthorizer;
        let mut actor = Actor::new(UserId(1));
        actor.boards = vec![BoardId(4)];
        assert!(!auth.can_manage_board(&actor, BoardId(4)));
        actor.manage_packets = true;
        assert!(auth.can_manage_board(&actor, BoardId(4)));
        assert!(!auth.can_manage_board(&actor, BoardId(5)));

        let admin = Actor {
            permissions: vec![ADMIN_PERMISSION.to_string()],
            ..Actor::new(UserId(2))
        };
        assert!(auth.can_manage_board(&admin, BoardId(5)));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let actor = Actor {
            boards: vec![BoardId(1)],
            topics: vec![TopicId(7)],
            review_all_topics: true,
            ..reviewer()
        };

        let token = manager.generate_token(&actor).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "5");
        assert_eq!(claims.actor, actor);
        assert!(manager.validate_token("not-a-token").is_err());
    }
}
