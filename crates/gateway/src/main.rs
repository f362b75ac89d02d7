//! EBMS Review Gateway
//!
//! HTTP entry point for the article review core.
//! Handles:
//! - Bearer-token authentication into a resolved actor scope
//! - Request routing to the state machine, queue and packet services
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    extract::FromRef,
    routing::{get, post, put},
    Router,
};
use ebms_common::{
    activity::{ActivityNotifier, SqsNotifier, TracingNotifier},
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::{apply_schema, DbPool, SeaOrmStore},
    errors::AppError,
    metrics::{self, COMMIT_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    reference::StaticReferenceData,
    MemoryStore, ReviewContext, ReviewServices, ReviewStore,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Absent when running on the in-memory store
    pub db: Option<DbPool>,
    pub services: ReviewServices,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);
    info!("Starting EBMS review gateway v{}", ebms_common::VERSION);

    init_metrics(&config.observability)?;

    let (store, db) = build_store(&config).await?;
    let state = build_state(config.clone(), store, db).await?;

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(config: &ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    metrics::register_metrics();
    if config.metrics_port == 0 {
        info!("Prometheus exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_queue_commit_duration_seconds", METRICS_PREFIX)),
            COMMIT_BUCKETS,
        )?
        .install()?;

    info!(port = config.metrics_port, "Prometheus exporter listening");
    Ok(())
}

/// Postgres unless the database url selects the in-memory store
async fn build_store(
    config: &AppConfig,
) -> Result<(Arc<dyn ReviewStore>, Option<DbPool>), AppError> {
    if config.database.url.starts_with("memory:") {
        warn!("Using the in-memory store; review state is lost on shutdown");
        return Ok((Arc::new(MemoryStore::new()), None));
    }

    let db = DbPool::new(&config.database).await?;
    if config.database.apply_schema {
        apply_schema(db.write()).await?;
    }
    Ok((Arc::new(SeaOrmStore::new(db.clone())), Some(db)))
}

async fn build_state(
    config: Arc<AppConfig>,
    store: Arc<dyn ReviewStore>,
    db: Option<DbPool>,
) -> Result<AppState, AppError> {
    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret is required".to_string(),
        })?;
    let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));

    let activity: Arc<dyn ActivityNotifier> = match config.activity.queue_url.as_deref() {
        Some(url) => Arc::new(
            SqsNotifier::new(url, Duration::from_secs(config.activity.max_retry_secs)).await,
        ),
        None => Arc::new(TracingNotifier),
    };

    let reference =
        StaticReferenceData::load(store.as_ref(), &config.review.reference_boards).await?;

    let context = ReviewContext::new(store)
        .with_activity(activity)
        .with_reference(Arc::new(reference))
        .with_config(config.review.clone());

    Ok(AppState {
        config,
        db,
        services: ReviewServices::new(context),
        jwt,
    })
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Article-topic states
        .route(
            "/articles/{article}/topics",
            post(handlers::states::assign_topic),
        )
        .route(
            "/articles/{article}/topics/{topic}/state",
            get(handlers::states::current_state),
        )
        .route(
            "/articles/{article}/topics/{topic}/history",
            get(handlers::states::history),
        )
        .route(
            "/articles/{article}/topics/{topic}/decisions",
            post(handlers::states::apply_decision),
        )
        .route(
            "/articles/{article}/topics/{topic}/agenda",
            post(handlers::states::place_on_agenda),
        )
        .route(
            "/articles/{article}/topics/{topic}/board-decision",
            post(handlers::states::record_board_decision),
        )
        .route("/states/count", get(handlers::states::count))
        // Review queues
        .route("/queues", post(handlers::queues::open_queue))
        .route("/queues/{id}", get(handlers::queues::get_queue))
        .route("/queues/{id}/page", get(handlers::queues::page))
        .route(
            "/queues/{id}/decisions",
            get(handlers::queues::list_staged)
                .put(handlers::queues::stage_decision)
                .delete(handlers::queues::unstage_decision),
        )
        .route("/queues/{id}/commit", post(handlers::queues::commit))
        .route("/queues/{id}/reset", post(handlers::queues::reset))
        .route("/queues/{id}/display", put(handlers::queues::set_display))
        .route(
            "/boards/{board}/topic-counts",
            get(handlers::queues::topic_counts),
        )
        // Packets and reviews
        .route(
            "/topics/{topic}/packet-candidates",
            get(handlers::packets::candidates),
        )
        .route("/packets", post(handlers::packets::create_packet))
        .route(
            "/packets/{id}/rejection-candidates",
            get(handlers::packets::rejection_candidates),
        )
        .route(
            "/packets/{id}/unanswered",
            get(handlers::packets::articles_without_responses),
        )
        .route(
            "/packets/{id}/articles/{article}/status",
            get(handlers::packets::response_status),
        )
        .route(
            "/packets/{id}/articles/{article}/dispositions",
            get(handlers::packets::disposition_summary),
        )
        .route(
            "/packets/{id}/articles/{article}/reviews",
            post(handlers::packets::submit_review),
        )
        .route(
            "/packets/{id}/articles/{article}/quick-reject",
            post(handlers::packets::quick_reject),
        )
        .route(
            "/packets/{id}/articles/{article}/drop",
            post(handlers::packets::drop_article),
        )
        .route(
            "/packets/{id}/articles/{article}/restore",
            post(handlers::packets::restore_article),
        );

    let timeout = state.config.request_timeout();
    let max_concurrent = state.config.server.max_concurrent_requests;

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .route_layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(TimeoutLayer::new(timeout))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use ebms_common::auth::Actor;
    use ebms_common::domain::{
        Article, ArticleId, Board, BoardId, QueueType, StateValue, Topic, TopicId, UserId,
    };
    use ebms_common::review::{InitialState, TopicAssignment};
    use ebms_common::store::CatalogStore;
    use tower::ServiceExt;

    async fn test_app() -> (Router, Arc<JwtManager>, ReviewServices) {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some("test-secret".to_string());

        let store = Arc::new(MemoryStore::new());
        store
            .save_board(Board {
                id: BoardId(1),
                name: "Adult Treatment".into(),
                manager: None,
            })
            .await
            .unwrap();
        store
            .save_topic(Topic {
                id: TopicId(10),
                board_id: BoardId(1),
                name: "Breast Cancer".into(),
                nci_reviewer: None,
            })
            .await
            .unwrap();
        store
            .save_article(Article {
                id: ArticleId(1),
                source_id: "35000001".into(),
                title: "Outcomes study".into(),
                authors: vec!["Smith J".into()],
                journal_title: "The Lancet. Oncology".into(),
                brief_journal_title: "Lancet Oncol".into(),
                source_journal_id: "100957246".into(),
                core_journal: true,
                year: Some(2021),
                full_text: None,
                tags: Vec::new(),
                imported: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let state = build_state(Arc::new(config), store, None).await.unwrap();
        let jwt = state.jwt.clone();
        let services = state.services.clone();
        (create_router(state), jwt, services)
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let (app, _, _) = test_app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let (app, _, _) = test_app().await;
        let response = app
            .oneshot(
                Request::get("/v1/articles/1/topics/10/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_decision_endpoint_applies_transition() {
        let (app, jwt, services) = test_app().await;
        let mut admin = Actor::new(UserId(1));
        admin.permissions = vec![ebms_common::auth::ADMIN_PERMISSION.to_string()];
        tokio_test::assert_ok!(
            services
                .machine
                .assign_topic(
                    TopicAssignment {
                        article_id: ArticleId(1),
                        topic_id: TopicId(10),
                        cycle: None,
                        initial: InitialState::ReadyInitReview,
                        comment: None,
                    },
                    &admin,
                )
                .await
        );

        let mut librarian = Actor::new(UserId(3));
        librarian.permissions = vec![QueueType::LibrarianReview.permission().to_string()];
        let token = jwt.generate_token(&librarian).unwrap();

        let body = serde_json::json!({"queue_type": "librarian_review", "decision": 2});
        let response = app
            .oneshot(
                Request::post("/v1/articles/1/topics/10/decisions")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let record: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(record["value"], StateValue::RejectInitReview.text_id());
    }
}
