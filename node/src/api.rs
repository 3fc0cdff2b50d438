//! HTTP API for BALLOTBOX node

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ballotbox_core::{ApiConfig, BallotError, OptionId};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{AdminOnly, Authenticated};
use crate::runtime::NodeRuntime;
use crate::ws::observe_changes;

/// API state containing node runtime
pub type ApiState = Arc<NodeRuntime>;

/// Error body: `{"error": "ALREADY_VOTED", "message": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Failure of an API call
#[derive(Debug)]
pub enum ApiError {
    Ballot(BallotError),
    /// Path segment that is not an option id at all
    UnknownOption(String),
}

impl From<BallotError> for ApiError {
    fn from(err: BallotError) -> Self {
        ApiError::Ballot(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Ballot(BallotError::InvalidInput(rejection.body_text()))
    }
}

pub(crate) fn status_for(err: &BallotError) -> StatusCode {
    match err {
        BallotError::InvalidInput(_) | BallotError::AlreadyVoted { .. } => StatusCode::BAD_REQUEST,
        BallotError::OptionNotFound(_) | BallotError::VoterNotFound(_) => StatusCode::NOT_FOUND,
        BallotError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        BallotError::Forbidden(_) => StatusCode::FORBIDDEN,
        BallotError::TooManyObservers(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Ballot(err) => {
                let status = status_for(&err);
                let message = if err.is_internal() {
                    error!("Request failed: {}", err);
                    "An internal error occurred".to_string()
                } else {
                    err.to_string()
                };
                (status, err.code(), message)
            }
            ApiError::UnknownOption(raw) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Ballot option not found: {}", raw),
            ),
        };

        let body = ErrorResponse {
            error: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Create option request
#[derive(Debug, Deserialize)]
pub struct CreateOptionRequest {
    pub option: Option<String>,
}

/// Delete option response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: OptionId,
}

fn parse_option_id(raw: &str) -> ApiResult<OptionId> {
    raw.parse().map_err(|_| ApiError::UnknownOption(raw.to_string()))
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let api_config = state.config().api.clone();

    let router = Router::new()
        // Health
        .route("/health", get(health))
        .route("/status", get(status))
        // Ballot
        .route("/api/votes", get(list_options).post(add_option))
        .route("/api/vote/:id", post(cast_vote).delete(remove_option))
        // Voters
        .route("/api/me", get(me))
        .route("/api/audit", get(audit))
        // Live changes
        .route("/ws", get(observe_changes))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if api_config.enable_cors {
        router.layer(cors_layer(&api_config))
    } else {
        router
    }
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Node status
async fn status(State(runtime): State<ApiState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(runtime.status().await?))
}

/// List options with their creators
async fn list_options(State(runtime): State<ApiState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(runtime.list_options().await?))
}

/// Add an option
async fn add_option(
    State(runtime): State<ApiState>,
    AdminOnly(admin): AdminOnly,
    payload: Result<Json<CreateOptionRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let label = request
        .option
        .ok_or_else(|| BallotError::InvalidInput("option is required".into()))?;

    let option = runtime.add_option(&label, &admin).await?;
    Ok((StatusCode::CREATED, Json(option)))
}

/// Cast the caller's vote
async fn cast_vote(
    State(runtime): State<ApiState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_option_id(&id)?;
    let receipt = runtime.cast_vote(&caller.voter, &id).await?;
    Ok(Json(receipt))
}

/// Remove an option
async fn remove_option(
    State(runtime): State<ApiState>,
    _admin: AdminOnly,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_option_id(&id)?;
    runtime.remove_option(&id).await?;

    Ok(Json(DeleteResponse {
        message: "Option deleted".to_string(),
        id,
    }))
}

/// The caller's voter record
async fn me(caller: Authenticated) -> impl IntoResponse {
    Json(caller.voter)
}

/// Tally audit
async fn audit(
    State(runtime): State<ApiState>,
    _admin: AdminOnly,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(runtime.audit().await?))
}

/// Start API server
pub async fn start_api_server(runtime: Arc<NodeRuntime>, listen_addr: &str) -> anyhow::Result<()> {
    let router = create_router(runtime);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("API server listening on {}", listen_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ballotbox_core::{NodeConfig, Role, StorageBackend, DEV_JWT_SECRET};
    use chrono::Duration;
    use serde_json::Value;
    use tower::ServiceExt;

    fn runtime() -> ApiState {
        let mut config = NodeConfig::default();
        config.storage.backend = StorageBackend::Memory;
        Arc::new(NodeRuntime::new(config).unwrap())
    }

    fn token(voter: &str, role: Role) -> String {
        issue_token(DEV_JWT_SECRET, voter, role, Duration::hours(1)).unwrap()
    }

    async fn send(
        runtime: &ApiState,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = create_router(runtime.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let runtime = runtime();
        let (status, body) = send(&runtime, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_pizza_over_http() {
        let runtime = runtime();
        let admin = token("admin", Role::Admin);
        let u1 = token("u1", Role::Voter);
        let u2 = token("u2", Role::Voter);
        let mut events = runtime.subscribe(None).unwrap();

        let (status, created) = send(
            &runtime,
            Method::POST,
            "/api/votes",
            Some(&admin),
            Some(serde_json::json!({"option": "Pizza"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["tally"], 0);
        let uri = format!("/api/vote/{}", created["id"].as_str().unwrap());

        let (status, body) = send(&runtime, Method::POST, &uri, Some(&u1), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vote"]["tally"], 1);
        assert_eq!(body["user"]["votedFor"], created["id"]);

        let (status, _) = send(&runtime, Method::POST, &uri, Some(&u2), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&runtime, Method::POST, &uri, Some(&u1), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ALREADY_VOTED");

        let (status, listed) = send(&runtime, Method::GET, "/api/votes", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["tally"], 2);
        assert_eq!(listed[0]["creator"]["id"], "admin");

        let mut kinds = Vec::new();
        while let Some(Ok(frame)) = events.try_recv() {
            kinds.push(frame.event.kind());
        }
        assert_eq!(kinds, vec!["voteCreated", "voteUpdated", "voteUpdated"]);
    }

    #[tokio::test]
    async fn test_add_option_validation() {
        let runtime = runtime();
        let admin = token("admin", Role::Admin);

        for body in [serde_json::json!({}), serde_json::json!({"option": "   "})] {
            let (status, reply) =
                send(&runtime, Method::POST, "/api/votes", Some(&admin), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(reply["error"], "INVALID_INPUT");
        }

        let (status, _) = send(&runtime, Method::GET, "/api/votes", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin() {
        let runtime = runtime();
        let voter = token("u1", Role::Voter);
        let body = serde_json::json!({"option": "Pizza"});

        let (status, _) =
            send(&runtime, Method::POST, "/api/votes", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, reply) =
            send(&runtime, Method::POST, "/api/votes", Some(&voter), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(reply["error"], "FORBIDDEN");

        let uri = format!("/api/vote/{}", OptionId::generate());
        let (status, _) = send(&runtime, Method::DELETE, &uri, Some(&voter), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&runtime, Method::GET, "/api/audit", Some(&voter), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_vote_unknown_option() {
        let runtime = runtime();
        let voter = token("u1", Role::Voter);

        let uri = format!("/api/vote/{}", OptionId::generate());
        let (status, body) = send(&runtime, Method::POST, &uri, Some(&voter), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");

        let (status, _) =
            send(&runtime, Method::POST, "/api/vote/not-an-id", Some(&voter), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, me) = send(&runtime, Method::GET, "/api/me", Some(&voter), None).await;
        assert_eq!(me["votedFor"], Value::Null);
    }

    #[tokio::test]
    async fn test_delete_option() {
        let runtime = runtime();
        let admin = token("admin", Role::Admin);

        let (_, created) = send(
            &runtime,
            Method::POST,
            "/api/votes",
            Some(&admin),
            Some(serde_json::json!({"option": "Sushi"})),
        )
        .await;
        let uri = format!("/api/vote/{}", created["id"].as_str().unwrap());
        let mut events = runtime.subscribe(None).unwrap();

        let (status, body) = send(&runtime, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], created["id"]);
        assert!(body["message"].is_string());

        let frame = events.try_recv().unwrap().unwrap();
        let frame: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(frame["event"], "voteDeleted");
        assert_eq!(frame["data"], created["id"]);
        assert!(events.try_recv().is_none());

        let (status, listed) = send(&runtime, Method::GET, "/api/votes", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, serde_json::json!([]));

        let (status, _) = send(&runtime, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_me_and_audit() {
        let runtime = runtime();
        let admin = token("admin", Role::Admin);

        let (status, me) = send(&runtime, Method::GET, "/api/me", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], "admin");
        assert_eq!(me["role"], "admin");

        let (status, report) = send(&runtime, Method::GET, "/api/audit", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["consistent"], true);

        let (status, body) =
            send(&runtime, Method::GET, "/api/me", Some("not-a-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let response =
            ApiError::from(BallotError::StorageUnavailable("disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let partial = BallotError::PartialCommitFailure {
            voter: ballotbox_core::VoterId::new("v1"),
            option: OptionId::generate(),
            reason: "offline".into(),
        };
        assert_eq!(status_for(&partial), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_for(&BallotError::TooManyObservers(1)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
