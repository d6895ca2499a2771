// ABOUTME: Shared test utilities: cached RSA keys, in-memory registry, and a mock LMS server
// ABOUTME: The mock LMS is a real axum app on 127.0.0.1 so calls travel through reqwest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::too_many_lines,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `lti_advantage_server`

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex, MutexGuard, Once, OnceLock};

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{header::HOST, HeaderMap, StatusCode},
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lti_advantage_server::{
    crypto::{keys::RSA_KEY_SIZE, ToolKeyPair},
    lti::{EngineSettings, LtiEngine},
    models::{AgsEndpoint, LtiContext, NewPlatform, NrpsEndpoint, Platform, RosterMember, SessionClaims},
    platform_store::{PlatformStore, SqlitePlatformStore},
    rewrite::UrlRewriter,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::Level;

static INIT_LOGGER: Once = Once::new();
static TOOL_KEYS: OnceLock<ToolKeyPair> = OnceLock::new();
static PLATFORM_KEYS: OnceLock<ToolKeyPair> = OnceLock::new();

pub const CLIENT_ID: &str = "client-123";
pub const DEPLOYMENT_ID: &str = "deployment-1";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };
        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// The tool's key pair, generated once per test binary
pub fn tool_keys() -> ToolKeyPair {
    TOOL_KEYS
        .get_or_init(|| ToolKeyPair::generate_with_key_size(RSA_KEY_SIZE).unwrap())
        .clone()
}

/// The mock LMS signing key pair
pub fn platform_keys() -> ToolKeyPair {
    PLATFORM_KEYS
        .get_or_init(|| ToolKeyPair::generate_with_key_size(RSA_KEY_SIZE).unwrap())
        .clone()
}

/// Fresh in-memory platform registry
pub async fn create_test_store() -> Arc<SqlitePlatformStore> {
    init_test_logging();
    Arc::new(SqlitePlatformStore::connect("sqlite::memory:").await.unwrap())
}

/// Engine settings pointing the tool at `public_url`, with caching off
pub fn test_settings(public_url: &str) -> EngineSettings {
    EngineSettings {
        public_url: public_url.to_owned(),
        tool_url: public_url.to_owned(),
        http_timeout_secs: 5,
        http_connect_timeout_secs: 2,
        tool_name: "Test Tool".to_owned(),
        ..EngineSettings::default()
    }
}

/// Build an engine over `store`
pub fn create_engine(
    store: Arc<SqlitePlatformStore>,
    settings: EngineSettings,
    rewriter: UrlRewriter,
) -> LtiEngine {
    LtiEngine::new(settings, tool_keys(), store, rewriter).unwrap()
}

/// Serve `router` on an ephemeral port and return its base URL
pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Sign an id_token as the mock LMS would
pub fn sign_id_token(claims: &Value) -> String {
    let keys = platform_keys();
    keys.sign(claims, 300, Some(keys.kid())).unwrap()
}

/// Minimal valid LTI resource link claims for the platform
pub fn id_token_claims(platform: &Platform, nonce: &str) -> Value {
    json!({
        "iss": platform.issuer,
        "sub": "student-1",
        "aud": [platform.client_id],
        "nonce": nonce,
        "name": "Ada Lovelace",
        "email": "ada@example.edu",
        "https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
        "https://purl.imsglobal.org/spec/lti/claim/deployment_id": DEPLOYMENT_ID,
        "https://purl.imsglobal.org/spec/lti/claim/target_link_uri": "https://tool.example/api/lti/launch",
        "https://purl.imsglobal.org/spec/lti/claim/roles": [
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Learner"
        ],
        "https://purl.imsglobal.org/spec/lti/claim/context": {
            "id": "course-1",
            "label": "CS101",
            "title": "Intro to Computing",
            "type": ["http://purl.imsglobal.org/vocab/lis/v2/course#CourseOffering"]
        },
        "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint": {
            "scope": ["https://purl.imsglobal.org/spec/lti-ags/scope/score"],
            "lineitems": format!("{}/lineitems", platform.issuer)
        },
        "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice": {
            "context_memberships_url": format!("{}/memberships", platform.issuer),
            "service_versions": ["2.0"]
        }
    })
}

/// Session as a launch from the mock LMS would produce it, both services granted
pub fn session_for(platform: &Platform) -> SessionClaims {
    SessionClaims {
        sub: "instructor-1".to_owned(),
        name: "Grace Hopper".to_owned(),
        email: "grace@example.edu".to_owned(),
        roles: vec!["http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor".to_owned()],
        context: LtiContext {
            id: "course-1".to_owned(),
            title: "Intro to Computing".to_owned(),
            label: Some("CS101".to_owned()),
            context_type: Vec::new(),
        },
        issuer: platform.issuer.clone(),
        client_id: platform.client_id.clone(),
        deployment_id: platform.deployment_id.clone(),
        platform_id: platform.id.clone(),
        ags: Some(AgsEndpoint {
            lineitems: format!("{}/lineitems", platform.issuer),
            scope: Vec::new(),
        }),
        nrps: Some(NrpsEndpoint {
            context_memberships_url: format!("{}/memberships", platform.issuer),
            service_versions: vec!["2.0".to_owned()],
        }),
        iat: None,
        exp: None,
    }
}

/// A roster member with one role
pub fn roster_member(user_id: &str, role: &str, status: Option<&str>) -> RosterMember {
    RosterMember {
        user_id: user_id.to_owned(),
        name: Some(format!("User {user_id}")),
        given_name: None,
        family_name: None,
        email: Some(format!("{user_id}@example.edu")),
        roles: vec![role.to_owned()],
        status: status.map(str::to_owned),
    }
}

/// Everything the mock LMS records and every behaviour switch
#[derive(Debug, Default)]
pub struct MockState {
    pub base_url: String,
    pub host_headers: Vec<String>,
    pub jwks_requests: usize,
    pub token_requests: Vec<HashMap<String, String>>,
    pub reject_full_ags_scopes: bool,
    pub reject_token_requests: bool,
    pub line_items: Vec<Value>,
    pub reject_tag_filter: bool,
    pub wrap_line_items: bool,
    pub line_item_queries: Vec<HashMap<String, String>>,
    pub created_line_items: usize,
    pub scores: Vec<(String, Value)>,
    pub score_submissions: usize,
    pub roster_pages: Vec<Vec<RosterMember>>,
    pub roster_cycle: bool,
    pub roster_requests: Vec<HashMap<String, String>>,
    pub openid_config: Value,
    pub config_requests: usize,
    pub registration_status: u16,
    pub registration_body: String,
    pub registration_requests: Vec<(Option<String>, Value)>,
}

/// Handle to a running mock LMS
#[derive(Clone)]
pub struct MockLms {
    pub base_url: String,
    pub state: Arc<Mutex<MockState>>,
}

type Shared = Arc<Mutex<MockState>>;

impl MockLms {
    /// Start the mock LMS with default behaviour
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state: Shared = Arc::new(Mutex::new(MockState {
            base_url: base_url.clone(),
            openid_config: json!({
                "issuer": base_url,
                "authorization_endpoint": format!("{base_url}/auth"),
                "token_endpoint": format!("{base_url}/token"),
                "jwks_uri": format!("{base_url}/jwks"),
                "registration_endpoint": format!("{base_url}/register"),
            }),
            registration_status: 200,
            registration_body: json!({
                "client_id": CLIENT_ID,
                "https://purl.imsglobal.org/spec/lti-tool-configuration": {
                    "deployment_id": DEPLOYMENT_ID
                }
            })
            .to_string(),
            ..MockState::default()
        }));

        let router = Router::new()
            .route("/jwks", get(jwks))
            .route("/token", post(token))
            .route("/lineitems", get(list_line_items).post(create_line_item))
            .route("/lineitems/:id/scores", post(submit_score))
            .route("/lineitems/:id/results", get(list_results))
            .route("/memberships", get(memberships))
            .route("/.well-known/openid-configuration", get(openid_configuration))
            .route("/register", post(register))
            .layer(axum_middleware::from_fn_with_state(
                Arc::clone(&state),
                record_host,
            ))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { base_url, state }
    }

    /// Lock the recorded state
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Registration the tool would hold for this LMS
    pub fn new_platform(&self) -> NewPlatform {
        NewPlatform {
            issuer: self.base_url.clone(),
            client_id: CLIENT_ID.to_owned(),
            deployment_id: Some(DEPLOYMENT_ID.to_owned()),
            auth_login_url: format!("{}/auth", self.base_url),
            auth_token_url: format!("{}/token", self.base_url),
            keyset_url: format!("{}/jwks", self.base_url),
        }
    }

    /// Register this LMS in `store`
    pub async fn register_in(&self, store: &SqlitePlatformStore) -> Platform {
        store.upsert(self.new_platform()).await.unwrap()
    }

    /// Line items URL the launch would hand out
    pub fn lineitems_url(&self) -> String {
        format!("{}/lineitems", self.base_url)
    }
}

async fn record_host(State(state): State<Shared>, request: Request, next: Next) -> Response {
    if let Some(host) = request.headers().get(HOST).and_then(|h| h.to_str().ok()) {
        state.lock().unwrap().host_headers.push(host.to_owned());
    }
    next.run(request).await
}

async fn jwks(State(state): State<Shared>) -> Json<Value> {
    state.lock().unwrap().jwks_requests += 1;
    Json(serde_json::to_value(platform_keys().jwks()).unwrap())
}

async fn token(State(state): State<Shared>, body: Bytes) -> Response {
    let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body).unwrap();
    let mut state = state.lock().unwrap();
    let scope = form.get("scope").cloned().unwrap_or_default();
    state.token_requests.push(form);

    if state.reject_token_requests
        || (state.reject_full_ags_scopes && scope.contains("scope/lineitem"))
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_scope" })),
        )
            .into_response();
    }

    let n = state.token_requests.len();
    Json(json!({
        "access_token": format!("token-{n}"),
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": scope,
    }))
    .into_response()
}

async fn list_line_items(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.line_item_queries.push(query.clone());

    if query.contains_key("tag") && state.reject_tag_filter {
        return (StatusCode::BAD_REQUEST, "tag filter not supported").into_response();
    }

    let items: Vec<Value> = state
        .line_items
        .iter()
        .filter(|item| query.get("tag").is_none_or(|tag| item["tag"] == **tag))
        .cloned()
        .collect();

    if state.wrap_line_items {
        Json(json!({ "lineItems": items })).into_response()
    } else {
        Json(Value::Array(items)).into_response()
    }
}

async fn create_line_item(State(state): State<Shared>, body: Bytes) -> Json<Value> {
    let mut item: Value = serde_json::from_slice(&body).unwrap();
    let mut state = state.lock().unwrap();
    state.created_line_items += 1;
    let id = format!("{}/lineitems/{}", state.base_url, state.line_items.len() + 1);
    item["id"] = Value::String(id);
    state.line_items.push(item.clone());
    Json(item)
}

async fn submit_score(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != "application/vnd.ims.lis.v1.score+json" {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE;
    }
    let score: Value = serde_json::from_slice(&body).unwrap();
    let mut state = state.lock().unwrap();
    let line_item_id = format!("{}/lineitems/{id}", state.base_url);
    state.score_submissions += 1;
    // Upsert keyed by user, like an LMS gradebook
    state
        .scores
        .retain(|(item, s)| !(item == &line_item_id && s["userId"] == score["userId"]));
    state.scores.push((line_item_id, score));
    StatusCode::OK
}

async fn list_results(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    let state = state.lock().unwrap();
    let line_item_id = format!("{}/lineitems/{id}", state.base_url);
    let results: Vec<Value> = state
        .scores
        .iter()
        .filter(|(item, _)| item == &line_item_id)
        .map(|(_, s)| {
            json!({
                "userId": s["userId"],
                "resultScore": s["scoreGiven"],
                "resultMaximum": s["scoreMaximum"],
                "comment": s["comment"],
                "scoreOf": line_item_id,
            })
        })
        .collect();
    Json(json!({ "results": results }))
}

async fn memberships(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.roster_requests.push(query.clone());

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let members = state.roster_pages.get(page).cloned().unwrap_or_default();
    let body = Json(json!({
        "id": format!("{}/memberships", state.base_url),
        "members": members,
    }));

    let next = if page + 1 < state.roster_pages.len() {
        Some(page + 1)
    } else if state.roster_cycle && state.roster_pages.len() > 1 {
        Some(1)
    } else {
        None
    };

    match next {
        Some(next) => (
            [(
                "link",
                format!(
                    "<{}/memberships?page={next}>; rel=\"next\"",
                    state.base_url
                ),
            )],
            body,
        )
            .into_response(),
        None => body.into_response(),
    }
}

async fn openid_configuration(State(state): State<Shared>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.config_requests += 1;
    Json(state.openid_config.clone())
}

async fn register(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let document: Value = serde_json::from_slice(&body).unwrap();
    let mut state = state.lock().unwrap();
    state.registration_requests.push((auth, document));

    let status = StatusCode::from_u16(state.registration_status).unwrap();
    (
        status,
        [("content-type", "application/json")],
        state.registration_body.clone(),
    )
        .into_response()
}
