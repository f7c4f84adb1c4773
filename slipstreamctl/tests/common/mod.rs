//! Mock SlipStream server for integration tests
//!
//! Serves XML fixtures behind a cookie login, records run requests and
//! answers module publication requests with the status codes the real server
//! uses for conflicts, missing modules and missing rights.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";
pub const SESSION_COOKIE: &str = "com.sixsq.slipstream.cookie";
pub const SESSION_TOKEN: &str = "token-3f1c";
pub const RUN_ID: &str = "0b5f8a3e-7d1c-4f9a-9e2b-6c4d2a1f0e37";

pub const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<list>
  <item resourceUri="module/examples/tutorials/wordpress/wordpress/478" name="wordpress"
        category="Deployment" version="478" published="true"/>
  <item resourceUri="module/examples/images/ubuntu-12.04/480" name="ubuntu-12.04"
        category="Image" version="480" published="true"/>
  <item resourceUri="module/examples/images/centos-6/479" name="centos-6"
        category="Image" version="479"/>
</list>"#;

pub const RUNS: &str = r#"<runs>
  <item uuid="3fd93072-fcef-4c03-bdec-0cb2b19699e2"
        moduleResourceUri="module/examples/tutorials/wordpress/wordpress/478"
        status="Running" startTime="2014-06-13 12:09:47.202 UTC"
        cloudServiceNames="exoscale-ch-gva"/>
</runs>"#;

pub const VMS: &str = r#"<vms>
  <vm instanceId="aaa-bbb-111" cloud="exoscale-ch-gva" state="Running"
      runUuid="3fd93072-fcef-4c03-bdec-0cb2b19699e2"/>
  <vm instanceId="ccc-ddd-222" cloud="ec2-eu-west" state="Terminated"/>
</vms>"#;

pub const DASHBOARD: &str = r#"<dashboard>
  <usage>
    <usageElement cloud="exoscale-ch-gva" quota="20" currentUsage="3" userVmUsage="4"/>
    <usageElement cloud="ec2-eu-west" quota="10" currentUsage="0"/>
  </usage>
</dashboard>"#;

const MODULE_ROOT: &str = r#"<list>
  <item resourceUri="module/A/1" name="A" category="Project" version="1"/>
  <item resourceUri="module/B/2" name="B" category="Image" version="2"/>
</list>"#;

/// Children of A, addressed through the parent's attributes only.
const MODULE_A: &str = r#"<projectModule shortName="A" parentUri="module/" category="Project" version="1">
  <children>
    <item name="A1" category="Image" version="7"/>
  </children>
</projectModule>"#;

const MODULE_SECRET: &str = r#"<list>
  <item resourceUri="module/secret/S1/4" name="S1" category="Project" version="4"/>
  <item resourceUri="module/secret/S2/5" name="S2" category="Deployment" version="5"/>
</list>"#;

const MODULE_BROKEN: &str = r#"<list>
  <item resourceUri="module/broken/X/6" name="X" category="Project" version="6"/>
  <item resourceUri="module/broken/Y/7" name="Y" category="Image" version="7"/>
</list>"#;

const CENTOS: &str = r#"<imageModule shortName="centos-6" parentUri="module/examples/images"
    category="Image" version="479"/>"#;

/// Requests recorded by the mock server
#[derive(Debug, Clone, Default)]
pub struct MockState {
    /// Form bodies of `POST /run`, in arrival order
    pub run_forms: Arc<Mutex<Vec<Vec<(String, String)>>>>,
    /// `activeOnly` query values of `GET /run`
    pub run_queries: Arc<Mutex<Vec<Option<String>>>>,
    /// Number of `GET /logout` calls
    pub logouts: Arc<Mutex<usize>>,
}

impl MockState {
    pub fn run_forms(&self) -> Vec<Vec<(String, String)>> {
        self.run_forms.lock().unwrap().clone()
    }

    pub fn last_run_form(&self) -> Vec<(String, String)> {
        self.run_forms().pop().expect("no run request recorded")
    }

    pub fn run_queries(&self) -> Vec<Option<String>> {
        self.run_queries.lock().unwrap().clone()
    }

    pub fn logouts(&self) -> usize {
        *self.logouts.lock().unwrap()
    }
}

/// Handle on a running mock server
#[derive(Debug, Clone)]
pub struct MockServer {
    pub state: MockState,
    pub url: String,
}

impl MockServer {
    /// Start the mock server on an ephemeral port
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Mock server error: {}", e);
            }
        });

        Self {
            state,
            url: format!("http://127.0.0.1:{}", port),
        }
    }
}

fn router(state: MockState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/login", post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/run", get(runs_handler).post(create_run_handler))
        .route("/run/:id", delete(terminate_handler))
        .route("/vms", get(vms_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/module", get(module_root_handler))
        .route(
            "/module/*path",
            get(module_handler)
                .put(module_put_handler)
                .delete(module_delete_handler),
        )
        .with_state(state)
}

fn logged_in(headers: &HeaderMap) -> bool {
    let expected = format!("{}={}", SESSION_COOKIE, SESSION_TOKEN);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split("; "))
        .any(|c| c == expected)
}

fn xml(body: &'static str) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

macro_rules! require_login {
    ($headers:expr) => {
        if !logged_in(&$headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
}

async fn login_handler(Form(form): Form<HashMap<String, String>>) -> Response {
    let accepted = form.get("username").map(String::as_str) == Some(USERNAME)
        && form.get("password").map(String::as_str) == Some(PASSWORD);

    if !accepted {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let cookie = format!("{}={}; Path=/", SESSION_COOKIE, SESSION_TOKEN);
    ([(header::SET_COOKIE, cookie)], "").into_response()
}

async fn logout_handler(State(state): State<MockState>) -> Response {
    *state.logouts.lock().unwrap() += 1;
    let cookie = format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE);
    ([(header::SET_COOKIE, cookie)], "").into_response()
}

async fn index_handler(headers: HeaderMap) -> Response {
    require_login!(headers);
    xml(INDEX)
}

async fn runs_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    require_login!(headers);
    state
        .run_queries
        .lock()
        .unwrap()
        .push(query.get("activeOnly").cloned());
    xml(RUNS)
}

async fn create_run_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Form(form): Form<Vec<(String, String)>>,
) -> Response {
    require_login!(headers);
    state.run_forms.lock().unwrap().push(form);

    let location = format!("/run/{}", RUN_ID);
    (StatusCode::CREATED, [(header::LOCATION, location)], "").into_response()
}

async fn terminate_handler(headers: HeaderMap, Path(id): Path<String>) -> Response {
    require_login!(headers);
    if id == RUN_ID {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::CONFLICT, "run is not in a terminable state").into_response()
    }
}

async fn vms_handler(headers: HeaderMap) -> Response {
    require_login!(headers);
    xml(VMS)
}

async fn dashboard_handler(headers: HeaderMap) -> Response {
    require_login!(headers);
    xml(DASHBOARD)
}

async fn module_root_handler(headers: HeaderMap) -> Response {
    require_login!(headers);
    xml(MODULE_ROOT)
}

async fn module_handler(headers: HeaderMap, Path(path): Path<String>) -> Response {
    require_login!(headers);
    match path.trim_start_matches('/') {
        "A/1" => xml(MODULE_A),
        "secret" => xml(MODULE_SECRET),
        "broken" => xml(MODULE_BROKEN),
        "examples/images/centos-6" => xml(CENTOS),
        "denied" | "secret/S1/4" => StatusCode::FORBIDDEN.into_response(),
        "broken/X/6" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn module_put_handler(headers: HeaderMap, Path(path): Path<String>) -> Response {
    require_login!(headers);
    match path.trim_start_matches('/') {
        "examples/images/centos-6/479/publish" => StatusCode::OK.into_response(),
        "examples/published/1/publish" => StatusCode::CONFLICT.into_response(),
        "restricted/1/publish" => StatusCode::FORBIDDEN.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn module_delete_handler(headers: HeaderMap, Path(path): Path<String>) -> Response {
    require_login!(headers);
    match path.trim_start_matches('/') {
        "examples/images/centos-6/479/publish" => StatusCode::OK.into_response(),
        "examples/unpublished/1/publish" => StatusCode::CONFLICT.into_response(),
        "examples/images/centos-6" | "examples/images/centos-6/479" => {
            StatusCode::OK.into_response()
        }
        "restricted" => StatusCode::FORBIDDEN.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
