//! Shared harness: a stub job service served by axum on an ephemeral port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mmm_client::{Endpoint, HttpJobService, StaticTokenProvider};

pub const TOKEN: &str = "test-token";

/// One request the stub received.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Canned behavior shared by every route.
#[derive(Clone, Default)]
pub struct StubState {
    pub hits: Arc<Mutex<Vec<Hit>>>,
    /// Force every route to answer with this status and body.
    pub fail_with: Option<(u16, String)>,
    /// Delay before answering.
    pub delay: Option<Duration>,
    /// Return analytics bodies as JSON strings wrapping the payload.
    pub string_wrapped: bool,
    /// Answer 200 with a body that is not JSON.
    pub malformed: bool,
}

impl StubState {
    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    fn record(&self, hit: Hit) {
        self.hits.lock().unwrap().push(hit);
    }

    async fn answer(&self, body: serde_json::Value) -> Response {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((status, text)) = &self.fail_with {
            return (StatusCode::from_u16(*status).unwrap(), text.clone()).into_response();
        }
        if self.malformed {
            return (StatusCode::OK, "<html>maintenance</html>").into_response();
        }
        if self.string_wrapped {
            return Json(serde_json::Value::String(body.to_string())).into_response();
        }
        Json(body).into_response()
    }
}

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn completed_job(job_id: &str) -> serde_json::Value {
    serde_json::json!({
        "job_id": job_id,
        "job_name": "weekly model",
        "req_media_table": "media_weekly",
        "req_kpi_table": "kpi_sales",
        "req_cost_table": "cost_weekly",
        "req_feature_table": "feature_macro",
        "req_number_warmup": "1000",
        "req_number_samples": "1000",
        "req_number_chains": "2",
        "req_compute_type": "CPU",
        "req_compute_cores": "16",
        "job_status": "completed",
        "batch_job_id": "b-1",
        "execution_time": "812"
    })
}

async fn list_jobs(State(state): State<StubState>, headers: HeaderMap) -> Response {
    state.record(Hit {
        method: "GET".into(),
        path: "/frontend/jobs".into(),
        query: HashMap::new(),
        authorization: auth_header(&headers),
        body: None,
    });
    state
        .answer(serde_json::json!({ "items": [completed_job("job-1")], "next_key": null }))
        .await
}

async fn put_job(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.record(Hit {
        method: "PUT".into(),
        path: "/frontend/jobs".into(),
        query: HashMap::new(),
        authorization: auth_header(&headers),
        body: Some(body),
    });
    state.answer(serde_json::json!({ "job": "{}" })).await
}

async fn list_tables(State(state): State<StubState>, headers: HeaderMap) -> Response {
    state.record(Hit {
        method: "GET".into(),
        path: "/frontend/tables".into(),
        query: HashMap::new(),
        authorization: auth_header(&headers),
        body: None,
    });
    state
        .answer(serde_json::json!(["kpi_sales", "cost_weekly", "feature_macro", "media_weekly"]))
        .await
}

async fn graph(
    State(state): State<StubState>,
    Path(job_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let graph_type = query.get("graph_type").cloned().unwrap_or_default();
    state.record(Hit {
        method: "GET".into(),
        path: format!("/frontend/jobs/{job_id}/graph"),
        query,
        authorization: auth_header(&headers),
        body: None,
    });
    let body = match graph_type.as_str() {
        "media_baseline_contribution_area_plot" => serde_json::json!([
            {"id": "baseline", "data": [{"x": "period_0", "y": 10.0}]},
            {"id": "tv", "data": [{"x": "period_0", "y": 2.5}]}
        ]),
        "bars_media_metrics" => serde_json::json!([
            {"x": "tv", "y": 0.4, "errorX": 0, "errorY": 0.05}
        ]),
        _ => serde_json::json!([]),
    };
    state.answer(body).await
}

async fn budget(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record(Hit {
        method: "GET".into(),
        path: "/backend/budget".into(),
        query,
        authorization: auth_header(&headers),
        body: None,
    });
    state
        .answer(serde_json::json!({
            "graph1": [
                {"id": "optimal_budget_allocation", "data": [{"x": "tv", "y": 600.0, "y1_label": 0.6}]},
                {"id": "previous_budget_allocation", "data": [{"x": "tv", "y": 500.0, "y1_label": 0.5}]}
            ],
            "graph2": {"data": [
                {"x": "Pre optimization \n predicted target", "y": 1000},
                {"x": "Post optimization \n predicted target", "y": 1200}
            ]}
        }))
        .await
}

/// Serve the stub and return its base URL.
pub async fn spawn_stub(state: StubState) -> String {
    let app = Router::new()
        .route("/frontend/jobs", get(list_jobs).put(put_job))
        .route("/frontend/tables", get(list_tables))
        .route("/frontend/jobs/{job_id}/graph", get(graph))
        .route("/backend/budget", get(budget))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A transport pointed at `base_url` holding [`TOKEN`].
pub fn service(base_url: &str, timeout: Duration) -> HttpJobService {
    HttpJobService::new(
        Endpoint::parse(base_url).unwrap(),
        Arc::new(StaticTokenProvider::new(Some(TOKEN.to_string()))),
        timeout,
    )
}
