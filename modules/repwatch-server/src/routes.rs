use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use repwatch_analysis::{
    CompletionOutcome, JobProvisioner, Pipeline, PipelineContext, PipelineStore, OVERALL_PLATFORM,
};
use repwatch_common::{scraping_job_id, PlatformId, RepwatchError};
use repwatch_store::{NewPost, NewThread};

#[derive(Clone)]
pub struct AppState {
    pub ctx: PipelineContext,
    pub pipeline: Arc<Pipeline>,
    pub provisioner: Arc<JobProvisioner>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/thread", post(create_thread))
        .route("/thread/{thread_id}", get(thread_lookup).put(update_thread))
        .route("/platforms", get(list_platforms))
        .route("/post", post(ingest_post))
        .route("/nlp-analysis/{thread_id}", get(nlp_analysis))
        .route("/analysis/{thread_id}", get(batch_analysis))
        .route("/post-analysis", post(post_analysis))
        .route("/playbook/{thread_id}", get(latest_playbook))
        .route("/sentiment/{thread_id}", get(sentiment_levels))
        .route("/sentiment/{thread_id}/history", get(sentiment_history))
        .route("/job", post(provision_jobs))
        .route("/job/{thread_id}/{platform_id}", get(job_lookup))
        .route("/jobs/{thread_id}", get(jobs_for_thread))
        .route(
            "/job/{thread_id}/{platform_id}/keywords",
            post(refresh_job_keywords),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    warn!(error = %e, "{context} failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": context })),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "service": "repwatch", "status": "ok" }))
}

async fn create_thread(
    State(state): State<AppState>,
    Json(thread): Json<NewThread>,
) -> impl IntoResponse {
    match state.ctx.store.insert_thread(thread).await {
        Ok(thread_id) => (StatusCode::CREATED, Json(json!({ "thread_id": thread_id }))),
        Err(e) => internal_error("thread creation", e),
    }
}

async fn thread_lookup(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> impl IntoResponse {
    match state.ctx.store.thread_by_id(thread_id).await {
        Ok(Some(thread)) => (StatusCode::OK, Json(json!(thread))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "thread not found" })),
        ),
        Err(e) => internal_error("thread lookup", e),
    }
}

async fn update_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Json(thread): Json<NewThread>,
) -> impl IntoResponse {
    match state.ctx.store.update_thread(thread_id, thread).await {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "thread not found" })),
        ),
        Ok(_) => (StatusCode::OK, Json(json!({ "thread_id": thread_id }))),
        Err(e) => internal_error("thread update", e),
    }
}

async fn list_platforms(State(state): State<AppState>) -> impl IntoResponse {
    match state.ctx.store.platforms().await {
        Ok(platforms) => (StatusCode::OK, Json(json!(platforms))),
        Err(e) => internal_error("platform listing", e),
    }
}

/// Ingestion callback: register one scraped post in `pending` state.
async fn ingest_post(
    State(state): State<AppState>,
    Json(post): Json<NewPost>,
) -> impl IntoResponse {
    match state.ctx.store.insert_post(post).await {
        Ok(post_id) => (StatusCode::CREATED, Json(json!({ "post_id": post_id }))),
        Err(e) => internal_error("post ingestion", e),
    }
}

/// Synchronous scoring pass over a thread's pending posts.
async fn nlp_analysis(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> impl IntoResponse {
    match state.pipeline.aggregator().score_pending(thread_id).await {
        Ok(pass) => (StatusCode::OK, Json(json!(pass))),
        Err(e) => internal_error("scoring pass", e),
    }
}

/// Submit the thread's pending posts as a batch classification job.
async fn batch_analysis(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> impl IntoResponse {
    match state.pipeline.aggregator().submit_batch(thread_id).await {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(json!({ "status": "submitted", "job": job.name, "state": job.state })),
        ),
        Ok(None) => (StatusCode::OK, Json(json!({ "status": "empty_run" }))),
        Err(e) => internal_error("batch submission", e),
    }
}

/// Storage finalize webhook for scored-result artifacts.
#[derive(Debug, Deserialize)]
pub struct StorageEvent {
    pub bucket: String,
    pub name: String,
}

async fn post_analysis(
    State(state): State<AppState>,
    Json(event): Json<StorageEvent>,
) -> impl IntoResponse {
    match state
        .pipeline
        .handle_storage_event(&event.bucket, &event.name)
        .await
    {
        Ok(CompletionOutcome::Duplicated) => {
            (StatusCode::OK, Json(json!({ "status": "duplicated" })))
        }
        Ok(CompletionOutcome::EmptyRun) => (StatusCode::OK, Json(json!({ "status": "empty_run" }))),
        Ok(CompletionOutcome::Done {
            updated,
            playbook_id,
        }) => (
            StatusCode::OK,
            Json(json!({ "status": "done", "updated": updated, "playbook_id": playbook_id })),
        ),
        Err(e) => internal_error("completion handling", e),
    }
}

async fn latest_playbook(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> impl IntoResponse {
    match state.ctx.store.latest_playbook(thread_id).await {
        Ok(Some(playbook)) => (StatusCode::OK, Json(json!(playbook))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no playbook for thread" })),
        ),
        Err(e) => internal_error("playbook lookup", e),
    }
}

/// Latest overall level plus the latest level per platform.
async fn sentiment_levels(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> impl IntoResponse {
    let overall = match state.ctx.store.latest_level(thread_id, OVERALL_PLATFORM).await {
        Ok(level) => level,
        Err(e) => return internal_error("sentiment lookup", e),
    };
    let platforms = match state.ctx.store.latest_by_platform(thread_id).await {
        Ok(rows) => rows,
        Err(e) => return internal_error("sentiment lookup", e),
    };
    let platforms: Vec<serde_json::Value> = platforms
        .into_iter()
        .filter(|(p, _)| p != OVERALL_PLATFORM)
        .map(|(platform_id, level)| json!({ "platform_id": platform_id, "level": level }))
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "thread_id": thread_id,
            "overall": overall,
            "platforms": platforms,
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct HistoryRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Level time series for a thread within a timestamp range, all platform
/// keys included (the `overall` rows carry `platform_id = "overall"`).
async fn sentiment_history(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Query(range): Query<HistoryRange>,
) -> impl IntoResponse {
    match state
        .ctx
        .store
        .levels_in_range(thread_id, range.start, range.end)
        .await
    {
        Ok(rows) => (StatusCode::OK, Json(json!(rows))),
        Err(e) => internal_error("sentiment history", e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    pub thread_id: i64,
    pub platform_ids: Vec<String>,
}

async fn provision_jobs(
    State(state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> impl IntoResponse {
    match state
        .provisioner
        .provision(request.thread_id, &request.platform_ids)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(json!(report))),
        Err(RepwatchError::Validation(message)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
        }
        Err(e) => internal_error("job provisioning", e),
    }
}

async fn job_lookup(
    State(state): State<AppState>,
    Path((thread_id, platform_id)): Path<(i64, String)>,
) -> impl IntoResponse {
    let platform: PlatformId = match platform_id.parse() {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))),
    };
    match state
        .ctx
        .store
        .job_by_id(&scraping_job_id(thread_id, platform))
        .await
    {
        Ok(Some(job)) => (StatusCode::OK, Json(json!(job))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "job not provisioned" })),
        ),
        Err(e) => internal_error("job lookup", e),
    }
}

async fn jobs_for_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> impl IntoResponse {
    match state.ctx.store.jobs_by_thread(thread_id).await {
        Ok(jobs) => (StatusCode::OK, Json(json!(jobs))),
        Err(e) => internal_error("job listing", e),
    }
}

/// Regenerate the keyword set of a provisioned job.
async fn refresh_job_keywords(
    State(state): State<AppState>,
    Path((thread_id, platform_id)): Path<(i64, String)>,
) -> impl IntoResponse {
    let platform: PlatformId = match platform_id.parse() {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))),
    };
    match state.provisioner.refresh_keywords(thread_id, platform).await {
        Ok(keywords) => (StatusCode::OK, Json(json!({ "keywords": keywords }))),
        Err(RepwatchError::Validation(message)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
        }
        Err(e) => internal_error("keyword refresh", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use repwatch_analysis::testing::{test_context, MockPipelineStore};
    use repwatch_analysis::KeywordBuilder;

    fn test_state(store: Arc<MockPipelineStore>) -> AppState {
        let ctx = test_context(store);
        let pipeline = Arc::new(Pipeline::new(ctx.clone()));
        let provisioner = Arc::new(JobProvisioner::new(
            ctx.store.clone(),
            KeywordBuilder::new(ctx.generator.clone()),
            ctx.scheduler.clone(),
            ctx.service_base_url.clone(),
        ));
        AppState {
            ctx,
            pipeline,
            provisioner,
        }
    }

    async fn get_json(
        app: Router,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_service_identity() {
        let app = build_router(test_state(Arc::new(MockPipelineStore::new())));
        let (status, body) = get_json(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "repwatch");
    }

    #[tokio::test]
    async fn created_thread_is_readable_back() {
        let state = test_state(Arc::new(MockPipelineStore::new()));
        let app = build_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/thread")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "display_name": "Launch",
                    "thread_type": "brand",
                    "context": "product launch chatter",
                    "instructions": "",
                    "platform_ids": ["twitter"],
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let thread_id = body["thread_id"].as_i64().unwrap();

        let (status, body) = get_json(app, &format!("/thread/{thread_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display_name"], "Launch");
        assert_eq!(body["platform_ids"][0], "twitter");
    }

    #[tokio::test]
    async fn ingested_post_lands_in_pending_state() {
        let store = Arc::new(MockPipelineStore::new().with_thread(
            7,
            "Launch",
            "brand",
            "ctx",
            &["twitter"],
        ));
        let app = build_router(test_state(store.clone()));
        let request = Request::builder()
            .method("POST")
            .uri("/post")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "post_id": "tw-abc",
                    "thread_id": 7,
                    "platform_id": "twitter",
                    "content": "loving the new release",
                    "content_type": "text",
                    "scraped_at": "2026-08-27T10:00:00Z",
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.post_status("tw-abc").as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn updating_unknown_thread_is_not_found() {
        let app = build_router(test_state(Arc::new(MockPipelineStore::new())));
        let request = Request::builder()
            .method("PUT")
            .uri("/thread/99")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "display_name": "x",
                    "thread_type": "brand",
                    "context": "y",
                    "instructions": "",
                    "platform_ids": [],
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn platform_listing_never_exposes_secrets() {
        let app = build_router(test_state(Arc::new(MockPipelineStore::new())));
        let (status, body) = get_json(app, "/platforms").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|p| p.get("secret").is_none()));
    }

    #[tokio::test]
    async fn history_route_returns_rows_in_range() {
        let store = Arc::new(MockPipelineStore::new());
        store.insert_level(7, "twitter", 55.0).await.unwrap();
        store.insert_level(7, OVERALL_PLATFORM, 60.0).await.unwrap();
        let app = build_router(test_state(store));

        let (status, body) = get_json(
            app,
            "/sentiment/7/history?start=2020-01-01T00:00:00Z&end=2099-01-01T00:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["sentiment_level"], 55.0);
    }

    #[tokio::test]
    async fn keyword_refresh_without_a_job_is_not_found() {
        let store = Arc::new(MockPipelineStore::new().with_thread(
            7,
            "Launch",
            "brand",
            "ctx",
            &["twitter"],
        ));
        let app = build_router(test_state(store));
        let request = Request::builder()
            .method("POST")
            .uri("/job/7/twitter/keywords")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sentiment_route_reports_overall_and_platforms() {
        let store = Arc::new(MockPipelineStore::new());
        store.insert_level(7, "twitter", 55.0).await.unwrap();
        store.insert_level(7, OVERALL_PLATFORM, 60.0).await.unwrap();
        let app = build_router(test_state(store));

        let (status, body) = get_json(app, "/sentiment/7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall"], 60.0);
        assert_eq!(body["platforms"][0]["platform_id"], "twitter");
        assert_eq!(body["platforms"][0]["level"], 55.0);
    }

    #[tokio::test]
    async fn missing_playbook_is_not_found() {
        let app = build_router(test_state(Arc::new(MockPipelineStore::new())));
        let (status, _) = get_json(app, "/playbook/7").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn job_lookup_rejects_unknown_platform() {
        let app = build_router(test_state(Arc::new(MockPipelineStore::new())));
        let (status, _) = get_json(app, "/job/7/myspace").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn job_lookup_finds_provisioned_job() {
        let store = Arc::new(MockPipelineStore::new().with_job(
            "scraping-job-7-twitter",
            7,
            "twitter",
            &["acme"],
        ));
        let app = build_router(test_state(store));
        let (status, body) = get_json(app, "/job/7/twitter").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job_id"], "scraping-job-7-twitter");
    }

    #[tokio::test]
    async fn webhook_reports_duplicate_deliveries() {
        let store = Arc::new(MockPipelineStore::new());
        let state = test_state(store.clone());
        store
            .mark_blob_if_absent("processed/run.jsonl", "ops-test")
            .await
            .unwrap();
        let app = build_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/post-analysis")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "bucket": "test-bucket", "name": "processed/run.jsonl" }).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "duplicated");
    }

    #[tokio::test]
    async fn provisioning_unknown_thread_is_not_found() {
        let app = build_router(test_state(Arc::new(MockPipelineStore::new())));
        let request = Request::builder()
            .method("POST")
            .uri("/job")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "thread_id": 99, "platform_ids": ["twitter"] }).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
