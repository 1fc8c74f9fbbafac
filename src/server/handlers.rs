use std::convert::Infallible;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::estimation::{EstimationOverrides, EstimationParams};
use crate::github::{parse_issue_link, parse_repo_link};
use crate::models::EstimationResult;
use crate::server::error::ApiError;
use crate::server::rate_limit::client_key;
use crate::server::AppState;
use crate::stream::{progress_channel, ProgressEvent, DEFAULT_CAPACITY};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoEstimateRequest {
    pub repo_link: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub overrides: EstimationOverrides,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueEstimateRequest {
    pub issue_link: String,
    #[serde(flatten)]
    pub overrides: EstimationOverrides,
}

/// POST /estimate-repo-issues
pub async fn estimate_repo_issues(
    State(state): State<AppState>,
    Json(request): Json<RepoEstimateRequest>,
) -> Result<Response, ApiError> {
    let repo = parse_repo_link(&request.repo_link)?;
    let params = EstimationParams::resolve(&state.defaults, &request.overrides)?;

    tracing::info!(
        "Repository estimate requested for {} (stream={})",
        repo,
        request.stream
    );

    if !request.stream {
        let estimate = state
            .pipeline
            .estimate_repository(&repo, &params, &crate::estimation::NoopSink)
            .await?;
        return Ok(Json(estimate).into_response());
    }

    let (sender, progress) = progress_channel(DEFAULT_CAPACITY);
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let outcome = pipeline.estimate_repository(&repo, &params, &sender).await;
        sender.finish(outcome).await;
    });

    let events = progress.into_stream().map(|event| Ok::<_, Infallible>(to_sse(&event)));
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn to_sse(event: &ProgressEvent) -> Event {
    let event_name = event.name();
    Event::default()
        .event(event_name)
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to serialize {} event: {}", event_name, e);
            Event::default()
                .event("error")
                .data(r#"{"type":"error","message":"Failed to serialize event"}"#)
        })
}

/// POST /estimate-issue
pub async fn estimate_issue(
    State(state): State<AppState>,
    Json(request): Json<IssueEstimateRequest>,
) -> Result<Json<EstimationResult>, ApiError> {
    let (repo, issue_number) = parse_issue_link(&request.issue_link)?;
    let params = EstimationParams::resolve(&state.defaults, &request.overrides)?;

    let result = state
        .pipeline
        .estimate_issue(&repo, issue_number, &params)
        .await?;
    Ok(Json(result))
}

/// GET /health
///
/// Reports the caller's remaining quota without spending any of it.
pub async fn health(State(state): State<AppState>, request: Request) -> impl IntoResponse {
    let quota = state.limiter.snapshot(&client_key(&request), Utc::now());
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "groupSize": state.pipeline.group_size(),
            "trackedClients": state.limiter.tracked_clients(),
            "rateLimit": {
                "dailyRemaining": quota.daily_remaining,
                "shortTermRemaining": quota.short_term_remaining,
            },
        })),
    )
}
