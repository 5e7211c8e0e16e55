//! Distributed voting endpoints: configuration, assignments, ballots,
//! statistics, and results.

use crate::{error::ApiResult, extractors::ValidatedJson, responses::Created, state::AppState};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use peerrank_application::dto::{
    AssignmentBatchSummary, BallotSummary, FeasibilityPreview, VotingStatistics,
};
use peerrank_application::validation::{
    SubmitBallotRequest, UpdateConfigurationRequest, VotingConfigurationRequest,
};
use peerrank_domain::{Assignment, EventId, ParticipantId, VotingConfiguration, VotingResults};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Voting routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events/:event_id/voting-config",
            post(create_configuration)
                .get(get_configuration)
                .patch(update_configuration),
        )
        .route(
            "/events/:event_id/voting-config/preview",
            post(preview_configuration),
        )
        .route(
            "/events/:event_id/generate-assignments",
            post(generate_assignments),
        )
        .route(
            "/events/:event_id/participants/:participant_id/assignment",
            get(get_assignment),
        )
        .route(
            "/events/:event_id/participants/:participant_id/ranking-votes",
            post(submit_ballot),
        )
        .route("/events/:event_id/voting-statistics", get(statistics))
        .route("/events/:event_id/distributed-results", get(results))
}

/// Create voting configuration
#[utoipa::path(
    post,
    path = "/events/{event_id}/voting-config",
    tag = "voting",
    params(("event_id" = Uuid, Path, description = "Event id")),
    request_body = VotingConfigurationRequest,
    responses(
        (status = 201, description = "Configuration created"),
        (status = 403, description = "Only legal during registration"),
        (status = 409, description = "Configuration already exists"),
    )
)]
async fn create_configuration(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<VotingConfigurationRequest>,
) -> ApiResult<Created<VotingConfiguration>> {
    let config = state
        .voting
        .create_configuration(EventId::from(event_id), request)
        .await?;
    Ok(Created(config))
}

/// Get voting configuration
#[utoipa::path(
    get,
    path = "/events/{event_id}/voting-config",
    tag = "voting",
    params(("event_id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "The configuration"),
        (status = 404, description = "No configuration for this event"),
    )
)]
async fn get_configuration(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<VotingConfiguration>> {
    let config = state
        .voting
        .get_configuration(EventId::from(event_id))
        .await?;
    Ok(Json(config))
}

/// Update voting configuration
#[utoipa::path(
    patch,
    path = "/events/{event_id}/voting-config",
    tag = "voting",
    params(("event_id" = Uuid, Path, description = "Event id")),
    request_body = UpdateConfigurationRequest,
    responses(
        (status = 200, description = "Configuration updated"),
        (status = 403, description = "Only legal during registration"),
    )
)]
async fn update_configuration(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateConfigurationRequest>,
) -> ApiResult<Json<VotingConfiguration>> {
    let config = state
        .voting
        .update_configuration(EventId::from(event_id), request)
        .await?;
    Ok(Json(config))
}

/// Preview configuration feasibility against current counts
#[utoipa::path(
    post,
    path = "/events/{event_id}/voting-config/preview",
    tag = "voting",
    params(("event_id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Feasibility report"),
        (status = 404, description = "No configuration for this event"),
    )
)]
async fn preview_configuration(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<FeasibilityPreview>> {
    let preview = state
        .voting
        .preview_configuration(EventId::from(event_id))
        .await?;
    Ok(Json(preview))
}

/// Generate the assignment batch
#[utoipa::path(
    post,
    path = "/events/{event_id}/generate-assignments",
    tag = "voting",
    params(("event_id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 201, description = "Batch generated"),
        (status = 403, description = "Only legal during voting"),
        (status = 409, description = "Assignments already exist"),
        (status = 422, description = "Configuration infeasible"),
    )
)]
async fn generate_assignments(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Created<AssignmentBatchSummary>> {
    let summary = state
        .voting
        .generate_assignments(EventId::from(event_id), CancellationToken::new())
        .await?;
    Ok(Created(summary))
}

/// Read a participant's assignment
#[utoipa::path(
    get,
    path = "/events/{event_id}/participants/{participant_id}/assignment",
    tag = "voting",
    params(
        ("event_id" = Uuid, Path, description = "Event id"),
        ("participant_id" = Uuid, Path, description = "Participant id"),
    ),
    responses(
        (status = 200, description = "The assignment"),
        (status = 404, description = "No assignment for this participant"),
    )
)]
async fn get_assignment(
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state
        .voting
        .get_assignment(EventId::from(event_id), ParticipantId::from(participant_id))
        .await?;
    Ok(Json(assignment))
}

/// Submit a ranking ballot
#[utoipa::path(
    post,
    path = "/events/{event_id}/participants/{participant_id}/ranking-votes",
    tag = "voting",
    params(
        ("event_id" = Uuid, Path, description = "Event id"),
        ("participant_id" = Uuid, Path, description = "Voter id"),
    ),
    request_body = SubmitBallotRequest,
    responses(
        (status = 201, description = "Ballot recorded"),
        (status = 400, description = "Invalid ranking"),
        (status = 403, description = "Voting closed or voter not assigned"),
        (status = 409, description = "Already voted"),
    )
)]
async fn submit_ballot(
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(request): ValidatedJson<SubmitBallotRequest>,
) -> ApiResult<Created<BallotSummary>> {
    let summary = state
        .voting
        .submit_ballot(
            EventId::from(event_id),
            ParticipantId::from(participant_id),
            request,
        )
        .await?;
    Ok(Created(summary))
}

/// Participation statistics
#[utoipa::path(
    get,
    path = "/events/{event_id}/voting-statistics",
    tag = "voting",
    params(("event_id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Progress statistics"),
        (status = 403, description = "Voting has not started"),
    )
)]
async fn statistics(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<VotingStatistics>> {
    let stats = state.voting.statistics(EventId::from(event_id)).await?;
    Ok(Json(stats))
}

/// Compute and return the distributed results
#[utoipa::path(
    get,
    path = "/events/{event_id}/distributed-results",
    tag = "voting",
    params(("event_id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Global and adjusted rankings"),
        (status = 403, description = "Results are not yet available"),
    )
)]
async fn results(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<VotingResults>> {
    let results = state
        .voting
        .compute_results(EventId::from(event_id), CancellationToken::new())
        .await?;
    Ok(Json(results))
}
