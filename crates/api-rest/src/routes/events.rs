//! Event lifecycle endpoints: events, registration, stage transitions, and
//! proposal metadata.

use crate::{
    error::ApiResult,
    extractors::ValidatedJson,
    responses::{Created, NoContent},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use peerrank_application::dto::StageTransitionOutcome;
use peerrank_application::validation::{
    CreateEventRequest, RegisterParticipantRequest, SubmitProposalRequest, TransitionStageRequest,
};
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::{Event, EventId, Participant, ParticipantId, Proposal, ProposalId};
use uuid::Uuid;

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/:event_id", get(get_event))
        .route("/events/:event_id/stage", patch(transition_stage))
        .route("/events/:event_id/register", post(register_participant))
        .route("/events/:event_id/participants", get(list_participants))
        .route(
            "/events/:event_id/participants/:participant_id/proposal",
            post(submit_proposal),
        )
        .route("/events/:event_id/proposals", get(list_proposals))
        .route(
            "/events/:event_id/proposals/:proposal_id",
            axum::routing::delete(delete_proposal),
        )
}

/// Create event
#[utoipa::path(
    post,
    path = "/events",
    tag = "events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created"),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Author not found"),
    )
)]
async fn create_event(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateEventRequest>,
) -> ApiResult<Created<Event>> {
    let event = state.events.create_event(request).await?;
    Ok(Created(event))
}

/// List events
#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    params(PaginationParams),
    responses((status = 200, description = "Page of events"))
)]
async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResult<Event>>> {
    let params = PaginationParams::new(params.page, params.per_page);
    Ok(Json(state.events.list_events(&params).await?))
}

/// Get event
#[utoipa::path(
    get,
    path = "/events/{event_id}",
    tag = "events",
    params(("event_id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "The event"),
        (status = 404, description = "Event not found"),
    )
)]
async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    let event = state.events.get_event(EventId::from(event_id)).await?;
    Ok(Json(event))
}

/// Transition stage
#[utoipa::path(
    patch,
    path = "/events/{event_id}/stage",
    tag = "events",
    params(("event_id" = Uuid, Path, description = "Event id")),
    request_body = TransitionStageRequest,
    responses(
        (status = 200, description = "Stage advanced"),
        (status = 403, description = "Transition not permitted"),
        (status = 422, description = "Population constraints not met"),
    )
)]
async fn transition_stage(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<TransitionStageRequest>,
) -> ApiResult<Json<StageTransitionOutcome>> {
    let outcome = state
        .events
        .transition_stage(EventId::from(event_id), request)
        .await?;
    Ok(Json(outcome))
}

/// Register participant
#[utoipa::path(
    post,
    path = "/events/{event_id}/register",
    tag = "events",
    params(("event_id" = Uuid, Path, description = "Event id")),
    request_body = RegisterParticipantRequest,
    responses(
        (status = 201, description = "Participant registered"),
        (status = 403, description = "Registration is closed"),
        (status = 409, description = "Already registered"),
    )
)]
async fn register_participant(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RegisterParticipantRequest>,
) -> ApiResult<Created<Participant>> {
    let participant = state
        .events
        .register_participant(EventId::from(event_id), request)
        .await?;
    Ok(Created(participant))
}

/// List participants
#[utoipa::path(
    get,
    path = "/events/{event_id}/participants",
    tag = "events",
    params(("event_id" = Uuid, Path, description = "Event id"), PaginationParams),
    responses((status = 200, description = "Page of participants"))
)]
async fn list_participants(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResult<Participant>>> {
    let params = PaginationParams::new(params.page, params.per_page);
    Ok(Json(
        state
            .events
            .list_participants(EventId::from(event_id), &params)
            .await?,
    ))
}

/// Submit proposal metadata
#[utoipa::path(
    post,
    path = "/events/{event_id}/participants/{participant_id}/proposal",
    tag = "proposals",
    params(
        ("event_id" = Uuid, Path, description = "Event id"),
        ("participant_id" = Uuid, Path, description = "Author id"),
    ),
    request_body = SubmitProposalRequest,
    responses(
        (status = 201, description = "Proposal registered"),
        (status = 403, description = "Submissions are closed"),
        (status = 409, description = "Author already submitted"),
    )
)]
async fn submit_proposal(
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(request): ValidatedJson<SubmitProposalRequest>,
) -> ApiResult<Created<Proposal>> {
    let proposal = state
        .proposals
        .submit_proposal(
            EventId::from(event_id),
            ParticipantId::from(participant_id),
            request,
        )
        .await?;
    Ok(Created(proposal))
}

/// List proposals
#[utoipa::path(
    get,
    path = "/events/{event_id}/proposals",
    tag = "proposals",
    params(("event_id" = Uuid, Path, description = "Event id"), PaginationParams),
    responses((status = 200, description = "Page of proposals"))
)]
async fn list_proposals(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResult<Proposal>>> {
    let params = PaginationParams::new(params.page, params.per_page);
    Ok(Json(
        state
            .proposals
            .list_proposals(EventId::from(event_id), &params)
            .await?,
    ))
}

/// Delete proposal (only while submissions are open)
#[utoipa::path(
    delete,
    path = "/events/{event_id}/proposals/{proposal_id}",
    tag = "proposals",
    params(
        ("event_id" = Uuid, Path, description = "Event id"),
        ("proposal_id" = Uuid, Path, description = "Proposal id"),
    ),
    responses(
        (status = 204, description = "Proposal deleted"),
        (status = 403, description = "Submissions are closed"),
        (status = 404, description = "Proposal not found"),
    )
)]
async fn delete_proposal(
    State(state): State<AppState>,
    Path((event_id, proposal_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<NoContent> {
    state
        .proposals
        .delete_proposal(EventId::from(event_id), ProposalId::from(proposal_id))
        .await?;
    Ok(NoContent)
}
