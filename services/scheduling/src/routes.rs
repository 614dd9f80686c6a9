//! Scheduling service routes

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, put},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::ApiError,
    guard::Actor,
    middleware::auth_middleware,
    models::{
        AssignRequest, CreateSessionRequest, MeetingLinkRequest, RejectRequest,
        RescheduleRequest, UpdateStatusRequest,
    },
    state::AppState,
};

/// Create the router for the scheduling service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sessions", get(list_all_sessions).post(create_session))
        .route("/sessions/booked-slots", get(booked_slots))
        .route("/sessions/user", get(list_user_sessions))
        .route("/sessions/instructor", get(list_instructor_sessions))
        .route("/sessions/mentor/:id", get(list_mentor_sessions))
        .route("/sessions/:id", get(get_session))
        .route(
            "/sessions/:id/assign-mentor",
            put(assign_session).patch(assign_session),
        )
        .route(
            "/sessions/:id/add-meet-link",
            put(add_meeting_link).patch(add_meeting_link),
        )
        .route("/sessions/:id/status", put(update_status).patch(update_status))
        .route(
            "/sessions/:id/reschedule",
            put(reschedule_session).patch(reschedule_session),
        )
        .route("/sessions/:id/reject", put(reject_session).patch(reject_session))
        .route(
            "/sessions/:id/complete",
            put(complete_session).patch(complete_session),
        )
        .route("/sessions/:id/cancel", put(cancel_session).patch(cancel_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "ok",
            _ => "unreachable",
        },
        None => "in_memory",
    };

    let status = if database == "unreachable" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "scheduling-service",
            "database": database,
        })),
    )
}

/// Book a session for the calling user
pub async fn create_session(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let session = state.sessions.create(&actor, request).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_all_sessions(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.list_all(&actor).await?))
}

/// Taken slots across the platform
pub async fn booked_slots(
    State(state): State<AppState>,
    _actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.booked_slots().await?))
}

pub async fn list_user_sessions(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.list_for_user(&actor).await?))
}

pub async fn list_instructor_sessions(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.list_for_instructor(&actor).await?))
}

pub async fn list_mentor_sessions(
    State(state): State<AppState>,
    actor: Actor,
    mentor_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(mentor_id) = mentor_id?;
    Ok(Json(state.sessions.list_for_mentor(&actor, mentor_id).await?))
}

pub async fn get_session(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.sessions.get(&actor, id).await?))
}

/// Bind a pending session to a mentor or an instructor
pub async fn assign_session(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    Ok(Json(state.sessions.assign(&actor, id, request).await?))
}

pub async fn add_meeting_link(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<MeetingLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    Ok(Json(state.sessions.add_meeting_link(&actor, id, request).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    Ok(Json(state.sessions.update_status(&actor, id, request).await?))
}

pub async fn reschedule_session(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RescheduleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    Ok(Json(state.sessions.reschedule(&actor, id, request).await?))
}

pub async fn reject_session(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    Ok(Json(state.sessions.reject(&actor, id, request).await?))
}

pub async fn complete_session(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.sessions.complete(&actor, id).await?))
}

pub async fn cancel_session(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.sessions.cancel(&actor, id).await?))
}
