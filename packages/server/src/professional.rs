//! Professional endpoints: the work list and the processing steps.
//!
//! Every handler acts as the calling professional and goes through
//! [`IncidentWorkflow::apply`](geoinfo_incident::IncidentWorkflow::apply).
//! The workflow checks assignment and sector; this module only resolves who
//! is calling.

use actix_web::{HttpRequest, HttpResponse, web};
use geoinfo_database::queries;
use geoinfo_incident::{Mode, Operation, parse_status};
use geoinfo_server_models::{ApiIncident, CompleteRequest, ReasonRequest, StatusUpdateRequest};

use crate::actor::professional;
use crate::{ApiError, AppState};

/// `GET /api/professional/incidents`
///
/// Incidents of the caller's sector past moderation, newest first.
pub async fn incidents(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let (_, profile) = professional(&req, state.workflow.store()).await?;
    let incidents = queries::professional_incidents(state.workflow.store(), profile.sector_id)
        .await?;
    let incidents: Vec<ApiIncident> = incidents.into_iter().map(ApiIncident::from).collect();
    Ok(HttpResponse::Ok().json(incidents))
}

/// Runs one strict processing step as `professional_id`.
async fn step(
    state: &AppState,
    id: i64,
    professional_id: i64,
    operation: Operation,
    text: Option<&str>,
) -> Result<HttpResponse, ApiError> {
    let incident = state
        .workflow
        .apply(
            id,
            Mode::Strict(operation),
            Some(professional_id),
            operation.target(),
            text,
        )
        .await?;
    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}

/// `PUT /api/professional/incidents/{id}/acknowledge`
pub async fn acknowledge(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let (user, _) = professional(&req, state.workflow.store()).await?;
    step(&state, path.into_inner(), user.id, Operation::Acknowledge, None).await
}

/// `PUT /api/professional/incidents/{id}/start`
pub async fn start(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let (user, _) = professional(&req, state.workflow.store()).await?;
    step(&state, path.into_inner(), user.id, Operation::StartProcessing, None).await
}

/// `PUT /api/professional/incidents/{id}/complete`
pub async fn complete(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<CompleteRequest>,
) -> Result<HttpResponse, ApiError> {
    let (user, _) = professional(&req, state.workflow.store()).await?;
    step(
        &state,
        path.into_inner(),
        user.id,
        Operation::Complete,
        Some(body.notes.as_str()),
    )
    .await
}

/// `PUT /api/professional/incidents/{id}/block`
pub async fn block(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ReasonRequest>,
) -> Result<HttpResponse, ApiError> {
    let (user, _) = professional(&req, state.workflow.store()).await?;
    step(
        &state,
        path.into_inner(),
        user.id,
        Operation::Block,
        Some(body.reason.as_str()),
    )
    .await
}

/// `PUT /api/professional/incidents/{id}/unblock`
pub async fn unblock(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let (user, _) = professional(&req, state.workflow.store()).await?;
    step(&state, path.into_inner(), user.id, Operation::Unblock, None).await
}

/// `PUT /api/professional/incidents/{id}/status`
///
/// Sets any status on an incident of the caller's sector.
pub async fn set_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let (user, _) = professional(&req, state.workflow.store()).await?;
    let target = parse_status(&body.status)?;
    let incident = state
        .workflow
        .apply(
            path.into_inner(),
            Mode::SectorOverride {
                professional_id: user.id,
            },
            Some(user.id),
            target,
            body.comment.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}
