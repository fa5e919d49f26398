//! Administrator endpoints: moderation, assignment, overrides and the
//! professional accounts.

use actix_web::{HttpRequest, HttpResponse, web};
use geoinfo_database::queries;
use geoinfo_incident::{Mode, Operation, WorkflowError, parse_specialty, parse_status};
use geoinfo_incident_models::{NewProfessional, ProfessionalUpdate, RoleKind};
use geoinfo_server_models::{
    ApiIncident, CreateProfessionalRequest, ReasonRequest, StatusUpdateRequest,
    UpdateProfessionalRequest,
};

use crate::actor::require;
use crate::{ApiError, AppState};

/// `GET /api/admin/incidents/pending`
///
/// Drafted incidents awaiting moderation, newest first.
pub async fn pending(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let incidents = queries::pending_incidents(state.workflow.store()).await?;
    let incidents: Vec<ApiIncident> = incidents.into_iter().map(ApiIncident::from).collect();
    Ok(HttpResponse::Ok().json(incidents))
}

/// `PUT /api/admin/incidents/{id}/validate`
pub async fn validate(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let incident = state
        .workflow
        .apply(
            path.into_inner(),
            Mode::Strict(Operation::Validate),
            None,
            Operation::Validate.target(),
            None,
        )
        .await?;
    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}

/// `PUT /api/admin/incidents/{id}/reject`
pub async fn reject(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ReasonRequest>,
) -> Result<HttpResponse, ApiError> {
    require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let incident = state
        .workflow
        .apply(
            path.into_inner(),
            Mode::Strict(Operation::Reject),
            None,
            Operation::Reject.target(),
            Some(body.reason.as_str()),
        )
        .await?;
    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}

/// `POST /api/admin/incidents/{id}/assign/{professional_id}`
pub async fn assign(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let (id, professional_id) = path.into_inner();
    let incident = state.workflow.assign(id, professional_id).await?;
    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}

/// `PUT /api/admin/incidents/{id}/status`
///
/// Sets any status, bypassing the transition table.
pub async fn set_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let admin = require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let id = path.into_inner();
    let target = parse_status(&body.status)?;

    log::warn!("Administrator {} overrides incident {id} to {target}", admin.id);
    let incident = state
        .workflow
        .apply(
            id,
            Mode::AdministratorOverride,
            Some(admin.id),
            target,
            body.comment.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}

/// `GET /api/admin/professionals`
///
/// Active professionals, for the assignment picker.
pub async fn professionals(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let professionals = queries::active_professionals(state.workflow.store()).await?;
    Ok(HttpResponse::Ok().json(professionals))
}

/// `POST /api/admin/professionals`
pub async fn create_professional(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateProfessionalRequest>,
) -> Result<HttpResponse, ApiError> {
    let admin = require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let body = body.into_inner();
    let new = NewProfessional {
        last_name: body.last_name,
        first_name: body.first_name,
        email: body.email,
        phone: body.phone,
        sector_id: body.sector_id,
        specialty: parse_specialty(&body.specialty)?,
    };

    let user = state.workflow.create_professional(new).await?;
    log::info!("Administrator {} created professional {}", admin.id, user.id);
    Ok(HttpResponse::Created().json(user))
}

/// `PUT /api/admin/professionals/{id}`
pub async fn update_professional(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateProfessionalRequest>,
) -> Result<HttpResponse, ApiError> {
    require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let body = body.into_inner();
    let update = ProfessionalUpdate {
        last_name: body.last_name,
        first_name: body.first_name,
        phone: body.phone,
        sector_id: body.sector_id,
        specialty: body.specialty.as_deref().map(parse_specialty).transpose()?,
    };

    let user = state
        .workflow
        .update_professional(path.into_inner(), update)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

/// `DELETE /api/admin/professionals/{id}`
///
/// Deactivates the account; nothing is deleted.
pub async fn deactivate_professional(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require(&req, state.workflow.store(), RoleKind::Admin).await?;
    state
        .workflow
        .deactivate_professional(path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// `DELETE /api/admin/rate-limit/{key}`
///
/// Clears the recovery attempts recorded for one client key.
pub async fn reset_rate_limit(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let admin = require(&req, state.workflow.store(), RoleKind::Admin).await?;
    let key = path.into_inner();

    if !state.limiter.reset(&key) {
        return Err(WorkflowError::NotFound {
            entity: "Rate limit entry",
            id: key,
        }
        .into());
    }

    log::info!("Administrator {} reset the rate limit for '{key}'", admin.id);
    Ok(HttpResponse::NoContent().finish())
}
