//! Public and citizen-facing HTTP handlers.

use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use geoinfo_database::queries;
use geoinfo_database_models::{DEFAULT_PAGE_SIZE, IncidentQuery, Page, PageRequest};
use geoinfo_incident::{WorkflowError, parse_status};
use geoinfo_incident_models::Incident;
use geoinfo_server_models::{
    ApiHealth, ApiIncident, DeclareIncidentRequest, IncidentSearchParams, PageParams,
    RecoverAccountRequest, RecoverAccountResponse, ResolveParams,
};

use crate::actor::{caller, client_key};
use crate::{ApiError, AppState};

/// Largest page a client may request.
const MAX_PAGE_SIZE: u32 = 100;

fn page_request(limit: Option<u32>, offset: Option<u32>) -> PageRequest {
    PageRequest {
        limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: offset.unwrap_or(0),
    }
}

fn api_page(page: Page<Incident>) -> Page<ApiIncident> {
    Page {
        items: page.items.into_iter().map(ApiIncident::from).collect(),
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }
}

fn api_list(incidents: Vec<Incident>) -> Vec<ApiIncident> {
    incidents.into_iter().map(ApiIncident::from).collect()
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/sectors`
pub async fn sectors(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let sectors = state.workflow.store().sectors().await?;
    Ok(HttpResponse::Ok().json(sectors))
}

/// `GET /api/regions/geojson`
///
/// Returns the loaded region polygons as a `FeatureCollection`.
pub async fn regions_geojson(state: web::Data<AppState>) -> HttpResponse {
    let body = state.workflow.resolver().index().to_geojson();
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body)
}

/// `GET /api/regions/resolve?lat=&lon=`
pub async fn resolve(
    state: web::Data<AppState>,
    params: web::Query<ResolveParams>,
) -> Result<HttpResponse, ApiError> {
    let resolution = state
        .workflow
        .resolver()
        .resolve(params.lat, params.lon)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(HttpResponse::Ok().json(resolution))
}

/// `GET /api/incidents`
///
/// Lists public incidents, newest first.
pub async fn incidents(
    state: web::Data<AppState>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let page = page_request(params.limit, params.offset);
    let incidents = queries::public_incidents(state.workflow.store(), page).await?;
    Ok(HttpResponse::Ok().json(api_page(incidents)))
}

/// `GET /api/incidents/search`
///
/// Filters by status, sector, type and region. Unlike the public listing,
/// every status is searchable.
pub async fn search(
    state: web::Data<AppState>,
    params: web::Query<IncidentSearchParams>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_status)
        .transpose()?;

    let query = IncidentQuery {
        status,
        sector_id: params.sector_id,
        incident_type: params.incident_type,
        region: params.region,
        page: page_request(params.limit, params.offset),
    };
    let incidents = queries::search_incidents(state.workflow.store(), &query).await?;
    Ok(HttpResponse::Ok().json(api_page(incidents)))
}

/// `GET /api/incidents/map`
///
/// Validated incidents, for the public map.
pub async fn map(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let incidents = queries::map_incidents(state.workflow.store()).await?;
    Ok(HttpResponse::Ok().json(api_list(incidents)))
}

/// `GET /api/incidents/stats`
pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = queries::statistics(state.workflow.store()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// `GET /api/incidents/summary`
pub async fn summary(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let summary = queries::platform_summary(state.workflow.store(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// `GET /api/incidents/{id}`
pub async fn incident(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let incident = state
        .workflow
        .store()
        .incident(id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound {
            entity: "Incident",
            id: id.to_string(),
        })?;
    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}

/// `GET /api/incidents/by-email/{email}`
pub async fn by_email(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let incidents = queries::incidents_by_email(state.workflow.store(), path.trim()).await?;
    Ok(HttpResponse::Ok().json(api_list(incidents)))
}

/// `GET /api/incidents/device/{device_id}`
pub async fn by_device(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let incidents = queries::incidents_by_device(state.workflow.store(), path.trim()).await?;
    Ok(HttpResponse::Ok().json(api_list(incidents)))
}

/// `POST /api/incidents`
///
/// Declares an incident. Anonymous declarations are accepted; when the
/// request names a user, the incident is attributed to them.
pub async fn declare(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DeclareIncidentRequest>,
) -> Result<HttpResponse, ApiError> {
    let reporter = caller(&req, state.workflow.store()).await?;
    let new = body.into_inner().into_new_incident(reporter.map(|u| u.id));
    let incident = state.workflow.declare(new).await?;
    Ok(HttpResponse::Created().json(ApiIncident::from(incident)))
}

/// `POST /api/recover-account`
///
/// Returns the incidents declared from a device. Rate limited per client.
pub async fn recover_account(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<RecoverAccountRequest>,
) -> Result<HttpResponse, ApiError> {
    let key = client_key(&req);
    let device_id = body.into_inner().device_id;
    let incidents = state
        .workflow
        .recover_account(&state.limiter, &key, &device_id)
        .await?;

    Ok(HttpResponse::Ok().json(RecoverAccountResponse {
        device_id: device_id.trim().to_string(),
        incidents: api_list(incidents),
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use geoinfo_database_models::{IncidentStatistics, PlatformSummary};
    use geoinfo_incident_models::{IncidentStatus, Sector};
    use geoinfo_server_models::ApiErrorBody;
    use geoinfo_spatial::Resolution;
    use serde_json::json;

    use super::*;
    use crate::USER_ID_HEADER;
    use crate::tests::{CITIZEN, VOIRIE, app, state};

    fn declaration(device: &str) -> serde_json::Value {
        json!({
            "incidentType": "Nid de poule",
            "description": "Trou profond sur la chaussée",
            "latitude": 33.5731,
            "longitude": -7.5898,
            "sectorId": VOIRIE,
            "deviceId": device,
            "email": "citoyen@example.ma"
        })
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = test::init_service(app(state().await)).await;
        let resp: ApiHealth =
            test::call_and_read_body_json(&app, TestRequest::get().uri("/api/health").to_request())
                .await;
        assert!(resp.healthy);
    }

    #[actix_web::test]
    async fn sectors_are_listed() {
        let app = test::init_service(app(state().await)).await;
        let sectors: Vec<Sector> = test::call_and_read_body_json(
            &app,
            TestRequest::get().uri("/api/sectors").to_request(),
        )
        .await;
        assert_eq!(sectors.len(), 2);
    }

    #[actix_web::test]
    async fn resolve_falls_back_without_polygons() {
        let app = test::init_service(app(state().await)).await;
        let resolution: Resolution = test::call_and_read_body_json(
            &app,
            TestRequest::get()
                .uri("/api/regions/resolve?lat=33.58&lon=-7.60")
                .to_request(),
        )
        .await;
        assert_eq!(resolution.label, "Casablanca-Settat");
        assert!(resolution.is_degraded());

        let resp = test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/regions/resolve?lat=91&lon=0")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn declared_incident_is_attributed_and_drafted() {
        let app = test::init_service(app(state().await)).await;
        let resp = test::call_service(
            &app,
            TestRequest::post()
                .uri("/api/incidents")
                .insert_header((USER_ID_HEADER, CITIZEN.to_string()))
                .set_json(declaration("device-1"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let incident: ApiIncident = test::read_body_json(resp).await;
        assert_eq!(incident.status, IncidentStatus::Redige);
        assert_eq!(incident.region, "Casablanca-Settat");

        let fetched: ApiIncident = test::call_and_read_body_json(
            &app,
            TestRequest::get()
                .uri(&format!("/api/incidents/{}", incident.id))
                .to_request(),
        )
        .await;
        assert_eq!(fetched.id, incident.id);
    }

    #[actix_web::test]
    async fn drafted_incidents_stay_out_of_public_listings() {
        let app = test::init_service(app(state().await)).await;
        test::call_service(
            &app,
            TestRequest::post()
                .uri("/api/incidents")
                .set_json(declaration("device-1"))
                .to_request(),
        )
        .await;

        let page: Page<ApiIncident> = test::call_and_read_body_json(
            &app,
            TestRequest::get().uri("/api/incidents").to_request(),
        )
        .await;
        assert_eq!(page.total, 0);

        let page: Page<ApiIncident> = test::call_and_read_body_json(
            &app,
            TestRequest::get()
                .uri("/api/incidents/search?status=REDIGE")
                .to_request(),
        )
        .await;
        assert_eq!(page.total, 1);

        let stats: IncidentStatistics = test::call_and_read_body_json(
            &app,
            TestRequest::get().uri("/api/incidents/stats").to_request(),
        )
        .await;
        assert_eq!(stats.total, 0);

        let summary: PlatformSummary = test::call_and_read_body_json(
            &app,
            TestRequest::get().uri("/api/incidents/summary").to_request(),
        )
        .await;
        assert_eq!(summary.total_incidents, 0);
    }

    #[actix_web::test]
    async fn unknown_status_token_is_a_bad_request() {
        let app = test::init_service(app(state().await)).await;
        let resp = test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/incidents/search?status=FINI")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ApiErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.kind, "VALIDATION");
    }

    #[actix_web::test]
    async fn unknown_incident_is_not_found() {
        let app = test::init_service(app(state().await)).await;
        let resp = test::call_service(
            &app,
            TestRequest::get().uri("/api/incidents/42").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn lookups_by_email_and_device() {
        let app = test::init_service(app(state().await)).await;
        test::call_service(
            &app,
            TestRequest::post()
                .uri("/api/incidents")
                .set_json(declaration("device-7"))
                .to_request(),
        )
        .await;

        let by_email: Vec<ApiIncident> = test::call_and_read_body_json(
            &app,
            TestRequest::get()
                .uri("/api/incidents/by-email/CITOYEN@example.ma")
                .to_request(),
        )
        .await;
        assert_eq!(by_email.len(), 1);

        let by_device: Vec<ApiIncident> = test::call_and_read_body_json(
            &app,
            TestRequest::get()
                .uri("/api/incidents/device/device-8")
                .to_request(),
        )
        .await;
        assert!(by_device.is_empty());
    }

    #[actix_web::test]
    async fn recovery_is_limited_to_five_attempts_per_client() {
        let app = test::init_service(app(state().await)).await;
        test::call_service(
            &app,
            TestRequest::post()
                .uri("/api/incidents")
                .set_json(declaration("device-1"))
                .to_request(),
        )
        .await;

        let recover = |device: &str| {
            TestRequest::post()
                .uri("/api/recover-account")
                .insert_header(("X-Forwarded-For", "41.250.1.2"))
                .set_json(json!({ "deviceId": device }))
                .to_request()
        };

        let resp = test::call_service(&app, recover("device-1")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: RecoverAccountResponse = test::read_body_json(resp).await;
        assert_eq!(body.incidents.len(), 1);

        let resp = test::call_service(&app, recover("device-unknown")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        for _ in 0..3 {
            test::call_service(&app, recover("device-1")).await;
        }
        let resp = test::call_service(&app, recover("device-1")).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("Retry-After"));
    }
}
