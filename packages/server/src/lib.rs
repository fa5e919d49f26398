#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the geoinfo incident platform.
//!
//! Serves the public incident listings and map, the citizen declaration
//! and account recovery endpoints, and the administrator and professional
//! workflow endpoints. Region polygons are loaded from a `GeoJSON` file at
//! startup; reference data comes from a TOML seed. The store lives in
//! memory for the lifetime of the process.

mod actor;
mod admin;
pub mod config;
mod error;
mod handlers;
pub mod interactive;
mod professional;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use geoinfo_database::memory::MemoryStore;
use geoinfo_database::{StoreError, seed};
use geoinfo_incident::IncidentWorkflow;
use geoinfo_rate_limit::{RateLimitPolicy, RateLimiter};
use geoinfo_spatial::{RegionIndex, RegionLoadError, RegionResolver};

pub use actor::USER_ID_HEADER;
pub use config::ServerConfig;
pub use error::ApiError;

/// Shared application state.
pub struct AppState {
    /// Incident state machine, store and region resolver.
    pub workflow: IncidentWorkflow,
    /// Limits account recovery attempts per client.
    pub limiter: Arc<RateLimiter>,
}

/// Errors that prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Seed could not be loaded or applied.
    #[error("Seed error: {0}")]
    Store(#[from] StoreError),

    /// Region reference data could not be loaded.
    #[error("Region data error: {0}")]
    Regions(#[from] RegionLoadError),
}

/// Loads region polygons from `path`.
///
/// A missing or unreadable file is not fatal: the resolver then answers
/// from the fallback table only, and the degradation is logged.
#[must_use]
pub fn load_regions(path: Option<&Path>) -> RegionIndex {
    let Some(path) = path else {
        log::warn!("No region polygons configured, resolving from the fallback table only");
        return RegionIndex::empty();
    };

    match RegionIndex::load(path) {
        Ok(index) => index,
        Err(e) => {
            log::warn!(
                "Failed to load regions from {}: {e}, resolving from the fallback table only",
                path.display()
            );
            RegionIndex::empty()
        }
    }
}

/// Builds the application state: seeds the store and loads regions.
///
/// # Errors
///
/// * [`StartupError::Store`] if the seed cannot be loaded or applied
/// * [`StartupError::Regions`] if the embedded fallback table is malformed
pub async fn build_state(config: &ServerConfig) -> Result<AppState, StartupError> {
    let store = Arc::new(MemoryStore::new());

    let seed = match &config.seed_path {
        Some(path) => {
            log::info!("Loading seed from {}", path.display());
            seed::load(path)?
        }
        None => seed::default_seed()?,
    };
    let report = seed::apply(store.as_ref(), seed).await?;
    log::info!(
        "Seeded {} sector(s) and {} user(s)",
        report.sectors,
        report.users
    );

    let index = load_regions(config.regions_path.as_deref());
    let resolver = RegionResolver::with_embedded_table(index)?;

    Ok(AppState {
        workflow: IncidentWorkflow::new(store, Arc::new(resolver)),
        limiter: Arc::new(RateLimiter::new(RateLimitPolicy::default())),
    })
}

/// Registers every `/api` route.
///
/// Static incident paths are registered before `/incidents/{id}` so that
/// they are not captured by it.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/sectors", web::get().to(handlers::sectors))
            .route("/regions/geojson", web::get().to(handlers::regions_geojson))
            .route("/regions/resolve", web::get().to(handlers::resolve))
            .route("/recover-account", web::post().to(handlers::recover_account))
            .route("/incidents", web::get().to(handlers::incidents))
            .route("/incidents", web::post().to(handlers::declare))
            .route("/incidents/search", web::get().to(handlers::search))
            .route("/incidents/map", web::get().to(handlers::map))
            .route("/incidents/stats", web::get().to(handlers::stats))
            .route("/incidents/summary", web::get().to(handlers::summary))
            .route(
                "/incidents/by-email/{email}",
                web::get().to(handlers::by_email),
            )
            .route(
                "/incidents/device/{device_id}",
                web::get().to(handlers::by_device),
            )
            .route("/incidents/{id}", web::get().to(handlers::incident))
            .service(
                web::scope("/admin")
                    .route("/incidents/pending", web::get().to(admin::pending))
                    .route("/incidents/{id}/validate", web::put().to(admin::validate))
                    .route("/incidents/{id}/reject", web::put().to(admin::reject))
                    .route(
                        "/incidents/{id}/assign/{professional_id}",
                        web::post().to(admin::assign),
                    )
                    .route("/incidents/{id}/status", web::put().to(admin::set_status))
                    .route("/professionals", web::get().to(admin::professionals))
                    .route(
                        "/professionals",
                        web::post().to(admin::create_professional),
                    )
                    .route(
                        "/professionals/{id}",
                        web::put().to(admin::update_professional),
                    )
                    .route(
                        "/professionals/{id}",
                        web::delete().to(admin::deactivate_professional),
                    )
                    .route(
                        "/rate-limit/{key}",
                        web::delete().to(admin::reset_rate_limit),
                    ),
            )
            .service(
                web::scope("/professional")
                    .route("/incidents", web::get().to(professional::incidents))
                    .route(
                        "/incidents/{id}/acknowledge",
                        web::put().to(professional::acknowledge),
                    )
                    .route("/incidents/{id}/start", web::put().to(professional::start))
                    .route(
                        "/incidents/{id}/complete",
                        web::put().to(professional::complete),
                    )
                    .route("/incidents/{id}/block", web::put().to(professional::block))
                    .route(
                        "/incidents/{id}/unblock",
                        web::put().to(professional::unblock),
                    )
                    .route(
                        "/incidents/{id}/status",
                        web::put().to(professional::set_status),
                    ),
            ),
    );
}

/// Periodically drops rate-limit entries with no attempts left in the
/// window.
fn spawn_cleanup(limiter: Arc<RateLimiter>, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });
}

/// Starts the geoinfo API server.
///
/// Reads [`ServerConfig`] from the environment, builds the state and
/// starts the Actix-Web HTTP server. This is a regular async function;
/// the caller is responsible for providing the async runtime (e.g. via
/// `#[actix_web::main]`) and for initializing logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the state cannot be built, or if
/// the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let config = ServerConfig::from_env();
    let state = build_state(&config).await.map_err(std::io::Error::other)?;

    spawn_cleanup(state.limiter.clone(), config.cleanup_interval);

    let state = web::Data::new(state);
    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
pub(crate) mod tests {
    use actix_web::body::MessageBody;
    use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
    use chrono::Utc;
    use geoinfo_database::Store as _;
    use geoinfo_incident_models::{Incident, IncidentStatus};

    use super::*;

    /// IDs assigned by [`TEST_SEED`], in insertion order.
    pub const ADMIN: i64 = 1;
    pub const VOIRIE_PRO: i64 = 2;
    pub const CITIZEN: i64 = 3;
    pub const VOIRIE: i64 = 1;
    pub const EAU: i64 = 2;

    const TEST_SEED: &str = r#"
        [[sectors]]
        name = "Voirie"

        [[sectors]]
        name = "Eau"

        [[users]]
        last_name = "Admin"
        first_name = "Root"
        email = "admin@example.ma"
        role = "ADMIN"

        [[users]]
        last_name = "Alaoui"
        first_name = "Karim"
        email = "karim@example.ma"
        role = "PROFESSIONNEL"
        sector = "Voirie"
        specialty = "ROAD"

        [[users]]
        last_name = "Bennani"
        first_name = "Sara"
        email = "sara@example.ma"
        role = "CITOYEN"
    "#;

    pub async fn state() -> web::Data<AppState> {
        let store = Arc::new(MemoryStore::new());
        seed::apply(store.as_ref(), seed::parse(TEST_SEED).unwrap())
            .await
            .unwrap();
        let resolver = RegionResolver::with_embedded_table(RegionIndex::empty()).unwrap();
        web::Data::new(AppState {
            workflow: IncidentWorkflow::new(store, Arc::new(resolver)),
            limiter: Arc::new(RateLimiter::new(RateLimitPolicy::default())),
        })
    }

    /// Stores an incident directly, bypassing declaration.
    pub async fn insert_incident(
        state: &web::Data<AppState>,
        sector_id: i64,
        status: IncidentStatus,
        assignee: Option<i64>,
    ) -> i64 {
        let now = Utc::now();
        let incident = Incident {
            id: 0,
            version: 0,
            incident_type: "Nid de poule".to_string(),
            description: None,
            latitude: 33.5731,
            longitude: -7.5898,
            region: "Casablanca-Settat".to_string(),
            place_name: None,
            address: None,
            photo_url: None,
            declared_at: now,
            modified_at: now,
            resolved_at: None,
            status,
            reason: None,
            resolution_notes: None,
            sector_id,
            reporter_id: None,
            assigned_professional_id: assignee,
            device_id: None,
            citizen_email: None,
        };
        state
            .workflow
            .store()
            .insert_incident(incident)
            .await
            .unwrap()
            .id
    }

    pub fn app(
        state: web::Data<AppState>,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Response = ServiceResponse<impl MessageBody>,
            Config = (),
            InitError = (),
            Error = actix_web::Error,
        >,
    > {
        App::new().app_data(state).configure(configure)
    }

    #[test]
    fn missing_regions_file_degrades_to_empty_index() {
        assert!(load_regions(None).is_empty());
        assert!(load_regions(Some(Path::new("does/not/exist.geojson"))).is_empty());
    }

    #[actix_web::test]
    async fn build_state_applies_the_default_seed() {
        let state = build_state(&ServerConfig::default()).await.unwrap();
        let sectors = state.workflow.store().sectors().await.unwrap();
        assert_eq!(sectors.len(), 6);
    }
}
