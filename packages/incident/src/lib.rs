#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident lifecycle.
//!
//! [`IncidentWorkflow`] owns every status change an incident goes through
//! after it is declared:
//!
//! ```text
//! REDIGE ──validate──▶ VALIDE ──acknowledge──▶ PRIS_EN_COMPTE ──start──▶ EN_COURS_DE_TRAITEMENT ──complete──▶ TRAITE
//!    └──reject──▶ REJETE                                                    ▲        │
//!                                                                  unblock  │        │ block
//!                                                                           └ BLOQUE ◀┘
//! ```
//!
//! `REDIRIGE` is only reachable through a status override. Each operation
//! loads the incident, checks its guards, and saves with the version it
//! loaded, so two concurrent transitions from the same status cannot both
//! land: the loser gets [`WorkflowError::Conflict`].

mod citizen;
mod error;
mod staff;
pub mod workflow;

use std::sync::Arc;

use geoinfo_database::Store;
use geoinfo_spatial::RegionResolver;

pub use error::{TransitionRejection, WorkflowError};
pub use staff::parse_specialty;
pub use workflow::{Mode, Operation, parse_status};

/// The incident state machine, the citizen-facing operations around it,
/// and the administration of the professionals who process incidents.
#[derive(Clone)]
pub struct IncidentWorkflow {
    store: Arc<dyn Store>,
    resolver: Arc<RegionResolver>,
}

impl IncidentWorkflow {
    /// Creates a workflow over `store`, resolving regions with `resolver`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, resolver: Arc<RegionResolver>) -> Self {
        Self { store, resolver }
    }

    /// The underlying store, for read-side queries.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// The region resolver used at declaration.
    #[must_use]
    pub fn resolver(&self) -> &RegionResolver {
        &self.resolver
    }
}
