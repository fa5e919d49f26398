use geoinfo_database::StoreError;
use geoinfo_incident_models::IncidentStatus;
use geoinfo_rate_limit::RateLimitError;

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRejection {
    /// The incident is not in a status the transition starts from.
    WrongStatus {
        /// Statuses the transition accepts.
        expected: &'static [IncidentStatus],
        /// Current status.
        found: IncidentStatus,
    },
    /// The acting professional is not the one assigned to the incident.
    NotAssigned {
        /// Acting professional.
        professional_id: i64,
    },
    /// The acting professional works for another sector.
    SectorMismatch {
        /// Sector of the acting professional.
        professional_sector: i64,
        /// Sector of the incident.
        incident_sector: i64,
    },
    /// The professional is inactive and cannot take work.
    ProfessionalInactive {
        /// Inactive professional.
        professional_id: i64,
    },
    /// The acting user exists but is not a professional.
    NotAProfessional {
        /// Acting user.
        user_id: i64,
    },
}

impl std::fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongStatus { expected, found } => {
                let expected = expected
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<&str>>()
                    .join(" or ");
                write!(f, "status is {found}, expected {expected}")
            }
            Self::NotAssigned { professional_id } => {
                write!(f, "professional {professional_id} is not assigned")
            }
            Self::SectorMismatch {
                professional_sector,
                incident_sector,
            } => write!(
                f,
                "incident belongs to sector {incident_sector}, professional to sector {professional_sector}"
            ),
            Self::ProfessionalInactive { professional_id } => {
                write!(f, "professional {professional_id} is inactive")
            }
            Self::NotAProfessional { user_id } => {
                write!(f, "user {user_id} is not a professional")
            }
        }
    }
}

/// Errors returned by workflow operations.
///
/// Every error leaves the incident untouched.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// A guard refused the transition.
    #[error("Incident {id}: {rejection}")]
    InvalidTransition {
        /// Incident ID.
        id: i64,
        /// Failed guard.
        rejection: TransitionRejection,
    },

    /// Input is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Another transition on the same incident landed first.
    #[error("Incident {id} was modified concurrently, reload and retry")]
    Conflict {
        /// Incident ID.
        id: i64,
    },

    /// The caller exhausted its attempts.
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl WorkflowError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) const fn rejected(id: i64, rejection: TransitionRejection) -> Self {
        Self::InvalidTransition { id, rejection }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { id, .. } => Self::Conflict { id },
            StoreError::Missing { entity, id } => Self::not_found(entity, id),
            other => Self::Store(other),
        }
    }
}
