#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident lifecycle domain types.
//!
//! Defines the canonical incident record, its lifecycle status, and the
//! reference data (sectors, regions, users) that incidents point at. These
//! types are shared by the persistence layer, the workflow, and the HTTP
//! boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Lifecycle status of an incident.
///
/// The wire tokens are the `SCREAMING_SNAKE_CASE` variant names (e.g.
/// `PRIS_EN_COMPTE`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    /// Drafted by a citizen, awaiting moderation.
    Redige,
    /// Validated by an administrator and published.
    Valide,
    /// Rejected by an administrator (terminal, carries a reason).
    Rejete,
    /// Acknowledged by a professional, who is now assigned.
    PrisEnCompte,
    /// Being worked on by the assigned professional.
    EnCoursDeTraitement,
    /// Resolved (terminal, carries resolution notes and a resolution time).
    Traite,
    /// Blocked while in progress (carries a reason).
    Bloque,
    /// Redirected elsewhere. Only reachable through a status override.
    Redirige,
}

impl IncidentStatus {
    /// Returns all variants of this enum, in lifecycle order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Redige,
            Self::Valide,
            Self::Rejete,
            Self::PrisEnCompte,
            Self::EnCoursDeTraitement,
            Self::Traite,
            Self::Bloque,
            Self::Redirige,
        ]
    }

    /// Whether incidents in this status appear in public listings and
    /// public statistics.
    #[must_use]
    pub const fn is_public(self) -> bool {
        !matches!(self, Self::Redige | Self::Bloque)
    }

    /// Whether the guarded transitions have no way out of this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejete | Self::Traite)
    }

    /// Whether an override into this status must carry a comment.
    #[must_use]
    pub const fn requires_comment(self) -> bool {
        matches!(self, Self::Traite | Self::Bloque)
    }

    /// Whether a professional's work list shows incidents in this status.
    #[must_use]
    pub const fn is_professional_visible(self) -> bool {
        matches!(
            self,
            Self::Valide
                | Self::PrisEnCompte
                | Self::EnCoursDeTraitement
                | Self::Traite
                | Self::Bloque
                | Self::Redirige
        )
    }
}

/// A validated WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    /// Latitude in degrees, within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, within `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair, checking both ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is out of range or not finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinatesError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidCoordinatesError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidCoordinatesError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Error returned when a coordinate pair is out of range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidCoordinatesError {
    /// Latitude outside `[-90, 90]`.
    Latitude(f64),
    /// Longitude outside `[-180, 180]`.
    Longitude(f64),
}

impl std::fmt::Display for InvalidCoordinatesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latitude(v) => write!(f, "invalid latitude {v}: expected -90 to 90"),
            Self::Longitude(v) => write!(f, "invalid longitude {v}: expected -180 to 180"),
        }
    }
}

impl std::error::Error for InvalidCoordinatesError {}

/// A citizen-reported incident as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Unique incident ID.
    pub id: i64,
    /// Optimistic concurrency version, bumped on every successful save.
    pub version: u64,
    /// Free-form classification (e.g. "Route endommagée").
    pub incident_type: String,
    /// Citizen description.
    pub description: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Region name, resolved once at creation.
    pub region: String,
    /// Name of the place (e.g. a school or a market).
    pub place_name: Option<String>,
    /// Free-text address.
    pub address: Option<String>,
    /// Reference to the uploaded photo.
    pub photo_url: Option<String>,
    /// When the incident was declared. Never changes.
    pub declared_at: DateTime<Utc>,
    /// When the incident was last modified.
    pub modified_at: DateTime<Utc>,
    /// When the incident was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: IncidentStatus,
    /// Rejection or blocking reason.
    pub reason: Option<String>,
    /// Resolution notes written by the professional.
    pub resolution_notes: Option<String>,
    /// Sector responsible for the incident.
    pub sector_id: i64,
    /// Authenticated reporter, if any.
    pub reporter_id: Option<i64>,
    /// Professional currently assigned.
    pub assigned_professional_id: Option<i64>,
    /// Anonymous device identifier of the reporting citizen.
    pub device_id: Option<String>,
    /// Optional reporter email, used for multi-device lookups.
    pub citizen_email: Option<String>,
}

impl Incident {
    /// Whether `professional_id` is the assigned professional.
    #[must_use]
    pub fn is_assigned_to(&self, professional_id: i64) -> bool {
        self.assigned_professional_id == Some(professional_id)
    }

    /// Point as `(latitude, longitude)`.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Input for declaring a new incident.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    /// Free-form classification. Must not be blank.
    pub incident_type: String,
    /// Citizen description.
    pub description: Option<String>,
    /// Name of the place.
    pub place_name: Option<String>,
    /// Free-text address.
    pub address: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Sector the incident belongs to.
    pub sector_id: i64,
    /// Reference to an already-stored photo.
    pub photo_url: Option<String>,
    /// Anonymous device identifier.
    pub device_id: Option<String>,
    /// Reporter email.
    pub citizen_email: Option<String>,
    /// Authenticated reporter.
    pub reporter_id: Option<i64>,
}

/// Input for creating a professional account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfessional {
    /// Last name. Must not be blank.
    pub last_name: String,
    /// First name. Must not be blank.
    pub first_name: String,
    /// Unique email.
    pub email: String,
    /// Phone number.
    pub phone: Option<String>,
    /// Sector the professional works for.
    pub sector_id: i64,
    /// Technical specialty.
    pub specialty: Specialty,
}

/// Changes to a professional account. Absent fields are kept; the email
/// never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalUpdate {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub phone: Option<String>,
    pub sector_id: Option<i64>,
    pub specialty: Option<Specialty>,
}

/// A category of municipal responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sector {
    /// Unique sector ID.
    pub id: i64,
    /// Unique sector name.
    pub name: String,
    /// What the sector covers.
    pub description: Option<String>,
    /// Display color (hex, e.g. `#3B82F6`).
    pub color: Option<String>,
}

/// An administrative region. Its geometry, when known, lives in the
/// spatial index rather than here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// Unique region name.
    pub name: String,
    /// Optional administrative code.
    pub code: Option<String>,
}

/// Technical specialty of a professional.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Specialty {
    /// Water supply
    Water,
    /// Electricity network
    Electricity,
    /// Roads
    Road,
    /// Sewage and sanitation
    Sanitation,
    /// Street lighting
    PublicLighting,
    /// Waste collection
    Waste,
    /// Parks and green spaces
    GreenSpaces,
    /// Public safety
    Security,
    /// Anything else
    Other,
}

/// Attachment present only on professional users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalProfile {
    /// Sector the professional works for.
    pub sector_id: i64,
    /// Technical specialty.
    pub specialty: Specialty,
    /// Whether the professional is currently available.
    pub available: bool,
}

/// Role of a user, with the professional attachment carried by its variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform administrator.
    Admin,
    /// Municipal professional.
    #[serde(rename = "PROFESSIONNEL")]
    Professional(ProfessionalProfile),
    /// Registered citizen.
    #[serde(rename = "CITOYEN")]
    Citizen,
}

/// Role discriminant, without attachments.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum RoleKind {
    /// Platform administrator.
    #[serde(rename = "ADMIN")]
    #[strum(serialize = "ADMIN")]
    Admin,
    /// Municipal professional.
    #[serde(rename = "PROFESSIONNEL")]
    #[strum(serialize = "PROFESSIONNEL")]
    Professional,
    /// Registered citizen.
    #[serde(rename = "CITOYEN")]
    #[strum(serialize = "CITOYEN")]
    Citizen,
}

impl Role {
    /// Returns the discriminant of this role.
    #[must_use]
    pub const fn kind(&self) -> RoleKind {
        match self {
            Self::Admin => RoleKind::Admin,
            Self::Professional(_) => RoleKind::Professional,
            Self::Citizen => RoleKind::Citizen,
        }
    }
}

/// A platform user. Credentials are managed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Last name.
    pub last_name: String,
    /// First name.
    pub first_name: String,
    /// Unique email.
    pub email: String,
    /// Phone number.
    pub phone: Option<String>,
    /// Role and role-specific attachment.
    #[serde(flatten)]
    pub role: Role,
    /// Inactive users cannot be assigned work.
    pub active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The professional attachment, if this user is a professional.
    #[must_use]
    pub const fn professional(&self) -> Option<&ProfessionalProfile> {
        match &self.role {
            Role::Professional(profile) => Some(profile),
            Role::Admin | Role::Citizen => None,
        }
    }
}
