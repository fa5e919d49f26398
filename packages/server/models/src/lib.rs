#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the geoinfo server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the domain types so that the API contract can evolve on its own,
//! and so that reporter contact details never leak into public listings.

use chrono::{DateTime, Utc};
use geoinfo_incident_models::{Incident, IncidentStatus, NewIncident};
use serde::{Deserialize, Serialize};

/// An incident as returned by the API.
///
/// Omits the reporter's device identifier and email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    /// Unique incident ID.
    pub id: i64,
    /// Version, for clients that want to detect concurrent edits.
    pub version: u64,
    /// Free-form classification.
    pub incident_type: String,
    /// Citizen description.
    pub description: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Region resolved at declaration.
    pub region: String,
    /// Name of the place.
    pub place_name: Option<String>,
    /// Free-text address.
    pub address: Option<String>,
    /// Photo reference.
    pub photo_url: Option<String>,
    /// When the incident was declared.
    pub declared_at: DateTime<Utc>,
    /// When the incident was last modified.
    pub modified_at: DateTime<Utc>,
    /// When the incident was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: IncidentStatus,
    /// Rejection or blocking reason.
    pub reason: Option<String>,
    /// Resolution notes.
    pub resolution_notes: Option<String>,
    /// Responsible sector.
    pub sector_id: i64,
    /// Assigned professional.
    pub assigned_professional_id: Option<i64>,
}

impl From<Incident> for ApiIncident {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            version: incident.version,
            incident_type: incident.incident_type,
            description: incident.description,
            latitude: incident.latitude,
            longitude: incident.longitude,
            region: incident.region,
            place_name: incident.place_name,
            address: incident.address,
            photo_url: incident.photo_url,
            declared_at: incident.declared_at,
            modified_at: incident.modified_at,
            resolved_at: incident.resolved_at,
            status: incident.status,
            reason: incident.reason,
            resolution_notes: incident.resolution_notes,
            sector_id: incident.sector_id,
            assigned_professional_id: incident.assigned_professional_id,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable category (e.g. `INVALID_TRANSITION`).
    pub kind: String,
}

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Query parameters for the incident search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentSearchParams {
    /// Status token (e.g. `VALIDE`).
    pub status: Option<String>,
    /// Sector ID.
    pub sector_id: Option<i64>,
    /// Exact type tag.
    #[serde(rename = "type")]
    pub incident_type: Option<String>,
    /// Exact region name.
    pub region: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Query parameters for region resolution.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResolveParams {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// Body of `POST /api/incidents`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeclareIncidentRequest {
    /// Free-form classification.
    pub incident_type: String,
    /// Description.
    pub description: Option<String>,
    /// Name of the place.
    pub place_name: Option<String>,
    /// Free-text address.
    pub address: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Sector ID.
    pub sector_id: i64,
    /// Reference to an already-uploaded photo.
    pub photo_url: Option<String>,
    /// Anonymous device identifier.
    pub device_id: Option<String>,
    /// Reporter email.
    pub email: Option<String>,
}

impl DeclareIncidentRequest {
    /// Converts into the domain input, attributing it to `reporter_id`.
    #[must_use]
    pub fn into_new_incident(self, reporter_id: Option<i64>) -> NewIncident {
        NewIncident {
            incident_type: self.incident_type,
            description: self.description,
            place_name: self.place_name,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            sector_id: self.sector_id,
            photo_url: self.photo_url,
            device_id: self.device_id,
            citizen_email: self.email,
            reporter_id,
        }
    }
}

/// Body of `POST /api/recover-account`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecoverAccountRequest {
    /// Device whose incidents to recover.
    pub device_id: String,
}

/// Response of `POST /api/recover-account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverAccountResponse {
    /// Device the incidents belong to.
    pub device_id: String,
    /// Incidents, newest first.
    pub incidents: Vec<ApiIncident>,
}

/// Body carrying a reason (reject, block).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReasonRequest {
    /// Reason text.
    pub reason: String,
}

/// Body of the complete endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteRequest {
    /// Resolution notes.
    pub notes: String,
}

/// Body of the status override endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusUpdateRequest {
    /// Target status token.
    pub status: String,
    /// Comment. Required by the professional override for `TRAITE` and
    /// `BLOQUE`; the administrator override keeps it only for those two.
    pub comment: Option<String>,
}

/// Body of `POST /api/admin/professionals`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateProfessionalRequest {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub sector_id: i64,
    /// Specialty token, e.g. `ROAD`.
    pub specialty: String,
}

/// Body of `PUT /api/admin/professionals/{id}`. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfessionalRequest {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub phone: Option<String>,
    pub sector_id: Option<i64>,
    pub specialty: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_request_reads_camel_case() {
        let request: DeclareIncidentRequest = serde_json::from_str(
            r#"{
                "incidentType": "Fuite d'eau",
                "latitude": 33.5731,
                "longitude": -7.5898,
                "sectorId": 2,
                "deviceId": "abc",
                "email": "c@example.ma"
            }"#,
        )
        .unwrap();
        let new = request.into_new_incident(Some(4));
        assert_eq!(new.sector_id, 2);
        assert_eq!(new.citizen_email.as_deref(), Some("c@example.ma"));
        assert_eq!(new.reporter_id, Some(4));
    }

    #[test]
    fn missing_reason_defaults_to_blank() {
        let request: ReasonRequest = serde_json::from_str("{}").unwrap();
        assert!(request.reason.is_empty());
    }

    #[test]
    fn search_params_use_type_key() {
        let params: IncidentSearchParams =
            serde_json::from_str(r#"{"type": "Voirie", "sectorId": 1}"#).unwrap();
        assert_eq!(params.incident_type.as_deref(), Some("Voirie"));
        assert_eq!(params.sector_id, Some(1));
    }
}
