//! Citizen-facing operations: declaring an incident and recovering the
//! incidents of an anonymous device.

use chrono::Utc;
use geoinfo_database::queries;
use geoinfo_incident_models::{Coordinates, Incident, IncidentStatus, NewIncident};
use geoinfo_rate_limit::RateLimiter;

use crate::workflow::{optional, required};
use crate::{IncidentWorkflow, WorkflowError};

impl IncidentWorkflow {
    /// Records a new incident in [`IncidentStatus::Redige`].
    ///
    /// The region is resolved here, once, and never recomputed.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::Validation`] if the type is blank, the
    ///   coordinates are out of range, or the email is malformed
    /// * [`WorkflowError::NotFound`] if the sector does not exist
    pub async fn declare(&self, new: NewIncident) -> Result<Incident, WorkflowError> {
        let incident_type = required(Some(&new.incident_type), "incident type")?;
        let point = Coordinates::new(new.latitude, new.longitude)
            .map_err(|e| WorkflowError::Validation(e.to_string()))?;
        let citizen_email = optional(new.citizen_email.as_deref());
        if citizen_email.as_ref().is_some_and(|e| !e.contains('@')) {
            return Err(WorkflowError::Validation(
                "Reporter email is malformed".to_string(),
            ));
        }

        if !self.store.sector_exists(new.sector_id).await? {
            return Err(WorkflowError::not_found("Sector", new.sector_id));
        }

        let resolution = self
            .resolver
            .resolve(point.latitude, point.longitude)
            .map_err(|e| WorkflowError::Validation(e.to_string()))?;
        if resolution.is_degraded() {
            log::warn!(
                "Incident at ({}, {}) gets region '{}' from {} resolution",
                point.latitude,
                point.longitude,
                resolution.label,
                resolution.method
            );
        }

        let now = Utc::now();
        let incident = Incident {
            id: 0,
            version: 0,
            incident_type,
            description: optional(new.description.as_deref()),
            latitude: point.latitude,
            longitude: point.longitude,
            region: resolution.label,
            place_name: optional(new.place_name.as_deref()),
            address: optional(new.address.as_deref()),
            photo_url: optional(new.photo_url.as_deref()),
            declared_at: now,
            modified_at: now,
            resolved_at: None,
            status: IncidentStatus::Redige,
            reason: None,
            resolution_notes: None,
            sector_id: new.sector_id,
            reporter_id: new.reporter_id,
            assigned_professional_id: None,
            device_id: optional(new.device_id.as_deref()),
            citizen_email,
        };

        let saved = self.store.insert_incident(incident).await?;
        log::info!(
            "Incident {} declared in region '{}' (sector {})",
            saved.id,
            saved.region,
            saved.sector_id
        );
        Ok(saved)
    }

    /// Returns the incidents declared from `device_id`, newest first.
    ///
    /// The attempt is counted against `client_key` before anything is read.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::RateLimited`] if `client_key` is out of attempts
    /// * [`WorkflowError::Validation`] if `device_id` is blank
    /// * [`WorkflowError::NotFound`] if the device has no incidents
    pub async fn recover_account(
        &self,
        limiter: &RateLimiter,
        client_key: &str,
        device_id: &str,
    ) -> Result<Vec<Incident>, WorkflowError> {
        limiter.check_and_record(client_key)?;
        let device_id = required(Some(device_id), "device identifier")?;

        let incidents = queries::incidents_by_device(self.store.as_ref(), &device_id).await?;
        if incidents.is_empty() {
            return Err(WorkflowError::not_found("Incidents for device", device_id));
        }

        log::info!(
            "Recovered {} incident(s) for device {device_id}",
            incidents.len()
        );
        Ok(incidents)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geoinfo_database::Store;
    use geoinfo_database::memory::MemoryStore;
    use geoinfo_incident_models::Sector;
    use geoinfo_rate_limit::RateLimitError;
    use geoinfo_spatial::{RegionIndex, RegionResolver};

    use super::*;

    async fn workflow() -> IncidentWorkflow {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_sector(Sector {
                id: 0,
                name: "Infrastructure".to_string(),
                description: None,
                color: None,
            })
            .await
            .unwrap();
        let resolver = RegionResolver::with_embedded_table(RegionIndex::empty()).unwrap();
        IncidentWorkflow::new(store, Arc::new(resolver))
    }

    fn new_incident() -> NewIncident {
        NewIncident {
            incident_type: "Éclairage public".to_string(),
            description: Some("Lampadaire éteint".to_string()),
            place_name: Some("  ".to_string()),
            latitude: 33.5731,
            longitude: -7.5898,
            sector_id: 1,
            device_id: Some("device-1".to_string()),
            citizen_email: Some("citoyen@example.ma".to_string()),
            ..NewIncident::default()
        }
    }

    #[tokio::test]
    async fn declare_resolves_the_region_once() {
        let workflow = workflow().await;
        let incident = workflow.declare(new_incident()).await.unwrap();

        assert_eq!(incident.id, 1);
        assert_eq!(incident.status, IncidentStatus::Redige);
        assert_eq!(incident.region, "Casablanca-Settat");
        assert_eq!(incident.declared_at, incident.modified_at);
        assert!(incident.place_name.is_none());

        let validated = workflow.validate(incident.id).await.unwrap();
        assert_eq!(validated.region, incident.region);
        assert_eq!(validated.declared_at, incident.declared_at);
    }

    #[tokio::test]
    async fn declare_validates_its_input() {
        let workflow = workflow().await;

        let blank_type = NewIncident {
            incident_type: " ".to_string(),
            ..new_incident()
        };
        let bad_latitude = NewIncident {
            latitude: 95.0,
            ..new_incident()
        };
        let bad_email = NewIncident {
            citizen_email: Some("nobody".to_string()),
            ..new_incident()
        };
        for input in [blank_type, bad_latitude, bad_email] {
            assert!(matches!(
                workflow.declare(input).await,
                Err(WorkflowError::Validation(_))
            ));
        }

        let unknown_sector = NewIncident {
            sector_id: 9,
            ..new_incident()
        };
        assert!(matches!(
            workflow.declare(unknown_sector).await,
            Err(WorkflowError::NotFound { entity: "Sector", .. })
        ));
    }

    #[tokio::test]
    async fn recovery_returns_device_incidents_newest_first() {
        let workflow = workflow().await;
        workflow.declare(new_incident()).await.unwrap();
        workflow.declare(new_incident()).await.unwrap();
        workflow
            .declare(NewIncident {
                device_id: Some("device-2".to_string()),
                ..new_incident()
            })
            .await
            .unwrap();

        let limiter = RateLimiter::default();
        let incidents = workflow
            .recover_account(&limiter, "10.0.0.1", "device-1")
            .await
            .unwrap();
        let ids: Vec<i64> = incidents.iter().map(|i| i.id).collect();
        assert_eq!(ids, [2, 1]);

        assert!(matches!(
            workflow
                .recover_account(&limiter, "10.0.0.1", "device-9")
                .await,
            Err(WorkflowError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn recovery_is_rate_limited_per_client() {
        let workflow = workflow().await;
        let limiter = RateLimiter::default();

        for _ in 0..5 {
            let _ = workflow
                .recover_account(&limiter, "10.0.0.1", "device-1")
                .await;
        }
        assert!(matches!(
            workflow
                .recover_account(&limiter, "10.0.0.1", "device-1")
                .await,
            Err(WorkflowError::RateLimited(RateLimitError::Limited { .. }))
        ));
        assert!(matches!(
            workflow
                .recover_account(&limiter, "10.0.0.2", "device-1")
                .await,
            Err(WorkflowError::NotFound { .. })
        ));
    }
}
