//! Administration of professional accounts.
//!
//! Professionals are never deleted: deactivation keeps their history and
//! takes them out of assignment.

use std::str::FromStr as _;

use chrono::Utc;
use geoinfo_database::StoreError;
use geoinfo_incident_models::{
    NewProfessional, ProfessionalProfile, ProfessionalUpdate, Role, Specialty, User,
};

use crate::workflow::{optional, required};
use crate::{IncidentWorkflow, TransitionRejection, WorkflowError};

/// Parses a specialty token such as `PUBLIC_LIGHTING`.
///
/// # Errors
///
/// Returns [`WorkflowError::Validation`] for an unknown token.
pub fn parse_specialty(token: &str) -> Result<Specialty, WorkflowError> {
    Specialty::from_str(token.trim())
        .map_err(|_| WorkflowError::Validation(format!("Unknown specialty '{token}'")))
}

impl IncidentWorkflow {
    /// Creates an active, available professional.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::Validation`] if a name is blank, the email is
    ///   malformed or already taken
    /// * [`WorkflowError::NotFound`] if the sector does not exist
    pub async fn create_professional(&self, new: NewProfessional) -> Result<User, WorkflowError> {
        let last_name = required(Some(&new.last_name), "last name")?;
        let first_name = required(Some(&new.first_name), "first name")?;
        let email = required(Some(&new.email), "email")?;
        if !email.contains('@') {
            return Err(WorkflowError::Validation(
                "Professional email is malformed".to_string(),
            ));
        }
        self.require_sector(new.sector_id).await?;

        let user = User {
            id: 0,
            last_name,
            first_name,
            email,
            phone: optional(new.phone.as_deref()),
            role: Role::Professional(ProfessionalProfile {
                sector_id: new.sector_id,
                specialty: new.specialty,
                available: true,
            }),
            active: true,
            created_at: Utc::now(),
        };

        let saved = self
            .store
            .insert_user(user)
            .await
            .map_err(duplicate_email)?;
        log::info!(
            "Professional {} created in sector {} ({})",
            saved.id,
            new.sector_id,
            new.specialty
        );
        Ok(saved)
    }

    /// Applies `update` to a professional. The email is left as is.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the user or the new sector does not
    ///   exist
    /// * [`WorkflowError::InvalidTransition`] if the user is not a
    ///   professional
    /// * [`WorkflowError::Validation`] if a name is set to blank
    pub async fn update_professional(
        &self,
        id: i64,
        update: ProfessionalUpdate,
    ) -> Result<User, WorkflowError> {
        let mut user = self.load_professional(id).await?;
        let Role::Professional(mut profile) = user.role.clone() else {
            return Err(not_a_professional(id));
        };

        if let Some(last_name) = update.last_name.as_deref() {
            user.last_name = required(Some(last_name), "last name")?;
        }
        if let Some(first_name) = update.first_name.as_deref() {
            user.first_name = required(Some(first_name), "first name")?;
        }
        if let Some(phone) = update.phone.as_deref() {
            user.phone = optional(Some(phone));
        }
        if let Some(sector_id) = update.sector_id {
            self.require_sector(sector_id).await?;
            profile.sector_id = sector_id;
        }
        if let Some(specialty) = update.specialty {
            profile.specialty = specialty;
        }
        user.role = Role::Professional(profile);

        let saved = self.store.update_user(user).await?;
        log::info!("Professional {id} updated");
        Ok(saved)
    }

    /// Marks a professional inactive and unavailable.
    ///
    /// Incidents already assigned stay assigned; new assignments are
    /// refused.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the user does not exist
    /// * [`WorkflowError::InvalidTransition`] if the user is not a
    ///   professional
    pub async fn deactivate_professional(&self, id: i64) -> Result<User, WorkflowError> {
        let mut user = self.load_professional(id).await?;
        let Role::Professional(mut profile) = user.role.clone() else {
            return Err(not_a_professional(id));
        };
        profile.available = false;
        user.role = Role::Professional(profile);
        user.active = false;

        let saved = self.store.update_user(user).await?;
        log::info!("Professional {id} deactivated");
        Ok(saved)
    }

    async fn load_professional(&self, id: i64) -> Result<User, WorkflowError> {
        self.store
            .user(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("User", id))
    }

    async fn require_sector(&self, sector_id: i64) -> Result<(), WorkflowError> {
        if self.store.sector_exists(sector_id).await? {
            Ok(())
        } else {
            Err(WorkflowError::not_found("Sector", sector_id))
        }
    }
}

fn not_a_professional(user_id: i64) -> WorkflowError {
    WorkflowError::InvalidTransition {
        id: user_id,
        rejection: TransitionRejection::NotAProfessional { user_id },
    }
}

fn duplicate_email(error: StoreError) -> WorkflowError {
    match error {
        StoreError::Duplicate {
            field: "email",
            value,
            ..
        } => WorkflowError::Validation(format!("Email '{value}' is already in use")),
        other => other.into(),
    }
}
