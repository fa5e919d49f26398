#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident persistence for the geoinfo platform.
//!
//! The [`Store`] trait is the persistence boundary the workflow talks to:
//! load by id, insert, and versioned update for incidents, plus the sector
//! and user reference data. Updates are optimistic: a save carrying a stale
//! [`Incident::version`] is refused with [`StoreError::Conflict`], so two
//! concurrent transitions from the same predecessor state cannot both land.
//!
//! [`memory::MemoryStore`] is the in-process implementation. Read-side
//! listings and statistics live in [`queries`]; default reference data in
//! [`seed`].

pub mod memory;
pub mod queries;
pub mod seed;

use async_trait::async_trait;
use geoinfo_incident_models::{Incident, Sector, User};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record to update does not exist.
    #[error("{entity} {id} does not exist")]
    Missing {
        /// Kind of record.
        entity: &'static str,
        /// Requested ID.
        id: i64,
    },

    /// The record was modified since it was loaded.
    #[error("Incident {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        /// Incident ID.
        id: i64,
        /// Version the caller loaded.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },

    /// A unique field is already taken.
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        /// Kind of record.
        entity: &'static str,
        /// Unique field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// Seed data could not be parsed.
    #[error("Seed error: {0}")]
    Seed(#[from] toml::de::Error),

    /// Seed file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence collaborator for incidents and their reference data.
#[async_trait]
pub trait Store: Send + Sync {
    /// Loads an incident by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn incident(&self, id: i64) -> Result<Option<Incident>, StoreError>;

    /// Returns every incident, in ID order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn incidents(&self) -> Result<Vec<Incident>, StoreError>;

    /// Inserts a new incident. The store assigns the ID and sets the
    /// version to 1; whatever the caller put in those fields is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn insert_incident(&self, incident: Incident) -> Result<Incident, StoreError>;

    /// Saves a modified incident and returns it with its version bumped.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Missing`] if no incident has this ID
    /// * [`StoreError::Conflict`] if `incident.version` is stale
    async fn update_incident(&self, incident: Incident) -> Result<Incident, StoreError>;

    /// Loads a sector by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn sector(&self, id: i64) -> Result<Option<Sector>, StoreError>;

    /// Returns every sector, in ID order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn sectors(&self) -> Result<Vec<Sector>, StoreError>;

    /// Inserts a sector under a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the name is taken.
    async fn insert_sector(&self, sector: Sector) -> Result<Sector, StoreError>;

    /// Loads a user by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn user(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Returns every user, in ID order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn users(&self) -> Result<Vec<User>, StoreError>;

    /// Inserts a user under a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the email is taken.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    /// Replaces a stored user.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Missing`] if no user has this ID
    /// * [`StoreError::Duplicate`] if another user has the email
    async fn update_user(&self, user: User) -> Result<User, StoreError>;

    /// Whether a sector with this ID exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn sector_exists(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.sector(id).await?.is_some())
    }
}
