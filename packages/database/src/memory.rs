//! In-process [`Store`] implementation.
//!
//! All tables sit behind one `tokio` `RwLock`. An update takes the write
//! lock, compares versions, and swaps the record in a single critical
//! section, which is what makes the optimistic check race-free.

use std::collections::BTreeMap;

use async_trait::async_trait;
use geoinfo_incident_models::{Incident, Sector, User};
use tokio::sync::RwLock;

use crate::{Store, StoreError};

#[derive(Default)]
struct Tables {
    incidents: BTreeMap<i64, Incident>,
    sectors: BTreeMap<i64, Sector>,
    users: BTreeMap<i64, User>,
    next_incident_id: i64,
    next_sector_id: i64,
    next_user_id: i64,
}

/// Store that keeps everything in memory for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[async_trait]
impl Store for MemoryStore {
    async fn incident(&self, id: i64) -> Result<Option<Incident>, StoreError> {
        Ok(self.tables.read().await.incidents.get(&id).cloned())
    }

    async fn incidents(&self) -> Result<Vec<Incident>, StoreError> {
        Ok(self.tables.read().await.incidents.values().cloned().collect())
    }

    async fn insert_incident(&self, mut incident: Incident) -> Result<Incident, StoreError> {
        let mut tables = self.tables.write().await;
        incident.id = next_id(&mut tables.next_incident_id);
        incident.version = 1;
        tables.incidents.insert(incident.id, incident.clone());
        Ok(incident)
    }

    async fn update_incident(&self, mut incident: Incident) -> Result<Incident, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.incidents.get_mut(&incident.id) else {
            return Err(StoreError::Missing {
                entity: "Incident",
                id: incident.id,
            });
        };

        if stored.version != incident.version {
            return Err(StoreError::Conflict {
                id: incident.id,
                expected: incident.version,
                found: stored.version,
            });
        }

        incident.version += 1;
        *stored = incident.clone();
        Ok(incident)
    }

    async fn sector(&self, id: i64) -> Result<Option<Sector>, StoreError> {
        Ok(self.tables.read().await.sectors.get(&id).cloned())
    }

    async fn sectors(&self) -> Result<Vec<Sector>, StoreError> {
        Ok(self.tables.read().await.sectors.values().cloned().collect())
    }

    async fn insert_sector(&self, mut sector: Sector) -> Result<Sector, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.sectors.values().any(|s| s.name == sector.name) {
            return Err(StoreError::Duplicate {
                entity: "Sector",
                field: "name",
                value: sector.name,
            });
        }
        sector.id = next_id(&mut tables.next_sector_id);
        tables.sectors.insert(sector.id, sector.clone());
        Ok(sector)
    }

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Duplicate {
                entity: "User",
                field: "email",
                value: user.email,
            });
        }
        user.id = next_id(&mut tables.next_user_id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::Missing {
                entity: "User",
                id: user.id,
            });
        }
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Duplicate {
                entity: "User",
                field: "email",
                value: user.email,
            });
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}
