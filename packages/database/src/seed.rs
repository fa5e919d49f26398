//! Reference data loaded at startup.
//!
//! The default seed (six municipal sectors) is embedded at compile time via
//! [`include_str!`]. A deployment can point at its own TOML file instead,
//! which may also declare users. Professionals name their sector rather
//! than its ID, since IDs are only known once sectors are inserted.

use std::path::Path;

use chrono::Utc;
use geoinfo_incident_models::{ProfessionalProfile, Role, Sector, Specialty, User};
use serde::Deserialize;

use crate::{Store, StoreError};

/// Seed embedded at compile time.
const DEFAULT_SEED: &str = include_str!("../seed.toml");

/// Parsed seed file.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    /// Sectors to create.
    #[serde(default)]
    pub sectors: Vec<SeedSector>,
    /// Users to create.
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// A sector entry in a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedSector {
    /// Unique name.
    pub name: String,
    /// What the sector covers.
    pub description: Option<String>,
    /// Hex display color.
    pub color: Option<String>,
}

/// A user entry in a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedUser {
    /// Last name.
    pub last_name: String,
    /// First name.
    pub first_name: String,
    /// Unique email.
    pub email: String,
    /// Phone number.
    pub phone: Option<String>,
    /// Role.
    #[serde(flatten)]
    pub role: SeedRole,
}

/// Role of a seeded user.
#[derive(Debug, Deserialize)]
#[serde(tag = "role")]
pub enum SeedRole {
    /// Administrator.
    #[serde(rename = "ADMIN")]
    Admin,
    /// Citizen.
    #[serde(rename = "CITOYEN")]
    Citizen,
    /// Professional attached to the sector with this name.
    #[serde(rename = "PROFESSIONNEL")]
    Professional {
        /// Sector name.
        sector: String,
        /// Technical specialty.
        specialty: Specialty,
    },
}

/// What [`apply`] created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Sectors created.
    pub sectors: usize,
    /// Users created.
    pub users: usize,
}

/// Parses a seed from TOML.
///
/// # Errors
///
/// Returns [`StoreError::Seed`] if the TOML is malformed.
pub fn parse(toml_str: &str) -> Result<Seed, StoreError> {
    Ok(toml::from_str(toml_str)?)
}

/// The embedded default seed.
///
/// # Errors
///
/// Returns [`StoreError::Seed`] if the embedded TOML is malformed.
pub fn default_seed() -> Result<Seed, StoreError> {
    parse(DEFAULT_SEED)
}

/// Reads and parses a seed file.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be read or parsed.
pub fn load(path: &Path) -> Result<Seed, StoreError> {
    parse(&std::fs::read_to_string(path)?)
}

/// Inserts the seed into `store`, skipping sectors whose name and users
/// whose email already exist.
///
/// # Errors
///
/// Returns [`StoreError::Missing`] if a professional names an unknown
/// sector, or any other [`StoreError`] from the store.
pub async fn apply(store: &dyn Store, seed: Seed) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    for entry in seed.sectors {
        let exists = store.sectors().await?.iter().any(|s| s.name == entry.name);
        if exists {
            log::debug!("Sector '{}' already present, skipping", entry.name);
            continue;
        }
        store
            .insert_sector(Sector {
                id: 0,
                name: entry.name,
                description: entry.description,
                color: entry.color,
            })
            .await?;
        report.sectors += 1;
    }

    let sectors = store.sectors().await?;

    for entry in seed.users {
        let exists = store
            .users()
            .await?
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&entry.email));
        if exists {
            log::debug!("User '{}' already present, skipping", entry.email);
            continue;
        }

        let role = match entry.role {
            SeedRole::Admin => Role::Admin,
            SeedRole::Citizen => Role::Citizen,
            SeedRole::Professional { sector, specialty } => {
                let sector_id = sectors
                    .iter()
                    .find(|s| s.name == sector)
                    .map(|s| s.id)
                    .ok_or(StoreError::Missing {
                        entity: "Sector",
                        id: 0,
                    })
                    .inspect_err(|_| {
                        log::error!("Seed user '{}' names unknown sector '{sector}'", entry.email);
                    })?;
                Role::Professional(ProfessionalProfile {
                    sector_id,
                    specialty,
                    available: true,
                })
            }
        };

        store
            .insert_user(User {
                id: 0,
                last_name: entry.last_name,
                first_name: entry.first_name,
                email: entry.email,
                phone: entry.phone,
                role,
                active: true,
                created_at: Utc::now(),
            })
            .await?;
        report.users += 1;
    }

    log::info!(
        "Seeded {} sector(s) and {} user(s)",
        report.sectors,
        report.users
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn default_seed_has_six_sectors() {
        let seed = default_seed().unwrap();
        let names: Vec<&str> = seed.sectors.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Infrastructure",
                "Environnement",
                "Sécurité",
                "Urbanisme",
                "Transport",
                "Santé"
            ]
        );
        assert!(seed.users.is_empty());
    }

    #[tokio::test]
    async fn applying_twice_is_idempotent() {
        let store = MemoryStore::new();
        let first = apply(&store, default_seed().unwrap()).await.unwrap();
        let second = apply(&store, default_seed().unwrap()).await.unwrap();
        assert_eq!(first.sectors, 6);
        assert_eq!(second, SeedReport::default());
        assert_eq!(store.sectors().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn professionals_resolve_their_sector_by_name() {
        let store = MemoryStore::new();
        let seed = parse(
            r#"
            [[sectors]]
            name = "Transport"

            [[users]]
            last_name = "Amrani"
            first_name = "Youssef"
            email = "youssef@example.ma"
            role = "PROFESSIONNEL"
            sector = "Transport"
            specialty = "ROAD"

            [[users]]
            last_name = "Admin"
            first_name = "Root"
            email = "admin@example.ma"
            role = "ADMIN"
            "#,
        )
        .unwrap();

        let report = apply(&store, seed).await.unwrap();
        assert_eq!(report, SeedReport { sectors: 1, users: 2 });

        let pro = store.user(1).await.unwrap().unwrap();
        let profile = pro.professional().unwrap();
        assert_eq!(profile.sector_id, 1);
        assert_eq!(profile.specialty, Specialty::Road);
    }

    #[tokio::test]
    async fn unknown_sector_fails() {
        let store = MemoryStore::new();
        let seed = parse(
            r#"
            [[users]]
            last_name = "Amrani"
            first_name = "Youssef"
            email = "youssef@example.ma"
            role = "PROFESSIONNEL"
            sector = "Nowhere"
            specialty = "ROAD"
            "#,
        )
        .unwrap();
        assert!(matches!(
            apply(&store, seed).await,
            Err(StoreError::Missing { entity: "Sector", .. })
        ));
    }
}
