//! Read-side queries over the [`Store`].
//!
//! Listings are ordered newest first unless stated otherwise. Public
//! listings and public statistics never include drafted or blocked
//! incidents.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use geoinfo_database_models::{
    IncidentQuery, IncidentStatistics, Page, PageRequest, PlatformSummary,
};
use geoinfo_incident_models::{Incident, IncidentStatus, User};

use crate::{Store, StoreError};

/// Window for the average resolution delay.
const DELAY_WINDOW_DAYS: i64 = 30;

fn newest_first(incidents: &mut [Incident]) {
    incidents.sort_by(|a, b| {
        b.declared_at
            .cmp(&a.declared_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn paginate(items: Vec<Incident>, page: PageRequest) -> Page<Incident> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect();
    Page {
        items,
        total,
        limit: page.limit,
        offset: page.offset,
    }
}

async fn filtered(
    store: &dyn Store,
    predicate: impl Fn(&Incident) -> bool + Send,
) -> Result<Vec<Incident>, StoreError> {
    let mut incidents: Vec<Incident> = store
        .incidents()
        .await?
        .into_iter()
        .filter(|i| predicate(i))
        .collect();
    newest_first(&mut incidents);
    Ok(incidents)
}

/// Public incidents, one page at a time.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn public_incidents(
    store: &dyn Store,
    page: PageRequest,
) -> Result<Page<Incident>, StoreError> {
    let incidents = filtered(store, |i| i.status.is_public()).await?;
    Ok(paginate(incidents, page))
}

/// Incidents matching every filter set in `query`.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn search_incidents(
    store: &dyn Store,
    query: &IncidentQuery,
) -> Result<Page<Incident>, StoreError> {
    let incidents = filtered(store, |i| {
        query.status.is_none_or(|s| i.status == s)
            && query.sector_id.is_none_or(|s| i.sector_id == s)
            && query
                .incident_type
                .as_deref()
                .is_none_or(|t| i.incident_type == t)
            && query.region.as_deref().is_none_or(|r| i.region == r)
    })
    .await?;
    Ok(paginate(incidents, query.page))
}

/// Drafted incidents awaiting moderation.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn pending_incidents(store: &dyn Store) -> Result<Vec<Incident>, StoreError> {
    filtered(store, |i| i.status == IncidentStatus::Redige).await
}

/// Validated incidents shown on the public map.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn map_incidents(store: &dyn Store) -> Result<Vec<Incident>, StoreError> {
    filtered(store, |i| i.status == IncidentStatus::Valide).await
}

/// Incidents declared from an anonymous device.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn incidents_by_device(
    store: &dyn Store,
    device_id: &str,
) -> Result<Vec<Incident>, StoreError> {
    filtered(store, |i| i.device_id.as_deref() == Some(device_id)).await
}

/// Incidents declared with a given reporter email.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn incidents_by_email(
    store: &dyn Store,
    email: &str,
) -> Result<Vec<Incident>, StoreError> {
    filtered(store, |i| {
        i.citizen_email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(email))
    })
    .await
}

/// Work list of a professional: incidents of their sector in a status
/// professionals act on.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn professional_incidents(
    store: &dyn Store,
    sector_id: i64,
) -> Result<Vec<Incident>, StoreError> {
    filtered(store, |i| {
        i.sector_id == sector_id && i.status.is_professional_visible()
    })
    .await
}

/// Active professionals, in ID order.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn active_professionals(store: &dyn Store) -> Result<Vec<User>, StoreError> {
    Ok(store
        .users()
        .await?
        .into_iter()
        .filter(|u| u.active && u.professional().is_some())
        .collect())
}

fn increment(map: &mut BTreeMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_default() += 1;
}

/// Breakdown of public incidents by status, sector, region and type.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn statistics(store: &dyn Store) -> Result<IncidentStatistics, StoreError> {
    let sector_names: BTreeMap<i64, String> = store
        .sectors()
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();

    let incidents: Vec<Incident> = store
        .incidents()
        .await?
        .into_iter()
        .filter(|i| i.status.is_public())
        .collect();

    let mut by_status: BTreeMap<IncidentStatus, u64> = IncidentStatus::all()
        .iter()
        .filter(|s| s.is_public())
        .map(|s| (*s, 0))
        .collect();
    let mut by_sector = BTreeMap::new();
    let mut by_region = BTreeMap::new();
    let mut by_type = BTreeMap::new();

    for incident in &incidents {
        *by_status.entry(incident.status).or_default() += 1;
        let sector = sector_names
            .get(&incident.sector_id)
            .map_or("Unknown", String::as_str);
        increment(&mut by_sector, sector);
        increment(&mut by_region, &incident.region);
        increment(&mut by_type, &incident.incident_type);
    }

    let total = incidents.len() as u64;
    let resolved = by_status
        .get(&IncidentStatus::Traite)
        .copied()
        .unwrap_or_default();

    #[allow(clippy::cast_precision_loss)]
    let resolution_rate = if total > 0 {
        (resolved as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    };

    Ok(IncidentStatistics {
        total,
        by_status,
        by_sector,
        by_region,
        by_type,
        resolution_rate,
    })
}

/// Headline figures: incidents past moderation, resolved count, rounded
/// resolution rate, and the mean resolution delay over the last 30 days.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn platform_summary(
    store: &dyn Store,
    now: DateTime<Utc>,
) -> Result<PlatformSummary, StoreError> {
    let incidents = store.incidents().await?;

    let total_incidents = incidents
        .iter()
        .filter(|i| !matches!(i.status, IncidentStatus::Redige | IncidentStatus::Rejete))
        .count() as u64;
    let resolved: Vec<&Incident> = incidents
        .iter()
        .filter(|i| i.status == IncidentStatus::Traite)
        .collect();
    let resolved_incidents = resolved.len() as u64;

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let resolution_rate = if total_incidents > 0 {
        (resolved_incidents as f64 * 100.0 / total_incidents as f64).round() as u32
    } else {
        0
    };

    let since = now - Duration::days(DELAY_WINDOW_DAYS);
    let delays: Vec<i64> = resolved
        .iter()
        .filter_map(|i| i.resolved_at.map(|r| (i.declared_at, r)))
        .filter(|(_, resolved_at)| *resolved_at > since)
        .map(|(declared_at, resolved_at)| (resolved_at - declared_at).num_hours())
        .filter(|hours| *hours > 0)
        .collect();

    Ok(PlatformSummary {
        total_incidents,
        resolved_incidents,
        resolution_rate,
        average_delay: format_delay(&delays),
    })
}

/// Formats the mean of `hours` as hours under a day, else as days.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
fn format_delay(hours: &[i64]) -> String {
    if hours.is_empty() {
        return "N/A".to_string();
    }
    let mean = hours.iter().sum::<i64>() as f64 / hours.len() as f64;
    if mean < 24.0 {
        format!("{}h", mean.round() as i64)
    } else {
        format!("{}j", (mean / 24.0).round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use geoinfo_incident_models::{ProfessionalProfile, Role, Sector, Specialty};

    use super::*;
    use crate::memory::MemoryStore;
    use crate::memory::tests::incident;

    async fn store_with(statuses: &[IncidentStatus]) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_sector(Sector {
                id: 0,
                name: "Infrastructure".to_string(),
                description: None,
                color: None,
            })
            .await
            .unwrap();
        for (offset, status) in statuses.iter().enumerate() {
            let mut i = incident(1, *status);
            i.declared_at = Utc::now() - Duration::minutes(offset as i64);
            store.insert_incident(i).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn public_listing_hides_drafted_and_blocked() {
        let store = store_with(&[
            IncidentStatus::Redige,
            IncidentStatus::Valide,
            IncidentStatus::Bloque,
            IncidentStatus::Traite,
        ])
        .await;

        let page = public_incidents(&store, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        let statuses: Vec<_> = page.items.iter().map(|i| i.status).collect();
        assert_eq!(statuses, [IncidentStatus::Valide, IncidentStatus::Traite]);
    }

    #[tokio::test]
    async fn pagination_windows_the_results() {
        let store = store_with(&[IncidentStatus::Valide; 5]).await;
        let page = public_incidents(
            &store,
            PageRequest {
                limit: 2,
                offset: 4,
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn search_combines_filters() {
        let store = store_with(&[IncidentStatus::Valide, IncidentStatus::Traite]).await;
        let mut other = incident(1, IncidentStatus::Valide);
        other.region = "Oriental".to_string();
        store.insert_incident(other).await.unwrap();

        let query = IncidentQuery {
            status: Some(IncidentStatus::Valide),
            region: Some("Casablanca-Settat".to_string()),
            ..IncidentQuery::default()
        };
        let page = search_incidents(&store, &query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, 1);
    }

    #[tokio::test]
    async fn professional_work_list_skips_drafted_and_rejected() {
        let store = store_with(&[
            IncidentStatus::Redige,
            IncidentStatus::Rejete,
            IncidentStatus::Valide,
            IncidentStatus::Redirige,
        ])
        .await;
        store
            .insert_incident(incident(2, IncidentStatus::Valide))
            .await
            .unwrap();

        let list = professional_incidents(&store, 1).await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|i| i.sector_id == 1));
    }

    #[tokio::test]
    async fn statistics_count_public_incidents_only() {
        let store = store_with(&[
            IncidentStatus::Redige,
            IncidentStatus::Valide,
            IncidentStatus::Traite,
            IncidentStatus::Traite,
            IncidentStatus::Bloque,
        ])
        .await;

        let stats = statistics(&store).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status[&IncidentStatus::Traite], 2);
        assert_eq!(stats.by_status[&IncidentStatus::Redirige], 0);
        assert!(!stats.by_status.contains_key(&IncidentStatus::Redige));
        assert_eq!(stats.by_sector["Infrastructure"], 3);
        assert_eq!(stats.by_region["Casablanca-Settat"], 3);
        assert!((stats.resolution_rate - 66.67).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn summary_reports_average_delay() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for hours in [30, 42] {
            let mut i = incident(1, IncidentStatus::Traite);
            i.declared_at = now - Duration::hours(hours + 1);
            i.resolved_at = Some(now - Duration::hours(1));
            store.insert_incident(i).await.unwrap();
        }
        store
            .insert_incident(incident(1, IncidentStatus::Redige))
            .await
            .unwrap();
        store
            .insert_incident(incident(1, IncidentStatus::Valide))
            .await
            .unwrap();

        let summary = platform_summary(&store, now).await.unwrap();
        assert_eq!(summary.total_incidents, 3);
        assert_eq!(summary.resolved_incidents, 2);
        assert_eq!(summary.resolution_rate, 67);
        assert_eq!(summary.average_delay, "2j");
    }

    #[test]
    fn delay_formatting() {
        assert_eq!(format_delay(&[]), "N/A");
        assert_eq!(format_delay(&[3, 4]), "4h");
        assert_eq!(format_delay(&[48, 96]), "3j");
    }

    #[tokio::test]
    async fn only_active_professionals_are_listed() {
        let store = MemoryStore::new();
        let base = User {
            id: 0,
            last_name: "Tazi".to_string(),
            first_name: "Karim".to_string(),
            email: String::new(),
            phone: None,
            role: Role::Professional(ProfessionalProfile {
                sector_id: 1,
                specialty: Specialty::Road,
                available: true,
            }),
            active: true,
            created_at: Utc::now(),
        };
        for (email, active, role) in [
            ("a@example.ma", true, base.role.clone()),
            ("b@example.ma", false, base.role.clone()),
            ("c@example.ma", true, Role::Admin),
        ] {
            store
                .insert_user(User {
                    email: email.to_string(),
                    active,
                    role,
                    ..base.clone()
                })
                .await
                .unwrap();
        }

        let pros = active_professionals(&store).await.unwrap();
        assert_eq!(pros.len(), 1);
        assert_eq!(pros[0].email, "a@example.ma");
    }
}
