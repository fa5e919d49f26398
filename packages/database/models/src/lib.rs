#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident query parameters and aggregate statistics rows.
//!
//! These types describe what callers ask the store for and the shapes of
//! aggregated answers. They are distinct from the API response types in
//! `geoinfo_server_models`.

use std::collections::BTreeMap;

use geoinfo_incident_models::IncidentStatus;
use serde::{Deserialize, Serialize};

/// Default page size when a caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Filters for searching incidents. Every filter is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentQuery {
    /// Exact status.
    pub status: Option<IncidentStatus>,
    /// Sector ID.
    pub sector_id: Option<i64>,
    /// Exact type tag.
    pub incident_type: Option<String>,
    /// Exact region name.
    pub region: Option<String>,
    /// Page window.
    pub page: PageRequest,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of results to return.
    pub limit: u32,
    /// Number of results to skip.
    pub offset: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Results in this page.
    pub items: Vec<T>,
    /// Total matches across all pages.
    pub total: u64,
    /// Requested limit.
    pub limit: u32,
    /// Requested offset.
    pub offset: u32,
}

/// Breakdown of public incidents.
///
/// Drafted and blocked incidents are excluded from every count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentStatistics {
    /// Number of public incidents.
    pub total: u64,
    /// Count per status.
    pub by_status: BTreeMap<IncidentStatus, u64>,
    /// Count per sector name.
    pub by_sector: BTreeMap<String, u64>,
    /// Count per region name.
    pub by_region: BTreeMap<String, u64>,
    /// Count per type tag.
    pub by_type: BTreeMap<String, u64>,
    /// Percentage of public incidents that are resolved, two decimals.
    pub resolution_rate: f64,
}

/// Headline figures for the platform landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSummary {
    /// Incidents past moderation (everything except drafted and rejected).
    pub total_incidents: u64,
    /// Resolved incidents.
    pub resolved_incidents: u64,
    /// Rounded percentage of resolved incidents.
    pub resolution_rate: u32,
    /// Mean declaration-to-resolution delay over the last 30 days, as
    /// `"{h}h"`, `"{d}j"` or `"N/A"`.
    pub average_delay: String,
}
