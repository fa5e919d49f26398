//! Region tools run straight from the command line.

use std::path::PathBuf;

use geoinfo_server::{ServerConfig, load_regions};
use geoinfo_spatial::{RegionLoadError, RegionResolver, Resolution, ResolveError};

/// Errors from the region tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Reference data could not be loaded.
    #[error(transparent)]
    Load(#[from] RegionLoadError),

    /// Coordinates were rejected.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// The polygons file to use: `explicit` if given, else `GEOINFO_REGIONS`.
fn regions_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| ServerConfig::from_env().regions_path)
}

fn resolver(regions: Option<PathBuf>) -> Result<RegionResolver, ToolError> {
    let path = regions_path(regions);
    let index = load_regions(path.as_deref());
    Ok(RegionResolver::with_embedded_table(index)?)
}

/// Resolves the region label for a point.
///
/// # Errors
///
/// * [`ToolError::Load`] if the fallback table is malformed
/// * [`ToolError::Resolve`] if the coordinates are out of range
pub fn resolve(
    latitude: f64,
    longitude: f64,
    regions: Option<PathBuf>,
) -> Result<Resolution, ToolError> {
    Ok(resolver(regions)?.resolve(latitude, longitude)?)
}

/// Prints the regions loaded from `regions`.
///
/// # Errors
///
/// Returns [`ToolError::Load`] if the fallback table is malformed.
pub fn list_regions(regions: Option<PathBuf>) -> Result<(), ToolError> {
    let resolver = resolver(regions)?;
    let index = resolver.index();

    if index.is_empty() {
        println!("No regions loaded.");
        return Ok(());
    }

    println!("{:<8} NAME", "CODE");
    println!("{}", "-".repeat(48));
    for region in index.regions() {
        println!("{:<8} {}", region.code.as_deref().unwrap_or("-"), region.name);
    }
    println!(
        "\n{} region(s), {} with geometry",
        index.len(),
        index.with_geometry()
    );
    Ok(())
}

/// Prints a resolution the way both the subcommand and the menu show it.
pub fn print_resolution(latitude: f64, longitude: f64, resolution: &Resolution) {
    println!(
        "({latitude}, {longitude}) -> {} [{}]",
        resolution.label, resolution.method
    );
}
