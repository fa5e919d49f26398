#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the geoinfo platform.
//!
//! ```text
//! geoinfo serve
//! geoinfo resolve --lat 33.57 --lon -7.59 [--regions regions.geojson]
//! geoinfo regions [--regions regions.geojson]
//! ```
//!
//! Running `geoinfo` with no subcommand lets the user pick a tool
//! interactively.

mod tools;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};

#[derive(Parser)]
#[command(name = "geoinfo", about = "Urban incident reporting platform")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server, configured from the environment
    Serve,
    /// Resolve the region containing a point
    Resolve {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// `GeoJSON` region polygons (defaults to `GEOINFO_REGIONS`)
        #[arg(long)]
        regions: Option<PathBuf>,
    },
    /// List the loaded regions
    Regions {
        /// `GeoJSON` region polygons (defaults to `GEOINFO_REGIONS`)
        #[arg(long)]
        regions: Option<PathBuf>,
    },
}

/// Tools offered by the interactive menu.
enum Tool {
    Server,
    Resolve,
    Regions,
}

impl Tool {
    const ALL: &[Self] = &[Self::Server, Self::Resolve, Self::Regions];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Server => "Start server",
            Self::Resolve => "Resolve a point",
            Self::Regions => "List regions",
        }
    }
}

/// Runs the server future on its own actix system.
///
/// The server uses actix-web's runtime, so it runs in a blocking task to
/// avoid nesting tokio runtimes.
async fn on_actix_system<F, Fut>(server: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = std::io::Result<()>>,
{
    tokio::task::spawn_blocking(move || actix_web::rt::System::new().block_on(server())).await??;
    Ok(())
}

fn prompt_coordinate(prompt: &str) -> Result<f64, dialoguer::Error> {
    Input::new().with_prompt(prompt).interact_text()
}

async fn interactive() -> Result<(), Box<dyn std::error::Error>> {
    println!("Geoinfo");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Server => on_actix_system(geoinfo_server::interactive::run).await?,
        Tool::Resolve => {
            let lat = prompt_coordinate("Latitude")?;
            let lon = prompt_coordinate("Longitude")?;
            let resolution = tools::resolve(lat, lon, None)?;
            tools::print_resolution(lat, lon, &resolution);
        }
        Tool::Regions => tools::list_regions(None)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive().await;
    };

    match command {
        Commands::Serve => {
            log::info!("Starting server from environment configuration");
            on_actix_system(geoinfo_server::run_server).await?;
        }
        Commands::Resolve { lat, lon, regions } => {
            let resolution = tools::resolve(lat, lon, regions)?;
            tools::print_resolution(lat, lon, &resolution);
        }
        Commands::Regions { regions } => tools::list_regions(regions)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn resolve_accepts_negative_longitude() {
        let cli = Cli::try_parse_from(["geoinfo", "resolve", "--lat", "33.57", "--lon", "-7.59"])
            .unwrap();
        let Some(Commands::Resolve { lat, lon, regions }) = cli.command else {
            panic!("expected resolve");
        };
        assert!((lat - 33.57).abs() < f64::EPSILON);
        assert!((lon + 7.59).abs() < f64::EPSILON);
        assert!(regions.is_none());
    }

    #[test]
    fn no_subcommand_means_interactive() {
        let cli = Cli::try_parse_from(["geoinfo"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn resolve_requires_both_coordinates() {
        assert!(Cli::try_parse_from(["geoinfo", "resolve", "--lat", "33.57"]).is_err());
    }
}
