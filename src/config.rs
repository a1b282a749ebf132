//! Configuration management for PMTiles Streamer.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `PMTILES_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use pmtiles_streamer::config::{Cli, Command};
//!
//! match Cli::parse().command {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Check(config) => println!("Checking {}", config.storage.archive_key),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `PMTILES_HOST` - Server bind address (default: 0.0.0.0)
//! - `PMTILES_PORT` - Server port (default: 3000)
//! - `PMTILES_S3_BUCKET` - S3 bucket name (required)
//! - `PMTILES_ARCHIVE_KEY` - Object key of the archive (required)
//! - `PMTILES_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `PMTILES_S3_REGION` - AWS region (default: us-east-1)
//! - `PMTILES_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `PMTILES_LEAF_CACHE` - Leaf directories to cache (default: 64)
//! - `PMTILES_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use clap::{Args, Parser, Subcommand};

use crate::archive::DEFAULT_LEAF_CACHE_CAPACITY;
use crate::server::DEFAULT_CACHE_MAX_AGE;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// PMTiles Streamer - serve map tiles straight from a PMTiles archive in S3.
///
/// Tiles are located with HTTP range requests against the archive's
/// directories; the archive is never downloaded.
#[derive(Parser, Debug, Clone)]
#[command(name = "pmtiles-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Consume the parsed CLI and return the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the tile server
    Serve(ServeConfig),

    /// Verify storage access and print the archive header
    Check(CheckConfig),
}

/// Location of the archive in object storage.
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// S3 bucket name containing the archive.
    #[arg(long, env = "PMTILES_S3_BUCKET")]
    pub s3_bucket: String,

    /// Object key of the archive (e.g. `tiles/planet.pmtiles`).
    #[arg(long, env = "PMTILES_ARCHIVE_KEY")]
    pub archive_key: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, R2, etc.).
    ///
    /// If not specified, uses the default AWS S3 endpoint.
    #[arg(long, env = "PMTILES_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "PMTILES_S3_REGION")]
    pub s3_region: String,
}

impl StorageArgs {
    fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.trim().is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or PMTILES_S3_BUCKET".to_string(),
            );
        }
        if self.archive_key.trim().is_empty() {
            return Err(
                "Archive key is required. Set --archive-key or PMTILES_ARCHIVE_KEY".to_string(),
            );
        }
        Ok(())
    }
}

/// Options for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PMTILES_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PMTILES_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    #[command(flatten)]
    pub storage: StorageArgs,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PMTILES_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Maximum number of decoded leaf directories to keep in memory.
    #[arg(long, default_value_t = DEFAULT_LEAF_CACHE_CAPACITY, env = "PMTILES_LEAF_CACHE")]
    pub leaf_cache: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PMTILES_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;

        if self.leaf_cache == 0 {
            return Err("leaf_cache must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Options for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
