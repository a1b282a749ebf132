//! PMTiles Streamer - serve map tiles from a PMTiles archive in S3.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmtiles_streamer::{
    config::{CheckConfig, Cli, Command, ServeConfig},
    create_s3_client,
    io::{ObjectStore, S3ObjectStore},
    server::{create_router, RouterConfig},
    tile::TileService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let storage = &config.storage;

    info!("PMTiles Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  S3 bucket: {}", storage.s3_bucket);
    info!("  Archive: {}", storage.archive_key);
    if let Some(ref endpoint) = storage.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", storage.s3_region);
    info!(
        "  Cache: {} leaf directories, max-age {}s",
        config.leaf_cache, config.cache_max_age
    );

    let s3_client = create_s3_client(storage.s3_endpoint.as_deref(), &storage.s3_region).await;
    let store = Arc::new(S3ObjectStore::new(s3_client, storage.s3_bucket.clone()));

    // Reachability only; the header is loaded on the first tile request
    info!("");
    info!("Connecting to S3...");
    match store.head(&storage.archive_key).await {
        Ok(object) => {
            info!("  Connected successfully");
            info!(
                "  Archive size: {} bytes, ETag: {}",
                object.size,
                object.etag.as_deref().unwrap_or("-")
            );
        }
        Err(e) => {
            error!("  Failed to reach archive: {}", e);
            error!("");
            error!("  Please check:");
            error!("    - Your AWS credentials are configured correctly");
            error!(
                "    - The object '{}' exists in bucket '{}'",
                storage.archive_key, storage.s3_bucket
            );
            error!("    - The S3 endpoint is correct (if using MinIO/custom S3)");
            return ExitCode::FAILURE;
        }
    }

    let tile_service =
        TileService::with_leaf_cache_capacity(store, &storage.archive_key, config.leaf_cache);
    let object_name = tile_service.object_name().to_string();

    let router = create_router(tile_service, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/metadata", addr);
    info!("    curl http://{}/tiles/0/0/0.pbf", addr);
    info!("    curl -H 'Range: bytes=0-126' http://{}/{}", addr, object_name);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pmtiles_streamer=debug,tower_http=debug"
    } else {
        "pmtiles_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("PMTiles Streamer Configuration Check");
    println!("════════════════════════════════════");
    println!();

    if let Err(e) = config.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let storage = &config.storage;
    println!("✓ Bucket: {}", storage.s3_bucket);
    println!("✓ Archive: {}", storage.archive_key);
    if let Some(ref endpoint) = storage.s3_endpoint {
        println!("✓ Endpoint: {}", endpoint);
    }
    println!("✓ Region: {}", storage.s3_region);
    println!();

    let s3_client = create_s3_client(storage.s3_endpoint.as_deref(), &storage.s3_region).await;
    let store = S3ObjectStore::new(s3_client, storage.s3_bucket.clone());
    let service = TileService::new(store, &storage.archive_key);

    print!("Testing S3 connection... ");
    match service.object_info().await {
        Ok(object) => {
            println!("✓ success");
            println!("  Size: {:.2} MB", object.size as f64 / (1024.0 * 1024.0));
            if let Some(ref etag) = object.etag {
                println!("  ETag: {}", etag);
            }
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - Your AWS credentials are configured correctly");
            println!(
                "  - The object '{}' exists in bucket '{}'",
                storage.archive_key, storage.s3_bucket
            );
            if storage.s3_endpoint.is_some() {
                println!("  - The S3 endpoint is correct and reachable");
            }
            return ExitCode::FAILURE;
        }
    }

    println!();
    print!("Reading archive header... ");
    let header = match service.header().await {
        Ok(header) => {
            println!("✓ valid");
            header
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("  Spec version: {}", header.spec_version);
    println!("  Tile type: {:?}", header.tile_type);
    println!("  Tile compression: {}", header.tile_compression);
    println!("  Internal compression: {}", header.internal_compression);
    println!("  Zoom: {}-{}", header.min_zoom, header.max_zoom);
    println!(
        "  Bounds: {:.4},{:.4} {:.4},{:.4}",
        header.min_lon, header.min_lat, header.max_lon, header.max_lat
    );
    println!(
        "  Center: {:.4},{:.4} @ z{}",
        header.center_lon, header.center_lat, header.center_zoom
    );
    if header.num_addressed_tiles > 0 {
        println!("  Addressed tiles: {}", header.num_addressed_tiles);
    }

    println!();
    println!("════════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
