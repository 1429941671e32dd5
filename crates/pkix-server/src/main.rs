use clap::Parser;
use pkix_server::{Config, Mode, PkixServer};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// PKIX Server - OCSP responder and forwarder (RFC 6960, RFC 5019)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "pkix-server")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "pkix.json")]
    config_path: String,

    /// Validate configuration and exit (doesn't start server)
    #[arg(short, long)]
    validate: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load or create configuration (without logging first)
    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::registry()
                .with(EnvFilter::new("info"))
                .with(tracing_subscriber::fmt::layer())
                .init();

            if cli.validate {
                eprintln!("Configuration validation failed!");
                eprintln!("   Error: {}", e);
                process::exit(1);
            }

            if std::path::Path::new(&cli.config_path).exists() {
                error!("Could not load config file {}: {}", cli.config_path, e);
                process::exit(1);
            }

            warn!("Config file {} not found", cli.config_path);
            info!("Creating example configuration at: {}", cli.config_path);

            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }

            info!("Please edit {} and restart the server", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        println!("Configuration validated successfully!");
        println!();
        println!("Configuration summary:");
        println!("  Listen: {}:{}", config.listen_address, config.listen_port);
        println!("  Mode: {:?}", config.mode);
        println!("  Path prefix: {}", config.path_prefix);
        println!("  Allowed methods: {}", config.allowed_methods.join(", "));
        println!("  Log level: {}", config.log_level.as_deref().unwrap_or("info"));
        match config.mode {
            Mode::Responder => {
                if let Some(store) = &config.store {
                    println!("  Store: {}", store.base_dir.display());
                }
                match config.max_age {
                    Some(max_age) => println!("  Max age: {}s", max_age),
                    None => println!("  Max age: until nextUpdate"),
                }
            }
            Mode::Forwarder => {
                if let Some(upstream) = &config.upstream {
                    println!("  Upstream: {} {}", upstream.method, upstream.url);
                    println!(
                        "  Timeout: {}s, retries: {} every {}ms",
                        upstream.timeout_secs, upstream.max_retries, upstream.retry_interval_ms
                    );
                }
            }
        }
        process::exit(0);
    }

    let log_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("PKIX Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path);
    info!("Mode: {:?}", config.mode);

    let server = match PkixServer::from_config(&config) {
        Ok(srv) => srv,
        Err(e) => {
            error!("Failed to create server: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
