use std::{net::SocketAddr, path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use redirector::{
    adapters::{HttpClientAdapter, HttpHandler, build_router},
    config::{ServerConfig, ServerConfigValidator, load_config},
    core::{ForwardingEngine, RouteTable, TlsTrustPolicy},
    ports::http_client::HttpClient,
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Optional configuration file; environment variables override its values
    #[clap(short, long, global = true)]
    config: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate the effective configuration (file + environment)
    Validate {
        /// Print the effective configuration as JSON
        #[clap(long)]
        dump: bool,
    },
    /// Write a configuration file with the default values
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "redirector.toml")]
        output: String,
    },
    /// Start the redirector (default)
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config_path = args.config.as_deref();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Validate { dump } => validate_config_command(config_path, dump).await,
        Commands::Init { output } => init_config_command(&output).await,
        Commands::Serve => serve(config_path).await,
    }
}

async fn serve(config_path: Option<&str>) -> Result<()> {
    let provider = rustls::crypto::aws_lc_rs::default_provider();
    let provider_installed = rustls::crypto::CryptoProvider::install_default(provider).is_ok();

    let config = load_config(config_path)
        .await
        .context("Failed to load configuration")?;

    tracing_setup::init_tracing(&config.log_level, config.log_format)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    if !provider_installed {
        tracing::warn!("A rustls crypto provider was already installed; keeping it");
    }

    ServerConfigValidator::validate(&config).context("Invalid configuration")?;

    let routes = RouteTable::from_config(&config).context("Failed to build route table")?;

    let verified_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(TlsTrustPolicy::Verified)
            .context("Failed to create HTTP client adapter")?,
    );
    let insecure_client: Arc<dyn HttpClient> = if config.allow_insecure_ssl {
        tracing::warn!(
            "ALLOW_INSECURE_SSL is set: certificates of {} will not be verified",
            config.web_server_url
        );
        Arc::new(
            HttpClientAdapter::new(TlsTrustPolicy::Insecure)
                .context("Failed to create insecure HTTP client adapter")?,
        )
    } else {
        verified_client.clone()
    };

    let engine = Arc::new(ForwardingEngine::new(routes, verified_client, insecure_client));
    let app = build_router(HttpHandler::new(engine, config.max_body_bytes), &config);

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Redirector listening on {}", addr);
    println!("Redirector listening on {addr}");

    let shutdown_signal = graceful_shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal.wait_for_shutdown_signal().await;
    })
    .await
    .context("Server error")?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate the effective configuration and exit
async fn validate_config_command(config_path: Option<&str>, dump: bool) -> Result<()> {
    match config_path {
        Some(path) => {
            println!("🔍 Validating configuration file: {path} (plus environment)");
            if !Path::new(path).exists() {
                eprintln!("❌ Error: Configuration file '{path}' not found");
                std::process::exit(1);
            }
        }
        None => println!("🔍 Validating configuration from environment"),
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            print_summary(&config);
            if dump {
                println!();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .context("Failed to serialize configuration")?
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure all upstream URLs start with http:// or https://");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            println!("   • Use durations like '10s' or '1m 30s' for timeouts");
            println!("   • Keep route names distinct and outside the web wildcard");
            std::process::exit(1);
        }
    }
}

fn print_summary(config: &ServerConfig) {
    println!("📋 Configuration Summary:");
    println!("   • Listen Address: {}", config.listen_addr);
    println!(
        "   • GET  {} -> {} ({})",
        config.mount_path(&config.teamserver_get_route),
        config.teamserver_get_url,
        config.get_timeout
    );
    println!(
        "   • POST {} -> {} ({})",
        config.mount_path(&config.teamserver_post_route),
        config.teamserver_post_url,
        config.post_timeout
    );
    println!(
        "   • ANY  {}/* -> {} ({})",
        config.mount_path(&config.web_route_base),
        config.web_server_url,
        config.web_timeout
    );
    println!("   • Insecure TLS to web upstream: {}", config.allow_insecure_ssl);
}

/// Initialize a new configuration file
async fn init_config_command(output: &str) -> Result<()> {
    let path = Path::new(output);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{output}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Redirector configuration
# Every key can be overridden by the upper-cased environment variable,
# e.g. TEAMSERVER_GET_URL or ALLOW_INSECURE_SSL.

listen_addr = "0.0.0.0:8080"
# Mount all routes under a prefix, e.g. "api" -> /api/get
route_prefix = ""

# Upstreams
teamserver_get_url = "https://your-c2-domain.com/api/get"
teamserver_post_url = "https://your-c2-domain.com/api/post"
web_server_url = "http://example.com"
# Skip certificate checks towards web_server_url only
allow_insecure_ssl = false

# Route names
teamserver_get_route = "get"
teamserver_post_route = "post"
web_route_base = "web"

# Per-route upstream timeouts
get_timeout = "10s"
post_timeout = "15s"
web_timeout = "20s"

max_body_bytes = 10485760

log_level = "info"
# "json" or "console"
log_format = "json"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {output}");
    println!("   Run 'redirector --config {output} serve' to start the server");
    Ok(())
}
