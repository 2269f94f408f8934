use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use playmat_builder::{AppState, Config, create_app, playmat::Compositor, startup_checks};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Overrides `[app] log_level` from the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Compose a local image into a playmat without starting the server
    Compose {
        /// Source image
        input: PathBuf,

        /// Overlay template name (defaults to the configured default overlay)
        #[arg(long)]
        overlay: Option<String>,

        /// Where to write the PNG
        #[arg(short, long, default_value = "playmat.png")]
        output: PathBuf,
    },

    /// List the overlay templates available in the template directory
    Overlays,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;

    // RUST_LOG, then --log-level, then the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level(cli.log_level.as_deref())));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !cli.config.exists() {
        info!("Config file not found at {:?}, using defaults", cli.config);
    }

    config.apply_port_override(std::env::var("PORT").ok().as_deref())?;
    config.validate()?;

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, port, host, quit_after).await,
        Some(Commands::Compose {
            input,
            overlay,
            output,
        }) => compose_file(config, input, overlay, output).await,
        Some(Commands::Overlays) => list_overlays(config),
        None => run_server(config, None, None, None).await,
    }
}

async fn compose_file(
    config: Config,
    input: PathBuf,
    overlay: Option<String>,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let overlay = overlay.unwrap_or_else(|| config.overlays.default_overlay.clone());
    let compositor = Compositor::from_config(&config)?;
    let bytes = tokio::fs::read(&input).await?;

    info!("Composing {:?} with overlay '{}'", input, overlay);
    let png = tokio::task::spawn_blocking(move || compositor.compose(&bytes, &overlay)).await??;
    tokio::fs::write(&output, &png).await?;
    println!("Wrote {} bytes to {}", png.len(), output.display());

    Ok(())
}

fn list_overlays(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let compositor = Compositor::from_config(&config)?;
    let overlays = compositor.overlays().available()?;
    if overlays.is_empty() {
        println!(
            "No overlay templates in {}",
            compositor.overlays().directory().display()
        );
    } else {
        for name in overlays {
            let marker = if name == config.overlays.default_overlay {
                " (default)"
            } else {
                ""
            };
            println!("  {}{}", name, marker);
        }
    }
    Ok(())
}

async fn run_server(
    config: Config,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);

    match startup_checks::perform_startup_checks(&config).await {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    let app_state = AppState::new(config.clone())?;
    let canvas = app_state.compositor.canvas();
    info!(
        "Overlay template directory: {:?}",
        app_state.compositor.overlays().directory()
    );
    info!("Canvas size: {}x{}", canvas.width, canvas.height);

    if config.overlays.preload {
        let compositor = app_state.compositor.clone();
        tokio::task::spawn_blocking(move || compositor.overlays().warm()).await?;
    }

    let app = create_app(app_state);

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
