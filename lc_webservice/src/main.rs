use clap::Parser;
use lc_sheets::SheetsConfig;
use lc_webservice::{load_config_from_path, router, AppState, ServerConfig, ServerDetails};
use log::{debug, error, info, warn};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "lc_webservice.yaml")]
    config: String,
    /// Overrides the port of the first configured listener.
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_logging(config: &ServerConfig) {
    match &config.log4rs_config {
        Some(path) => {
            if let Err(e) = log4rs::init_file(path, Default::default()) {
                eprintln!("Failed to initialize log4rs from {}: {}. Exiting.", path, e);
                std::process::exit(1);
            }
            info!("log4rs initialized from {}", path);
        }
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        }
    }
}

/// Environment credentials win over the file. A mirror section is only created when
/// the environment supplies a complete service account.
fn apply_sheets_env(config: &mut ServerConfig) {
    match config.sheets.as_mut() {
        Some(sheets) => sheets.apply_env(),
        None => {
            let mut sheets = SheetsConfig::default();
            sheets.apply_env();
            if sheets.has_credentials() {
                config.sheets = Some(sheets);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match load_config_from_path(Path::new(&cli.config)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    info!("Starting lc_webservice...");
    debug!("CLI arguments: {:?}", cli);

    apply_sheets_env(&mut config);
    if let Some(port) = cli.port {
        info!("Overriding listener port from CLI: {}", port);
        match config.servers.first_mut() {
            Some(server) => server.port = port,
            None => config.servers.push(ServerDetails {
                port,
                ..Default::default()
            }),
        }
    }

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {:#}", e);
            std::process::exit(1);
        }
    };
    let app = router(state);

    let mut tasks = Vec::new();
    for server in config.listeners() {
        if server.protocol != "http" {
            warn!(
                "Protocol '{}' on port {} is not supported; terminate TLS in front of the service. Skipping.",
                server.protocol, server.port
            );
            continue;
        }

        let app = app.clone();
        let listener_future = async move {
            let addr = match server.bind_address.parse::<IpAddr>() {
                Ok(ip) => SocketAddr::new(ip, server.port),
                Err(e) => {
                    error!("Invalid bind address {}: {}", server.bind_address, e);
                    return;
                }
            };
            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind {}: {}", addr, e);
                    return;
                }
            };
            info!("Server listening on http://{}", addr);
            if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await {
                error!("Server on {} stopped: {}", addr, e);
            }
        };
        tasks.push(tokio::spawn(listener_future));
    }

    if tasks.is_empty() {
        error!("No usable listeners configured. Exiting.");
        std::process::exit(1);
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!("Listener task failed: {}", e);
        }
    }
}
