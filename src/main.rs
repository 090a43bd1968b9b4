use actix_files::Files;
use actix_server::ServerHandle;
use actix_web::{App, HttpServer, web::Data};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use homebase_setup::{
    api::Api,
    auth_gateway_client::AuthGatewayClient,
    config::AppConfig,
    services::{
        connectivity::LocalAddressProbe,
        mode::SystemdModeSwitch,
        network::WpaSupplicantApplier,
        provisioning::{Provisioner, ProvisionerSettings},
    },
    store::JsonStore,
};
use log::{debug, error, info};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};

type UiApi = Api<WpaSupplicantApplier, LocalAddressProbe, AuthGatewayClient, SystemdModeSwitch>;

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    debug!("configuration: {config:?}");

    let api = create_api(&config).context("failed to create api")?;

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let (server_handle, server_task) = run_server(api, &config)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
        },
    }

    info!("shutting down");
    server_handle.stop(true).await;
    info!("shutdown complete");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

fn create_api(config: &AppConfig) -> Result<UiApi> {
    let store = JsonStore::new(&config.paths.state_file, &config.paths.wifi_file);

    let applier = WpaSupplicantApplier::new(
        &config.network.wpa_supplicant_conf,
        &config.network.interface,
        &config.network.country,
        config.network.command_timeout,
    );
    let probe = LocalAddressProbe::new(config.network.ignored_interfaces.clone());
    let gateway = AuthGatewayClient::new(&config.gateway)?;
    let mode_switch = SystemdModeSwitch::new(config.mode.command_timeout);

    let settings = ProvisionerSettings {
        settle_interval: config.network.settle_interval,
        normal_service: config.mode.normal_service.clone(),
        setup_service: config.mode.setup_service.clone(),
    };

    Ok(UiApi::new(Provisioner::new(
        store,
        applier,
        probe,
        gateway,
        mode_switch,
        settings,
    )))
}

fn run_server(
    api: UiApi,
    config: &AppConfig,
) -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let ui_dir = config.server.ui_dir.clone();
    let bind = (config.server.bind_address, config.server.port);

    info!("starting server on {}:{}", bind.0, bind.1);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(api.clone()))
            .configure(UiApi::configure)
            .service(Files::new("/", &ui_dir).index_file("index.html"))
    })
    .bind(bind)
    .context("failed to bind server")?
    .disable_signals()
    .run();

    Ok((server.handle(), tokio::spawn(server)))
}
