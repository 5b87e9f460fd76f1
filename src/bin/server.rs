use campus_relay::app::{build_router, spawn_heartbeat, AppState};
use campus_relay::collision::MapRegistry;
use campus_relay::config::Config;
use campus_relay::relay::RelayState;
use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();

    let maps = match MapRegistry::builtin() {
        Ok(maps) => maps,
        Err(err) => {
            error!("failed to load maps: {err}");
            std::process::exit(1);
        }
    };
    info!("loaded maps: {}", maps.names().collect::<Vec<_>>().join(", "));

    let app = AppState::new(RelayState::new(maps, config.to_options()));
    spawn_heartbeat(app.clone());
    let router = build_router(app);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .await
        .expect("server runtime failed");
}
