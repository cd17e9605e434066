use chromatic_clash_server::config::ServerConfig;
use chromatic_clash_server::ws::{app, start_timer_loop, AppState};
use clap::Parser;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let config = ServerConfig::parse();

    let state = AppState::new(config.game_settings());
    start_timer_loop(state.clone());

    let static_dir = config.resolve_static_dir();
    match &static_dir {
        Some(path) => info!(path = %path.display(), "static file root"),
        None => warn!("static file root not found; serving websocket and health check only"),
    }
    let app = app(state, static_dir);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    info!(addr = %bind_addr, "listening");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}
