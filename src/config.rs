use std::path::PathBuf;

use clap::Parser;

use crate::constants::{
    CANVAS_HEIGHT, CANVAS_WIDTH, COUNTDOWN_START, GAME_DURATION_SECS, MAX_PLAYERS,
    MIN_PLAYERS_TO_START, POWERUP_SPAWN_INTERVAL_MS,
};

/// Per-room game parameters, shared by every room a coordinator creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub game_duration_secs: u32,
    pub powerup_interval_ms: u64,
    pub countdown_start: u32,
    pub max_players: usize,
    pub min_players_to_start: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            game_duration_secs: GAME_DURATION_SECS,
            powerup_interval_ms: POWERUP_SPAWN_INTERVAL_MS,
            countdown_start: COUNTDOWN_START,
            max_players: MAX_PLAYERS,
            min_players_to_start: MIN_PLAYERS_TO_START,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Chromatic Clash territory-painting game server")]
pub struct ServerConfig {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Directory with the browser client; `public/` is tried when unset.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
    #[arg(long, default_value_t = CANVAS_WIDTH, value_parser = clap::value_parser!(u32).range(1..=4096))]
    pub canvas_width: u32,
    #[arg(long, default_value_t = CANVAS_HEIGHT, value_parser = clap::value_parser!(u32).range(1..=4096))]
    pub canvas_height: u32,
    #[arg(long, default_value_t = GAME_DURATION_SECS, value_parser = clap::value_parser!(u32).range(1..=3600))]
    pub game_seconds: u32,
    #[arg(long, default_value_t = POWERUP_SPAWN_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(100..))]
    pub powerup_interval_ms: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            game_duration_secs: self.game_seconds,
            powerup_interval_ms: self.powerup_interval_ms,
            ..GameSettings::default()
        }
    }

    pub fn resolve_static_dir(&self) -> Option<PathBuf> {
        if let Some(path) = &self.static_dir {
            if path.join("index.html").is_file() {
                return Some(path.clone());
            }
        }

        let candidates = [PathBuf::from("public"), PathBuf::from("../public")];
        candidates
            .into_iter()
            .find(|path| path.join("index.html").is_file())
    }
}
