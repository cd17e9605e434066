pub mod canvas;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod session;
pub mod spawner;
pub mod timers;
pub mod types;
pub mod ws;
