pub mod client;
pub mod config;
pub mod render;
pub mod table;
pub mod telemetry;
pub mod terminal;
