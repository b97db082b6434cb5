pub mod config;
pub mod types;

pub use config::{AccountConfig, BotConfig, GeneratorConfig};
