pub mod api;
pub mod bootstrap;
pub mod cases;
pub mod comments;
pub mod config;
pub mod database;
pub mod error;
pub mod messaging;
pub mod node;
pub mod profiles;
pub mod reactions;
pub mod stats;
pub mod telemetry;
pub mod trending;
pub mod utils;
