pub mod bridge;
pub mod config;
pub mod error;
pub mod fsops;
pub mod interact;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod registry;
