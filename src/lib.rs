pub mod chart;
pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod processor;
pub mod provider;
pub mod server;
pub mod utils;
