pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod invoker;
pub mod metadata;
pub mod route;
pub mod schema;
pub mod server;
pub mod types;
