pub mod api;
pub mod auth_gateway_client;
pub mod command;
pub mod config;
pub mod error;
pub mod response;
pub mod services;
pub mod store;
