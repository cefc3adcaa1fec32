pub mod auth;
pub mod config;
pub mod descriptors;
pub mod download;
pub mod fetch;
