pub mod cache;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod export;
pub mod inventory;
pub mod io;
pub mod layer;
pub mod metadata;
pub mod paths;
pub mod pipeline;
pub mod reference;
pub mod tower;
pub mod types;
pub mod upstream;
pub mod xlr;

#[cfg(test)]
mod fakes;

pub use error::{BoltError, Result};
