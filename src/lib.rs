pub mod accounts;
pub mod config;
pub mod description;
pub mod dispatcher;
pub mod error;
pub mod file_store;
pub mod http;
pub mod ingest;
pub mod models;
pub mod transform;
pub mod utils;
pub mod validator;
pub mod websites;

#[cfg(test)]
pub mod mock;
