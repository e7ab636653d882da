pub mod app;
pub mod authz;
pub mod config;
pub mod db;
pub mod docs;
pub mod editor;
pub mod errors;
pub mod events;
pub mod export;
pub mod extract;
pub mod jwt;
pub mod models;
pub mod response;
pub mod routes;
pub mod store;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{create_app, create_app_with};
pub use config::AppConfig;
