// Community Hub - profiles, follow graph, content and feeds over a document store

// Data model and validation
pub mod models;

// Store backends, ids, reconciliation and request identity
pub mod infrastructure;

// Domain services
pub mod services;

// HTTP surface
pub mod api;
pub mod app_state;

// Common utilities
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
