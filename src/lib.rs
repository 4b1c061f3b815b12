// Public API for integration tests and the server binary

pub mod advance;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
