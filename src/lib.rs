pub mod api;
pub mod core;
pub mod extraction;
pub mod features;
pub mod reconcile;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::AppState;

// --- Short module paths ---
pub use features::{job_events, jobs};
pub use tools::{crawl, programs};
