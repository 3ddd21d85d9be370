pub mod content;
pub mod fetcher;
