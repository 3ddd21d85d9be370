pub mod crawl;
pub mod programs;
