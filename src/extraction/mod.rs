pub mod heuristic;
pub mod literal;
pub mod llm;
pub mod resolver;
pub mod schema;

pub use llm::{LlmClient, LlmExtractor, OpenAiCompatClient};
pub use resolver::{compute_entity_extraction, inject_linking_options, LinkTarget};
pub use schema::{schema, EntitySchema};
