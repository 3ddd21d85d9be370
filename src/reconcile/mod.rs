pub mod finalize;
pub mod level;
pub mod matcher;
pub mod names;
pub mod relink;
pub mod store;

pub use finalize::{finalize, FinalizeOutcome, FinalizeRequest, OverrideChoice, ReconcileAction};
pub use relink::{relink_programs_by_level, RelinkStats};
pub use store::{DirectoryStore, MemoryStore};
