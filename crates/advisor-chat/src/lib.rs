//! Chat-side services: usage log, active-collection pointer, the query
//! orchestrator, and the application context that wires everything up.

pub mod context;
pub mod orchestrator;
pub mod store;

pub use context::AdvisorContext;
pub use orchestrator::{ChatOutcome, QueryOrchestrator};
pub use store::SqliteChatStore;
