//! Qdrant gateway for uni-advisor.
//!
//! Talks to Qdrant over its REST API with the same HTTP client the rest
//! of the workspace uses. Similarity and score-threshold searches run
//! server-side; MMR re-ranking happens client-side in [`search`].

pub mod gateway;
pub mod search;

pub use gateway::QdrantGateway;
