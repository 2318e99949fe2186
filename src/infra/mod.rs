//! Infrastructure adapters for the store collaborator.

pub mod store;
pub use store::InMemoryStore;
