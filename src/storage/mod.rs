//! Registry storage.
//!
//! [`RegistryStore`] is the collaborator boundary the registry loads from at
//! open and flushes into at the end of a run. Two backends are provided:
//! an in-memory store and a JSON snapshot file.

mod json;
mod memory;
mod traits;

pub use json::JsonFileStore;
pub use memory::InMemoryRegistryStore;
pub use traits::{RegistrySnapshot, RegistryStore};
