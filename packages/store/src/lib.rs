//! # dcstruct store
//!
//! Shared state for structural descriptors:
//!
//! - [`PathStore`]: dotted-path addressed model store with namespace roots
//!   and observable cells.
//! - [`ModelCell`]: the observable cell behind a two-way binding.
//! - [`LruCache`]: the bounded cache used for rendered descriptors.
//! - [`global`]: the per-thread shared store and its inspection snapshot.

pub mod cell;
pub mod global;
pub mod lru;
pub mod path_store;

pub use cell::{ModelCell, SubscriptionId};
pub use lru::{LruCache, DEFAULT_CAPACITY};
pub use path_store::{PathStore, StoreEntry, PATH_SEPARATOR};
