//! Progressive-disclosure skill loading
//!
//! Level 1 is the catalog (always loaded), Level 2 a skill's full document,
//! Level 3 its reference documents. Levels 2 and 3 are fetched on demand and
//! memoized for the rest of the run.

mod cache;
mod catalog;
mod front_matter;
mod store;

pub use cache::{
    CapabilityDocument, LoadKind, LoadRecord, ReferenceDocument, SkillCache, SkillSource,
};
pub use catalog::{Catalog, CatalogEntry};
pub use store::{DocumentStore, FsDocumentStore};

#[cfg(test)]
pub(crate) use cache::tests::{cache_over, source_over, MemoryStore};
