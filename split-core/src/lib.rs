#![forbid(unsafe_code)]

pub mod error;
pub mod config;
pub mod domain;
pub mod partition;

pub mod bucket;
pub mod bucket_fs;
pub mod bucket_mem;

pub mod catalog;

pub mod fanout;
pub mod reassemble;

pub mod store;
pub mod store_factory;

// Re-exports: stable API surface
pub use bucket::{BucketBackend, Buckets};
pub use catalog::{Catalog, Migrator};
pub use config::{Backend, ReadMode, StoreConfig};
pub use domain::{ChunkId, ChunkRow, FileId, FileRecord};
pub use error::{Result, SplitError};
pub use reassemble::{ChunkStream, Download};
pub use store::SplitStore;
pub use store_factory::open_store;
