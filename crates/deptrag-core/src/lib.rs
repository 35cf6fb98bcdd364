//! deptrag-core
//!
//! Domain types, service traits, configuration and the file-system side of the
//! retrieval pipeline: loading department documents and splitting them into
//! chunks. Everything that talks to a model or an index lives in sibling crates.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod model_config;
pub mod traits;
pub mod types;
