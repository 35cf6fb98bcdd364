//! LanceDB-backed department indexes.
//!
//! One index per department lives under `<vector_root>/<department>` and holds
//! a `chunks` table (text, source, position, vector) plus a `meta` table
//! recording which embedder produced it.

pub mod registry;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod writer;

pub use registry::{IndexRegistry, IndexState, Invalidation};
pub use search::{retrieve, DepartmentIndex};
pub use store::IndexStore;
pub use table::IndexMeta;
