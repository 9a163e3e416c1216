//! Resource execution and relationship resolution over the catalog.

mod crud;
mod query;
pub mod relations;
pub use crud::{parse_id, ResourceService};
pub use relations::{diff_links, LinkDiff, RelationshipResolver};
