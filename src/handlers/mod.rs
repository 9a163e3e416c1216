//! HTTP handlers for the generic resource surface.

pub mod path;
pub mod resource;
pub use path::{authorize, parse_read_path, parse_write_path, ResourcePath};
