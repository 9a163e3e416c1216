//! Schema models derived from catalog metadata.

pub mod derive;
pub mod model;
pub mod timestamp;
pub mod validate;

pub use derive::derive;
pub use model::*;
pub use timestamp::is_rfc3339;
pub use validate::Payload;
