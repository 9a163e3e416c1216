//! Generic data API: CRUD over catalogued PostgreSQL tables, shaped by the `relationships`
//! and `operations` control tables.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{load_catalog, Catalog, EntityBundle, Operation, OperationPermissions, Settings};
pub use error::{ApiError, AppError, CatalogError, ConfigError, FaultKind, StatusMap};
pub use response::{success_many, success_one};
pub use routes::{app, common_routes, resource_routes};
pub use schema::SchemaModel;
pub use service::{RelationshipResolver, ResourceService};
pub use state::{AppState, SharedCatalog};
