//! Local school-records store: typed CRUD over departments, courses,
//! teachers, students and their dependent rows, with referential cleanup
//! on delete, plus the JSON-lines sidecar that exposes it.

pub mod backup;
pub mod cascade;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod manager;
pub mod schema;

pub use cascade::DeleteReport;
pub use config::{Config, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use manager::{EntityLifecycleManager, ListFilter, Patch};
pub use schema::EntityKind;
