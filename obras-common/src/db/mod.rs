//! Store access: initialization, schema management, models, dashboard view

pub mod dashboard;
pub mod init;
pub mod models;
pub mod schema;

pub use dashboard::*;
pub use init::*;
pub use models::*;
pub use schema::{
    assert_no_foreign_key_violations, clear_all, ensure_schema, SchemaReady, CLEAR_ORDER,
    DASHBOARD_VIEW, NOT_CATEGORIZED, NOT_INFORMED,
};
