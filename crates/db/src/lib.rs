pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{ReferencePipelineSeed, SeedResult};
pub use repositories::{
    RepositoryError, SqlApprovalService, SqlDocumentIndex, SqlProjectStore, SqlStageCatalog,
    SqlTransitionLog,
};
