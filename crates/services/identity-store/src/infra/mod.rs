//! Infrastructure layer - database, sessions and schema.

mod db;
pub mod migrations;
mod persister;
pub mod schema;
pub mod session;
pub mod tables;
pub mod unit_of_work;

pub use db::Database;
pub use migrations::Migrator;
pub use schema::SchemaExport;
pub use session::{Session, SessionFactory};
pub use tables::IdentityTables;
pub use unit_of_work::{SessionUnitOfWork, UnitOfWork, UnitOfWorkState};
