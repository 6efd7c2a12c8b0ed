//! yuow core: a unit-of-work, repository and data-mapper kernel.
//!
//! Application code mutates plain domain values; a [`UnitOfWork`] runs it
//! inside a transaction, tracks the entities it loads or adds through
//! [`Repository`] identity maps, and writes the differences back with
//! optimistic version checks. Conflicting attempts are re-run.
//!
//! ```ignore
//! let customers = Schema::<Customer>::new(
//!     PropertyMap::new().column("state.id", "id").column("state.name", "name"),
//!     SchemaOptions::new("customers", "state.id").versioned(),
//! )?
//! .create_repository();
//!
//! UnitOfWork::new(db).run(|ctx| {
//!     let repo = ctx.get_repository(&customers);
//!     if let Some(customer) = repo.find_by_identity("A")? {
//!         customer.borrow_mut().rename("Y");
//!     }
//!     Ok(())
//! })?;
//! ```

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod identity;
pub mod logging_facility;
pub mod mapper;
pub mod path;
pub mod property;
pub mod provider;
pub mod query;
pub mod repository;
pub mod schema;
pub mod state;
pub mod transaction;
pub mod unit_of_work;
pub mod version;

// Re-exported for the logging macros
pub use yuow_core_types as core_types;

pub use config::{UowConfig, UowOptions};
pub use context::Context;
pub use errors::{ErrorKind, PersistenceError, PersistenceOperation, Result, UowError};
pub use identity::Identity;
pub use mapper::{DataMapper, Entity, EntityDataMapper, Hydrated};
pub use property::{BoolColumn, Column, JsonColumn, MappedColumn, Property, PropertyMap, TimestampColumn};
pub use provider::{Database, DbTransaction, Executor, IsolationLevel};
pub use query::{Comparison, Condition, Filter, Order, Record, Select};
pub use repository::{
    track, EntityState, Repository, RepositoryConstructor, RepositoryEvent, RepositoryEventKind,
    Tracked,
};
pub use schema::{EntityRepository, Schema, SchemaOptions, VersionColumn};
pub use state::SharedState;
pub use transaction::{Transaction, TransactionPhase};
pub use unit_of_work::{RetryPolicy, UnitOfWork};
pub use version::VersionStamp;
