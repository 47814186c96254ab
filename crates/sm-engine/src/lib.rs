//! Session engine for snowmock.
//!
//! Executes Snowflake-dialect statements against an embedded DuckDB,
//! maintaining the metadata catalog, stages, sessions, and cursors that
//! shape results the way the warehouse would.

pub mod batch;
pub mod bulk;
pub mod catalog;
mod copy;
pub mod cursor;
pub mod error;
pub mod instance;
pub mod macros;
pub mod rowtype;
pub mod session;
pub mod stage;
pub mod value;
pub mod variables;

pub use cursor::Cursor;
pub use error::{EngineError, EngineResult};
pub use instance::{Instance, InstanceOptions, ParamStyle};
pub use rowtype::ColumnInfo;
pub use session::Connection;
pub use value::Value;

/// Open a default instance and connect in one step.
pub fn connect(database: Option<&str>, schema: Option<&str>) -> EngineResult<(Instance, Connection)> {
    let instance = Instance::open()?;
    let conn = instance.connect(database, schema)?;
    Ok((instance, conn))
}
