pub mod memory;
pub mod postgres;
pub mod record;
pub mod schema;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::{id_to_string, Record, RecordKey, Related};
pub use schema::{RelationDef, Schema, SchemaError, TypeSchema};
pub use store::{EntityStore, Query, StoreError};
