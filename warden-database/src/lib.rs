pub mod database;
pub mod impls;

pub use database::{Database, MIGRATOR};
pub use impls::cases::PgAuditSink;
pub use impls::sanctions::PgSanctionStore;
