pub mod document;
pub mod engine;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;
pub mod typed;

pub use document::{ArrayFilter, Collection, Document, Filter, Update, UpdateOp, UpdateResult};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use traits::DocumentStore;
