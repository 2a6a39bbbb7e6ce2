pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod schema;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{into_row, PageRequest, Paginated, Repository};
pub use store::{Query, Row, Store, StoreError, StoreResult, TableSpec};
