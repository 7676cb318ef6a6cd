pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use common::{EmailAddress, OrderId, OrderStatus};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    CatalogItem, Customer, ErrorReport, ErrorSeverity, ErrorSource, LineItem, NewOrder, Order,
    PastOrder,
};
pub use store::{CatalogStore, CustomerStore, ErrorLog, IntakeStore, OrderStore};
