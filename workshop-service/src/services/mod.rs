pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod workshop;

pub use database::PgStore;
pub use memory::MemoryStore;
pub use store::Store;
pub use workshop::WorkshopService;
