pub mod app_config;
pub mod events;
pub mod memory;

pub use events::EventRecorder;
pub use memory::{
    MemoryLedgerStore, MemoryNotifier, MemoryOrderStore, MemoryStockRepository,
};
