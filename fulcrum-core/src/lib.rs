pub mod errors;
pub mod models;
pub mod repository;
pub mod session;

pub use errors::{EligibilityReason, StoreError, WorkflowError};
pub use models::{
    Availability, ClaimAction, ClaimRequest, LedgerEntry, LedgerEntryType, Order, OrderLine,
    OrderStatus, PaymentAccount, ProblemDecision, ProblemReport, ProblemStatus, TransitionRecord,
    Warehouse,
};
pub use repository::{LedgerStore, Notifier, OrderStore, StockRepository, Telemetry};
pub use session::{Role, SessionContext};
