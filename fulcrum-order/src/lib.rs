pub mod claims;
pub mod collection;
pub mod matching;
pub mod mediator;
pub mod settlement;
pub mod state;

pub use claims::{ClaimResolution, UnderdeliveredLine};
pub use collection::{AvailabilityCheck, CollectionWorkflow};
pub use matching::{FirstMatchSelector, WarehouseCheck, WarehouseSelector};
pub use mediator::{DecisionOutcome, ExceptionMediator, MatchOutcome};
pub use settlement::PaymentSettlement;
pub use state::OrderStateMachine;
