//! Guarded multi-step transaction workflow engine
//!
//! A workflow validates its inputs, then runs each step through build, wallet
//! signature, broadcast and confirmation. Outputs of confirmed steps feed later
//! steps through a write-once context. A failure halts the run; the progress it
//! made is kept so that re-running the same request resumes where it stopped.

pub mod builder;
pub mod classifier;
pub mod driver;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod single_flight;
pub mod state;
pub mod validator;

// Re-exports
pub use builder::{StepBuilder, TransactionPlan};
pub use classifier::{classify, classify_message, ClassifiedError, ErrorKind};
pub use driver::{ConfirmationOutcome, Driver, DriverSettings, StepFailure};
pub use ledger::{Checkpoint, LedgerEntry, LedgerKey, ResumeLedger, UnresolvedBroadcast, DEFAULT_LEDGER_TTL};
pub use orchestrator::{
    EngineError, StepAction, StepDescriptor, StepEffect, StepEnv, UploadRequest, WorkflowDefinition,
    WorkflowEngine,
};
pub use single_flight::{FlightGuard, SingleFlight};
pub use state::{
    ContextKey, ContextUpdates, ContextValue, Feature, StepOutcome, StepRecord, WorkflowContext,
    WorkflowReport, WorkflowState, WorkflowStatus,
};
