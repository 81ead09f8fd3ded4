// Execution - Deterministic state machine
// Principle: No Turing-complete, simple and verifiable transactions

pub mod executor;

pub use executor::{ExecutionError, Receipt, TransactionExecutor, WorkingState};
