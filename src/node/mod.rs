// Node - Orchestrateur du nœud
pub mod chain;

pub use chain::{BlockReceipt, ChainContext, ChainError, RejectedTransaction};
