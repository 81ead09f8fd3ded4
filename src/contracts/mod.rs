// Contracts - System contracts embedded in the runtime
// Principle: No deployable smart contracts, everything is hardcoded and auditable

pub mod staking;
pub mod parameters;
pub mod governance;
pub mod stake_action;
