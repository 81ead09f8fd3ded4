// Tests module
// Change-params scenarios run end to end through ChainContext and RocksDB
// Governance invariants are property tests over the contracts

pub mod governance_invariants;
