// Storage - Couche de persistance (RocksDB + Merkle trees)
// Principe: Auditabilité, Reproductibilité, Sync rapide

pub mod db;
pub mod state;

pub use db::*;
pub use state::*;
