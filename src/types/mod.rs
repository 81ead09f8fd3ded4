// Types fondamentaux
// Principe: Minimal, auditable

pub mod primitives;
pub mod signature;
pub mod account;
pub mod params;
pub mod transaction;
pub mod block;

pub use primitives::*;
pub use signature::*;
pub use account::*;
pub use params::*;
pub use transaction::*;
pub use block::*;
