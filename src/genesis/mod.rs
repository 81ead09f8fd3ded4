// Genesis - Configuration et bloc genesis
pub mod scheme;

pub use scheme::{dev_account, dev_key, Scheme, SchemeError};
