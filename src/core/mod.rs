pub mod bounded;
pub mod config;
pub mod entropy;
pub mod error;
pub mod types;

pub use bounded::{BoundedInsert, BoundedSet};
pub use config::EconomyConfig;
pub use entropy::{EntropySource, HashEntropy, ScriptedEntropy};
pub use error::{Capacity, EconomyError, Result, Subject};
