//! External collaborators: resource ownership and fungible balances
//!
//! The economy only talks to these through the two traits; the in-memory
//! stores here back the simulator and the tests.

pub mod balances;
pub mod ownership;

pub use balances::{Account, BalanceBook, BalanceLedger};
pub use ownership::{OwnershipRegistry, Resource, ResourceRegistry};
