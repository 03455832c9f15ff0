//! Faction contests: membership, quorum-gated resolution, rewards and titles

pub mod record;
pub mod resolver;
pub mod title;

pub use record::{ContestBook, ContestRecord, ContestStatus, ContestTerms, Outcome};
pub use resolver::{Resolution, ResolveContext, TIE_BREAK_FACTION};
pub use title::{TitleBook, TitleRecord};
