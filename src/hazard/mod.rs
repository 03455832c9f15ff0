//! Periodic hazards against staked mining principal

pub mod randomizer;

pub use randomizer::{EventRandomizer, HazardEntry, HazardLog, SweepReport};
