//! Pseudo-random sources for contest jitter and hazard rolls
//!
//! The production source hashes public inputs only: the tick and caller-supplied
//! tags. Anyone who can see a pending operation can compute its roll before it
//! is committed. This is not a secure randomness source.

use std::collections::VecDeque;

use sha2::{Digest, Sha256};

use crate::core::types::Tick;

/// Source of pseudo-random draws
pub trait EntropySource {
    /// Draw a value for `tick` mixed with `tags`
    fn draw(&mut self, tick: Tick, tags: &[u64]) -> u64;
}

/// Hash of the tick followed by each tag, all big-endian
///
/// Returns the first eight bytes of the SHA-256 digest.
pub fn deterministic_hash(tick: Tick, tags: &[u64]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(tick.to_be_bytes());
    for tag in tags {
        hasher.update(tag.to_be_bytes());
    }
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Production source: a pure function of its inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEntropy;

impl EntropySource for HashEntropy {
    fn draw(&mut self, tick: Tick, tags: &[u64]) -> u64 {
        deterministic_hash(tick, tags)
    }
}

/// Replays a fixed script of values, then repeats the fallback
#[derive(Debug, Clone, Default)]
pub struct ScriptedEntropy {
    script: VecDeque<u64>,
    fallback: u64,
}

impl ScriptedEntropy {
    pub fn new(script: impl IntoIterator<Item = u64>) -> Self {
        Self { script: script.into_iter().collect(), fallback: 0 }
    }

    /// Value returned once the script runs out
    pub fn with_fallback(mut self, fallback: u64) -> Self {
        self.fallback = fallback;
        self
    }

    /// Always returns the same value
    pub fn constant(value: u64) -> Self {
        Self::new([]).with_fallback(value)
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl EntropySource for ScriptedEntropy {
    fn draw(&mut self, _tick: Tick, _tags: &[u64]) -> u64 {
        self.script.pop_front().unwrap_or(self.fallback)
    }
}
