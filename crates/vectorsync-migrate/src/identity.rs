//! Stable numeric point identities for opaque source ids.
//!
//! An identity is the first eight bytes of `SHA-256(source_id)`, read
//! big-endian, with the top bit cleared so it falls in `[0, 2^63)`. The
//! next eight bytes form a fingerprint used only to tell a repeated source
//! id apart from two distinct ids that landed on the same identity.
//!
//! Nothing here avoids collisions. With `n` distinct ids the chance of at
//! least one collision is about `1 - exp(-n(n-1) / 2^64)`; that is roughly
//! 0.4% at `2^28` ids and 39% at `sqrt(2^63)` (about 3 billion). Runs
//! that reach [`COLLISION_REPORT_THRESHOLD`] records carry this estimate in
//! their report.

use ring::digest::{SHA256, digest};
use std::collections::HashMap;

/// Record count from which the birthday-bound estimate is reported.
pub const COLLISION_REPORT_THRESHOLD: u64 = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: u64,
    pub fingerprint: u64,
}

pub struct IdentityMapper;

impl IdentityMapper {
    /// Identity for `source_id`; the same input always yields the same value.
    pub fn map(source_id: &str) -> u64 {
        Self::identity(source_id).id
    }

    pub fn identity(source_id: &str) -> Identity {
        let hash = digest(&SHA256, source_id.as_bytes());
        let bytes = hash.as_ref();

        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&bytes[8..16]);

        Identity {
            id: u64::from_be_bytes(head) & (u64::MAX >> 1),
            fingerprint: u64::from_be_bytes(tail),
        }
    }

    /// Birthday-bound probability of at least one collision among `n` ids.
    pub fn collision_probability(n: u64) -> f64 {
        if n < 2 {
            return 0.0;
        }
        let n = n as f64;
        let exponent = -(n * (n - 1.0)) / 2f64.powi(64);
        -exponent.exp_m1()
    }
}

/// What a newly seen identity means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    New,
    /// The same source id was seen before.
    Repeat,
    /// A different source id already produced this identity.
    Collision,
}

/// Tracks identities issued during one run.
///
/// Holds one `u64 -> u64` entry per distinct identity, so memory grows with
/// the run: about 20 bytes per record after table overhead, which is several
/// GiB by the time a run reaches [`COLLISION_REPORT_THRESHOLD`] records.
#[derive(Debug, Default)]
pub struct CollisionTracker {
    seen: HashMap<u64, u64>,
    collisions: usize,
}

impl CollisionTracker {
    pub fn observe(&mut self, identity: Identity) -> Observation {
        match self.seen.get(&identity.id) {
            None => {
                self.seen.insert(identity.id, identity.fingerprint);
                Observation::New
            }
            Some(fingerprint) if *fingerprint == identity.fingerprint => Observation::Repeat,
            Some(_) => {
                self.collisions += 1;
                Observation::Collision
            }
        }
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn distinct(&self) -> usize {
        self.seen.len()
    }
}
