//! Labeled random streams derived from a single session seed.

use sha2::{Digest, Sha256};

const STREAM_PLACEMENT: &str = "placement";
const STREAM_DENSITY: &str = "density";
const STREAM_SELECTION: &str = "selection";

/// Independent seeds for every random consumer in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SessionSeeds {
    pub(crate) placement: u64,
    pub(crate) density: u32,
    pub(crate) selection: u64,
}

impl SessionSeeds {
    pub(crate) fn derive(seed: u64) -> Self {
        Self {
            placement: derive_labeled_seed(seed, STREAM_PLACEMENT),
            density: derive_labeled_seed(seed, STREAM_DENSITY) as u32,
            selection: derive_labeled_seed(seed, STREAM_SELECTION),
        }
    }
}

fn derive_labeled_seed(base: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    finalize_seed(hasher)
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
