// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! VP9 probability-table snapshotting (spec.md §3: "`access_idx` ... is
//! used to index the `sps_tile` and `probs` rings"; content layout
//! supplemented from `original_source/avid/vp9/probs.py`'s
//! `AVDVP9Probs`, whose 1905-byte layout this mirrors at a byte-blob
//! level rather than field-by-field, since the HAL only ever needs to
//! snapshot-and-restore the blob, never address individual entries).

/// `1905` content bytes, zero-padded to a 4-byte boundary, matching the
/// original's `ZPadding(3)` tail.
pub const PROBS_SIZE: usize = 1908;

/// The probability context VP9 adapts after every frame (spec.md §4.5:
/// "snapshot its probability table after each frame").
#[derive(Clone, Debug)]
pub struct ProbTable {
    bytes: [u8; PROBS_SIZE],
}

impl ProbTable {
    /// VP9's coefficient/mode probabilities default to the neutral
    /// value `128` (equal likelihood) before the first keyframe
    /// establishes real statistics; see `default_coef_probs` etc. in the
    /// VP9 bitstream specification, annex A.
    pub fn default_probs() -> Self {
        ProbTable {
            bytes: [128u8; PROBS_SIZE],
        }
    }

    pub fn as_bytes(&self) -> &[u8; PROBS_SIZE] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; PROBS_SIZE] {
        &mut self.bytes
    }
}

/// A ring of [`ProbTable`] snapshots, one slot per `access_idx % depth`,
/// mirroring how `sps_tile` is ring-addressed for H.264/H.265 (spec.md
/// §4.3).
pub struct ProbsRing {
    slots: Vec<ProbTable>,
}

impl ProbsRing {
    pub fn new(depth: usize) -> Self {
        ProbsRing {
            slots: vec![ProbTable::default_probs(); depth],
        }
    }

    pub fn slot(&self, access_idx: u64) -> &ProbTable {
        &self.slots[(access_idx as usize) % self.slots.len()]
    }

    pub fn slot_mut(&mut self, access_idx: u64) -> &mut ProbTable {
        let depth = self.slots.len();
        &mut self.slots[(access_idx as usize) % depth]
    }

    /// On a keyframe, every ring slot resets to the default table
    /// (libvpx `vp9_init_mode_probs`/`vp9_default_coef_probs`).
    pub fn reset_all(&mut self) {
        for s in &mut self.slots {
            *s = ProbTable::default_probs();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_wraps_by_access_idx() {
        let mut ring = ProbsRing::new(4);
        ring.slot_mut(0).as_bytes_mut()[0] = 7;
        assert_eq!(ring.slot(4).as_bytes()[0], 7);
    }

    #[test]
    fn reset_all_restores_defaults() {
        let mut ring = ProbsRing::new(2);
        ring.slot_mut(0).as_bytes_mut()[0] = 9;
        ring.reset_all();
        assert_eq!(ring.slot(0).as_bytes()[0], 128);
    }
}
