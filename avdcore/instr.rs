// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! The instruction stream and its `FrameParams` mirror (spec.md §3
//! "Instruction", §4.3 "Opcode encoding").
//!
//! The original tool keyed each mirror write by a string tag looked up
//! through Python's introspection; spec.md §9 REDESIGN FLAGS calls for
//! replacing that with a closed enum and a direct dispatch, which is what
//! [`FpField`] and [`Emitter`] do here.

use crate::fp::FrameParams;

/// A named field in a [`FrameParams`] blob that an [`Instruction`] mirrors
/// into. Variants are grouped by codec; the common ones are shared.
///
/// Replaces the original's by-name reflection lookup (spec.md §9
/// "Metaclass-driven FrameParams binding"): each variant maps to exactly
/// one byte offset via [`FrameParams::offset_of`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum FpField {
    /// "Start instruction FIFO" opcode (spec.md §4.3 table, first row).
    FifoStart,
    /// "End instruction FIFO" opcode, last or continuation (table row 2-3).
    FifoEnd,
    /// "Execute MB/VP on region" opcode (table row 4).
    ExecCmd,
    /// "Set reference-type / slice-kind" opcode (table row 5,
    /// `0x2d000000 | flags`).
    RefType,
    Width,
    Height,
    ChromaFormat,
    BitDepth,
    SpsFlags,
    PpsFlags,
    ScalingList,
    SpsTileAddr,
    /// H.265-only: second `sps_tile` ring pointer B-slices mirror
    /// alongside `SpsTileAddr`, addressing the collocated reference's
    /// ring slot instead of the current picture's (spec.md §4.3 "SPS/PPS
    /// tile ring").
    SpsTileAddr2,
    PpsTileAddr,
    CurRvraAddr,
    DispYAddr,
    DispUvAddr,
    RefDescriptor,
    RefAddrPlane,
    SliceDesc,
    CtbWindow,
    Quant,
    Deblock,
    RefListEntry,
    MvWindow,
    WpDenom,
    WpWeight,
    WpOffset,
    MbDims,
    /// "Start-of-header marker" opcode (table row: `0x2db00000 | ...`).
    HeaderStart,
    /// VP9-only: one `SEG_LVL_{ALT_Q,ALT_L,REF_FRAME,SKIP}` feature value
    /// (spec.md §9 supplemented feature: persisted segmentation data).
    SegFeature,
    /// VP9-only: `segmentation_enabled`/`seg_abs_or_delta_update` packed
    /// into one word.
    SegFlags,
    /// VP9-only: one of the four loop-filter `ref_deltas`.
    LfRefDelta,
    /// VP9-only: one of the two loop-filter `mode_deltas`.
    LfModeDelta,
    /// VP9-only: address of this frame's slot in the probability-table
    /// ring (spec.md §3: "`access_idx` ... is used to index the
    /// `sps_tile` and `probs` rings").
    ProbsAddr,
}

/// One entry in the instruction stream (spec.md §3 "Instruction").
#[derive(Copy, Clone, Debug)]
pub struct Instruction {
    pub val: u32,
    pub field: FpField,
    pub idx: Option<u16>,
    pub pos: u32,
}

/// Appends to both the flat hardware-bound word stream and the sparse
/// `FrameParams` mirror in one call, so the two can never drift apart
/// (spec.md §3: "its final form is both a flat `Vec<u32>` ... and a
/// sparse mirror `FrameParams`").
pub struct Emitter<'a, F: FrameParams> {
    stream: Vec<Instruction>,
    fp: &'a mut F,
}

impl<'a, F: FrameParams> Emitter<'a, F> {
    pub fn new(fp: &'a mut F) -> Self {
        Emitter {
            stream: Vec::new(),
            fp,
        }
    }

    /// Emits one instruction at position `stream.len()`, writing `val`
    /// into both the returned vec and the mirror blob at `field[idx]`.
    pub fn push(&mut self, val: u32, field: FpField, idx: Option<u16>) {
        let pos = self.stream.len() as u32;
        self.fp.set(field, idx, val);
        self.stream.push(Instruction {
            val,
            field,
            idx,
            pos,
        });
    }

    pub fn len(&self) -> usize {
        self.stream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Consumes the emitter, returning the finished instruction stream.
    /// Callers are expected to have already emitted a FIFO-end opcode
    /// (spec.md §5: "Partial emission is not a reachable state").
    pub fn finish(self) -> Vec<Instruction> {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyFp {
        last: Option<(FpField, Option<u16>, u32)>,
    }

    impl FrameParams for DummyFp {
        fn set(&mut self, field: FpField, idx: Option<u16>, val: u32) {
            self.last = Some((field, idx, val));
        }

        fn field_value(&self, _field: FpField, _idx: Option<u16>) -> Option<u32> {
            self.last.map(|(_, _, v)| v)
        }

        fn as_bytes(&self) -> &[u8] {
            &[]
        }
    }

    #[test]
    fn push_mirrors_into_frame_params_and_advances_pos() {
        let mut fp = DummyFp { last: None };
        let mut e = Emitter::new(&mut fp);
        e.push(0x1234, FpField::Width, None);
        e.push(0x5678, FpField::Height, Some(2));
        let stream = e.finish();
        assert_eq!(stream[0].pos, 0);
        assert_eq!(stream[1].pos, 1);
        assert_eq!(fp.last, Some((FpField::Height, Some(2), 0x5678)));
    }
}
