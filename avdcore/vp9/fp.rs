// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! VP9 `FrameParams` mirror: much smaller than H.264/H.265 since VP9
//! frames carry no slice segmentation.

use byteorder::{ByteOrder, LittleEndian};

use crate::fp::{FieldPredicate, FieldSpec, FrameParams};
use crate::instr::FpField;

pub const SIZE: usize = 0x1c4;

/// Every scalar field the VP9 HAL pushes with `idx == None`, one 4-byte
/// slot each (see `h264::fp::SCALAR_FIELDS` for why this avoids P2
/// collisions between distinct opcodes).
const SCALAR_FIELDS: &[FpField] = &[
    FpField::FifoStart,
    FpField::FifoEnd,
    FpField::ExecCmd,
    FpField::HeaderStart,
    FpField::RefType,
    FpField::Width,
    FpField::MbDims,
    FpField::SpsFlags,
    FpField::CurRvraAddr,
    FpField::DispYAddr,
    FpField::DispUvAddr,
    FpField::Quant,
    FpField::Deblock,
    FpField::SegFlags,
    FpField::ProbsAddr,
];

const MAX_SEG_FEATURES: usize = super::types::MAX_SEGMENTS * super::types::SEG_LVL_MAX;

const SCALAR_BASE: usize = 0x8;
const SCALAR_STRIDE: usize = 4;
const INDEXED_BASE: usize = SCALAR_BASE + SCALAR_FIELDS.len() * SCALAR_STRIDE;
const REF_ADDR_PLANE_BASE: usize = INDEXED_BASE;
const SEG_FEATURE_BASE: usize = REF_ADDR_PLANE_BASE + 3 * 4;
const LF_REF_DELTA_BASE: usize = SEG_FEATURE_BASE + MAX_SEG_FEATURES * 4;
const LF_MODE_DELTA_BASE: usize = LF_REF_DELTA_BASE + 4 * 4;

fn layout(field: FpField, idx: Option<u16>) -> usize {
    if let Some(pos) = SCALAR_FIELDS.iter().position(|f| *f == field) {
        return SCALAR_BASE + pos * SCALAR_STRIDE;
    }
    let base = match field {
        FpField::RefAddrPlane => REF_ADDR_PLANE_BASE,
        FpField::SegFeature => SEG_FEATURE_BASE,
        FpField::LfRefDelta => LF_REF_DELTA_BASE,
        FpField::LfModeDelta => LF_MODE_DELTA_BASE,
        _ => unreachable!("field {field:?} is neither scalar nor a known indexed field"),
    };
    match idx {
        None => base,
        Some(i) => base + (i as usize) * 4,
    }
}

/// Declarative layout table (spec.md §4.4), same `count == 1` / `count
/// > 1` convention as `h264::fp::field_table`.
pub fn field_table() -> Vec<FieldSpec> {
    let mut table: Vec<FieldSpec> = SCALAR_FIELDS
        .iter()
        .map(|&field| FieldSpec {
            field,
            offset: layout(field, None) as u32,
            len: 4,
            count: 1,
            predicate: FieldPredicate::Any,
        })
        .collect();
    let indexed = [
        (FpField::RefAddrPlane, REF_ADDR_PLANE_BASE, 3usize),
        (FpField::SegFeature, SEG_FEATURE_BASE, MAX_SEG_FEATURES),
        (FpField::LfRefDelta, LF_REF_DELTA_BASE, 4),
        (FpField::LfModeDelta, LF_MODE_DELTA_BASE, 2),
    ];
    for (field, base, count) in indexed {
        table.push(FieldSpec {
            field,
            offset: base as u32,
            len: 4,
            count: count as u16,
            predicate: FieldPredicate::Any,
        });
    }
    table
}

pub struct Vp9FrameParams {
    bytes: Vec<u8>,
}

impl Default for Vp9FrameParams {
    fn default() -> Self {
        Vp9FrameParams { bytes: vec![0u8; SIZE] }
    }
}

impl Vp9FrameParams {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameParams for Vp9FrameParams {
    fn set(&mut self, field: FpField, idx: Option<u16>, val: u32) {
        let off = layout(field, idx);
        LittleEndian::write_u32(&mut self.bytes[off..off + 4], val);
    }

    fn field_value(&self, field: FpField, idx: Option<u16>) -> Option<u32> {
        let off = layout(field, idx);
        Some(LittleEndian::read_u32(&self.bytes[off..off + 4]))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_round_trip() {
        let mut fp = Vp9FrameParams::new();
        fp.set(FpField::MbDims, None, 0x0010_0020);
        assert_eq!(fp.field_value(FpField::MbDims, None), Some(0x0010_0020));
    }

    #[test]
    fn field_table_ranges_are_pairwise_disjoint() {
        let table = field_table();
        let mut ranges: Vec<(u32, u32)> = table
            .iter()
            .map(|f| (f.offset, f.offset + f.len as u32 * f.count.max(1) as u32))
            .collect();
        ranges.sort();
        for w in ranges.windows(2) {
            assert!(w[0].1 <= w[1].0, "field ranges overlap: {:?} vs {:?}", w[0], w[1]);
        }
        assert!(
            ranges.last().unwrap().1 as usize <= SIZE,
            "field table exceeds blob size {SIZE:#x}"
        );
    }

    #[test]
    fn field_table_round_trips_every_field() {
        let mut fp = Vp9FrameParams::new();
        let table = field_table();
        for spec in &table {
            let n = spec.count.max(1);
            for i in 0..n {
                let val = 0x3000_0000u32.wrapping_add(u32::from(i));
                let idx = if spec.count <= 1 { None } else { Some(i) };
                fp.set(spec.field, idx, val);
            }
        }
        for spec in &table {
            let n = spec.count.max(1);
            for i in 0..n {
                let expected = 0x3000_0000u32.wrapping_add(u32::from(i));
                let idx = if spec.count <= 1 { None } else { Some(i) };
                assert_eq!(fp.field_value(spec.field, idx), Some(expected));
            }
        }
    }
}
