// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.265 `FrameParams` mirror. Same shape as `h264::fp`, smaller blob.

use byteorder::{ByteOrder, LittleEndian};

use crate::fp::{FieldPredicate, FieldSpec, FrameParams};
use crate::instr::FpField;

pub const SIZE: usize = 0x34ce4;

const MAX_REFS: usize = 16;
const MAX_REF_PLANES: usize = MAX_REFS * 2;
/// Per-tile indexed fields (`CtbWindow`, `Quant`, `Deblock`, `SliceDesc`,
/// `ExecCmd`) are emitted once per entry point / tile (spec.md §4.3 step
/// 7); this bounds how many tiles a single frame's blob can mirror.
const MAX_TILES: usize = 512;

/// See `h264::fp::SCALAR_FIELDS`: every field the H.265 HAL pushes with
/// `idx == None` gets its own 4-byte slot so no two opcodes in the same
/// frame ever mirror into the same byte range (P2, spec.md §8).
const SCALAR_FIELDS: &[FpField] = &[
    FpField::FifoStart,
    FpField::FifoEnd,
    FpField::HeaderStart,
    FpField::RefType,
    FpField::Width,
    FpField::Height,
    FpField::ChromaFormat,
    FpField::BitDepth,
    FpField::SpsFlags,
    FpField::PpsFlags,
    FpField::SpsTileAddr,
    FpField::SpsTileAddr2,
    FpField::CurRvraAddr,
    FpField::DispYAddr,
    FpField::DispUvAddr,
    FpField::MvWindow,
    FpField::WpDenom,
    FpField::WpWeight,
    FpField::WpOffset,
    FpField::MbDims,
];

const SCALAR_BASE: usize = 0x20;
const SCALAR_STRIDE: usize = 4;
const INDEXED_BASE: usize = SCALAR_BASE + SCALAR_FIELDS.len() * SCALAR_STRIDE;
const PPS_TILE_ADDR_BASE: usize = INDEXED_BASE;
const REF_DESCRIPTOR_BASE: usize = PPS_TILE_ADDR_BASE + 8 * 4;
const REF_ADDR_PLANE_BASE: usize = REF_DESCRIPTOR_BASE + MAX_REFS * 4;
const REF_LIST_ENTRY_BASE: usize = REF_ADDR_PLANE_BASE + MAX_REF_PLANES * 4;
const CTB_WINDOW_BASE: usize = REF_LIST_ENTRY_BASE + MAX_TILES * 4;
const QUANT_BASE: usize = CTB_WINDOW_BASE + MAX_TILES * 4;
const DEBLOCK_BASE: usize = QUANT_BASE + MAX_TILES * 4;
const SLICE_DESC_BASE: usize = DEBLOCK_BASE + MAX_TILES * 4;
const EXEC_CMD_BASE: usize = SLICE_DESC_BASE + MAX_TILES * 4;
/// `ScalingList` is itself array-valued; parked well past every other
/// region computed above so it can never collide with them.
const SCALING_LIST_BASE: usize = 0x4000;

fn layout(field: FpField, idx: Option<u16>) -> usize {
    if let Some(pos) = SCALAR_FIELDS.iter().position(|f| *f == field) {
        return SCALAR_BASE + pos * SCALAR_STRIDE;
    }
    let base = match field {
        FpField::ScalingList => SCALING_LIST_BASE,
        FpField::PpsTileAddr => PPS_TILE_ADDR_BASE,
        FpField::RefDescriptor => REF_DESCRIPTOR_BASE,
        FpField::RefAddrPlane => REF_ADDR_PLANE_BASE,
        FpField::RefListEntry => REF_LIST_ENTRY_BASE,
        FpField::CtbWindow => CTB_WINDOW_BASE,
        FpField::Quant => QUANT_BASE,
        FpField::Deblock => DEBLOCK_BASE,
        FpField::SliceDesc => SLICE_DESC_BASE,
        FpField::ExecCmd => EXEC_CMD_BASE,
        _ => unreachable!("field {field:?} is neither scalar nor a known indexed field"),
    };
    match idx {
        None => base,
        Some(i) => base + (i as usize) * 4,
    }
}

/// Declarative layout table (spec.md §4.4), mirroring `h264::fp::field_table`'s
/// shape: `count == 1` means a single `idx == None` slot, `count > 1`
/// means `idx` ranges over `0..count`. Per-tile fields (`CtbWindow`,
/// `Quant`, `Deblock`, `SliceDesc`, `ExecCmd`) reserve `MAX_TILES` slots
/// each, matching `layout`'s region sizing above.
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
        (FpField::PpsTileAddr, PPS_TILE_ADDR_BASE, 8usize),
        (FpField::RefDescriptor, REF_DESCRIPTOR_BASE, MAX_REFS),
        (FpField::RefAddrPlane, REF_ADDR_PLANE_BASE, MAX_REF_PLANES),
        (FpField::RefListEntry, REF_LIST_ENTRY_BASE, MAX_TILES),
        (FpField::CtbWindow, CTB_WINDOW_BASE, MAX_TILES),
        (FpField::Quant, QUANT_BASE, MAX_TILES),
        (FpField::Deblock, DEBLOCK_BASE, MAX_TILES),
        (FpField::SliceDesc, SLICE_DESC_BASE, MAX_TILES),
        (FpField::ExecCmd, EXEC_CMD_BASE, MAX_TILES),
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

pub struct H265FrameParams {
    bytes: Vec<u8>,
}

impl Default for H265FrameParams {
    fn default() -> Self {
        H265FrameParams { bytes: vec![0u8; SIZE] }
    }
}

impl H265FrameParams {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameParams for H265FrameParams {
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
    fn round_trips_width_field() {
        let mut fp = H265FrameParams::new();
        fp.set(FpField::Width, None, 42);
        assert_eq!(fp.field_value(FpField::Width, None), Some(42));
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
    }

    #[test]
    fn field_table_round_trips_every_field() {
        let mut fp = H265FrameParams::new();
        let table = field_table();
        for spec in &table {
            let n = spec.count.max(1);
            for i in 0..n {
                let val = 0x2000_0000u32.wrapping_add(u32::from(i));
                let idx = if spec.count <= 1 { None } else { Some(i) };
                fp.set(spec.field, idx, val);
            }
        }
        for spec in &table {
            let n = spec.count.max(1);
            for i in 0..n {
                let expected = 0x2000_0000u32.wrapping_add(u32::from(i));
                let idx = if spec.count <= 1 { None } else { Some(i) };
                assert_eq!(fp.field_value(spec.field, idx), Some(expected));
            }
        }
    }
}
