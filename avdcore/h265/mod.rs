// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod ctx;
pub mod dpb;
pub mod fp;
pub mod hal;
pub mod slice;
pub mod types;

use crate::error::DecodeResult;
use crate::instr::Instruction;
use crate::slice::Slice as DecodeSlice;

pub use ctx::H265Context;
pub use fp::H265FrameParams;
pub use types::{NalUnitType, Pps, RpsBucket, SliceHeader, SliceType, Sps, StRpsEntry};

pub fn decode_slice(
    ctx: &mut ctx::H265Context,
    header: types::SliceHeader,
    payload_addr: u64,
) -> DecodeResult<(Vec<Instruction>, fp::H265FrameParams)> {
    let header = slice::resolve_dependent_segment(ctx, header)?;
    let mut dec_slice = DecodeSlice::new(header, payload_addr);
    dpb::init_slice(ctx, &dec_slice.header, &mut dec_slice)?;

    let mut frame_params = fp::H265FrameParams::new();
    let instructions = hal::decode(ctx, &dec_slice, &mut frame_params)?;

    ctx.access_idx += 1;
    Ok((instructions, frame_params))
}
