// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.264 decode-context pipeline: DPB management, opcode emission, and
//! the `FrameParams` mirror, wired together behind one entry point.

pub mod ctx;
pub mod dpb;
pub mod fp;
pub mod hal;
pub mod types;

use crate::error::DecodeResult;
use crate::instr::Instruction;
use crate::slice::Slice;

pub use ctx::H264Context;
pub use fp::H264FrameParams;
pub use types::{Mmco, NalUnitType, PicParameterSet, RefPicListModOp, SeqParameterSet, SliceHeader, SliceType};

/// Runs one slice through DPB assignment, opcode emission, and DPB
/// finalization (spec.md §4.2 + §4.3 composed into the per-slice
/// pipeline described in §2 "System Overview").
pub fn decode_slice(
    ctx: &mut ctx::H264Context,
    header: types::SliceHeader,
    payload_addr: u64,
) -> DecodeResult<(Vec<Instruction>, fp::H264FrameParams)> {
    let mut slice = Slice::new(header, payload_addr);
    dpb::init_slice(ctx, &slice.header, &mut slice)?;

    let mut frame_params = fp::H264FrameParams::new();
    let instructions = hal::decode(ctx, &slice, &mut frame_params)?;

    let hdr = slice.header.clone();
    let pic = slice.pic.expect("init_slice always assigns a picture");
    dpb::finish_slice(ctx, &hdr, pic)?;
    ctx.access_idx += 1;

    Ok((instructions, frame_params))
}
