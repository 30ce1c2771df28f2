// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod ctx;
pub mod dpb;
pub mod fp;
pub mod hal;
pub mod probs;
pub mod types;

use crate::error::DecodeResult;
use crate::instr::Instruction;

pub use ctx::Vp9Context;
pub use fp::Vp9FrameParams;
pub use types::FrameHeader;

pub fn decode_frame(
    ctx: &mut ctx::Vp9Context,
    header: FrameHeader,
) -> DecodeResult<(Vec<Instruction>, fp::Vp9FrameParams)> {
    let fb_idx = dpb::init_slice(ctx, &header)?;

    let mut frame_params = fp::Vp9FrameParams::new();
    let instructions = hal::decode(ctx, &header, fb_idx, &mut frame_params)?;

    dpb::finish_slice(ctx, &header, fb_idx);
    ctx.access_idx += 1;
    Ok((instructions, frame_params))
}
