// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! `avd-core`: the per-frame pipeline from decode context + slice to AVD
//! hardware opcodes. Allocator, DPB/RPS managers, HAL opcode emitters, and
//! the `FrameParams` mirror schema, shared by all three codec pipelines.
//!
//! This crate is pure compute: no I/O, no allocation beyond growing the
//! instruction vector and the allocator map, no concurrency beyond what
//! the caller imposes by holding one [`DecodeContext`]-like struct per
//! stream.

#![forbid(unsafe_code)]

pub mod alloc;
pub mod coding;
pub mod dpb;
pub mod error;
pub mod fp;
pub mod instr;
pub mod slice;

#[cfg(feature = "h264")]
pub mod h264;

#[cfg(feature = "h265")]
pub mod h265;

#[cfg(feature = "vp9")]
pub mod vp9;

pub use error::{DecodeError, DecodeResult};

/// Hardware codec-mode constant written into the command FIFO header
/// (spec.md §6).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum CodecMode {
    H264 = 1,
    Vp9 = 2,
    H265 = 3,
}

// Compile-time check that nothing in the public API smuggles in
// non-`Send`/`Sync` state; the concurrency model (spec.md §5) depends on
// a decode context being freely movable across threads as long as only
// one thread touches it at a time.
#[allow(dead_code)]
fn _assert_send_sync<T: Send + Sync>() {}
#[allow(dead_code)]
fn _assert_alloc_map_send_sync() {
    _assert_send_sync::<alloc::AllocMap>();
}
