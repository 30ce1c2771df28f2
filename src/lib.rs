// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! `avd-gen`: turns raw H.264/H.265/VP9 bitstreams into the AVD hardware
//! opcode stream plus matching `FrameParams` blob, one per slice
//! (H.264/H.265) or per frame (VP9).
//!
//! `avdcore` does the actual DPB/HAL work given already-parsed syntax
//! elements; this crate's `preparse` module turns bitstream bytes into
//! those syntax elements, and the `Decoder` facades below wire the two
//! together plus the allocator bookkeeping a caller shouldn't have to
//! do by hand (slice-data staging, dimension limits).

#![forbid(unsafe_code)]

pub mod preparse;

pub use avdcore::error::{DecodeError, DecodeResult};
pub use avdcore::instr::Instruction;
pub use base::limits::Limits;

/// One decode result: the hardware opcode stream plus the `FrameParams`
/// blob the HAL mirrors fields into alongside it (spec.md §3).
pub struct DecodeOutput<F> {
    pub instructions: Vec<Instruction>,
    pub frame_params: F,
}

#[cfg(feature = "h264")]
pub mod h264 {
    //! Facade over [`avdcore::h264`] + [`crate::preparse::h264`]: feed
    //! Annex-B bytes in, get one `DecodeOutput` per coded slice out.

    use avdcore::h264::{H264Context, H264FrameParams};

    use crate::preparse::h264::{H264Preparser, H264Unit};
    use crate::preparse::split_annex_b;
    use crate::{DecodeOutput, DecodeResult, Limits};

    pub struct Decoder {
        ctx: H264Context,
        preparser: H264Preparser,
    }

    impl Decoder {
        pub fn new(width: u32, height: u32, limits: &Limits) -> DecodeResult<Self> {
            limits.check_dimension(width, height, 16)?;
            let mut ctx = H264Context::new(width, height);
            ctx.rebuild_allocator(limits.h264_dpb_slots);
            Ok(Decoder {
                ctx,
                preparser: H264Preparser::new(),
            })
        }

        /// Feeds one Annex-B byte stream (a single access unit, or a
        /// whole stream trailer's worth of NAL units); returns one
        /// `DecodeOutput` per coded slice found within it, in order.
        pub fn push_annex_b(&mut self, data: &[u8]) -> DecodeResult<Vec<DecodeOutput<H264FrameParams>>> {
            let mut out = Vec::new();
            for nal in split_annex_b(data) {
                match self.preparser.push_nal(nal)? {
                    H264Unit::ParamSet => {
                        // Mirror the preparser's parameter-set tables into the
                        // decode context: `avdcore::h264::dpb::init_slice`
                        // resolves `hdr.pps_id`/`pps.sps_id` through
                        // `ctx.{sps,pps}_table`, not through the preparser.
                        for (&id, sps) in self.preparser.sps.iter() {
                            self.ctx.sps_table.insert(id, *sps);
                        }
                        for (&id, pps) in self.preparser.pps.iter() {
                            self.ctx.pps_table.insert(id, *pps);
                        }
                    }
                    H264Unit::Slice { header, rbsp_len } => {
                        let payload_addr = self.ctx.alloc.ensure_slice_data(rbsp_len as u64, 0x40);
                        let (instructions, frame_params) = avdcore::h264::decode_slice(&mut self.ctx, header, payload_addr)?;
                        out.push(DecodeOutput { instructions, frame_params });
                    }
                    H264Unit::Ignored => {}
                }
            }
            Ok(out)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rejects_dimensions_outside_limits() {
            let limits = Limits::default();
            let err = Decoder::new(32, 32, &limits).unwrap_err();
            assert_eq!(err.kind(), base::ErrorKind::DimensionUnsupported);
        }

        #[test]
        fn accepts_in_range_dimensions() {
            let limits = Limits::default();
            assert!(Decoder::new(640, 480, &limits).is_ok());
        }

        #[test]
        fn rejects_non_16_aligned_width() {
            let limits = Limits::default();
            let err = Decoder::new(70, 64, &limits).unwrap_err();
            assert_eq!(err.kind(), base::ErrorKind::DimensionUnsupported);
        }
    }
}

#[cfg(feature = "h265")]
pub mod h265 {
    //! Facade over [`avdcore::h265`] + [`crate::preparse::h265`].

    use avdcore::h265::{H265Context, H265FrameParams};

    use crate::preparse::h265::{H265Preparser, H265Unit};
    use crate::preparse::split_annex_b;
    use crate::{DecodeOutput, DecodeResult, Limits};

    pub struct Decoder {
        ctx: H265Context,
        preparser: H265Preparser,
    }

    impl Decoder {
        pub fn new(width: u32, height: u32, limits: &Limits) -> DecodeResult<Self> {
            limits.check_dimension(width, height, 2)?;
            let mut ctx = H265Context::new(width, height);
            ctx.rebuild_allocator(limits.h265_dpb_slots);
            Ok(Decoder {
                ctx,
                preparser: H265Preparser::new(),
            })
        }

        pub fn push_annex_b(&mut self, data: &[u8]) -> DecodeResult<Vec<DecodeOutput<H265FrameParams>>> {
            let mut out = Vec::new();
            for nal in split_annex_b(data) {
                match self.preparser.push_nal(nal)? {
                    H265Unit::ParamSet => {
                        for (&id, sps) in self.preparser.sps.iter() {
                            self.ctx.sps_table.insert(id, *sps);
                        }
                        for (&id, pps) in self.preparser.pps.iter() {
                            self.ctx.pps_table.insert(id, *pps);
                        }
                    }
                    H265Unit::Slice { header, rbsp_len } => {
                        let payload_addr = self.ctx.alloc.ensure_slice_data(rbsp_len as u64, 0x40);
                        let (instructions, frame_params) = avdcore::h265::decode_slice(&mut self.ctx, header, payload_addr)?;
                        out.push(DecodeOutput { instructions, frame_params });
                    }
                    H265Unit::Ignored => {}
                }
            }
            Ok(out)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rejects_dimensions_outside_limits() {
            let limits = Limits::default();
            let err = Decoder::new(16, 16, &limits).unwrap_err();
            assert_eq!(err.kind(), base::ErrorKind::DimensionUnsupported);
        }

        #[test]
        fn rejects_odd_width() {
            let limits = Limits::default();
            let err = Decoder::new(65, 64, &limits).unwrap_err();
            assert_eq!(err.kind(), base::ErrorKind::DimensionUnsupported);
        }
    }
}

#[cfg(feature = "vp9")]
pub mod vp9 {
    //! Facade over [`avdcore::vp9`] + [`crate::preparse::vp9`]. VP9 has
    //! no Annex-B start codes: callers hand this one already-demuxed
    //! frame (an IVF payload, or a superframe index entry) at a time.

    use avdcore::vp9::{Vp9Context, Vp9FrameParams};

    use crate::preparse::vp9::Vp9Preparser;
    use crate::{DecodeOutput, DecodeResult, Limits};

    pub struct Decoder {
        ctx: Vp9Context,
        preparser: Vp9Preparser,
    }

    impl Decoder {
        pub fn new(width: u32, height: u32, limits: &Limits) -> DecodeResult<Self> {
            limits.check_dimension(width, height, 1)?;
            let mut ctx = Vp9Context::new(width, height);
            ctx.rebuild_allocator();
            Ok(Decoder {
                ctx,
                preparser: Vp9Preparser::new(),
            })
        }

        /// Decodes one frame. Returns `None` for a `show_existing_frame`
        /// frame, which only replays an already-decoded buffer and has
        /// no opcodes of its own to emit.
        pub fn push_frame(&mut self, data: &[u8]) -> DecodeResult<Option<DecodeOutput<Vp9FrameParams>>> {
            let header = self.preparser.parse_frame(data)?;
            if header.show_existing_frame {
                return Ok(None);
            }
            let (instructions, frame_params) = avdcore::vp9::decode_frame(&mut self.ctx, header)?;
            self.preparser.record_frame(&header);
            Ok(Some(DecodeOutput { instructions, frame_params }))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rejects_dimensions_outside_limits() {
            let limits = Limits::default();
            let err = Decoder::new(16, 16, &limits).unwrap_err();
            assert_eq!(err.kind(), base::ErrorKind::DimensionUnsupported);
        }
    }
}
