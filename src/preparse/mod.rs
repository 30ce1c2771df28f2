// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bitstream pre-parsers: turn raw H.264/H.265/VP9 bytes into the
//! syntax-element shapes `avdcore` consumes. Gated behind the same
//! `h264`/`h265`/`vp9` features as `avdcore`'s own per-codec modules.

use nom::FindSubstring;

pub mod bitreader;

#[cfg(feature = "h264")]
pub mod h264;
#[cfg(feature = "h265")]
pub mod h265;
#[cfg(feature = "vp9")]
pub mod vp9;

/// Splits an Annex-B byte stream into NAL units (start-code-delimited,
/// trailing zero bytes stripped). H.264 and H.265 both use this byte
/// stream format (ISO/IEC 14496-10 Annex B / ISO/IEC 14496-15 §D);
/// mirrors the teacher's `decode_h264_annex_b` shape but collects into a
/// `Vec` rather than taking a per-unit callback.
#[cfg(any(feature = "h264", feature = "h265"))]
pub fn split_annex_b(mut data: &[u8]) -> Vec<&[u8]> {
    let start_code = &b"\x00\x00\x01"[..];
    let mut units = Vec::new();
    'outer: while let Some(pos) = data.find_substring(start_code) {
        let mut unit = &data[0..pos];
        data = &data[pos + start_code.len()..];
        loop {
            match unit.last() {
                None => continue 'outer,
                Some(0) => unit = &unit[..unit.len() - 1],
                Some(_) => break,
            }
        }
        units.push(unit);
    }
    if !data.is_empty() {
        units.push(data);
    }
    units
}
