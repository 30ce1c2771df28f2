// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Dimension and pool-size ceilings, overridable from a small TOML
//! fragment. There is no running service to configure here, unlike the
//! teacher's `moonfire-nvr.conf`; this exists only to make the hardcoded
//! numbers in spec.md §7 ("width or height outside `[64, 4096]`")
//! adjustable without a code change, in the same `serde(default = ...)`
//! style the teacher uses for its config file.

use serde::Deserialize;

fn default_min_dimension() -> u32 {
    64
}

fn default_max_dimension() -> u32 {
    4096
}

fn default_h264_dpb_slots() -> usize {
    16
}

fn default_h265_dpb_slots() -> usize {
    16
}

/// Dimension and DPB-size ceilings enforced before any decode call mutates
/// a `DecodeContext`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    #[serde(default = "default_min_dimension")]
    pub min_dimension: u32,

    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// Ceiling on the number of RVRA slots a H.264 `DecodeContext` will
    /// allocate; spec.md leaves this implementation-defined via
    /// `max_num_ref_frames`, but a ceiling keeps a malformed SPS from
    /// requesting an unbounded allocator map.
    #[serde(default = "default_h264_dpb_slots")]
    pub h264_dpb_slots: usize,

    #[serde(default = "default_h265_dpb_slots")]
    pub h265_dpb_slots: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            min_dimension: default_min_dimension(),
            max_dimension: default_max_dimension(),
            h264_dpb_slots: default_h264_dpb_slots(),
            h265_dpb_slots: default_h265_dpb_slots(),
        }
    }
}

impl Limits {
    /// Parses a `Limits` from a TOML fragment, falling back to defaults
    /// for any field left unspecified.
    pub fn from_toml(s: &str) -> Result<Self, crate::Error> {
        toml::from_str(s).map_err(|e| {
            crate::Error::new(crate::ErrorKind::MalformedStream, e.to_string())
        })
    }

    /// Checks `width`/`height` against `[min_dimension, max_dimension]` and
    /// against `align` (spec.md §7 category 3: "not multiples of 2 (H.265)
    /// / 16-align-compatible (H.264)"). Pass `1` for codecs with no
    /// alignment requirement of their own.
    pub fn check_dimension(&self, width: u32, height: u32, align: u32) -> Result<(), crate::Error> {
        if width < self.min_dimension
            || width > self.max_dimension
            || height < self.min_dimension
            || height > self.max_dimension
        {
            return Err(crate::Error::new(
                crate::ErrorKind::DimensionUnsupported,
                format!(
                    "{width}x{height} outside [{}, {}]",
                    self.min_dimension, self.max_dimension
                ),
            ));
        }
        if align > 1 && (width % align != 0 || height % align != 0) {
            return Err(crate::Error::new(
                crate::ErrorKind::DimensionUnsupported,
                format!("{width}x{height} not a multiple of {align}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let l = Limits::default();
        assert_eq!(l.min_dimension, 64);
        assert_eq!(l.max_dimension, 4096);
    }

    #[test]
    fn from_toml_overrides_selectively() {
        let l = Limits::from_toml("maxDimension = 1920\n").unwrap();
        assert_eq!(l.max_dimension, 1920);
        assert_eq!(l.min_dimension, 64);
    }

    #[test]
    fn rejects_out_of_range_dimensions() {
        let l = Limits::default();
        assert!(l.check_dimension(63, 64, 1).is_err());
        assert!(l.check_dimension(64, 64, 1).is_ok());
        assert!(l.check_dimension(4096, 4096, 1).is_ok());
        assert!(l.check_dimension(4097, 64, 1).is_err());
    }

    #[test]
    fn rejects_misaligned_dimensions() {
        let l = Limits::default();
        assert!(l.check_dimension(70, 64, 16).is_err(), "70 is not 16-aligned");
        assert!(l.check_dimension(64, 70, 16).is_err(), "70 is not 16-aligned");
        assert!(l.check_dimension(80, 64, 16).is_ok());
        assert!(l.check_dimension(65, 64, 2).is_err(), "65 is odd");
        assert!(l.check_dimension(66, 64, 2).is_ok());
    }

    #[test]
    fn align_one_accepts_any_in_range_dimension() {
        let l = Limits::default();
        assert!(l.check_dimension(65, 67, 1).is_ok());
    }
}
