// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Minimal big-endian bit reader for the handful of SPS/PPS/slice-header
//! and uncompressed-header syntax elements the H.264/H.265/VP9 adaptors
//! need, once `h264-reader` (or, for H.265/VP9, this reader itself) has
//! handed back a plain byte slice.
//!
//! Grounded on the bit-reader shape common to the RBSP-level parsers in
//! `examples/other_examples` and `therishidesai-h264-parser/src/bitreader.rs`:
//! a cursor over `(byte_pos, bit_pos)`, `u1`/`u(n)` fixed-width reads, and
//! Exp-Golomb `ue`/`se`. No off-the-shelf crate in the retrieval pack
//! covers H.265 or VP9 syntax, so this is hand-rolled rather than
//! fabricated as a dependency.

use base::bail_t;

use avdcore::error::DecodeResult;

pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    pub fn bits_left(&self) -> usize {
        (self.data.len().saturating_sub(self.byte_pos)) * 8 - self.bit_pos as usize
    }

    /// Reads one bit. Returns `MalformedStream` once the buffer is
    /// exhausted rather than panicking, since every caller of this reader
    /// is parsing attacker-controlled bitstream bytes.
    pub fn u1(&mut self) -> DecodeResult<bool> {
        if self.byte_pos >= self.data.len() {
            bail_t!(MalformedStream, "bit reader ran past end of buffer");
        }
        let byte = self.data[self.byte_pos];
        let bit = (byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(bit == 1)
    }

    /// Reads `n` bits (0..=32) as an unsigned fixed-width field, MSB first.
    pub fn u(&mut self, n: u32) -> DecodeResult<u32> {
        let mut v: u32 = 0;
        for _ in 0..n {
            v = (v << 1) | (self.u1()? as u32);
        }
        Ok(v)
    }

    /// Exp-Golomb unsigned (`ue(v)`, spec clause 9.1).
    pub fn ue(&mut self) -> DecodeResult<u32> {
        let mut leading_zeros = 0u32;
        while !self.u1()? {
            leading_zeros += 1;
            if leading_zeros > 32 {
                bail_t!(MalformedStream, "ue(v) exp-golomb prefix exceeds 32 bits");
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.u(leading_zeros)?;
        Ok((1u32 << leading_zeros) - 1 + suffix)
    }

    /// Exp-Golomb signed (`se(v)`, spec clause 9.1.1).
    pub fn se(&mut self) -> DecodeResult<i32> {
        let code = self.ue()? as i64;
        let v = if code % 2 == 0 { -(code / 2) } else { (code + 1) / 2 };
        Ok(v as i32)
    }

    /// Skips `n` bits without inspecting them (syntax elements we don't
    /// model but must stay aligned past).
    pub fn skip(&mut self, n: u32) -> DecodeResult<()> {
        for _ in 0..n {
            self.u1()?;
        }
        Ok(())
    }

    pub fn skip_ue(&mut self) -> DecodeResult<()> {
        self.ue()?;
        Ok(())
    }

    pub fn skip_se(&mut self) -> DecodeResult<()> {
        self.se()?;
        Ok(())
    }

    /// `more_rbsp_data()` (spec clause 7.2): true unless what remains is
    /// exactly the rbsp_trailing_bits pattern (a single `1` bit followed
    /// by zero or more `0` bits, possibly none at all).
    pub fn more_rbsp_data(&self) -> bool {
        let mut remaining = self.bits_left();
        if remaining == 0 {
            return false;
        }
        // Find the last set bit in what's left; if it's the very last bit
        // and everything after it (there is nothing after it) is zero,
        // this is just the trailing stop bit.
        let mut byte_pos = self.data.len();
        let mut last_set_bit_from_end = None;
        'outer: while byte_pos > self.byte_pos {
            byte_pos -= 1;
            let byte = self.data[byte_pos];
            for b in 0..8 {
                if byte & (1 << b) != 0 {
                    let bits_after_this_byte = (self.data.len() - byte_pos - 1) * 8;
                    last_set_bit_from_end = Some(bits_after_this_byte + b as usize);
                    break 'outer;
                }
            }
        }
        match last_set_bit_from_end {
            None => false,
            Some(from_end) => {
                remaining -= 0; // no-op, `remaining` kept for clarity of intent
                from_end + 1 < remaining
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u_reads_msb_first() {
        let mut r = BitReader::new(&[0b1011_0000]);
        assert_eq!(r.u(4).unwrap(), 0b1011);
    }

    #[test]
    fn ue_decodes_known_codewords() {
        // 1 -> 0, 010 -> 1, 011 -> 2, 00100 -> 3
        let mut r = BitReader::new(&[0b1_010_011_0, 0b0100_0000]);
        assert_eq!(r.ue().unwrap(), 0);
        assert_eq!(r.ue().unwrap(), 1);
        assert_eq!(r.ue().unwrap(), 2);
        assert_eq!(r.ue().unwrap(), 3);
    }

    #[test]
    fn se_maps_ue_codes_to_signed_zigzag() {
        // ue 0,1,2,3,4 -> se 0,1,-1,2,-2
        let mut r = BitReader::new(&[0b1_010_011, 0b00100_00]);
        assert_eq!(r.se().unwrap(), 0);
        assert_eq!(r.se().unwrap(), 1);
        assert_eq!(r.se().unwrap(), -1);
        assert_eq!(r.se().unwrap(), 2);
    }

    #[test]
    fn more_rbsp_data_false_on_bare_stop_bit() {
        let r = BitReader::new(&[0b1000_0000]);
        assert!(!r.more_rbsp_data());
    }

    #[test]
    fn more_rbsp_data_true_when_payload_remains() {
        let mut r = BitReader::new(&[0b1011_0000, 0b1000_0000]);
        r.u(4).unwrap();
        assert!(r.more_rbsp_data());
    }

    #[test]
    fn u1_past_end_is_malformed_not_a_panic() {
        let mut r = BitReader::new(&[0xff]);
        for _ in 0..8 {
            r.u1().unwrap();
        }
        let err = r.u1().unwrap_err();
        assert_eq!(err.kind(), base::ErrorKind::MalformedStream);
    }
}
