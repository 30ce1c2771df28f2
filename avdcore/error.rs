// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Domain error type for `avd-core`. Thin re-export of [`base::Error`] /
//! [`base::ErrorKind`] under names that read naturally from call sites in
//! this crate (spec.md §7).

pub use base::ErrorKind;

/// Alias kept distinct from `base::Error` so call sites in this crate
/// read as "a decode failed" rather than "the ambient error type".
pub type DecodeError = base::Error;

pub type DecodeResult<T> = Result<T, DecodeError>;
