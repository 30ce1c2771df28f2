// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

mod error;
pub mod limits;
pub mod tracing_setup;

pub use crate::error::{Error, ErrorKind, ResultExt};
