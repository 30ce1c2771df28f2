// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Logic for setting up a `tracing` subscriber according to our
//! preferences. The generator itself never calls `install()` — that's a
//! decision for the binary/test harness that embeds this library — but
//! the workspace carries the setup in the teacher's style so every crate
//! logs through the same pipeline.

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, Layer};

/// Custom panic hook that logs instead of directly writing to stderr, so a
/// panic deep inside a HAL emitter shows up with the same target/thread
/// annotations as everything else.
fn panic_hook(p: &std::panic::PanicHookInfo) {
    let payload: Option<&str> = if let Some(s) = p.payload().downcast_ref::<&str>() {
        Some(*s)
    } else if let Some(s) = p.payload().downcast_ref::<String>() {
        Some(s)
    } else {
        None
    };
    error!(
        target: std::env!("CARGO_CRATE_NAME"),
        location = p.location().map(tracing::field::display),
        payload = payload.map(tracing::field::display),
        "panic",
    );
}

/// Installs a global `tracing` subscriber reading its filter from the
/// `AVD_GEN_LOG` environment variable, defaulting to `info`.
pub fn install() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .with_env_var("AVD_GEN_LOG")
        .from_env_lossy();
    tracing_log::LogTracer::init().unwrap();
    let sub = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_filter(filter),
    );
    tracing::subscriber::set_global_default(sub).unwrap();

    let use_panic_hook = std::env::var("AVD_GEN_PANIC_HOOK")
        .map(|s| s != "false" && s != "0")
        .unwrap_or(true);
    if use_panic_hook {
        std::panic::set_hook(Box::new(&panic_hook));
    }
}

/// Installs a subscriber suitable for `#[test]` functions: writes through
/// the test harness's captured-output mechanism rather than raw stderr.
pub fn install_for_tests() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
        .with_env_var("AVD_GEN_LOG")
        .from_env_lossy();
    let _ = tracing_log::LogTracer::init();
    let sub = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::Layer::new()
            .with_test_writer()
            .with_thread_names(true)
            .with_filter(filter),
    );
    let _ = tracing::subscriber::set_global_default(sub);
}
