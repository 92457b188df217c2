// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Shared test infrastructure for integration tests.
//!
//! This module is **not** a test file, so it must comply with full clippy rules.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter for test runs.
pub const LOG_ENV: &str = "TETHER_LOG";

/// Install a test-friendly `tracing` subscriber once per test binary.
///
/// The filter is read from `TETHER_LOG` (for example `TETHER_LOG=debug`);
/// without it only warnings are printed. Output goes through the test
/// writer so that it is captured per test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another harness may have installed a subscriber already.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}
