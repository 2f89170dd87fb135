// SPDX-License-Identifier: MIT
//! Tracing setup for embedders.
//!
//! Library code only emits events; the host decides where they go. This
//! helper wires a stdout subscriber for hosts that have no subscriber of
//! their own.

/// Initialize a global stdout subscriber.
///
/// `filter` is an `EnvFilter` directive (e.g. `"info"` or
/// `"chatguard=debug"`); `RUST_LOG` overrides it when set. `format` selects
/// `"json"` or compact human output. Safe to call more than once — a second
/// call is a no-op.
pub fn init_tracing(filter: &str, format: &str) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    let result = if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .compact()
            .try_init()
    };

    // Err means a subscriber is already installed; that is fine.
    let _ = result;
}
