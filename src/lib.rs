//! envnode library: portable sampling and alerting core.
//!
//! Everything a monitoring node decides lives here: the shared sensor
//! state, the gas-concentration estimator, baseline calibration, the
//! threshold policy and decision list, execution-time statistics and the
//! telemetry wire format. None of it touches hardware, so it is testable on
//! any host with `cargo test`. The platform binary (`node-std`) is a thin
//! consumer that owns threads, timers, drivers and sockets.
//!
//! `no_std`, no allocator. Dependencies are limited to `heapless`,
//! `serde`/`serde-json-core`, `libm` and the `log` facade.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod calibration;
pub mod config;
pub mod defaults;
pub mod gas;
pub mod protocol;
pub mod rules;
pub mod state;
pub mod stats;
