//! # lanc
//!
//! A portable, no_std Rust driver for the Sony LANC (Control-L) camera remote bus,
//! bit-banged on two GPIO pins through an open-collector interface.
//!
//! This driver implements a software LANC controller using:
//! - `embedded-hal` traits for digital I/O
//! - a microsecond [`Clock`](clock::Clock) for busy-wait bit timing
//! - an explicit per-byte state machine that can run inside `critical-section`
//! - an optional blocking service loop over `DelayNs`
//!
//! ## Crate features
//! | Feature                    | Description |
//! |----------------------------|-------------|
//! | `std`                      | Disables `#![no_std]` support |
//! | `delay-loop`               | Adds `timer::service_lanc` / `timer::run_lanc_loop` over `embedded_hal::delay::DelayNs` |
//! | `interrupt-free` (default) | Runs every byte inside `critical_section::with` |
//! | `defmt-0-3`                | Uses `defmt` logging and derives `defmt::Format` |
//! | `log`                      | Uses `log` logging |
//!
//! ## Software Features
//!
//! - **Full-duplex frames**: command bytes 0-1 go out while camera status in bytes 4-7 comes back
//! - Frame synchronization on the camera's start bits, with warm re-entry between cycles
//! - Bounded waits everywhere: a dead or stuck line is a [`LinkError::LinkTimeout`](error::LinkError)
//! - Late bit slots are detected and reported instead of corrupting the frame
//! - Zoom, focus, iris, record and power commands, plus raw command bytes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lanc::driver::{LancConfig, LancDriver};
//!
//! let mut driver = LancDriver::new(lanc_in, lanc_out, micros, LancConfig::default());
//! driver.begin();
//! loop {
//!     driver.record_toggle();
//!     if !driver.cycle() {
//!         driver.begin();
//!     }
//! }
//! ```
//!
//! Or, use `run_lanc_loop()` with a `DelayNs` implementation:
//!
//! ```rust,ignore
//! lanc::timer::run_lanc_loop(&mut driver, &mut delay, 1_000, |_, _| {});
//! ```
//!
//! ## Integration Notes
//!
//! - Bits are 104 µs wide; the clock must resolve a few microseconds
//! - A cycle blocks for about `repeats` frame periods (20 ms each on PAL)
//! - Call `cycle()` again within [`timer::MAX_LOOP_GAP_US`] to keep the frame timing
//! - Interrupts that run longer than a few microseconds during a byte cause timing errors
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod macros;

#[cfg(feature = "interrupt-free")]
pub use critical_section;
pub use nb;

pub mod clock;
pub mod command;
pub mod consts;
pub mod driver;
pub mod error;
pub mod frame;
pub mod link;
pub mod timer;
pub mod transceiver;

#[cfg(test)]
mod sim;

pub use driver::{LancConfig, LancDriver};
pub use error::{LancError, LinkError};
pub use frame::Frame;
