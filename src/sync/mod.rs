//! Synchronization and Concurrency Support
//!
//! This module provides the synchronization primitives used by the DMA
//! device:
//!
//! - [`CriticalSectionCell`] - ISR-safe interior mutability, used as the
//!   per-device allocation lock
//! - [`AtomicBitmap`] - lock-free pending set filled by interrupt handlers
//! - [`SingleFlight`] - keeps the deferred completion worker non-reentrant
//!
//! The hot path (ticket protocol, RX push/pop) uses none of these; it
//! relies on hardware counters and a per-channel atomic.
//!
//! # Example
//!
//! ```ignore
//! use kvx_dma::sync::CriticalSectionCell;
//!
//! static COUNTER: CriticalSectionCell<u32> = CriticalSectionCell::new(0);
//!
//! fn on_irq() {
//!     COUNTER.with(|c| *c += 1);
//! }
//! ```

mod primitives;

pub use primitives::{AtomicBitmap, CriticalSectionCell, SingleFlight, SingleFlightGuard};
