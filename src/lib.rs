//! kvx DMA Engine
//!
//! A `no_std` + `alloc` driver for the DMA-NoC controller of Kalray kvx
//! processors.
//!
//! The controller moves data between memory, the network-on-chip and the
//! Ethernet block through hardware queues: 64 RX channels fed by shared RX
//! job queues, and 64 TX job/completion queue pairs whose jobs are executed
//! by microcode programs. This crate owns the queue memory, reserves and
//! shares physical channels, and implements the lock-free submit and
//! completion paths on top of the hardware counters.
//!
//! # Architecture
//!
//! 1. **Device** ([`DmaDevice`]): one per controller. Holds the physical
//!    channel table, the queue pool, the microcode program table and the
//!    NoC route table behind a single allocation lock.
//! 2. **Physical channels** ([`RxChannel`], [`TxChannel`]): direct handles
//!    for the hot paths. TX submission follows a ticket protocol so several
//!    producers can share one job queue without a lock.
//! 3. **Logical channels** ([`driver::ChannelId`]): a DMA-engine style front
//!    end with prepared descriptors, cookies and completion callbacks.
//!
//! The platform supplies register access ([`RegisterBus`]), DMA-coherent
//! memory ([`DmaAllocator`]), firmware images ([`FirmwareLoader`]) and a
//! `critical-section` implementation.
//!
//! # Features
//!
//! - `defmt`: log through defmt and derive `defmt::Format` on public types
//! - `log`: log through the `log` facade
//!
//! # Example
//!
//! ```ignore
//! use kvx_dma::{DeviceConfig, DmaDevice, Fragment, MmioBus, RouteParams, TransferType};
//!
//! let bus = unsafe { MmioBus::new(DMA_BASE) };
//! let config = DeviceConfig::new().with_vchan(0);
//! let dev = DmaDevice::new(bus, allocator, config)?;
//! dev.load_default_ucodes(&firmware)?;
//!
//! let route = RouteParams { noc_route: 0x1234, rx_tag: 3, qos_id: 0 };
//! let tx = dev.reserve_tx_channel(0, TransferType::Mem2Eth, &route)?;
//! let job_id = dev.submit_packet(&tx, &[Fragment::new(buf, 60)], tx.route_id(), &mut delay)?;
//! ```

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels; Cargo.toml carries the same table.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

extern crate alloc;

// =============================================================================
// Modules
// =============================================================================

pub mod constants;
pub mod driver;
pub mod error;
pub mod sync;

// Internal implementation details (pub(crate) only)
mod internal;

// Test utilities (only available during testing)
#[cfg(test)]
mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::{
    ChannelConfig, DeviceConfig, Direction, DmaDevice, ErrorVector, FirmwareLoader, Fragment,
    IdRange, IrqAction, MsiMessage, PhyId, ProgramMemory, RouteParams, RxChannel, StatusReport,
    TransferMode, TransferStatus, TransferType, TxChannel,
};
pub use error::{ArgumentError, Error, ResourceKind, Result};
pub use internal::dma::descriptor::{RxCompletion, TxJob};
pub use internal::dma::memory::{DmaAllocator, DmaRegion};
pub use internal::register::{MmioBus, RegisterBus};

/// Raw register map of the controller.
///
/// Offsets are relative to the DMA register window. Most users should
/// prefer the device APIs; these are for diagnostics and bring-up code.
pub mod registers {
    pub use crate::internal::register::RegisterWindow;
    pub use crate::internal::register::global;
    pub use crate::internal::register::rx;
    pub use crate::internal::register::tx;
}
