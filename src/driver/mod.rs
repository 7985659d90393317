//! Core driver components for the kvx DMA controller.
//!
//! - [`config`] - Device and channel configuration with builder patterns
//! - [`DmaDevice`] - one controller instance: phy table, queue pool,
//!   microcode, route table, interrupts
//! - [`RxChannel`] / [`TxChannel`] - direct handles on physical channels
//!   for the packet and fifo hot paths
//! - logical channels ([`ChannelId`]) - DMA-engine style descriptors with
//!   cookies and completion callbacks
//!
//! # Example
//!
//! ```ignore
//! use kvx_dma::driver::{DeviceConfig, DmaDevice, TransferType};
//!
//! let config = DeviceConfig::new()
//!     .with_dma_requests(64)
//!     .with_vchan(0);
//! let dev = DmaDevice::new(bus, allocator, config)?;
//! dev.load_default_ucodes(&firmware)?;
//! ```

// Submodules
pub mod config;

mod channel;
mod completion;
mod device;
mod dump;
mod interrupt;
mod phy;
mod route;
mod rx;
mod ticket;
mod tx;
mod ucode;

// Re-exports for convenience
pub use channel::{ChannelCallback, ChannelId, Cookie, TransferStatus};
pub use config::{
    ChannelConfig, DeviceConfig, Direction, Fragment, IdRange, MsiMessage, ProgramMemory,
    RouteParams, TransferMode, TransferType,
};
pub use device::{DmaDevice, ReservedChannel};
pub use dump::{RegisterValue, StatusReport};
pub use interrupt::{ErrorVector, IrqAction};
pub use phy::{PhyId, RxCallback};
pub use route::route_value;
pub use rx::RxChannel;
pub use ticket::Ticket;
pub use tx::TxChannel;
pub use ucode::FirmwareLoader;
