//! DMA device context
//!
//! [`DmaDevice`] owns everything one controller instance needs: the
//! register bus, the DMA memory allocator, the physical channel table and
//! the logical channel slots. Reservation and release go through a single
//! allocation lock; the submit and completion hot paths do not take it.
//!
//! The remaining operations are split by concern:
//! - RX channels: [`super::rx`]
//! - TX channels and the ticket protocol: [`super::tx`]
//! - logical channels: [`super::channel`]
//! - interrupts and the completion worker: [`super::interrupt`],
//!   [`super::completion`]
//! - microcode: [`super::ucode`]
//! - status dumps: [`super::dump`]

use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::channel::{ChannelId, LogicalChannel};
use super::config::{DeviceConfig, Direction, MsiMessage, TransferMode, TransferType};
use super::phy::{PhyId, PhyState, QueueSetup, RxCallback};
use super::rx::RxChannel;
use super::ticket::TicketCounter;
use super::tx::TxChannel;
use super::ucode::{DEFAULT_PROGRAMS, FirmwareLoader, UcodeState, load_program};
use crate::constants::{
    MSI_VECTOR_COUNT, RX_CACHE_COUNT, RX_CHANNEL_COUNT, TX_JOB_QUEUE_COUNT,
};
use crate::error::{ArgumentError, Error, Result};
use crate::internal::dma::memory::DmaAllocator;
use crate::internal::dma::pool::QueuePool;
use crate::internal::dma::ring::capacity_log2;
use crate::internal::register::RegisterBus;
use crate::internal::trace::{dma_debug, dma_error, dma_info, dma_warn};
use crate::sync::{AtomicBitmap, CriticalSectionCell, SingleFlight};

/// Words needed for one bit per MSI vector
pub(crate) const MSI_WORDS: usize = MSI_VECTOR_COUNT.div_ceil(64);

// =============================================================================
// Device State
// =============================================================================

/// State guarded by the allocation lock
#[derive(Debug)]
pub(crate) struct DeviceState {
    pub rx: Vec<PhyState>,
    pub tx: Vec<PhyState>,
    pub pool: QueuePool,
    pub ucode: UcodeState,
    pub channels: Vec<Option<LogicalChannel>>,
    /// Channels with issued descriptors, in first-issue order
    pub pending_channels: Vec<ChannelId>,
    pub msi: Vec<MsiMessage>,
}

impl DeviceState {
    fn new(config: &DeviceConfig) -> Self {
        let mut channels = Vec::with_capacity(config.dma_channels);
        channels.resize_with(config.dma_channels, || None);
        Self {
            rx: (0..RX_CHANNEL_COUNT)
                .map(|i| PhyState::new(PhyId::rx(i)))
                .collect(),
            tx: (0..TX_JOB_QUEUE_COUNT)
                .map(|i| PhyState::new(PhyId::tx(i)))
                .collect(),
            pool: QueuePool::new(),
            ucode: UcodeState::new(config.program_memory.start),
            channels,
            pending_channels: Vec::new(),
            msi: vec![MsiMessage::default(); MSI_VECTOR_COUNT],
        }
    }

    pub fn phy(&self, id: PhyId) -> Result<&PhyState> {
        let table = match id.dir {
            Direction::Rx => &self.rx,
            Direction::Tx => &self.tx,
        };
        table
            .get(id.hw_id)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidPhyId))
    }

    pub fn phy_mut(&mut self, id: PhyId) -> Result<&mut PhyState> {
        let table = match id.dir {
            Direction::Rx => &mut self.rx,
            Direction::Tx => &mut self.tx,
        };
        table
            .get_mut(id.hw_id)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidPhyId))
    }

    pub fn channel(&self, id: ChannelId) -> Result<&LogicalChannel> {
        self.channels
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidChannelId))
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Result<&mut LogicalChannel> {
        self.channels
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidChannelId))
    }
}

// =============================================================================
// Device
// =============================================================================

/// One kvx DMA controller
///
/// Create it once per controller with [`DmaDevice::new`], load the
/// default microcode, then reserve channels. Channel handles borrow the
/// device, so it cannot be dropped while a handle is alive; dropping it
/// stops every queue still running and frees all queue memory.
///
/// # Example
///
/// ```ignore
/// let config = DeviceConfig::new().with_vchan(0);
/// let dev = DmaDevice::new(bus, allocator, config)?;
/// dev.load_default_ucodes(&firmware)?;
///
/// let route = RouteParams { noc_route: 0x1234, rx_tag: 3, qos_id: 0 };
/// let tx = dev.reserve_tx_channel(0, TransferType::Mem2Eth, &route)?;
/// let frags = [Fragment::new(buf, 60)];
/// let job_id = dev.submit_packet(&tx, &frags, tx.route_id(), &mut delay)?;
/// while dev.tx_completion_count(&tx) < job_id {}
/// dev.release_channel(tx)?;
/// ```
pub struct DmaDevice<B: RegisterBus, A: DmaAllocator> {
    pub(super) bus: B,
    pub(super) allocator: A,
    pub(super) config: DeviceConfig,
    pub(super) size_log2: u32,
    pub(super) vchan: u32,
    pub(super) state: CriticalSectionCell<DeviceState>,
    /// Software write counters, one per TX job queue
    pub(super) tickets: Vec<TicketCounter>,
    /// Latched error vector, zero when clear
    pub(super) err_vec: AtomicU64,
    pub(super) irq_enabled: AtomicBitmap<MSI_WORDS>,
    /// Phys that signaled since the last completion run
    pub(super) pending: AtomicBitmap<MSI_WORDS>,
    pub(super) fallback: AtomicBool,
    pub(super) worker: SingleFlight,
}

impl<B: RegisterBus, A: DmaAllocator> DmaDevice<B, A> {
    /// Bring up a controller
    ///
    /// Validates `config` and builds every physical channel in the unused
    /// state. No register is written until a channel is reserved or a
    /// program loaded. All phy interrupts start enabled.
    pub fn new(bus: B, allocator: A, config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        let invalid = Error::InvalidArgument(ArgumentError::InvalidConfig);
        let size_log2 = capacity_log2(config.dma_requests).ok_or(invalid)?;
        let vchan = config.vchan.ok_or(invalid)?;

        let irq_enabled = AtomicBitmap::new();
        for index in 0..MSI_VECTOR_COUNT {
            irq_enabled.set(index);
        }

        dma_info!(
            "kvx DMA: {} channels, {} slots per queue, vchan {}, asn {:#x}",
            config.dma_channels,
            1u64 << size_log2,
            vchan,
            config.asn
        );

        Ok(Self {
            bus,
            allocator,
            state: CriticalSectionCell::new(DeviceState::new(&config)),
            config,
            size_log2,
            vchan,
            tickets: (0..TX_JOB_QUEUE_COUNT)
                .map(|_| TicketCounter::new(1 << size_log2))
                .collect(),
            err_vec: AtomicU64::new(0),
            irq_enabled,
            pending: AtomicBitmap::new(),
            fallback: AtomicBool::new(false),
            worker: SingleFlight::new(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Configuration the device was created with
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Register bus
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// DMA memory allocator
    pub const fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Maximum descriptors per queue, as configured
    pub const fn max_descriptors(&self) -> usize {
        self.config.dma_requests
    }

    /// Slots actually allocated per hardware queue
    pub const fn queue_capacity(&self) -> u64 {
        1 << self.size_log2
    }

    /// Number of reservations held on `phy`
    pub fn phy_refcount(&self, phy: PhyId) -> usize {
        self.state
            .with(|s| s.phy(phy).map_or(0, |p| p.refcount))
    }

    /// Latched hardware error vector, zero when no error is pending
    pub fn latched_error(&self) -> u64 {
        self.err_vec.load(Ordering::Acquire)
    }

    /// Set the notification target of MSI vector `index`
    ///
    /// Takes effect for queues initialized afterwards.
    pub fn configure_msi(&self, index: usize, msg: MsiMessage) -> Result<()> {
        PhyId::from_msi_index(index)?;
        self.state.with(|s| {
            if let Some(slot) = s.msi.get_mut(index) {
                *slot = msg;
            }
        });
        dma_debug!("msi[{}] -> {:#x} data {:#x}", index, msg.address, msg.data);
        Ok(())
    }

    // =========================================================================
    // Microcode
    // =========================================================================

    /// Load firmware `name` into program memory under a fresh program id
    pub fn load_ucode<L: FirmwareLoader + ?Sized>(
        &self,
        loader: &L,
        name: &str,
        mode: TransferMode,
    ) -> Result<u8> {
        self.state.with(|s| {
            load_program(&self.bus, &self.config, &mut s.ucode, loader, name, mode)
        })
    }

    /// Load the mem2mem, mem2noc and mem2eth programs
    ///
    /// Each becomes the program used by transfers of its type.
    pub fn load_default_ucodes<L: FirmwareLoader + ?Sized>(&self, loader: &L) -> Result<()> {
        for (transfer, name, mode) in DEFAULT_PROGRAMS {
            let id = self.load_ucode(loader, name, mode)?;
            self.state.with(|s| s.ucode.set_program(transfer, id));
        }
        Ok(())
    }

    /// Program used for `transfer`, once loaded
    pub fn program_id(&self, transfer: TransferType) -> Option<u8> {
        self.state.with(|s| s.ucode.program(transfer))
    }

    // =========================================================================
    // Phy Reservation
    // =========================================================================

    pub(super) fn queue_setup(&self, msi: &[MsiMessage], phy: PhyId) -> QueueSetup {
        QueueSetup {
            size_log2: self.size_log2,
            asn: self.config.asn,
            global: self.config.is_asn_global(),
            notify: msi.get(phy.msi_index()).copied().unwrap_or_default(),
        }
    }

    /// Take a reference on TX phy `hw_id`, programming it on first use
    ///
    /// Returns true when the queues were initialized by this call.
    pub(super) fn acquire_tx_phy(
        &self,
        state: &mut DeviceState,
        hw_id: usize,
        transfer: TransferType,
    ) -> Result<bool> {
        if !self.config.tx_job_queue_ids.contains(hw_id) {
            dma_error!("TX job queue {} outside the device range", hw_id);
            return Err(ArgumentError::InvalidPhyId.into());
        }
        let setup = self.queue_setup(&state.msi, PhyId::tx(hw_id));
        let DeviceState { tx, pool, .. } = state;
        let phy = tx
            .get_mut(hw_id)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidPhyId))?;

        if phy.refcount > 0 {
            if phy.transfer != transfer {
                dma_error!(
                    "TX phy {} reserved for {:?}, refusing {:?}",
                    hw_id,
                    phy.transfer,
                    transfer
                );
                return Err(Error::AlreadyInUse);
            }
            phy.refcount += 1;
            dma_debug!("TX phy {} shared, refcount {}", hw_id, phy.refcount);
            return Ok(false);
        }

        phy.transfer = transfer;
        phy.allocate_queues(&self.allocator, pool, self.size_log2)?;
        if let Err(e) = phy.init_tx_queues(&self.bus, &setup) {
            dma_error!("unable to init TX queues of phy {}", hw_id);
            phy.release_queues(&self.bus, &self.allocator, pool);
            return Err(e);
        }
        if let Some(counter) = self.tickets.get(hw_id) {
            counter.reset();
        }
        phy.refcount = 1;
        dma_debug!("TX phy {} reserved for {:?}", hw_id, transfer);
        Ok(true)
    }

    /// Reserve RX phy `hw_id` for `transfer`
    ///
    /// RX phys are never shared. A channel the hardware reports active is
    /// refused, since another software instance may own it.
    pub(super) fn acquire_rx_phy(
        &self,
        state: &mut DeviceState,
        hw_id: usize,
        rx_cache_id: usize,
        transfer: TransferType,
        callback: Option<RxCallback>,
    ) -> Result<()> {
        if transfer == TransferType::Mem2Mem {
            return Err(ArgumentError::UnsupportedTransfer.into());
        }
        if rx_cache_id >= RX_CACHE_COUNT {
            return Err(ArgumentError::InvalidCacheId.into());
        }
        let setup = self.queue_setup(&state.msi, PhyId::rx(hw_id));
        let DeviceState { rx, pool, .. } = state;
        let phy = rx
            .get_mut(hw_id)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidPhyId))?;

        if !phy.is_unused() || phy.rx_channel_active(&self.bus) {
            dma_error!("RX channel {} already in use", hw_id);
            return Err(Error::AlreadyInUse);
        }

        phy.transfer = transfer;
        phy.rx_cache_id = rx_cache_id;
        let first = phy.allocate_queues(&self.allocator, pool, self.size_log2)?;
        if let Err(e) = phy.init_rx_queues(&self.bus, &setup, first) {
            dma_error!("unable to init RX queues of phy {}", hw_id);
            phy.release_queues(&self.bus, &self.allocator, pool);
            return Err(e);
        }
        phy.refcount = 1;
        phy.rx_callback = callback;
        dma_debug!("RX phy {} reserved, cache {}", hw_id, rx_cache_id);
        Ok(())
    }

    /// Drop a reference on `id`; the last one stops and frees its queues
    pub(super) fn release_phy(&self, state: &mut DeviceState, id: PhyId) -> Result<()> {
        let DeviceState { rx, tx, pool, .. } = state;
        let table = match id.dir {
            Direction::Rx => rx,
            Direction::Tx => tx,
        };
        let phy = table
            .get_mut(id.hw_id)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidPhyId))?;
        if phy.is_unused() {
            dma_warn!("release of unused phy {:?}", id);
            return Err(ArgumentError::InvalidPhyId.into());
        }

        phy.refcount -= 1;
        if phy.refcount == 0 {
            phy.release_queues(&self.bus, &self.allocator, pool);
            phy.rx_callback = None;
            phy.bound.clear();
            dma_debug!("phy {:?} released", id);
        }
        Ok(())
    }

    /// Release a channel obtained from `reserve_rx_channel`,
    /// `reserve_rx_fifo_channel` or `reserve_tx_channel`
    pub fn release_channel<'d>(&'d self, channel: impl Into<ReservedChannel<'d>>) -> Result<()> {
        let id = match channel.into() {
            ReservedChannel::Rx(rx) => rx.phy(),
            ReservedChannel::Tx(tx) => tx.phy(),
        };
        self.state.with(|s| self.release_phy(s, id))
    }
}

impl<B: RegisterBus, A: DmaAllocator> Drop for DmaDevice<B, A> {
    fn drop(&mut self) {
        let bus = &self.bus;
        let allocator = &self.allocator;
        self.state.with(|s| {
            let DeviceState { rx, tx, pool, .. } = s;
            for phy in rx.iter_mut().chain(tx.iter_mut()) {
                if !phy.is_unused() {
                    phy.release_queues(bus, allocator, pool);
                    phy.refcount = 0;
                }
            }
            pool.drain(allocator);
        });
    }
}

// =============================================================================
// Reserved Channel
// =============================================================================

/// Either kind of reserved channel handle
#[derive(Debug)]
pub enum ReservedChannel<'d> {
    /// RX channel handle
    Rx(RxChannel<'d>),
    /// TX channel handle
    Tx(TxChannel<'d>),
}

impl<'d> From<RxChannel<'d>> for ReservedChannel<'d> {
    fn from(rx: RxChannel<'d>) -> Self {
        Self::Rx(rx)
    }
}

impl<'d> From<TxChannel<'d>> for ReservedChannel<'d> {
    fn from(tx: TxChannel<'d>) -> Self {
        Self::Tx(tx)
    }
}

// =============================================================================
// Tests
// =============================================================================
