//! Physical channels
//!
//! The controller has 64 RX channels and 64 TX job/completion queue pairs.
//! A physical channel ("phy") aggregates the hardware queues of one of
//! them. Phys are created at bring-up in the unused state; the first
//! reservation allocates and programs their queues, later reservations only
//! take a reference, and the last release stops the queues and frees their
//! memory.
//!
//! Everything here runs under the device allocation lock.

use alloc::vec::Vec;
use core::sync::atomic::{Ordering, fence};

use super::channel::ChannelId;
use super::config::{Direction, MsiMessage, TransferType};
use crate::constants::{
    MSI_VECTOR_COUNT, RX_CHANNEL_COUNT, RX_CHANNEL_ENTRY_SIZE, RX_COMPLETION_ENTRY_SIZE,
    RX_JOB_ENTRY_SIZE, TX_HEADER_ENTRY_SIZE, TX_JOB_ENTRY_SIZE, TX_JOB_QUEUE_COUNT,
    TX_THREAD_ID,
};
use crate::error::{ArgumentError, Error, ResourceKind, Result};
use crate::internal::dma::memory::{DmaAllocator, DmaRegion, DmaView};
use crate::internal::dma::pool::QueuePool;
use crate::internal::dma::ring::HardwareRing;
use crate::internal::register::rx::{
    self, COMPLETION_QUEUE_MODE, COMPLETION_STATIC_MODE, RX_CNT_CLEAR_MODE_PACKET,
    RX_COMP_FIELD_FULL, RX_Q_CFG_EN, RX_Q_CFG_FIELD_SEL_SHIFT, RX_Q_DISABLE,
};
use crate::internal::register::tx::{self, TX_COMPL_FIELD_NONE};
use crate::internal::register::{QueueStatus, RegisterBus, RegisterWindow};
use crate::internal::trace::{dma_debug, dma_error};

/// Callback invoked from the interrupt handler for RX phys without bound
/// logical channels
pub type RxCallback = fn(PhyId);

// =============================================================================
// Phy Identity
// =============================================================================

/// Identity of a physical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhyId {
    /// RX channel or TX queue pair
    pub dir: Direction,
    /// Hardware index within its direction
    pub hw_id: usize,
}

impl PhyId {
    /// RX channel `hw_id`
    #[must_use]
    pub const fn rx(hw_id: usize) -> Self {
        Self {
            dir: Direction::Rx,
            hw_id,
        }
    }

    /// TX queue pair `hw_id`
    #[must_use]
    pub const fn tx(hw_id: usize) -> Self {
        Self {
            dir: Direction::Tx,
            hw_id,
        }
    }

    /// Interrupt vector index: RX phys first, then TX phys
    pub const fn msi_index(&self) -> usize {
        match self.dir {
            Direction::Rx => self.hw_id,
            Direction::Tx => RX_CHANNEL_COUNT + self.hw_id,
        }
    }

    /// Phy served by interrupt vector `index`
    pub const fn from_msi_index(index: usize) -> Result<Self> {
        if index < RX_CHANNEL_COUNT {
            Ok(Self::rx(index))
        } else if index < MSI_VECTOR_COUNT {
            Ok(Self::tx(index - RX_CHANNEL_COUNT))
        } else {
            Err(Error::InvalidArgument(ArgumentError::InvalidMsiIndex))
        }
    }

    pub(crate) const fn check(&self) -> Result<()> {
        let limit = match self.dir {
            Direction::Rx => RX_CHANNEL_COUNT,
            Direction::Tx => TX_JOB_QUEUE_COUNT,
        };
        if self.hw_id < limit {
            Ok(())
        } else {
            Err(Error::InvalidArgument(ArgumentError::InvalidPhyId))
        }
    }
}

// =============================================================================
// Queue Setup Parameters
// =============================================================================

/// Device-wide values programmed into every queue
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueSetup {
    pub size_log2: u32,
    pub asn: u32,
    pub global: bool,
    pub notify: MsiMessage,
}

/// Memory owned by a phy
#[derive(Debug, Default)]
pub(crate) struct PhyQueues {
    /// RX channel buffer queue (RX mem2eth)
    chan: Option<DmaRegion>,
    /// RX completion queue (RX mem2eth)
    comp: Option<DmaRegion>,
    /// TX header queue (TX mem2eth)
    hdr: Option<DmaRegion>,
    /// Job queue memory, owned by the pool
    job: Option<DmaView>,
}

// =============================================================================
// Phy State
// =============================================================================

/// Book-keeping of one physical channel
#[derive(Debug)]
pub(crate) struct PhyState {
    pub id: PhyId,
    pub refcount: usize,
    pub transfer: TransferType,
    pub rx_cache_id: usize,
    pub queues: PhyQueues,
    /// Logical channels bound to this phy
    pub bound: Vec<ChannelId>,
    pub rx_callback: Option<RxCallback>,
}

impl PhyState {
    pub fn new(id: PhyId) -> Self {
        Self {
            id,
            refcount: 0,
            transfer: TransferType::default(),
            rx_cache_id: 0,
            queues: PhyQueues::default(),
            bound: Vec::new(),
            rx_callback: None,
        }
    }

    pub const fn is_unused(&self) -> bool {
        self.refcount == 0
    }

    // =========================================================================
    // Register Windows
    // =========================================================================

    pub const fn rx_channel(&self) -> RegisterWindow {
        rx::rx_channel(self.id.hw_id)
    }

    pub const fn rx_job_queue(&self) -> RegisterWindow {
        rx::rx_job_queue(QueuePool::rx_job_queue_index(self.rx_cache_id))
    }

    pub const fn tx_job_queue(&self) -> RegisterWindow {
        tx::tx_job_queue(self.id.hw_id)
    }

    pub const fn tx_completion_queue(&self) -> RegisterWindow {
        tx::tx_completion_queue(self.id.hw_id)
    }

    // =========================================================================
    // Rings
    // =========================================================================

    pub fn rx_job_ring(&self, size_log2: u32) -> Option<HardwareRing> {
        self.queues
            .job
            .map(|mem| HardwareRing::new(mem, size_log2, RX_JOB_ENTRY_SIZE))
    }

    pub fn rx_completion_ring(&self, size_log2: u32) -> Option<HardwareRing> {
        self.queues
            .comp
            .as_ref()
            .map(|r| HardwareRing::new(r.view(), size_log2, RX_COMPLETION_ENTRY_SIZE))
    }

    pub fn tx_job_ring(&self, size_log2: u32) -> Option<HardwareRing> {
        self.queues
            .job
            .map(|mem| HardwareRing::new(mem, size_log2, TX_JOB_ENTRY_SIZE))
    }

    pub fn tx_header_ring(&self, size_log2: u32) -> Option<HardwareRing> {
        self.queues
            .hdr
            .as_ref()
            .map(|r| HardwareRing::new(r.view(), size_log2, TX_HEADER_ENTRY_SIZE))
    }

    pub const fn has_job_queue(&self) -> bool {
        self.queues.job.is_some()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate the queues needed by this phy's transfer type
    ///
    /// Returns true when this phy allocated its job queue (as opposed to
    /// joining a shared RX job queue). On failure everything allocated so
    /// far is returned.
    pub fn allocate_queues<A: DmaAllocator + ?Sized>(
        &mut self,
        allocator: &A,
        pool: &mut QueuePool,
        size_log2: u32,
    ) -> Result<bool> {
        let result = self.try_allocate(allocator, pool, size_log2);
        if result.is_err() {
            self.free_queue_memory(allocator, pool);
        }
        result
    }

    fn try_allocate<A: DmaAllocator + ?Sized>(
        &mut self,
        allocator: &A,
        pool: &mut QueuePool,
        size_log2: u32,
    ) -> Result<bool> {
        let cap = 1usize << size_log2;
        let hw_id = self.id.hw_id;
        match (self.id.dir, self.transfer) {
            (Direction::Rx, TransferType::Mem2Eth) => {
                self.queues.chan = Some(alloc_region(allocator, cap * RX_CHANNEL_ENTRY_SIZE)
                    .inspect_err(|_| dma_error!("can't allocate RX chan queue[{}]", hw_id))?);
                let lease = pool.acquire_rx(allocator, self.rx_cache_id, cap * RX_JOB_ENTRY_SIZE)?;
                self.queues.job = Some(lease.mem);
                self.queues.comp =
                    Some(alloc_region(allocator, cap * RX_COMPLETION_ENTRY_SIZE).inspect_err(
                        |_| dma_error!("unable to alloc RX comp queue[{}]", hw_id),
                    )?);
                Ok(lease.first)
            }
            (Direction::Rx, _) => {
                dma_debug!("no RX job queue alloc for phy {} (static mode)", hw_id);
                Ok(false)
            }
            (Direction::Tx, transfer) => {
                self.queues.job = Some(pool.acquire_tx(allocator, hw_id, cap * TX_JOB_ENTRY_SIZE)?);
                if transfer == TransferType::Mem2Eth {
                    self.queues.hdr = Some(alloc_region(allocator, cap * TX_HEADER_ENTRY_SIZE)
                        .inspect_err(|_| dma_error!("can't allocate TX header queue[{}]", hw_id))?);
                }
                Ok(true)
            }
        }
    }

    /// Return every region this phy holds
    pub fn free_queue_memory<A: DmaAllocator + ?Sized>(
        &mut self,
        allocator: &A,
        pool: &mut QueuePool,
    ) {
        for region in [
            self.queues.chan.take(),
            self.queues.comp.take(),
            self.queues.hdr.take(),
        ]
        .into_iter()
        .flatten()
        {
            allocator.free(region);
        }
        if self.queues.job.take().is_some() {
            match self.id.dir {
                Direction::Rx => {
                    pool.release_rx(allocator, self.rx_cache_id);
                }
                Direction::Tx => {
                    pool.release_tx(allocator, self.id.hw_id);
                }
            }
        }
    }

    /// Stop the hardware queues, then free their memory
    ///
    /// The shared RX job queue is stopped only by its last user.
    pub fn release_queues<B, A>(&mut self, bus: &B, allocator: &A, pool: &mut QueuePool)
    where
        B: RegisterBus + ?Sized,
        A: DmaAllocator + ?Sized,
    {
        let last_jobq_user = match self.id.dir {
            Direction::Rx => pool.rx_refcount(self.rx_cache_id) <= 1,
            Direction::Tx => true,
        };
        self.stop_queues(bus, last_jobq_user);
        self.free_queue_memory(allocator, pool);
    }

    // =========================================================================
    // Hardware Programming
    // =========================================================================

    /// Stop this phy's queues
    pub fn stop_queues<B: RegisterBus + ?Sized>(&self, bus: &B, stop_job_queue: bool) {
        match self.id.dir {
            Direction::Tx => {
                if self.has_job_queue() {
                    self.tx_job_queue().write(bus, tx::TX_JOB_Q_STOP, 1);
                }
                self.tx_completion_queue().write(bus, tx::TX_COMP_Q_STOP, 1);
            }
            Direction::Rx => {
                if self.transfer != TransferType::Mem2Mem {
                    self.rx_channel().write(bus, rx::RX_CHAN_ACTIVATED, 0);
                }
                if self.has_job_queue() && stop_job_queue {
                    self.rx_job_queue().write(bus, rx::RX_JOB_Q_STOP, 1);
                }
            }
        }
    }

    /// Program the RX queues for this phy's transfer type
    ///
    /// `init_job_queue` is set for the first user of the shared RX job
    /// queue; later users must not reset its pointers.
    pub fn init_rx_queues<B: RegisterBus + ?Sized>(
        &self,
        bus: &B,
        setup: &QueueSetup,
        init_job_queue: bool,
    ) -> Result<()> {
        self.stop_queues(bus, init_job_queue);
        match self.transfer {
            TransferType::Mem2Eth => {
                if init_job_queue {
                    self.init_rx_job_queue(bus, setup)?;
                }
                self.init_rx_packet_channel(bus, setup)
            }
            TransferType::Mem2Noc => {
                self.init_rx_fifo_channel(bus, setup);
                Ok(())
            }
            TransferType::Mem2Mem => Ok(()),
        }
    }

    fn init_rx_job_queue<B: RegisterBus + ?Sized>(&self, bus: &B, setup: &QueueSetup) -> Result<()> {
        let Some(mem) = self.queues.job else {
            dma_error!("RX job queue of phy {} not allocated", self.id.hw_id);
            return Err(ResourceKind::QueueMemory.into());
        };
        let q = self.rx_job_queue();
        if q.read(bus, rx::RX_JOB_Q_ACTIVATE) == 1 {
            dma_error!("RX job queue[{}] already activated", self.id.hw_id);
            return Err(Error::AlreadyInUse);
        }
        q.write(bus, rx::RX_JOB_Q_SA, mem.dma_addr());
        q.write(bus, rx::RX_JOB_Q_NB_LOG2, setup.size_log2 as u64);
        q.write(bus, rx::RX_JOB_Q_WP, 0);
        q.write(bus, rx::RX_JOB_Q_VALID_WP, 0);
        q.write(bus, rx::RX_JOB_Q_RP, 0);
        q.write(bus, rx::RX_JOB_Q_NOTIF_ADDR, setup.notify.address);
        q.write(bus, rx::RX_JOB_Q_NOTIF_ARG, setup.notify.data);
        q.write(bus, rx::RX_JOB_Q_NOTIF_MODE, 1);
        q.write(bus, rx::RX_JOB_Q_CACHE_ID, self.rx_cache_id as u64);
        q.write(bus, rx::RX_JOB_Q_ASN, setup.asn as u64);
        fence(Ordering::Release);
        q.write(bus, rx::RX_JOB_Q_ACTIVATE, 1);
        Ok(())
    }

    fn init_rx_packet_channel<B: RegisterBus + ?Sized>(
        &self,
        bus: &B,
        setup: &QueueSetup,
    ) -> Result<()> {
        let Some(comp) = self.queues.comp.as_ref() else {
            return Err(ResourceKind::QueueMemory.into());
        };
        let c = self.rx_channel();
        dma_debug!("enabling rx_channel[{}] in packet mode", self.id.hw_id);
        c.write(bus, rx::RX_CHAN_BUF_EN, 0);
        c.write(bus, rx::RX_CHAN_BUF_SA, 0);
        c.write(bus, rx::RX_CHAN_BUF_SIZE, 0);
        c.write(
            bus,
            rx::RX_CHAN_JOB_Q_CFG,
            RX_Q_CFG_EN | ((self.rx_cache_id as u64) << RX_Q_CFG_FIELD_SEL_SHIFT),
        );
        c.write(bus, rx::RX_CHAN_CUR, 0);
        c.write(bus, rx::RX_CHAN_BYTE_CNT, 0);
        c.write(bus, rx::RX_CHAN_NOTIF_CNT, 0);
        c.write(bus, rx::RX_CHAN_CNT_CLEAR_MODE, RX_CNT_CLEAR_MODE_PACKET);
        c.write(
            bus,
            rx::RX_CHAN_COMP_Q_CFG,
            RX_Q_CFG_EN | (RX_COMP_FIELD_FULL << RX_Q_CFG_FIELD_SEL_SHIFT),
        );
        c.write(bus, rx::RX_CHAN_COMP_Q_MODE, COMPLETION_QUEUE_MODE);
        c.write(bus, rx::RX_CHAN_COMP_Q_SA, comp.dma_addr());
        c.write(bus, rx::RX_CHAN_COMP_Q_SLOT_NB_LOG2, setup.size_log2 as u64);
        c.write(bus, rx::RX_CHAN_COMP_Q_WP, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_RP, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_VALID_RP, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_NOTIF_ADDR, setup.notify.address);
        c.write(bus, rx::RX_CHAN_COMP_Q_NOTIF_ARG, setup.notify.data);
        c.write(bus, rx::RX_CHAN_COMP_Q_ASN, setup.asn as u64);
        fence(Ordering::Release);
        c.write(bus, rx::RX_CHAN_ACTIVATED, 1);
        Ok(())
    }

    /// Static-mode channel; stays inactive until a buffer is attached
    fn init_rx_fifo_channel<B: RegisterBus + ?Sized>(&self, bus: &B, setup: &QueueSetup) {
        let c = self.rx_channel();
        c.write(bus, rx::RX_CHAN_ACTIVATED, 0);
        fence(Ordering::SeqCst);
        dma_debug!("enabling rx_channel[{}] in static mode", self.id.hw_id);
        c.write(bus, rx::RX_CHAN_BUF_EN, 1);
        c.write(bus, rx::RX_CHAN_JOB_Q_CFG, RX_Q_DISABLE);
        c.write(bus, rx::RX_CHAN_CUR, 0);
        c.write(bus, rx::RX_CHAN_BYTE_CNT, 0);
        c.write(bus, rx::RX_CHAN_NOTIF_CNT, 0);
        c.write(bus, rx::RX_CHAN_CNT_CLEAR_MODE, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_CFG, RX_Q_CFG_EN);
        c.write(bus, rx::RX_CHAN_COMP_Q_MODE, COMPLETION_STATIC_MODE);
        c.write(bus, rx::RX_CHAN_COMP_Q_SA, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_SLOT_NB_LOG2, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_WP, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_RP, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_VALID_RP, 0);
        c.write(bus, rx::RX_CHAN_COMP_Q_NOTIF_ADDR, setup.notify.address);
        c.write(bus, rx::RX_CHAN_COMP_Q_NOTIF_ARG, setup.notify.data);
        c.write(bus, rx::RX_CHAN_COMP_Q_ASN, setup.asn as u64);
        fence(Ordering::SeqCst);
    }

    /// Attach the receive buffer of a static-mode channel and start it
    pub fn attach_rx_buffer<B: RegisterBus + ?Sized>(&self, bus: &B, addr: u64, len: u64) {
        let c = self.rx_channel();
        c.write(bus, rx::RX_CHAN_BUF_SA, addr);
        c.write(bus, rx::RX_CHAN_BUF_SIZE, len);
        dma_debug!("RX queue[{}] buffer {:#x} size {}", self.id.hw_id, addr, len);
        fence(Ordering::Release);
        c.write(bus, rx::RX_CHAN_ACTIVATED, 1);
    }

    /// Program and start the TX job queue and its static completion queue
    pub fn init_tx_queues<B: RegisterBus + ?Sized>(&self, bus: &B, setup: &QueueSetup) -> Result<()> {
        self.stop_queues(bus, true);
        self.init_tx_job_queue(bus, setup)?;
        self.init_tx_completion_queue(bus, setup)
    }

    fn init_tx_job_queue<B: RegisterBus + ?Sized>(&self, bus: &B, setup: &QueueSetup) -> Result<()> {
        let Some(mem) = self.queues.job else {
            dma_error!("TX job queue[{}] not allocated", self.id.hw_id);
            return Err(ResourceKind::QueueMemory.into());
        };
        let q = self.tx_job_queue();
        q.write(bus, tx::TX_JOB_Q_SA, mem.dma_addr());
        q.write(bus, tx::TX_JOB_Q_NB_LOG2, setup.size_log2 as u64);
        q.write(bus, tx::TX_JOB_Q_WP, 0);
        q.write(bus, tx::TX_JOB_Q_VALID_WP, 0);
        q.write(bus, tx::TX_JOB_Q_RP, 0);
        q.write(bus, tx::TX_JOB_Q_NOTIF_ADDR, setup.notify.address);
        q.write(bus, tx::TX_JOB_Q_NOTIF_ARG, setup.notify.data);
        q.write(bus, tx::TX_JOB_Q_ASN, setup.asn as u64);
        q.write(bus, tx::TX_JOB_Q_THREAD_ID, TX_THREAD_ID);
        fence(Ordering::Release);
        q.write(bus, tx::TX_JOB_Q_ACTIVATE, 1);
        Ok(())
    }

    fn init_tx_completion_queue<B: RegisterBus + ?Sized>(
        &self,
        bus: &B,
        setup: &QueueSetup,
    ) -> Result<()> {
        let q = self.tx_completion_queue();
        let status = QueueStatus::from_raw(q.read(bus, tx::TX_COMP_Q_STATUS));
        if status != Some(QueueStatus::Stopped) {
            dma_error!("TX completion queue[{}] still running", self.id.hw_id);
            return Err(Error::Busy);
        }
        q.write(bus, tx::TX_COMP_Q_MODE, COMPLETION_STATIC_MODE);
        q.write(bus, tx::TX_COMP_Q_SA, 0);
        q.write(bus, tx::TX_COMP_Q_NB_LOG2, 0);
        q.write(bus, tx::TX_COMP_Q_GLOBAL, setup.global as u64);
        q.write(bus, tx::TX_COMP_Q_ASN, setup.asn as u64);
        q.write(bus, tx::TX_COMP_Q_FIELD_EN, TX_COMPL_FIELD_NONE);
        q.write(bus, tx::TX_COMP_Q_WP, 0);
        q.write(bus, tx::TX_COMP_Q_RP, 0);
        q.write(bus, tx::TX_COMP_Q_VALID_RP, 0);
        q.write(bus, tx::TX_COMP_Q_NOTIF_ADDR, setup.notify.address);
        q.write(bus, tx::TX_COMP_Q_NOTIF_ARG, setup.notify.data);
        fence(Ordering::Release);
        q.write(bus, tx::TX_COMP_Q_ACTIVATE, 1);

        let status = QueueStatus::from_raw(q.read(bus, tx::TX_COMP_Q_STATUS));
        if status != Some(QueueStatus::Running) {
            dma_error!("TX completion queue[{}] not running", self.id.hw_id);
            return Err(Error::Busy);
        }
        Ok(())
    }

    /// Whether the RX channel is already running, possibly for another
    /// software instance
    pub fn rx_channel_active<B: RegisterBus + ?Sized>(&self, bus: &B) -> bool {
        self.rx_channel().read(bus, rx::RX_CHAN_ACTIVATED) & 1 != 0
    }
}

fn alloc_region<A: DmaAllocator + ?Sized>(allocator: &A, size: usize) -> Result<DmaRegion> {
    allocator
        .alloc(size)
        .ok_or(Error::ResourceExhausted(ResourceKind::QueueMemory))
}

// =============================================================================
// Tests
// =============================================================================
