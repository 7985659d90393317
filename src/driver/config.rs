//! Configuration types for the kvx DMA engine

use crate::constants::{
    ASN_GLOBAL_BIT, DEFAULT_ASN, DEFAULT_DMA_CHANNELS, DEFAULT_DMA_REQUESTS,
    NOC_ROUTE_TABLE_SIZE, PROGRAM_MEMORY_WORDS, PROGRAM_TABLE_SIZE, RX_CACHE_COUNT,
    TX_COMPLETION_QUEUE_COUNT, TX_JOB_QUEUE_COUNT,
};
use crate::error::{ArgumentError, Result};

/// Half-open range of hardware ids `[start, start + nb)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdRange {
    /// First id
    pub start: usize,
    /// Number of ids
    pub nb: usize,
}

impl IdRange {
    /// Range of `nb` ids starting at `start`
    #[must_use]
    pub const fn new(start: usize, nb: usize) -> Self {
        Self { start, nb }
    }

    /// One past the last id
    pub const fn end(&self) -> usize {
        self.start + self.nb
    }

    /// Whether `id` lies in the range
    pub const fn contains(&self, id: usize) -> bool {
        id >= self.start && id < self.end()
    }

    /// Whether the range is non-empty and ends at or before `limit`
    pub const fn fits(&self, limit: usize) -> bool {
        self.nb > 0 && self.end() <= limit
    }
}

/// Transfer direction of a physical or logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Device to memory
    Rx,
    /// Memory to device (or memory to memory)
    #[default]
    Tx,
}

/// Kind of transfer carried by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferType {
    /// Local memory copy
    #[default]
    Mem2Mem,
    /// Memory to a remote NoC target
    Mem2Noc,
    /// Memory to the Ethernet controller, packet framed
    Mem2Eth,
}

impl TransferType {
    /// Index into per-transfer tables
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Program transfer mode, as written to the program table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferMode {
    /// Writes go out on the NoC
    #[default]
    Noc = 0,
    /// Writes go to the local AXI bus
    Axi = 1,
}

/// MSI notification target written to queue NOTIF registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MsiMessage {
    /// Doorbell address
    pub address: u64,
    /// Payload written to the doorbell
    pub data: u64,
}

/// Program scratch memory window
///
/// Programs are packed from `start`; a program fits while its last word
/// stays below word `size` of program memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgramMemory {
    /// First byte offset available for programs
    pub start: usize,
    /// End of the window in 8-byte words
    pub size: usize,
}

impl Default for ProgramMemory {
    fn default() -> Self {
        Self {
            start: 0,
            size: PROGRAM_MEMORY_WORDS,
        }
    }
}

/// Device-wide configuration
///
/// Mirrors what the platform resource-binding layer hands to the engine at
/// bring-up. Id ranges let several software instances partition one
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    /// Number of logical channel slots
    pub dma_channels: usize,
    /// Maximum descriptors per hardware queue
    pub dma_requests: usize,
    /// Program ids available to this instance
    pub ucode_ids: IdRange,
    /// Program scratch memory available to this instance
    pub program_memory: ProgramMemory,
    /// TX job queue ids available to this instance
    pub tx_job_queue_ids: IdRange,
    /// TX completion queue ids available to this instance
    pub tx_completion_queue_ids: IdRange,
    /// NoC route table slots available to this instance
    pub noc_route_ids: IdRange,
    /// NoC virtual channel used by every route
    pub vchan: Option<u32>,
    /// Address space number; bit 31 marks it global
    pub asn: u32,
    /// Allow reloading over valid program table entries
    pub ucode_reload: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceConfig {
    /// Create a configuration with defaults
    ///
    /// `vchan` has no default and must be set before bring-up.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dma_channels: DEFAULT_DMA_CHANNELS,
            dma_requests: DEFAULT_DMA_REQUESTS,
            ucode_ids: IdRange::new(0, PROGRAM_TABLE_SIZE),
            program_memory: ProgramMemory {
                start: 0,
                size: PROGRAM_MEMORY_WORDS,
            },
            tx_job_queue_ids: IdRange::new(0, TX_JOB_QUEUE_COUNT),
            tx_completion_queue_ids: IdRange::new(0, TX_COMPLETION_QUEUE_COUNT),
            noc_route_ids: IdRange::new(0, NOC_ROUTE_TABLE_SIZE),
            vchan: None,
            asn: DEFAULT_ASN,
            ucode_reload: false,
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the number of logical channel slots
    #[must_use]
    pub const fn with_dma_channels(mut self, channels: usize) -> Self {
        self.dma_channels = channels;
        self
    }

    /// Set the maximum number of descriptors per queue
    ///
    /// Queue capacity is the largest power of two not above this value.
    #[must_use]
    pub const fn with_dma_requests(mut self, requests: usize) -> Self {
        self.dma_requests = requests;
        self
    }

    /// Set the program id range
    #[must_use]
    pub const fn with_ucode_ids(mut self, ids: IdRange) -> Self {
        self.ucode_ids = ids;
        self
    }

    /// Set the program scratch memory window
    #[must_use]
    pub const fn with_program_memory(mut self, memory: ProgramMemory) -> Self {
        self.program_memory = memory;
        self
    }

    /// Set both TX job and completion queue id ranges
    #[must_use]
    pub const fn with_tx_queue_ids(mut self, ids: IdRange) -> Self {
        self.tx_job_queue_ids = ids;
        self.tx_completion_queue_ids = ids;
        self
    }

    /// Set the NoC route table slot range
    #[must_use]
    pub const fn with_noc_route_ids(mut self, ids: IdRange) -> Self {
        self.noc_route_ids = ids;
        self
    }

    /// Set the NoC virtual channel
    #[must_use]
    pub const fn with_vchan(mut self, vchan: u32) -> Self {
        self.vchan = Some(vchan);
        self
    }

    /// Set the address space number
    #[must_use]
    pub const fn with_asn(mut self, asn: u32) -> Self {
        self.asn = asn;
        self
    }

    /// Allow program reloads over valid table entries
    #[must_use]
    pub const fn with_ucode_reload(mut self, reload: bool) -> Self {
        self.ucode_reload = reload;
        self
    }

    // =========================================================================
    // Derived Values
    // =========================================================================

    /// Whether the ASN is marked global
    pub const fn is_asn_global(&self) -> bool {
        self.asn & (1 << ASN_GLOBAL_BIT) != 0
    }

    /// Check the configuration against the hardware limits
    pub fn validate(&self) -> Result<()> {
        let invalid = ArgumentError::InvalidConfig;
        if self.vchan.is_none() {
            return Err(invalid.into());
        }
        if self.dma_requests == 0 || self.dma_channels == 0 {
            return Err(invalid.into());
        }
        if self.tx_job_queue_ids != self.tx_completion_queue_ids {
            return Err(invalid.into());
        }
        if !self.tx_job_queue_ids.fits(TX_JOB_QUEUE_COUNT)
            || !self.tx_completion_queue_ids.fits(TX_COMPLETION_QUEUE_COUNT)
            || !self.noc_route_ids.fits(NOC_ROUTE_TABLE_SIZE)
        {
            return Err(invalid.into());
        }
        // Program ids past the table are rejected at load time; the pool
        // itself tracks at most 64 ids.
        if self.ucode_ids.nb == 0 || self.ucode_ids.nb > 64 {
            return Err(invalid.into());
        }
        if self.program_memory.start % 8 != 0
            || self.program_memory.size > PROGRAM_MEMORY_WORDS
            || self.program_memory.start / 8 > self.program_memory.size
        {
            return Err(invalid.into());
        }
        Ok(())
    }
}

/// Configuration of a logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Transfer direction
    pub direction: Direction,
    /// Transfer type
    pub transfer: TransferType,
    /// NoC route to the target (low 40 bits)
    pub noc_route: u64,
    /// RX tag; also selects the physical channel
    pub rx_tag: u8,
    /// QoS id
    pub qos_id: u8,
    /// RX job cache (RX only)
    pub rx_cache_id: usize,
}

impl ChannelConfig {
    /// Create a TX mem2mem configuration on physical channel 0
    #[must_use]
    pub const fn new() -> Self {
        Self {
            direction: Direction::Tx,
            transfer: TransferType::Mem2Mem,
            noc_route: 0,
            rx_tag: 0,
            qos_id: 0,
            rx_cache_id: 0,
        }
    }

    /// Set the direction
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the transfer type
    #[must_use]
    pub const fn with_transfer(mut self, transfer: TransferType) -> Self {
        self.transfer = transfer;
        self
    }

    /// Set the NoC route
    #[must_use]
    pub const fn with_noc_route(mut self, route: u64) -> Self {
        self.noc_route = route;
        self
    }

    /// Set the RX tag (physical channel id)
    #[must_use]
    pub const fn with_rx_tag(mut self, tag: u8) -> Self {
        self.rx_tag = tag;
        self
    }

    /// Set the QoS id
    #[must_use]
    pub const fn with_qos_id(mut self, qos: u8) -> Self {
        self.qos_id = qos;
        self
    }

    /// Set the RX job cache
    #[must_use]
    pub const fn with_rx_cache_id(mut self, cache: usize) -> Self {
        self.rx_cache_id = cache;
        self
    }

    /// Route parameters derived from this configuration
    pub const fn route(&self) -> RouteParams {
        RouteParams {
            noc_route: self.noc_route,
            rx_tag: self.rx_tag,
            qos_id: self.qos_id,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.direction == Direction::Rx && self.rx_cache_id >= RX_CACHE_COUNT {
            return Err(ArgumentError::InvalidCacheId.into());
        }
        Ok(())
    }
}

/// Inputs to a NoC route table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RouteParams {
    /// NoC route to the target (low 40 bits)
    pub noc_route: u64,
    /// Tag of the receiving RX channel on the target
    pub rx_tag: u8,
    /// QoS id
    pub qos_id: u8,
}

/// One contiguous buffer of a scatter list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fragment {
    /// Device address
    pub addr: u64,
    /// Length in bytes
    pub len: u64,
}

impl Fragment {
    /// Fragment of `len` bytes at `addr`
    #[must_use]
    pub const fn new(addr: u64, len: u64) -> Self {
        Self { addr, len }
    }
}

// =============================================================================
// Tests
// =============================================================================
