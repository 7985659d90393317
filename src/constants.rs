//! Centralized Constants
//!
//! This module provides a single source of truth for hardware resource
//! counts, default configuration values and polling budgets used throughout
//! the DMA engine.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Hardware resources**: number of channels, queues and table slots
//! - **Descriptor geometry**: sizes of the in-memory queue entries
//! - **Timing**: ticket and submit polling budgets
//! - **Default configuration**: values used by `DeviceConfig::new()`
//! - **Firmware**: names of the default microcode programs
//!
//! # Note
//!
//! Register offsets and bit fields remain in the register map modules
//! (`internal/register/*`) as they are specific to those hardware blocks.

// =============================================================================
// Hardware Resources
// =============================================================================

/// Number of RX channels (one per RX tag)
pub const RX_CHANNEL_COUNT: usize = 64;

/// Number of RX job queues
pub const RX_JOB_QUEUE_COUNT: usize = 8;

/// Number of RX job caches
pub const RX_CACHE_COUNT: usize = 4;

/// RX job queues reserved per RX job cache
pub const RX_JOB_QUEUES_PER_CACHE: usize = 2;

/// Number of TX micro-engine threads
pub const TX_THREAD_COUNT: usize = 4;

/// Number of TX job queues
pub const TX_JOB_QUEUE_COUNT: usize = 64;

/// Number of TX completion queues
pub const TX_COMPLETION_QUEUE_COUNT: usize = 64;

/// Number of entries in the NoC route table
pub const NOC_ROUTE_TABLE_SIZE: usize = 512;

/// Number of entries in the TX program table
pub const PROGRAM_TABLE_SIZE: usize = 16;

/// Size of the TX program memory, in 64-bit words
pub const PROGRAM_MEMORY_WORDS: usize = 128;

/// TX thread used for every job queue
pub const TX_THREAD_ID: u64 = 1;

/// Number of MSI vectors: one per RX channel then one per TX job queue
pub const MSI_VECTOR_COUNT: usize = RX_CHANNEL_COUNT + TX_JOB_QUEUE_COUNT;

// =============================================================================
// Descriptor Geometry
// =============================================================================

/// Parameters passed to a microcode program per job
pub const UCODE_PARAM_COUNT: usize = 8;

/// Maximum fragments per packet
pub const MAX_FRAGMENTS: usize = 8;

/// Size of an RX channel buffer queue entry in bytes
pub const RX_CHANNEL_ENTRY_SIZE: usize = 8;

/// Size of an RX job queue entry in bytes (base, size)
pub const RX_JOB_ENTRY_SIZE: usize = 16;

/// Size of an RX completion queue entry in bytes (base, size, byte count, notif)
pub const RX_COMPLETION_ENTRY_SIZE: usize = 32;

/// Size of a TX job queue entry in bytes (8 params, config, config_bis)
pub const TX_JOB_ENTRY_SIZE: usize = 80;

/// Size of a TX header queue entry in bytes
pub const TX_HEADER_ENTRY_SIZE: usize = 16;

// =============================================================================
// Address Space
// =============================================================================

/// Bit in the ASN word marking a global (non-translated) address space
pub const ASN_GLOBAL_BIT: u32 = 31;

/// Mask of the ASN value written to hardware
pub const ASN_MASK: u32 = 0x1FF;

/// Default ASN when no IOMMU is attached (global bit only)
pub const DEFAULT_ASN: u32 = 1 << ASN_GLOBAL_BIT;

// =============================================================================
// Timing Constants
// =============================================================================

/// Poll interval for bounded waits in microseconds
pub const POLL_INTERVAL_US: u32 = 1;

/// Maximum wait for queue space after acquiring a ticket, in microseconds
pub const TICKET_TIMEOUT_US: u32 = 2_000;

/// Maximum wait for the preceding tickets to commit, in microseconds
pub const SUBMIT_TIMEOUT_US: u32 = 2_000;

// =============================================================================
// Default Configuration
// =============================================================================

/// Default number of logical channel slots
pub const DEFAULT_DMA_CHANNELS: usize = 64;

/// Default maximum descriptors per queue
pub const DEFAULT_DMA_REQUESTS: usize = 127;

// =============================================================================
// Firmware
// =============================================================================

/// Memory-to-memory strided copy program
pub const MEM2MEM_UCODE_NAME: &str = "mem2mem_stride2stride.bin";

/// Memory-to-NoC strided copy program
pub const MEM2NOC_UCODE_NAME: &str = "mem2noc_stride2stride.bin";

/// Memory-to-Ethernet packet program
pub const MEM2ETH_UCODE_NAME: &str = "mem2eth.bin";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msi_vectors_cover_rx_and_tx() {
        assert_eq!(MSI_VECTOR_COUNT, 128);
    }

    #[test]
    fn rx_job_queues_match_caches() {
        assert_eq!(RX_CACHE_COUNT * RX_JOB_QUEUES_PER_CACHE, RX_JOB_QUEUE_COUNT);
    }

    #[test]
    fn tx_job_entry_holds_params_and_config() {
        assert_eq!(TX_JOB_ENTRY_SIZE, (UCODE_PARAM_COUNT + 2) * 8);
    }

    #[test]
    fn default_asn_is_global() {
        assert_eq!(DEFAULT_ASN, 0x8000_0000);
        assert_eq!(DEFAULT_ASN & ASN_MASK, 0);
    }
}
