//! Device-Wide Register Definitions
//!
//! Interrupt vector, error status summary and the NoC route table.

// =============================================================================
// Interrupt Block
// =============================================================================

/// Interrupt block offset
pub const IT_OFFSET: usize = 0x5_0000;
/// Interrupt enable
pub const IT_EN: usize = 0x00;
/// Pending interrupt vector
pub const IT_VECTOR: usize = 0x10;
/// Pending interrupt vector, load-and-clear alias
pub const IT_VECTOR_LAC: usize = 0x18;

/// Bits of the interrupt vector that carry error causes
pub const IT_VECTOR_MASK: u64 = 0x7FFF_0FFF;

// =============================================================================
// Error Status Block
// =============================================================================

/// Error status block offset
pub const ERROR_OFFSET: usize = 0x5_1000;
/// RX channels in error (bit per channel)
pub const ERROR_RX_CHAN_STATUS: usize = 0x00;
/// RX job queues in error (bit per queue)
pub const ERROR_RX_JOB_STATUS: usize = 0x10;
/// TX job queues in error (bit per queue)
pub const ERROR_TX_JOB_STATUS: usize = 0x20;
/// TX threads in error (bit per thread)
pub const ERROR_TX_THREAD_STATUS: usize = 0x30;
/// TX completion queues in error (bit per queue)
pub const ERROR_TX_COMP_STATUS: usize = 0x40;

// =============================================================================
// NoC Route Table
// =============================================================================

/// Route table offset
pub const NOC_ROUTE_TABLE_OFFSET: usize = 0x6_6000;
/// Size of a route table entry
pub const NOC_ROUTE_TABLE_ELEM_SIZE: usize = 0x8;

/// Mask of the raw NoC route field
pub const NOC_ROUTE_MASK: u64 = 0xFF_FFFF_FFFF;
/// RX tag shift
pub const NOC_ROUTE_RX_TAG_SHIFT: u32 = 40;
/// RX tag mask (after shift)
pub const NOC_ROUTE_RX_TAG_MASK: u64 = 0x3F;
/// QoS id shift
pub const NOC_ROUTE_QOS_ID_SHIFT: u32 = 46;
/// Global address space shift
pub const NOC_ROUTE_GLOBAL_SHIFT: u32 = 50;
/// ASN shift
pub const NOC_ROUTE_ASN_SHIFT: u32 = 51;
/// Virtual channel shift
pub const NOC_ROUTE_VCHAN_SHIFT: u32 = 60;
/// Valid bit shift
pub const NOC_ROUTE_VALID_SHIFT: u32 = 61;

/// Offset of route table entry `id`
pub const fn route_table_entry(id: usize) -> usize {
    NOC_ROUTE_TABLE_OFFSET + id * NOC_ROUTE_TABLE_ELEM_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_entries_are_words() {
        assert_eq!(route_table_entry(0), 0x6_6000);
        assert_eq!(route_table_entry(511), 0x6_6FF8);
    }

    #[test]
    fn route_fields_do_not_overlap() {
        assert_eq!(NOC_ROUTE_MASK >> NOC_ROUTE_RX_TAG_SHIFT, 0);
        assert!(NOC_ROUTE_RX_TAG_SHIFT + 6 <= NOC_ROUTE_QOS_ID_SHIFT);
        assert!(NOC_ROUTE_ASN_SHIFT + 9 <= NOC_ROUTE_VCHAN_SHIFT);
    }
}
