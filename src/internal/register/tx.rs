//! TX Register Definitions
//!
//! TX job queues feed microcode programs running on the TX threads. Each
//! job names the program, the NoC route and the completion queue that
//! counts it when it retires.

use super::RegisterWindow;

// =============================================================================
// TX Thread / Program Blocks
// =============================================================================

/// TX thread block offset
pub const TX_THREAD_OFFSET: usize = 0x6_0000;
/// Stride between TX thread instances
pub const TX_THREAD_ELEM_SIZE: usize = 0x1000;
/// Thread error register
pub const TX_THREAD_ERROR: usize = 0x70;

/// Program memory offset
pub const TX_PGRM_MEM_OFFSET: usize = 0x6_4000;
/// Program table offset
pub const TX_PGRM_TAB_OFFSET: usize = 0x6_5000;
/// Size of a program table entry
pub const TX_PGRM_TAB_ELEM_SIZE: usize = 0x8;

/// Program table: start word in program memory (mask)
pub const PGRM_TAB_PM_START_MASK: u64 = 0x7F;
/// Program table: transfer mode shift
pub const PGRM_TAB_MODE_SHIFT: u32 = 7;
/// Program table: global address space shift
pub const PGRM_TAB_GLOBAL_SHIFT: u32 = 8;
/// Program table: ASN shift
pub const PGRM_TAB_ASN_SHIFT: u32 = 9;
/// Program table: valid bit shift
pub const PGRM_TAB_VALID_SHIFT: u32 = 18;

// =============================================================================
// TX Monitor Block
// =============================================================================

/// TX monitor block offset
pub const TX_MON_OFFSET: usize = 0x6_8000;
/// Per-thread outstanding read counters
pub const TX_MON_THREAD_OUTSTANDING_READ_CNT: usize = 0x00;
/// Stride between per-thread outstanding read counters
pub const TX_MON_THREAD_OUTSTANDING_READ_CNT_ELEM_SIZE: usize = 0x8;
/// Virtual channel outstanding read counter
pub const TX_MON_VCHAN_OUTSTANDING_READ_CNT: usize = 0x20;
/// Outstanding FIFO level
pub const TX_MON_OUTSTANDING_FIFO_LEVEL: usize = 0x30;
/// Per-queue outstanding FIFO level
pub const TX_MON_QUEUES_OUTSTANDING_FIFO_LEVEL: usize = 0x40;

// =============================================================================
// TX Job Queue Block
// =============================================================================

/// TX job queue block offset
pub const TX_JOB_Q_OFFSET: usize = 0x8_0000;
/// Stride between TX job queue instances
pub const TX_JOB_Q_ELEM_SIZE: usize = 0x1000;

/// Queue start address
pub const TX_JOB_Q_SA: usize = 0x00;
/// Queue slot count, log2
pub const TX_JOB_Q_NB_LOG2: usize = 0x08;
/// Write pointer
pub const TX_JOB_Q_WP: usize = 0x10;
/// Write pointer, load-and-increment alias
pub const TX_JOB_Q_LOAD_INCR_WP: usize = 0x18;
/// Committed write pointer
pub const TX_JOB_Q_VALID_WP: usize = 0x20;
/// Read pointer
pub const TX_JOB_Q_RP: usize = 0x30;
/// Notification address
pub const TX_JOB_Q_NOTIF_ADDR: usize = 0x38;
/// Notification argument
pub const TX_JOB_Q_NOTIF_ARG: usize = 0x40;
/// Address space number
pub const TX_JOB_Q_ASN: usize = 0x48;
/// Queue run status
pub const TX_JOB_Q_STATUS: usize = 0x50;
/// Queue activation
pub const TX_JOB_Q_ACTIVATE: usize = 0x60;
/// Queue stop request
pub const TX_JOB_Q_STOP: usize = 0x68;
/// TX thread executing this queue
pub const TX_JOB_Q_THREAD_ID: usize = 0x70;

// =============================================================================
// TX Completion Queue Block
// =============================================================================

/// TX completion queue block offset
pub const TX_COMP_Q_OFFSET: usize = 0xC_0000;
/// Stride between TX completion queue instances
pub const TX_COMP_Q_ELEM_SIZE: usize = 0x1000;

/// Completion mode (queue or static)
pub const TX_COMP_Q_MODE: usize = 0x00;
/// Queue start address
pub const TX_COMP_Q_SA: usize = 0x08;
/// Queue slot count, log2
pub const TX_COMP_Q_NB_LOG2: usize = 0x10;
/// Global address space flag
pub const TX_COMP_Q_GLOBAL: usize = 0x18;
/// Address space number
pub const TX_COMP_Q_ASN: usize = 0x20;
/// Completion field selection
pub const TX_COMP_Q_FIELD_EN: usize = 0x28;
/// Write pointer (completion count)
pub const TX_COMP_Q_WP: usize = 0x30;
/// Read pointer
pub const TX_COMP_Q_RP: usize = 0x40;
/// Read pointer, load-and-increment alias
pub const TX_COMP_Q_LOAD_INCR_RP: usize = 0x48;
/// Committed read pointer
pub const TX_COMP_Q_VALID_RP: usize = 0x50;
/// Notification address
pub const TX_COMP_Q_NOTIF_ADDR: usize = 0x60;
/// Notification argument
pub const TX_COMP_Q_NOTIF_ARG: usize = 0x68;
/// Queue activation
pub const TX_COMP_Q_ACTIVATE: usize = 0x70;
/// Queue stop request
pub const TX_COMP_Q_STOP: usize = 0x78;
/// Queue run status
pub const TX_COMP_Q_STATUS: usize = 0x80;

/// Completion field selection: counters only
pub const TX_COMPL_FIELD_NONE: u64 = 0;
/// Completion field selection: Ethernet status
pub const TX_COMPL_FIELD_ETH: u64 = 1;
/// Completion field selection: full descriptor
pub const TX_COMPL_FIELD_FULL: u64 = 2;

// =============================================================================
// Job Config Word
// =============================================================================

/// Route table index shift in the job config word
pub const JOB_ROUTE_ID_SHIFT: u32 = 16;
/// Program id shift in the job config word
pub const JOB_PGRM_ID_SHIFT: u32 = 32;
/// Fence-after flag shift in the job config word
pub const JOB_FENCE_AFTER_SHIFT: u32 = 48;

// =============================================================================
// Window Helpers
// =============================================================================

/// Register window of TX job queue `id`
pub const fn tx_job_queue(id: usize) -> RegisterWindow {
    RegisterWindow::new(TX_JOB_Q_OFFSET + id * TX_JOB_Q_ELEM_SIZE)
}

/// Register window of TX completion queue `id`
pub const fn tx_completion_queue(id: usize) -> RegisterWindow {
    RegisterWindow::new(TX_COMP_Q_OFFSET + id * TX_COMP_Q_ELEM_SIZE)
}

/// Register window of TX thread `id`
pub const fn tx_thread(id: usize) -> RegisterWindow {
    RegisterWindow::new(TX_THREAD_OFFSET + id * TX_THREAD_ELEM_SIZE)
}

/// Offset of program table entry `id`
pub const fn program_table_entry(id: usize) -> usize {
    TX_PGRM_TAB_OFFSET + id * TX_PGRM_TAB_ELEM_SIZE
}

/// Convert a byte address in program memory to a program start word
pub const fn to_program_word(addr: usize) -> u64 {
    (addr >> 3) as u64
}
