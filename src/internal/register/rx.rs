//! RX Register Definitions
//!
//! RX channels receive data from the NoC into memory. In packet mode each
//! channel pulls buffers from a shared RX job queue and reports them in a
//! per-channel completion queue. In static mode the channel writes into a
//! single fixed buffer.

use super::RegisterWindow;

// =============================================================================
// RX Channel Block
// =============================================================================

/// RX channel block offset
pub const RX_CHAN_OFFSET: usize = 0x0;
/// Stride between RX channel instances
pub const RX_CHAN_ELEM_SIZE: usize = 0x1000;

/// Static buffer start address
pub const RX_CHAN_BUF_SA: usize = 0x00;
/// Static buffer size
pub const RX_CHAN_BUF_SIZE: usize = 0x08;
/// Static buffer enable
pub const RX_CHAN_BUF_EN: usize = 0x10;
/// Current write offset in the static buffer
pub const RX_CHAN_CUR: usize = 0x18;
/// Job queue selection (enable bit + RX cache id)
pub const RX_CHAN_JOB_Q_CFG: usize = 0x20;
/// Channel activation
pub const RX_CHAN_ACTIVATED: usize = 0x28;
/// Received byte counter
pub const RX_CHAN_BYTE_CNT: usize = 0x30;
/// Notification counter
pub const RX_CHAN_NOTIF_CNT: usize = 0x38;
/// Counter clear mode
pub const RX_CHAN_CNT_CLEAR_MODE: usize = 0x40;
/// Completion queue config (enable + field select)
pub const RX_CHAN_COMP_Q_CFG: usize = 0x58;
/// Completion queue mode (queue or static)
pub const RX_CHAN_COMP_Q_MODE: usize = 0x60;
/// Completion queue start address
pub const RX_CHAN_COMP_Q_SA: usize = 0x68;
/// Completion queue slot count, log2
pub const RX_CHAN_COMP_Q_SLOT_NB_LOG2: usize = 0x70;
/// Completion queue write pointer (completion count)
pub const RX_CHAN_COMP_Q_WP: usize = 0x78;
/// Completion queue read pointer
pub const RX_CHAN_COMP_Q_RP: usize = 0x80;
/// Completion queue read pointer, load-and-increment alias
pub const RX_CHAN_COMP_Q_LOAD_INCR_RP: usize = 0x88;
/// Completion queue committed read pointer
pub const RX_CHAN_COMP_Q_VALID_RP: usize = 0x90;
/// Completion queue notification address
pub const RX_CHAN_COMP_Q_NOTIF_ADDR: usize = 0xA0;
/// Completion queue notification argument
pub const RX_CHAN_COMP_Q_NOTIF_ARG: usize = 0xB0;
/// Completion queue address space number
pub const RX_CHAN_COMP_Q_ASN: usize = 0xB8;

/// JOB_Q_CFG / COMP_Q_CFG enable bit
pub const RX_Q_CFG_EN: u64 = 0x1;
/// JOB_Q_CFG / COMP_Q_CFG field select shift
pub const RX_Q_CFG_FIELD_SEL_SHIFT: u32 = 1;

/// Completion field selection: full descriptor (base, size, byte, notif)
pub const RX_COMP_FIELD_FULL: u64 = 1;

/// Counter clear mode used in packet mode
pub const RX_CNT_CLEAR_MODE_PACKET: u64 = 3;

/// Completion queue mode: entries written to memory
pub const COMPLETION_QUEUE_MODE: u64 = 0;
/// Completion static mode: counters only
pub const COMPLETION_STATIC_MODE: u64 = 1;

// =============================================================================
// RX Job Queue Block
// =============================================================================

/// RX job queue block offset
pub const RX_JOB_Q_OFFSET: usize = 0x4_0000;
/// Stride between RX job queue instances
pub const RX_JOB_Q_ELEM_SIZE: usize = 0x1000;

/// Queue start address
pub const RX_JOB_Q_SA: usize = 0x00;
/// Queue slot count, log2
pub const RX_JOB_Q_NB_LOG2: usize = 0x08;
/// Write pointer
pub const RX_JOB_Q_WP: usize = 0x10;
/// Write pointer, load-and-increment alias
pub const RX_JOB_Q_LOAD_INCR_WP: usize = 0x18;
/// Committed write pointer
pub const RX_JOB_Q_VALID_WP: usize = 0x20;
/// Committed write pointer, load-and-increment alias
pub const RX_JOB_Q_LOAD_INCR_VALID_WP: usize = 0x28;
/// Read pointer
pub const RX_JOB_Q_RP: usize = 0x30;
/// Notification address
pub const RX_JOB_Q_NOTIF_ADDR: usize = 0x38;
/// Notification argument
pub const RX_JOB_Q_NOTIF_ARG: usize = 0x40;
/// Notification mode
pub const RX_JOB_Q_NOTIF_MODE: usize = 0x48;
/// Queue activation
pub const RX_JOB_Q_ACTIVATE: usize = 0x50;
/// Queue stop request
pub const RX_JOB_Q_STOP: usize = 0x58;
/// Queue run status
pub const RX_JOB_Q_STATUS: usize = 0x60;
/// RX job cache fed by this queue
pub const RX_JOB_Q_CACHE_ID: usize = 0x70;
/// Address space number
pub const RX_JOB_Q_ASN: usize = 0x78;

/// RX queue notification disabled
pub const RX_Q_DISABLE: u64 = 0;
/// RX queue notification enabled
pub const RX_Q_ENABLE: u64 = 1;

// =============================================================================
// Window Helpers
// =============================================================================

/// Register window of RX channel `id`
pub const fn rx_channel(id: usize) -> RegisterWindow {
    RegisterWindow::new(RX_CHAN_OFFSET + id * RX_CHAN_ELEM_SIZE)
}

/// Register window of RX job queue `idx`
pub const fn rx_job_queue(idx: usize) -> RegisterWindow {
    RegisterWindow::new(RX_JOB_Q_OFFSET + idx * RX_JOB_Q_ELEM_SIZE)
}
