//! TX job descriptors
//!
//! A TX job is a set of microcode parameters plus a config word naming the
//! program, the NoC route and the completion queue. Parameter meaning
//! depends on the program:
//!
//! | program | p0 | p1 | p2 | p3 | p4 | p5 | p6 |
//! |---|---|---|---|---|---|---|---|
//! | mem2mem / mem2noc | src | dst | len / 16 | len % 16 | nb | lstride - len | rstride - len |
//! | mem2eth | src | len | len / 16 | len % 16 | eot | 0 | 0 |

use crate::constants::UCODE_PARAM_COUNT;
use crate::internal::register::tx::{
    JOB_FENCE_AFTER_SHIFT, JOB_PGRM_ID_SHIFT, JOB_ROUTE_ID_SHIFT,
};

/// Generic transfer job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxJob {
    /// Source device address
    pub src: u64,
    /// Destination device address, or remote offset for NoC transfers
    pub dst: u64,
    /// Object length in bytes
    pub len: u64,
    /// Completion queue counting this job
    pub comp_q_id: u64,
    /// NoC route table index
    pub route_id: u64,
    /// Number of objects
    pub nb: u64,
    /// Local (source) stride in bytes
    pub lstride: u64,
    /// Remote (destination) stride in bytes
    pub rstride: u64,
    /// Wait for all previous writes before completing
    pub fence_after: bool,
    /// Last fragment of a packet
    pub eot: bool,
}

impl TxJob {
    /// Contiguous copy of `len` bytes
    pub const fn linear(src: u64, dst: u64, len: u64) -> Self {
        Self {
            src,
            dst,
            len,
            comp_q_id: 0,
            route_id: 0,
            nb: 1,
            lstride: len,
            rstride: len,
            fence_after: false,
            eot: false,
        }
    }
}

/// Encoded TX job queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxJobDescriptor {
    /// Microcode parameters
    pub params: [u64; UCODE_PARAM_COUNT],
    /// Program / route / completion queue selection
    pub config: u64,
    /// Reserved second config word
    pub config_bis: u64,
}

impl TxJobDescriptor {
    /// Number of words in a job queue entry
    pub const WORDS: usize = UCODE_PARAM_COUNT + 2;

    /// Build the config word
    pub const fn config_word(fence_after: bool, pgrm_id: u64, route_id: u64, comp_q_id: u64) -> u64 {
        ((fence_after as u64) << JOB_FENCE_AFTER_SHIFT)
            | (pgrm_id << JOB_PGRM_ID_SHIFT)
            | (route_id << JOB_ROUTE_ID_SHIFT)
            | comp_q_id
    }

    /// Strided copy for the mem2mem and mem2noc programs
    pub const fn strided(job: &TxJob, pgrm_id: u64) -> Self {
        Self {
            params: [
                job.src,
                job.dst,
                job.len >> 4,
                job.len & 0xF,
                job.nb,
                job.lstride.wrapping_sub(job.len),
                job.rstride.wrapping_sub(job.len),
                0,
            ],
            config: Self::config_word(job.fence_after, pgrm_id, job.route_id, job.comp_q_id),
            config_bis: 0,
        }
    }

    /// Packet fragment for the mem2eth program
    ///
    /// The packet program never fences.
    pub const fn packet(job: &TxJob, pgrm_id: u64) -> Self {
        Self {
            params: [
                job.src,
                job.len,
                job.len >> 4,
                job.len & 0xF,
                job.eot as u64,
                0,
                0,
                0,
            ],
            config: Self::config_word(false, pgrm_id, job.route_id, job.comp_q_id),
            config_bis: 0,
        }
    }

    /// Job that moves nothing and only counts on `comp_q_id`
    ///
    /// Zero objects for the strided programs, an empty non-final fragment
    /// for the packet program.
    pub const fn noop(pgrm_id: u64, comp_q_id: u64) -> Self {
        Self {
            params: [0; UCODE_PARAM_COUNT],
            config: Self::config_word(false, pgrm_id, 0, comp_q_id),
            config_bis: 0,
        }
    }

    /// Hardware word layout
    pub const fn to_words(&self) -> [u64; Self::WORDS] {
        let p = &self.params;
        [
            p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], self.config, self.config_bis,
        ]
    }
}
