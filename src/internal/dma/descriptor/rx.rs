//! RX queue entries

/// Empty buffer offered to an RX job queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxJobDescriptor {
    /// Buffer device address
    pub base: u64,
    /// Buffer length in bytes
    pub size: u64,
}

impl RxJobDescriptor {
    /// Number of words in a job queue entry
    pub const WORDS: usize = 2;

    /// Hardware word layout
    pub const fn to_words(&self) -> [u64; Self::WORDS] {
        [self.base, self.size]
    }
}

/// Completed RX buffer, as reported in a full-descriptor completion queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxCompletion {
    /// Buffer device address
    pub base: u64,
    /// Buffer length in bytes
    pub size: u64,
    /// Bytes written by the hardware
    pub byte_count: u64,
    /// Notification word
    pub notif: u64,
}

impl RxCompletion {
    /// Number of words in a completion queue entry
    pub const WORDS: usize = 4;

    /// Decode a completion queue entry
    pub const fn from_words(words: [u64; Self::WORDS]) -> Self {
        Self {
            base: words[0],
            size: words[1],
            byte_count: words[2],
            notif: words[3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RX_COMPLETION_ENTRY_SIZE, RX_JOB_ENTRY_SIZE};

    #[test]
    fn layouts_match_entry_sizes() {
        assert_eq!(RxJobDescriptor::WORDS * 8, RX_JOB_ENTRY_SIZE);
        assert_eq!(RxCompletion::WORDS * 8, RX_COMPLETION_ENTRY_SIZE);
    }

    #[test]
    fn completion_decodes_in_field_order() {
        let c = RxCompletion::from_words([0x1000, 2048, 60, 7]);
        assert_eq!(c.base, 0x1000);
        assert_eq!(c.size, 2048);
        assert_eq!(c.byte_count, 60);
        assert_eq!(c.notif, 7);
    }
}
