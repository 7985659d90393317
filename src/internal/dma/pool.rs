//! Job queue pool
//!
//! RX job queues are shared by every RX channel feeding the same RX job
//! cache: queue `2 * cache_id` is allocated by the first channel and freed
//! by the last. TX job queues are owned by exactly one physical channel and
//! indexed by its hardware id.
//!
//! The pool only tracks ownership; it is always accessed under the device
//! allocation lock.

use alloc::vec::Vec;

use super::memory::{DmaAllocator, DmaRegion, DmaView};
use crate::constants::{RX_JOB_QUEUE_COUNT, RX_JOB_QUEUES_PER_CACHE, TX_JOB_QUEUE_COUNT};
use crate::error::{ArgumentError, Error, ResourceKind, Result};
use crate::internal::trace::{dma_debug, dma_error};

/// Shared RX job queue slot
#[derive(Debug)]
struct SharedQueue {
    region: DmaRegion,
    refcount: usize,
}

/// Outcome of acquiring an RX job queue
#[derive(Debug, Clone, Copy)]
pub(crate) struct RxJobQueueLease {
    /// Hardware job queue index
    pub index: usize,
    /// Backing memory
    pub mem: DmaView,
    /// True when this acquisition allocated the queue
    pub first: bool,
}

/// Job queue ownership tracker
#[derive(Debug)]
pub(crate) struct QueuePool {
    rx: Vec<Option<SharedQueue>>,
    tx: Vec<Option<DmaRegion>>,
}

impl QueuePool {
    /// Empty pool sized for the hardware queue counts
    pub fn new() -> Self {
        let mut rx = Vec::with_capacity(RX_JOB_QUEUE_COUNT);
        rx.resize_with(RX_JOB_QUEUE_COUNT, || None);
        let mut tx = Vec::with_capacity(TX_JOB_QUEUE_COUNT);
        tx.resize_with(TX_JOB_QUEUE_COUNT, || None);
        Self { rx, tx }
    }

    /// Hardware index of the RX job queue used by `cache_id`
    pub const fn rx_job_queue_index(cache_id: usize) -> usize {
        RX_JOB_QUEUES_PER_CACHE * cache_id
    }

    /// Take a reference on the RX job queue of `cache_id`, allocating it on
    /// first use
    pub fn acquire_rx<A: DmaAllocator + ?Sized>(
        &mut self,
        allocator: &A,
        cache_id: usize,
        size: usize,
    ) -> Result<RxJobQueueLease> {
        let index = Self::rx_job_queue_index(cache_id);
        let slot = self
            .rx
            .get_mut(index)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidCacheId))?;

        if let Some(shared) = slot {
            shared.refcount += 1;
            dma_debug!("RX job queue[{}] already allocated, reusing it", index);
            return Ok(RxJobQueueLease {
                index,
                mem: shared.region.view(),
                first: false,
            });
        }

        let Some(region) = allocator.alloc(size) else {
            dma_error!("unable to allocate RX job queue[{}]", index);
            return Err(Error::ResourceExhausted(ResourceKind::QueueMemory));
        };
        let mem = region.view();
        *slot = Some(SharedQueue {
            region,
            refcount: 1,
        });
        Ok(RxJobQueueLease {
            index,
            mem,
            first: true,
        })
    }

    /// Drop a reference on the RX job queue of `cache_id`
    ///
    /// Returns true when the last reference was dropped and the memory
    /// returned to the allocator.
    pub fn release_rx<A: DmaAllocator + ?Sized>(&mut self, allocator: &A, cache_id: usize) -> bool {
        let index = Self::rx_job_queue_index(cache_id);
        let Some(slot) = self.rx.get_mut(index) else {
            return false;
        };
        let last = match slot {
            Some(shared) => {
                shared.refcount -= 1;
                shared.refcount == 0
            }
            None => return false,
        };
        if last {
            if let Some(shared) = slot.take() {
                allocator.free(shared.region);
            }
        }
        last
    }

    /// Number of channels sharing the RX job queue of `cache_id`
    pub fn rx_refcount(&self, cache_id: usize) -> usize {
        self.rx
            .get(Self::rx_job_queue_index(cache_id))
            .and_then(Option::as_ref)
            .map_or(0, |shared| shared.refcount)
    }

    /// Allocate the TX job queue of physical channel `hw_id`
    pub fn acquire_tx<A: DmaAllocator + ?Sized>(
        &mut self,
        allocator: &A,
        hw_id: usize,
        size: usize,
    ) -> Result<DmaView> {
        let slot = self
            .tx
            .get_mut(hw_id)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidPhyId))?;
        if slot.is_some() {
            dma_error!("TX job queue[{}] already allocated", hw_id);
            return Err(Error::AlreadyInUse);
        }
        let Some(region) = allocator.alloc(size) else {
            dma_error!("unable to allocate TX job queue[{}]", hw_id);
            return Err(Error::ResourceExhausted(ResourceKind::QueueMemory));
        };
        let mem = region.view();
        *slot = Some(region);
        Ok(mem)
    }

    /// Free the TX job queue of physical channel `hw_id`
    pub fn release_tx<A: DmaAllocator + ?Sized>(&mut self, allocator: &A, hw_id: usize) -> bool {
        match self.tx.get_mut(hw_id).and_then(Option::take) {
            Some(region) => {
                allocator.free(region);
                true
            }
            None => false,
        }
    }

    /// Whether the TX job queue of `hw_id` is allocated
    #[cfg(test)]
    pub fn tx_allocated(&self, hw_id: usize) -> bool {
        self.tx.get(hw_id).is_some_and(Option::is_some)
    }

    /// Return every region to the allocator
    pub fn drain<A: DmaAllocator + ?Sized>(&mut self, allocator: &A) {
        for shared in self.rx.iter_mut().filter_map(Option::take) {
            allocator.free(shared.region);
        }
        for region in self.tx.iter_mut().filter_map(Option::take) {
            allocator.free(region);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockDmaAllocator;

    #[test]
    fn rx_queue_is_shared_per_cache() {
        let alloc = MockDmaAllocator::new();
        let mut pool = QueuePool::new();

        let a = pool.acquire_rx(&alloc, 1, 256).unwrap();
        let b = pool.acquire_rx(&alloc, 1, 256).unwrap();
        assert_eq!(a.index, 2);
        assert!(a.first);
        assert!(!b.first);
        assert_eq!(a.mem.dma_addr(), b.mem.dma_addr());
        assert_eq!(pool.rx_refcount(1), 2);
        assert_eq!(alloc.alloc_count(), 1);

        assert!(!pool.release_rx(&alloc, 1));
        assert_eq!(alloc.free_count(), 0);
        assert!(pool.release_rx(&alloc, 1));
        assert_eq!(alloc.free_count(), 1);
        assert_eq!(pool.rx_refcount(1), 0);
    }

    #[test]
    fn rx_cache_out_of_range() {
        let alloc = MockDmaAllocator::new();
        let mut pool = QueuePool::new();
        assert_eq!(
            pool.acquire_rx(&alloc, 4, 256).unwrap_err(),
            Error::InvalidArgument(ArgumentError::InvalidCacheId)
        );
    }

    #[test]
    fn rx_alloc_failure_leaves_slot_empty() {
        let alloc = MockDmaAllocator::new();
        alloc.fail_next_allocs(1);
        let mut pool = QueuePool::new();
        assert_eq!(
            pool.acquire_rx(&alloc, 0, 256).unwrap_err(),
            Error::ResourceExhausted(ResourceKind::QueueMemory)
        );
        assert_eq!(pool.rx_refcount(0), 0);
        assert!(pool.acquire_rx(&alloc, 0, 256).unwrap().first);
    }

    #[test]
    fn tx_queue_is_exclusive() {
        let alloc = MockDmaAllocator::new();
        let mut pool = QueuePool::new();

        pool.acquire_tx(&alloc, 5, 1024).unwrap();
        assert!(pool.tx_allocated(5));
        assert_eq!(pool.acquire_tx(&alloc, 5, 1024).unwrap_err(), Error::AlreadyInUse);

        assert!(pool.release_tx(&alloc, 5));
        assert!(!pool.release_tx(&alloc, 5));
        assert_eq!(alloc.free_count(), 1);
    }

    #[test]
    fn drain_frees_everything() {
        let alloc = MockDmaAllocator::new();
        let mut pool = QueuePool::new();
        pool.acquire_rx(&alloc, 0, 64).unwrap();
        pool.acquire_tx(&alloc, 0, 64).unwrap();
        pool.acquire_tx(&alloc, 1, 64).unwrap();

        pool.drain(&alloc);
        assert_eq!(alloc.outstanding(), 0);
    }
}
