//! In-memory queue entry layouts
//!
//! Entries are written into DMA memory word by word through volatile
//! stores, so the structures here are plain values that encode to and
//! decode from fixed word arrays matching the hardware layout.

pub mod rx;
pub mod tx;

pub use rx::{RxCompletion, RxJobDescriptor};
pub use tx::{TxJob, TxJobDescriptor};
