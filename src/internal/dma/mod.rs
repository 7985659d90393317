//! DMA memory and queue plumbing
//!
//! Everything the engine needs to lay out hardware queues in DMA memory:
//! - [`memory`]: allocator trait, owned regions and copyable views
//! - [`ring`]: power-of-two ring geometry over a view
//! - [`descriptor`]: bit-exact RX and TX queue entries
//! - [`pool`]: ownership of shared RX and exclusive TX job queues

pub(crate) mod descriptor;
pub(crate) mod memory;
pub(crate) mod pool;
pub(crate) mod ring;
