//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//! Types in this module may change without notice between minor versions.
//!
//! # Contents
//!
//! - [`register`]: DMA controller register map and bus access
//! - [`dma`]: DMA memory, hardware ring geometry, descriptors and the queue pool
//! - [`trace`]: logging shims over `defmt` / `log`
//!
//! # Stability
//!
//! **WARNING:** This module is `pub(crate)` only. Do not depend on any types
//! or functions in this module from external code. They are subject to change
//! without notice.

pub(crate) mod dma;
pub(crate) mod register;
pub(crate) mod trace;
