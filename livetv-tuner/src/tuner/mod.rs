//! Tuner management for playlist sources.
//!
//! This module provides:
//! - [`TunerAllocator`]: Per-source tuner slot accounting
//! - [`TunerLease`]: A held slot, released explicitly, on drop, or by the reaper
//! - [`LeaseSupervisor`]: Background reaping of slots without heartbeats
//! - [`TransportSelector`]: Shared passthrough vs buffered/looping delivery

pub mod allocator;
pub mod supervisor;
pub mod transport;

pub use allocator::{LeaseState, SourceUsage, StreamUsage, TunerAllocator, TunerLease};
pub use supervisor::{LeaseConfig, LeaseSupervisor};
pub use transport::{TransportSelector, DISALLOWED_SHARED_EXTENSIONS};
