//! Coffer ledger service layer.
//!
//! Sits on top of `coffer-storage` and exposes:
//!
//! - [`Ledger`]: the mutation/query API (create, balance, credit,
//!   transfer, delete, wipe) with read-your-write consistency from memory
//! - [`WriteCoordinator`]: the serializing, batching funnel between
//!   in-memory mutation and the durable operation log, including
//!   threshold-driven snapshot compaction
//! - [`shutdown_signal`]: signal handling for the `cofferd` binary
//!
//! HTTP routing and admin authentication are external collaborators;
//! this crate only provides the operations and stable error kinds they
//! map onto transports.

mod coordinator;
mod service;
mod shutdown;

pub use coordinator::WriteCoordinator;
pub use service::Ledger;
pub use shutdown::shutdown_signal;
