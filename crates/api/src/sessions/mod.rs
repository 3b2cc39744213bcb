//! Remote-control session coordination.

pub mod coordinator;

pub use coordinator::SessionCoordinator;
