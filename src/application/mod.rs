//! Application layer: the four services that own the escrow, dispute,
//! production, and reconciliation flows. Each is constructed with its
//! collaborators passed in so tests can substitute fakes.

pub mod disputes;
pub mod escrow;
pub mod production;
pub mod reconciler;
