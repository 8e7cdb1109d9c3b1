//! Order dispatch logic
//!
//! Everything that turns store mutations into room traffic:
//! - **broadcaster**: announces claimable orders to the agent pool and
//!   retracts them once claimed
//! - **arbiter**: resolves concurrent claims into exactly one winner via the
//!   store's atomic conditional update
//! - **location**: relays live coordinates within an order room
//! - **chat**: the per-order request/accept/reject handshake and message
//!   fan-out
//!
//! A broadcast is only ever emitted after the authoritative store operation
//! has confirmed success; failures degrade to a notice on the requesting
//! connection alone.

pub mod arbiter;
pub mod broadcaster;
pub mod chat;
pub mod location;
