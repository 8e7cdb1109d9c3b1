//! Error types for Fleetly

use thiserror::Error;

/// Failures surfaced by the order/agent stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(#[from] crate::types::UnknownVariant),
}
