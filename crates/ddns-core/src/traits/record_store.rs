// # Record Store Trait
//
// Defines the interface for durable storage of the record set.
//
// ## Purpose
//
// The record store keeps the inventory across restarts: the managed records
// with their resolved identifiers and advisory bookkeeping, plus the global
// settings. The engine saves after every applied update and after every
// inventory edit.
//
// ## Implementations
//
// - File-based: pretty-printed JSON with atomic replace and a backup copy
// - In-memory: for tests and throwaway runs

use async_trait::async_trait;

use crate::config::Inventory;

/// Trait for record store implementations
///
/// # Thread Safety
///
/// `save` may be called from the scheduler and from manual triggers. The
/// engine serializes its own saves, but implementations must still be safe
/// to call from several tasks.
///
/// # Failure Semantics
///
/// A failed save never rolls back DNS changes that were already applied. The
/// engine reports it as a `Persistence` failure and carries on; the next
/// successful save writes the complete current state.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the inventory
    ///
    /// An absent store yields an empty inventory with default settings.
    async fn load(&self) -> Result<Inventory, crate::Error>;

    /// Replace the stored inventory with this one
    async fn save(&self, inventory: &Inventory) -> Result<(), crate::Error>;
}
