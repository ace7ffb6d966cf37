//! In-memory [`LineItemStore`] for tests.
//!
//! Mirrors the Postgres schema's behavior: one row per `(user, product)`,
//! writes scoped to the owning user, inserts rejected for unknown products,
//! and a joined read that reports deleted products as `None`. Calls can be
//! made to fail or to stall so the service's failure paths can be exercised.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stg_catalog_core::{LineItemId, ProductId, Quantity, UserId};

use super::store::{CartRow, LineItemStore, ProductSummary, StoreError, StoredLine};

/// A store operation, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Find,
    Insert,
    Update,
    Increment,
    Delete,
    List,
}

#[derive(Default)]
struct MemoryState {
    products: HashMap<ProductId, ProductSummary>,
    lines: Vec<StoredLine>,
    fail_next: HashMap<StoreOp, usize>,
    calls: HashMap<StoreOp, usize>,
    latency: Option<Duration>,
}

/// Line item store backed by process memory.
#[derive(Default)]
pub struct MemoryLineItemStore {
    state: Mutex<MemoryState>,
}

impl MemoryLineItemStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a product so it can be added to carts.
    pub fn add_product(&self, product: ProductSummary) {
        self.state().products.insert(product.id, product);
    }

    /// Delete a product, leaving cart rows that reference it dangling.
    pub fn remove_product(&self, id: ProductId) {
        self.state().products.remove(&id);
    }

    /// Make the next `times` calls of `op` fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, op: StoreOp, times: usize) {
        self.state().fail_next.insert(op, times);
    }

    /// Delay every call by `latency` (or stop delaying with `None`).
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// How many times `op` was called.
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Total number of calls across all operations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    /// Raw rows for one user, bypassing failure injection.
    #[must_use]
    pub fn rows(&self, user: UserId) -> Vec<StoredLine> {
        self.state()
            .lines
            .iter()
            .filter(|line| line.user_id == user)
            .cloned()
            .collect()
    }

    /// Insert a row directly, as another device of the same user would.
    pub fn seed_line(&self, line: StoredLine) {
        self.state().lines.push(line);
    }

    /// Record the call, then sleep and fail as configured.
    async fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        let (latency, fail) = {
            let mut state = self.state();
            *state.calls.entry(op).or_insert(0) += 1;
            let fail = match state.fail_next.get_mut(&op) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };
            (state.latency, fail)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if fail {
            return Err(StoreError::Unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

impl LineItemStore for MemoryLineItemStore {
    async fn find_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<Option<StoredLine>, StoreError> {
        self.enter(StoreOp::Find).await?;
        Ok(self
            .state()
            .lines
            .iter()
            .find(|line| line.user_id == user && line.product_id == product)
            .cloned())
    }

    async fn insert_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<StoredLine, StoreError> {
        self.enter(StoreOp::Insert).await?;
        let mut state = self.state();

        if !state.products.contains_key(&product) {
            return Err(StoreError::UnknownProduct(product));
        }
        if state
            .lines
            .iter()
            .any(|line| line.user_id == user && line.product_id == product)
        {
            return Err(StoreError::Conflict);
        }

        let line = StoredLine {
            id: LineItemId::random(),
            user_id: user,
            product_id: product,
            quantity,
        };
        state.lines.push(line.clone());
        Ok(line)
    }

    async fn update_quantity(
        &self,
        user: UserId,
        line: LineItemId,
        quantity: Quantity,
    ) -> Result<Option<StoredLine>, StoreError> {
        self.enter(StoreOp::Update).await?;
        Ok(self
            .state()
            .lines
            .iter_mut()
            .find(|row| row.id == line && row.user_id == user)
            .map(|row| {
                row.quantity = quantity;
                row.clone()
            }))
    }

    async fn increment_line(
        &self,
        user: UserId,
        line: LineItemId,
    ) -> Result<Option<StoredLine>, StoreError> {
        self.enter(StoreOp::Increment).await?;
        Ok(self
            .state()
            .lines
            .iter_mut()
            .find(|row| row.id == line && row.user_id == user && row.quantity.get() < Quantity::MAX)
            .map(|row| {
                row.quantity = row.quantity.incremented();
                row.clone()
            }))
    }

    async fn delete_line(&self, user: UserId, line: LineItemId) -> Result<bool, StoreError> {
        self.enter(StoreOp::Delete).await?;
        let mut state = self.state();
        let before = state.lines.len();
        state
            .lines
            .retain(|row| !(row.id == line && row.user_id == user));
        Ok(state.lines.len() != before)
    }

    async fn list_cart(&self, user: UserId) -> Result<Vec<CartRow>, StoreError> {
        self.enter(StoreOp::List).await?;
        let state = self.state();
        Ok(state
            .lines
            .iter()
            .filter(|line| line.user_id == user)
            .map(|line| CartRow {
                id: line.id,
                quantity: line.quantity,
                product: state.products.get(&line.product_id).cloned(),
            })
            .collect())
    }
}
