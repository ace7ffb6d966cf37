//! Cart reconciler.
//!
//! Turns add / set-quantity / remove requests into single-row store writes and
//! mirrors each confirmed write into the session's view model. Planning is
//! pure ([`plan_add`], [`plan_set`]); executing a plan is one store call.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use stg_catalog_core::{LineItemId, ProductId, Quantity, QuantityError, UserId};

use super::{
    CartError, CartService, LineItemStore, SessionState, StoreError, StoredLine,
    require_identity,
};
use crate::error::add_breadcrumb;
use crate::models::CurrentIdentity;

/// Find-then-write rounds before a contended add gives up.
const MAX_MERGE_ATTEMPTS: usize = 3;

/// A single-row write derived from a cart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineWrite {
    /// Create the line for a product not yet in the cart.
    Insert {
        product: ProductId,
        quantity: Quantity,
    },
    /// Overwrite an existing line's quantity.
    Update { line: LineItemId, quantity: Quantity },
    /// Add one unit to an existing line, relative to the stored quantity.
    Increment { line: LineItemId },
    /// Delete a line.
    Delete { line: LineItemId },
}

/// Plan an add of one unit of `product`, given the user's existing line.
///
/// # Errors
///
/// Returns [`QuantityError::TooLarge`] if the line is already at
/// [`Quantity::MAX`].
pub fn plan_add(
    product: ProductId,
    existing: Option<&StoredLine>,
) -> Result<LineWrite, QuantityError> {
    let Some(existing) = existing else {
        return Ok(LineWrite::Insert {
            product,
            quantity: Quantity::ONE,
        });
    };

    if existing.quantity.get() >= Quantity::MAX {
        return Err(QuantityError::TooLarge {
            max: Quantity::MAX,
            got: i64::from(existing.quantity.get()) + 1,
        });
    }

    Ok(LineWrite::Increment { line: existing.id })
}

/// Plan a quantity change. Zero or below is a delete.
///
/// # Errors
///
/// Returns [`QuantityError::TooLarge`] above [`Quantity::MAX`].
pub fn plan_set(line: LineItemId, requested: i64) -> Result<LineWrite, QuantityError> {
    if requested <= 0 {
        return Ok(LineWrite::Delete { line });
    }
    let quantity = Quantity::try_from_i64(requested)?;
    Ok(LineWrite::Update { line, quantity })
}

/// Result of a confirmed add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    pub line_id: LineItemId,
    pub product_id: ProductId,
    /// Quantity confirmed by the store.
    pub quantity: Quantity,
    /// Whether an existing line was incremented rather than created.
    pub merged: bool,
}

/// Result of a confirmed quantity change or removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LineOutcome {
    Updated { line: LineItemId, quantity: Quantity },
    /// The line is gone, whether this call removed it or it was already gone.
    Removed { line: LineItemId },
}

/// What a write did in the store.
enum Applied {
    Written(StoredLine),
    /// The row was deleted, or did not exist.
    Gone,
}

impl<S: LineItemStore> CartService<S> {
    /// Add one unit of `product` to the user's cart.
    ///
    /// Merges into the existing line if there is one. The view model takes the
    /// confirmed quantity; a line it does not hold yet is picked up by
    /// re-fetching the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::IdentityMissing` without a signed-in user (no store
    /// call is made), and `CartError::Store` if the lookup or the write fails,
    /// in which case the view model is unchanged.
    #[instrument(skip(self, identity), fields(user_id))]
    pub async fn add_to_cart(
        &self,
        identity: Option<&CurrentIdentity>,
        product: ProductId,
    ) -> Result<AddOutcome, CartError> {
        let identity = require_identity(identity)?;
        let user = identity.user_id;
        tracing::Span::current().record("user_id", tracing::field::display(user));

        let session = self.session(user).await;
        let _pending = session.mark_pending(product);
        let mut state = session.state.lock().await;
        let previous = state.cart.clone();

        let (line, merged) = self.merge_add(user, product).await?;
        self.mirror_write(user, &mut state, &line).await;
        Self::settle_checkout(&mut state, previous.as_ref());

        info!(line_id = %line.id, quantity = %line.quantity, merged, "Added to cart");
        let (product_id, quantity) = (product.to_string(), line.quantity.to_string());
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[("product_id", product_id.as_str()), ("quantity", quantity.as_str())]),
        );

        Ok(AddOutcome {
            line_id: line.id,
            product_id: product,
            quantity: line.quantity,
            merged,
        })
    }

    /// Set a line's quantity; `requested <= 0` removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::IdentityMissing` without a signed-in user,
    /// `CartError::InvalidQuantity` above the maximum, and `CartError::Store`
    /// on a failed write. A line that no longer exists is not an error.
    #[instrument(skip(self, identity), fields(user_id))]
    pub async fn set_quantity(
        &self,
        identity: Option<&CurrentIdentity>,
        line: LineItemId,
        requested: i64,
    ) -> Result<LineOutcome, CartError> {
        let identity = require_identity(identity)?;
        let write = plan_set(line, requested)?;
        self.mutate_line(identity.user_id, line, write).await
    }

    /// Remove a line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::IdentityMissing` without a signed-in user and
    /// `CartError::Store` on a failed delete. Removing a line that is already
    /// gone succeeds.
    #[instrument(skip(self, identity), fields(user_id))]
    pub async fn remove_item(
        &self,
        identity: Option<&CurrentIdentity>,
        line: LineItemId,
    ) -> Result<LineOutcome, CartError> {
        let identity = require_identity(identity)?;
        self.mutate_line(identity.user_id, line, LineWrite::Delete { line })
            .await
    }

    async fn mutate_line(
        &self,
        user: UserId,
        line: LineItemId,
        write: LineWrite,
    ) -> Result<LineOutcome, CartError> {
        tracing::Span::current().record("user_id", tracing::field::display(user));

        let session = self.session(user).await;
        let mut state = session.state.lock().await;
        let previous = state.cart.clone();

        let outcome = match self.apply(user, write).await? {
            Applied::Written(row) => {
                self.mirror_write(user, &mut state, &row).await;
                LineOutcome::Updated {
                    line: row.id,
                    quantity: row.quantity,
                }
            }
            Applied::Gone => {
                if let Some(cart) = state.cart.as_mut() {
                    cart.remove(line);
                }
                LineOutcome::Removed { line }
            }
        };
        Self::settle_checkout(&mut state, previous.as_ref());

        let (message, quantity) = match outcome {
            LineOutcome::Updated { quantity, .. } => ("Updated quantity", quantity.to_string()),
            LineOutcome::Removed { .. } => ("Removed from cart", "0".to_owned()),
        };
        info!(line_id = %line, quantity = %quantity, "{message}");
        let line_id = line.to_string();
        add_breadcrumb(
            "cart",
            message,
            Some(&[("line_id", line_id.as_str()), ("quantity", quantity.as_str())]),
        );

        Ok(outcome)
    }

    /// Find-then-write until one write lands.
    ///
    /// A line deleted between lookup and increment, or created between lookup
    /// and insert, sends the add around again so it ends up as a merge. The
    /// increment itself is relative to the stored quantity, so adds racing in
    /// other processes are never overwritten.
    async fn merge_add(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(StoredLine, bool), CartError> {
        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let existing = self
                .call("find_line", self.inner.store.find_line(user, product))
                .await?;
            let write = plan_add(product, existing.as_ref())?;

            match self.apply(user, write).await {
                Ok(Applied::Written(row)) => return Ok((row, existing.is_some())),
                Ok(Applied::Gone) => debug!(attempt, "Line vanished before merge, retrying"),
                Err(StoreError::Conflict) => {
                    debug!(attempt, "Line created concurrently, retrying as merge");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(%product, "Add still contended after {MAX_MERGE_ATTEMPTS} attempts");
        Err(StoreError::Conflict.into())
    }

    /// Execute one planned write.
    async fn apply(&self, user: UserId, write: LineWrite) -> Result<Applied, StoreError> {
        let store = &self.inner.store;
        match write {
            LineWrite::Insert { product, quantity } => self
                .call("insert_line", store.insert_line(user, product, quantity))
                .await
                .map(Applied::Written),
            LineWrite::Update { line, quantity } => Ok(self
                .call("update_quantity", store.update_quantity(user, line, quantity))
                .await?
                .map_or(Applied::Gone, Applied::Written)),
            LineWrite::Increment { line } => Ok(self
                .call("increment_line", store.increment_line(user, line))
                .await?
                .map_or(Applied::Gone, Applied::Written)),
            LineWrite::Delete { line } => {
                if !self.call("delete_line", store.delete_line(user, line)).await? {
                    debug!(line_id = %line, "Line already removed");
                }
                Ok(Applied::Gone)
            }
        }
    }

    /// Copy a confirmed row into the view model.
    async fn mirror_write(&self, user: UserId, state: &mut SessionState, row: &StoredLine) {
        let Some(cart) = state.cart.as_mut() else {
            // Not loaded yet; the first read fetches the confirmed state.
            return;
        };
        if !cart.set_quantity(row.id, row.quantity) {
            self.resync(user, state).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::super::memory::{MemoryLineItemStore, StoreOp};
    use super::super::tests::{gadget, identity, service, widget};
    use super::super::{CartSettings, StoreError};
    use super::*;

    fn stored(quantity: u32) -> StoredLine {
        StoredLine {
            id: LineItemId::random(),
            user_id: UserId::random(),
            product_id: ProductId::random(),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    #[test]
    fn test_plan_add_inserts_new_product() {
        let product = ProductId::random();
        assert_eq!(
            plan_add(product, None).unwrap(),
            LineWrite::Insert {
                product,
                quantity: Quantity::ONE
            }
        );
    }

    #[test]
    fn test_plan_add_merges_existing_line() {
        let existing = stored(2);
        assert_eq!(
            plan_add(existing.product_id, Some(&existing)).unwrap(),
            LineWrite::Increment { line: existing.id }
        );
    }

    #[test]
    fn test_plan_add_at_maximum() {
        let existing = stored(Quantity::MAX);
        assert!(matches!(
            plan_add(existing.product_id, Some(&existing)),
            Err(QuantityError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_plan_set_zero_or_below_deletes() {
        let line = LineItemId::random();
        for requested in [0, -1, i64::MIN] {
            assert_eq!(plan_set(line, requested).unwrap(), LineWrite::Delete { line });
        }
        assert_eq!(
            plan_set(line, 4).unwrap(),
            LineWrite::Update {
                line,
                quantity: Quantity::new(4).unwrap()
            }
        );
        assert!(plan_set(line, i64::MAX).is_err());
    }

    #[tokio::test]
    async fn test_repeated_adds_leave_one_row() {
        let service = service();
        let me = identity();
        let product = widget();
        service.store().add_product(product.clone());

        for n in 1..=5u32 {
            let outcome = service.add_to_cart(Some(&me), product.id).await.unwrap();
            assert_eq!(outcome.quantity.get(), n);
            assert_eq!(outcome.merged, n > 1);
        }

        let rows = service.store().rows(me.user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity.get(), 5);

        let snapshot = service.cart(Some(&me)).await.unwrap();
        assert_eq!(snapshot.cart.items()[0].quantity.get(), 5);
        assert!(snapshot.pending.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_adds_converge() {
        let service = service();
        let me = identity();
        let product = widget();
        service.store().add_product(product.clone());
        service
            .store()
            .set_latency(Some(Duration::from_millis(10)));

        let (a, b) = tokio::join!(
            service.add_to_cart(Some(&me), product.id),
            service.add_to_cart(Some(&me), product.id),
        );
        a.unwrap();
        b.unwrap();

        let rows = service.store().rows(me.user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_adds_from_two_devices_converge() {
        // Separate services share the store but not the session lock, so both
        // lookups can miss and one insert has to fall back to a merge.
        let store = Arc::new(MemoryLineItemStore::new());
        let product = widget();
        store.add_product(product.clone());
        store.set_latency(Some(Duration::from_millis(10)));

        let settings = CartSettings {
            store_timeout: Duration::from_secs(1),
            ..CartSettings::default()
        };
        let phone = CartService::new(Arc::clone(&store), settings.clone());
        let laptop = CartService::new(Arc::clone(&store), settings);
        let me = identity();

        let (a, b) = tokio::join!(
            phone.add_to_cart(Some(&me), product.id),
            laptop.add_to_cart(Some(&me), product.id),
        );
        let merged = [a.unwrap().merged, b.unwrap().merged];
        assert!(merged.contains(&true));

        let rows = store.rows(me.user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_merges_from_two_devices_all_count() {
        // Both devices see quantity 1 and merge at the same time.
        let store = Arc::new(MemoryLineItemStore::new());
        let product = widget();
        store.add_product(product.clone());
        store.set_latency(Some(Duration::from_millis(10)));

        let settings = CartSettings {
            store_timeout: Duration::from_secs(1),
            ..CartSettings::default()
        };
        let phone = CartService::new(Arc::clone(&store), settings.clone());
        let laptop = CartService::new(Arc::clone(&store), settings);
        let me = identity();

        phone.add_to_cart(Some(&me), product.id).await.unwrap();
        let (a, b) = tokio::join!(
            phone.add_to_cart(Some(&me), product.id),
            laptop.add_to_cart(Some(&me), product.id),
        );
        let mut confirmed = [a.unwrap().quantity.get(), b.unwrap().quantity.get()];
        confirmed.sort_unstable();
        assert_eq!(confirmed, [2, 3]);

        let rows = store.rows(me.user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity.get(), 3);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_matches_remove() {
        let product = widget();
        let mut outcomes = Vec::new();

        for use_remove in [false, true] {
            let service = service();
            let me = identity();
            service.store().add_product(product.clone());
            service.store().add_product(gadget());
            let added = service.add_to_cart(Some(&me), product.id).await.unwrap();
            service.cart(Some(&me)).await.unwrap();

            let outcome = if use_remove {
                service.remove_item(Some(&me), added.line_id).await.unwrap()
            } else {
                service
                    .set_quantity(Some(&me), added.line_id, 0)
                    .await
                    .unwrap()
            };
            assert_eq!(outcome, LineOutcome::Removed { line: added.line_id });

            let snapshot = service.cart(Some(&me)).await.unwrap();
            outcomes.push((
                service.store().rows(me.user_id).len(),
                snapshot.cart.len(),
                snapshot.checkout,
            ));
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0].0, 0);
    }

    #[tokio::test]
    async fn test_set_quantity_overwrites_view() {
        let service = service();
        let me = identity();
        let product = widget();
        service.store().add_product(product.clone());
        let added = service.add_to_cart(Some(&me), product.id).await.unwrap();
        service.cart(Some(&me)).await.unwrap();

        let outcome = service
            .set_quantity(Some(&me), added.line_id, 7)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LineOutcome::Updated {
                line: added.line_id,
                quantity: Quantity::new(7).unwrap()
            }
        );

        let snapshot = service.cart(Some(&me)).await.unwrap();
        assert_eq!(snapshot.cart.items()[0].quantity.get(), 7);
        assert_eq!(service.store().calls(StoreOp::List), 1);
    }

    #[tokio::test]
    async fn test_stale_line_is_a_no_op() {
        let service = service();
        let me = identity();
        let product = widget();
        service.store().add_product(product.clone());
        let added = service.add_to_cart(Some(&me), product.id).await.unwrap();
        service.cart(Some(&me)).await.unwrap();

        // Removed elsewhere.
        service
            .store()
            .delete_line(me.user_id, added.line_id)
            .await
            .unwrap();

        let outcome = service
            .set_quantity(Some(&me), added.line_id, 3)
            .await
            .unwrap();
        assert_eq!(outcome, LineOutcome::Removed { line: added.line_id });
        assert!(service.cart(Some(&me)).await.unwrap().cart.is_empty());

        service.remove_item(Some(&me), added.line_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_lookup_aborts_add() {
        let service = service();
        let me = identity();
        let product = widget();
        service.store().add_product(product.clone());
        service.cart(Some(&me)).await.unwrap();

        service.store().fail_next(StoreOp::Find, 1);
        let err = service.add_to_cart(Some(&me), product.id).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(service.store().calls(StoreOp::Insert), 0);
        assert!(service.store().rows(me.user_id).is_empty());
        let snapshot = service.cart(Some(&me)).await.unwrap();
        assert!(snapshot.cart.is_empty());
        assert!(snapshot.pending.is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_leaves_view_unchanged() {
        let service = service();
        let me = identity();
        let product = widget();
        service.store().add_product(product.clone());
        let added = service.add_to_cart(Some(&me), product.id).await.unwrap();
        let before = service.cart(Some(&me)).await.unwrap();

        service.store().fail_next(StoreOp::Update, 1);
        let err = service
            .set_quantity(Some(&me), added.line_id, 9)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Store(StoreError::Unavailable(_))));

        assert_eq!(service.cart(Some(&me)).await.unwrap().cart, before.cart);
        assert_eq!(service.store().rows(me.user_id)[0].quantity, Quantity::ONE);
    }

    #[tokio::test]
    async fn test_mutations_require_identity() {
        let service = service();
        let product = widget();
        service.store().add_product(product.clone());
        let line = LineItemId::random();

        assert!(matches!(
            service.add_to_cart(None, product.id).await,
            Err(CartError::IdentityMissing)
        ));
        assert!(matches!(
            service.set_quantity(None, line, 2).await,
            Err(CartError::IdentityMissing)
        ));
        assert!(matches!(
            service.set_quantity(None, line, i64::MAX).await,
            Err(CartError::IdentityMissing)
        ));
        assert!(matches!(
            service.remove_item(None, line).await,
            Err(CartError::IdentityMissing)
        ));
        assert_eq!(service.store().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_quantity_is_rejected_before_store() {
        let service = service();
        let err = service
            .set_quantity(Some(&identity()), LineItemId::random(), i64::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity(_)));
        assert_eq!(service.store().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_new_product_is_picked_up_by_refetch() {
        let service = service();
        let me = identity();
        let (first, second) = (widget(), gadget());
        service.store().add_product(first.clone());
        service.store().add_product(second.clone());

        service.add_to_cart(Some(&me), first.id).await.unwrap();
        service.cart(Some(&me)).await.unwrap();
        let added = service.add_to_cart(Some(&me), second.id).await.unwrap();

        let snapshot = service.cart(Some(&me)).await.unwrap();
        let names: Vec<_> = snapshot
            .cart
            .items()
            .iter()
            .map(|item| item.product_name.as_str())
            .collect();
        assert_eq!(names, ["Widget", "Gadget"]);
        assert_eq!(snapshot.cart.items()[1].id, added.line_id);
        assert_eq!(snapshot.cart.total().to_string(), "24.90");
    }

    #[tokio::test]
    async fn test_refetch_failure_after_write_still_succeeds() {
        let service = service();
        let me = identity();
        let product = widget();
        service.store().add_product(product.clone());
        service.cart(Some(&me)).await.unwrap();

        service.store().fail_next(StoreOp::List, 1);
        let outcome = service.add_to_cart(Some(&me), product.id).await.unwrap();
        assert!(!outcome.merged);

        let snapshot = service.cart(Some(&me)).await.unwrap();
        assert_eq!(snapshot.cart.items()[0].id, outcome.line_id);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_retried() {
        let service = service();
        let err = service
            .add_to_cart(Some(&identity()), ProductId::random())
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Store(StoreError::UnknownProduct(_))));
        assert!(!err.is_transient());
        assert_eq!(service.store().calls(StoreOp::Insert), 1);
    }
}
