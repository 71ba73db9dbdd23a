//! Generic order stack over a keyed store.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::completion::CompletionPolicy;
use super::errors::StackError;
use super::store::{OrderStore, StoreError};
use crate::domain::orders::{BrokerOrder, ListOfOrders, OrderBase, OrderError, StackOrder};
use crate::domain::shared::{OrderId, TradeQuantity};

/// Orders of one hierarchy level.
///
/// Runtime has five stacks: instrument, contract, broker, and the stop-loss
/// contract and broker stacks. Writes are individually durable but not
/// transactional across calls.
pub struct OrderStack<O> {
    name: String,
    store: Arc<dyn OrderStore>,
    _kind: PhantomData<fn() -> O>,
}

impl<O> std::fmt::Debug for OrderStack<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStack").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<O> Clone for OrderStack<O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: Arc::clone(&self.store),
            _kind: PhantomData,
        }
    }
}

impl<O: StackOrder> OrderStack<O> {
    /// Stack named `name` over `store`.
    #[must_use]
    pub fn new(name: impl Into<String>, store: Arc<dyn OrderStore>) -> Self {
        Self {
            name: name.into(),
            store,
            _kind: PhantomData,
        }
    }

    /// Stack name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Insert and remove
    // =========================================================================

    /// Assign a fresh id and insert.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Storage` or `StackError::Serialization` on failure;
    /// nothing is written in that case.
    pub async fn put(&self, order: O) -> Result<OrderId, StackError> {
        let order_id = self.store.allocate_id().await.map_err(|e| self.storage(e))?;
        let base = order.base().clone().with_order_id(order_id);
        let order = order.with_base(base);
        let record = self.encode(&order)?;
        self.store
            .insert(order_id, record)
            .await
            .map_err(|e| self.storage(e))?;
        debug!(stack = %self.name, order_id = %order_id, key = %order.order_key(), "Put order on stack");
        Ok(order_id)
    }

    /// Insert several orders, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StackError::RollbackSucceeded` if an insert failed and the
    /// orders already inserted were removed again, or
    /// `StackError::StackCorrupted` if that removal failed too.
    pub async fn put_batch(&self, orders: Vec<O>) -> Result<Vec<OrderId>, StackError> {
        let mut ids = Vec::with_capacity(orders.len());
        for order in orders {
            match self.put(order).await {
                Ok(order_id) => ids.push(order_id),
                Err(err) => {
                    warn!(stack = %self.name, inserted = ids.len(), error = %err, "Batch insert failed, rolling back");
                    return Err(match self.rollback_list_of_orders(&ids).await {
                        Ok(()) => StackError::RollbackSucceeded {
                            stack: self.name.clone(),
                            reason: err.to_string(),
                        },
                        Err(rollback_err) => self.corrupted(format!(
                            "rollback of {ids:?} after '{err}' failed: {rollback_err}"
                        )),
                    });
                }
            }
        }
        Ok(ids)
    }

    /// Undo inserts: unlock, deactivate and remove each order. Ids already
    /// gone are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure; later ids are not attempted.
    pub async fn rollback_list_of_orders(&self, order_ids: &[OrderId]) -> Result<(), StackError> {
        for &order_id in order_ids {
            let Some(order) = self.get(order_id).await? else {
                continue;
            };
            let base = order.base().clone().unlocked().deactivated();
            self.write(&order.with_base(base)).await?;
            self.remove(order_id).await?;
        }
        Ok(())
    }

    /// Physically delete one order.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if absent.
    pub async fn remove(&self, order_id: OrderId) -> Result<(), StackError> {
        self.store.delete(order_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => self.not_found(order_id),
            other => self.storage(other),
        })
    }

    /// Purge every deactivated order. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure.
    pub async fn remove_all_deactivated(&self) -> Result<usize, StackError> {
        let mut removed = 0;
        for order in self.list_orders(false).await? {
            if order.base().is_active() {
                continue;
            }
            if let Some(order_id) = order.base().order_id() {
                self.remove(order_id).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(stack = %self.name, removed, "Removed deactivated orders");
        }
        Ok(removed)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Order by id, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns storage or decoding failures.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<O>, StackError> {
        let record = self.store.get(order_id).await.map_err(|e| self.storage(e))?;
        record
            .map(|value| {
                serde_json::from_value(value).map_err(|source| StackError::Serialization {
                    stack: self.name.clone(),
                    source,
                })
            })
            .transpose()
    }

    /// Order by id.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if absent.
    pub async fn get_or_not_found(&self, order_id: OrderId) -> Result<O, StackError> {
        self.get(order_id)
            .await?
            .ok_or_else(|| self.not_found(order_id))
    }

    /// Orders for the given ids, in the same order.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if any id is absent.
    pub async fn get_list_from_ids(&self, order_ids: &[OrderId]) -> Result<ListOfOrders<O>, StackError> {
        let mut orders = Vec::with_capacity(order_ids.len());
        for &order_id in order_ids {
            orders.push(self.get_or_not_found(order_id).await?);
        }
        Ok(ListOfOrders::new(orders))
    }

    /// All ids on the stack, ascending.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn list_order_ids(&self) -> Result<Vec<OrderId>, StackError> {
        self.store.ids().await.map_err(|e| self.storage(e))
    }

    /// All orders, optionally excluding deactivated ones.
    ///
    /// # Errors
    ///
    /// Returns storage or decoding failures.
    pub async fn list_orders(&self, exclude_inactive: bool) -> Result<Vec<O>, StackError> {
        let mut orders = Vec::new();
        for order_id in self.list_order_ids().await? {
            if let Some(order) = self.get(order_id).await?
                && (!exclude_inactive || order.base().is_active())
            {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// Active orders whose fill has not reached the trade.
    ///
    /// # Errors
    ///
    /// Returns storage or decoding failures.
    pub async fn list_unfilled_orders(&self) -> Result<Vec<O>, StackError> {
        Ok(self
            .list_orders(true)
            .await?
            .into_iter()
            .filter(|o| !o.base().fill_equals_trade())
            .collect())
    }

    /// Number of active orders.
    ///
    /// # Errors
    ///
    /// Returns storage or decoding failures.
    pub async fn count_active(&self) -> Result<usize, StackError> {
        Ok(self.list_orders(true).await?.len())
    }

    /// Ids of orders complete under `policy`.
    ///
    /// # Errors
    ///
    /// Returns storage or decoding failures.
    pub async fn list_of_completed_order_ids(
        &self,
        policy: CompletionPolicy,
    ) -> Result<Vec<OrderId>, StackError> {
        Ok(self
            .list_orders(false)
            .await?
            .iter()
            .filter(|o| policy.is_satisfied_by(o.base()))
            .filter_map(|o| o.base().order_id())
            .collect())
    }

    /// Whether one order is complete under `policy`.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if absent.
    pub async fn is_completed(&self, order_id: OrderId, policy: CompletionPolicy) -> Result<bool, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        Ok(policy.is_satisfied_by(order.base()))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Claim an order for an executing agent.
    ///
    /// # Errors
    ///
    /// Returns `StackError::AlreadyLocked` if already claimed.
    pub async fn lock(&self, order_id: OrderId) -> Result<O, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        if order.base().is_locked() {
            return Err(StackError::AlreadyLocked {
                stack: self.name.clone(),
                order_id,
            });
        }
        self.rewrite(order, |base| Ok(base.locked())).await
    }

    /// Release a claim. Unlocking an unlocked order is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if absent.
    pub async fn unlock(&self, order_id: OrderId) -> Result<O, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        self.rewrite(order, |base| Ok(base.unlocked())).await
    }

    /// Mark inactive. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if absent.
    pub async fn deactivate(&self, order_id: OrderId) -> Result<O, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        if !order.base().is_active() {
            return Ok(order);
        }
        self.rewrite(order, |base| Ok(base.deactivated())).await
    }

    /// Replace the requested trade, keeping everything else.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if absent, or
    /// `StackError::FillExceedsTrade` if the existing fill would exceed it.
    pub async fn change_trade_qty(&self, order_id: OrderId, trade: TradeQuantity) -> Result<O, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        self.rewrite(order, |base| base.with_trade(trade)).await
    }

    /// Replace the fill.
    ///
    /// # Errors
    ///
    /// Returns `StackError::FillExceedsTrade` if the fill is larger than the
    /// trade; the stored order is unchanged.
    pub async fn change_fill_qty(
        &self,
        order_id: OrderId,
        fill: TradeQuantity,
        filled_price: Option<Decimal>,
        fill_datetime: Option<DateTime<Utc>>,
    ) -> Result<O, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        self.rewrite(order, |base| base.with_fill(fill, filled_price, fill_datetime))
            .await
    }

    /// Link the first batch of children.
    ///
    /// # Errors
    ///
    /// Returns `StackError::ChildrenAlreadyPresent` if the parent has children.
    pub async fn add_children(&self, order_id: OrderId, children: Vec<OrderId>) -> Result<O, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        self.rewrite(order, |base| base.with_children(children)).await
    }

    /// Append one child.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if the parent is absent.
    pub async fn add_another_child(&self, order_id: OrderId, child: OrderId) -> Result<O, StackError> {
        let order = self.get_or_not_found(order_id).await?;
        self.rewrite(order, |base| Ok(base.with_another_child(child))).await
    }

    /// Overwrite a stored order with a modified copy.
    ///
    /// # Errors
    ///
    /// Returns `StackError::OrderNotFound` if the order has no id or is absent.
    pub async fn replace_order(&self, order: &O) -> Result<(), StackError> {
        self.write(order).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn rewrite<F>(&self, order: O, change: F) -> Result<O, StackError>
    where
        F: FnOnce(OrderBase) -> Result<OrderBase, OrderError>,
    {
        let order_id = order.base().order_id().ok_or_else(|| self.missing_id())?;
        let base = change(order.base().clone()).map_err(|e| self.order_error(order_id, e))?;
        let updated = order.with_base(base);
        self.write(&updated).await?;
        Ok(updated)
    }

    async fn write(&self, order: &O) -> Result<(), StackError> {
        let order_id = order.base().order_id().ok_or_else(|| self.missing_id())?;
        let record = self.encode(order)?;
        self.store.update(order_id, record).await.map_err(|e| match e {
            StoreError::NotFound(_) => self.not_found(order_id),
            other => self.storage(other),
        })
    }

    fn encode(&self, order: &O) -> Result<serde_json::Value, StackError> {
        serde_json::to_value(order).map_err(|source| StackError::Serialization {
            stack: self.name.clone(),
            source,
        })
    }

    pub(crate) fn order_error(&self, order_id: OrderId, err: OrderError) -> StackError {
        match err {
            OrderError::FillExceedsTrade { trade, fill } => StackError::FillExceedsTrade {
                stack: self.name.clone(),
                order_id,
                trade,
                fill,
            },
            OrderError::ChildrenAlreadyPresent { .. } => StackError::ChildrenAlreadyPresent {
                stack: self.name.clone(),
                order_id,
            },
            source => StackError::InvalidOrder {
                stack: self.name.clone(),
                order_id,
                source,
            },
        }
    }

    fn not_found(&self, order_id: OrderId) -> StackError {
        StackError::OrderNotFound {
            stack: self.name.clone(),
            order_id,
        }
    }

    fn storage(&self, source: StoreError) -> StackError {
        StackError::Storage {
            stack: self.name.clone(),
            source,
        }
    }

    fn missing_id(&self) -> StackError {
        self.corrupted("order has no id but was expected on the stack".to_string())
    }

    pub(crate) fn corrupted(&self, reason: String) -> StackError {
        StackError::StackCorrupted {
            stack: self.name.clone(),
            reason,
        }
    }
}

impl OrderStack<BrokerOrder> {
    /// Merge fill, price, commission and broker ids reported for the live
    /// order into the stored broker order.
    ///
    /// # Errors
    ///
    /// Returns `StackError::FillExceedsTrade` if the reported fill is larger
    /// than the trade; the stored order is unchanged.
    pub async fn add_execution_details(
        &self,
        order_id: OrderId,
        live: &BrokerOrder,
    ) -> Result<BrokerOrder, StackError> {
        let stored = self.get_or_not_found(order_id).await?;
        let merged = stored
            .with_execution_details(live)
            .map_err(|e| self.order_error(order_id, e))?;
        self.write(&merged).await?;
        Ok(merged)
    }
}
