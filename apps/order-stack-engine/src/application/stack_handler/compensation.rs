//! Compensation helpers shared by the normal and stop-loss creation paths.
//!
//! None of these are transactional. A failed write is undone by removing what
//! was inserted; if that fails too the stack is reported corrupted.

use tracing::{debug, warn};

use super::escalate;
use crate::domain::order_stack::{OrderStack, StackError};
use crate::domain::orders::StackOrder;
use crate::domain::shared::OrderId;
use crate::error::{ErrorCode, StackHandlerError};
use crate::observability::record_rollback;

/// Put a batch of children on `child_stack`, all or nothing.
///
/// # Errors
///
/// `RECOVERABLE_ROLLBACK` when an insert failed and the batch was removed
/// again; `STACK_CORRUPTED` when that removal failed.
pub async fn put_children_on_stack<C: StackOrder>(
    child_stack: &OrderStack<C>,
    parent_key: &str,
    children: Vec<C>,
) -> Result<Vec<OrderId>, StackHandlerError> {
    match child_stack.put_batch(children).await {
        Ok(child_ids) => {
            debug!(stack = %child_stack.name(), parent = parent_key, ?child_ids, "Put child orders on stack");
            Ok(child_ids)
        }
        Err(err @ StackError::RollbackSucceeded { .. }) => {
            record_rollback(child_stack.name());
            warn!(
                stack = %child_stack.name(),
                parent = parent_key,
                error = %err,
                "Adding child orders failed; rolled back so can try again"
            );
            Err(StackHandlerError::from(err).with_context("parent", parent_key))
        }
        Err(err) => Err(escalate(
            "put_children_on_stack",
            StackHandlerError::from(err).with_context("parent", parent_key),
        )),
    }
}

/// Link freshly inserted children to their parent, removing the children
/// again if the link cannot be written.
///
/// # Errors
///
/// `RECOVERABLE_ROLLBACK` when the link failed and the children were removed;
/// `STACK_CORRUPTED` when removing them failed.
pub async fn add_children_to_parent_or_rollback_children<P: StackOrder, C: StackOrder>(
    parent_stack: &OrderStack<P>,
    child_stack: &OrderStack<C>,
    parent_id: OrderId,
    child_ids: &[OrderId],
) -> Result<(), StackHandlerError> {
    let Err(link_err) = parent_stack.add_children(parent_id, child_ids.to_vec()).await else {
        return Ok(());
    };

    match child_stack.rollback_list_of_orders(child_ids).await {
        Ok(()) => {
            record_rollback(child_stack.name());
            warn!(
                stack = %parent_stack.name(),
                parent_id = %parent_id,
                error = %link_err,
                "Linking child orders failed; rolled back so can try again"
            );
            Err(StackHandlerError::new(
                ErrorCode::RecoverableRollback,
                format!("could not link children {child_ids:?}: {link_err}"),
            )
            .with_context("parent_id", parent_id))
        }
        Err(rollback_err) => Err(escalate(
            "add_children_to_parent",
            StackHandlerError::stack_corrupted(format!(
                "could not link children {child_ids:?} ({link_err}) and could not remove them: {rollback_err}"
            ))
            .with_context("stack", child_stack.name())
            .with_context("parent_id", parent_id),
        )),
    }
}

/// Remove a set of children and then their parents: unlock, deactivate and
/// delete each one.
///
/// # Errors
///
/// `STACK_CORRUPTED` if any removal fails.
pub async fn rollback_parents_and_children<P: StackOrder, C: StackOrder>(
    parent_stack: &OrderStack<P>,
    child_stack: &OrderStack<C>,
    parent_ids: &[OrderId],
    child_ids: &[OrderId],
) -> Result<(), StackHandlerError> {
    if let Err(err) = child_stack.rollback_list_of_orders(child_ids).await {
        return Err(escalate(
            "rollback_parents_and_children",
            StackHandlerError::stack_corrupted(format!(
                "could not roll back children {child_ids:?}: {err}"
            ))
            .with_context("stack", child_stack.name()),
        ));
    }
    if let Err(err) = parent_stack.rollback_list_of_orders(parent_ids).await {
        return Err(escalate(
            "rollback_parents_and_children",
            StackHandlerError::stack_corrupted(format!(
                "rolled back children {child_ids:?} but not parents {parent_ids:?}: {err}"
            ))
            .with_context("stack", parent_stack.name()),
        ));
    }
    record_rollback(parent_stack.name());
    debug!(?parent_ids, ?child_ids, "Rolled back parents and children");
    Ok(())
}
