//! Shared action dispatch path: one `perform_actions` call with metrics,
//! events and error context attached.

use lectern_store::{Action, ActionDispatcher, ActionResult, DatasetRef};

use crate::domain::{RepositoryContext, Result};
use crate::metrics::METRICS;
use crate::obs::{emit_actions_dispatched, emit_operation_failed};

pub(crate) async fn dispatch_actions(
    dispatcher: &dyn ActionDispatcher,
    target: &DatasetRef,
    operation: &str,
    context: &str,
    actions: Vec<Action>,
) -> Result<ActionResult> {
    let action_types: Vec<&'static str> = actions.iter().map(Action::action_type).collect();

    let result = match dispatcher.perform_actions(target, actions).await {
        Ok(result) => result,
        Err(err) => {
            emit_operation_failed(operation, &err);
            return Err(err).context(context);
        }
    };

    METRICS.add_actions_dispatched(action_types.len() as u64);
    emit_actions_dispatched(&result.transaction_id, &action_types);
    Ok(result)
}
