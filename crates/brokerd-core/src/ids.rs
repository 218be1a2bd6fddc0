//! Task and executor identifiers.
//!
//! Identifiers have the form `broker-<id>-<uuid>` so the owning broker can be
//! recovered from any status update the resource manager sends back.

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Generate a globally unique task id for a broker.
pub fn next_task_id(broker_id: &str) -> String {
    format!("broker-{broker_id}-{}", Uuid::new_v4())
}

/// Generate a globally unique executor id for a broker.
pub fn next_executor_id(broker_id: &str) -> String {
    format!("broker-{broker_id}-{}", Uuid::new_v4())
}

/// Recover the broker id from a task (or executor) id.
///
/// Takes the second `-`-delimited field. The `broker` prefix is not checked,
/// and a broker id that itself contains `-` is truncated at the first one.
pub fn id_from_task_id(task_id: &str) -> CoreResult<&str> {
    let mut fields = task_id.split('-');
    fields.next();
    fields
        .next()
        .ok_or_else(|| CoreError::InvalidTaskId(task_id.to_string()))
}
