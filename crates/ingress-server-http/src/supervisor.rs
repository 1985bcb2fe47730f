//! Per-connection fault boundary
//!
//! Each public connection is served inside [`supervise`]. A panic in the
//! supervised future is caught, logged against the connection id and
//! dropped; the listener and every other connection keep running. Whatever
//! the future owned (the connection included) is released by unwinding.

use futures::FutureExt;
use ingress_connection::ConnectionId;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::warn;

/// Run `task` for connection `conn_id`, turning a panic into `None`
pub async fn supervise<F>(conn_id: ConnectionId, task: F) -> Option<F::Output>
where
    F: Future,
{
    match AssertUnwindSafe(task).catch_unwind().await {
        Ok(output) => Some(output),
        Err(panic) => {
            warn!(
                conn = %conn_id,
                "HTTP handler failed with error {}",
                panic_message(panic.as_ref())
            );
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}
