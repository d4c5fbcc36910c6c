//! Parallel dispatch of one statement to the worker pool.
//!
//! The transport is external; a [`Worker`] is anything that can answer a
//! statement asynchronously. One round queries every worker in parallel
//! under a single deadline. A worker that has not answered by then is
//! aborted and recorded as an absent reply, so it never blocks the round.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};
use verity_consensus::{RawReply, Statement, WorkerId};

/// A worker node reachable through some transport.
pub trait Worker: Send + Sync + 'static {
    /// The worker's identity.
    fn id(&self) -> WorkerId;

    /// Asks the worker to resolve a statement.
    ///
    /// `None` means the worker declined or the transport failed.
    fn query(&self, statement: Statement) -> impl Future<Output = Option<Value>> + Send;
}

/// Queries every worker in parallel and collects one raw reply each.
///
/// Replies are returned in the order of `workers`. Absent, failed and
/// timed-out workers yield [`RawReply::missing`].
pub async fn dispatch_round<W: Worker>(
    workers: &[Arc<W>],
    statement: &Statement,
    timeout: Duration,
) -> Vec<RawReply> {
    let deadline = Instant::now() + timeout;
    let mut set = JoinSet::new();

    for worker in workers {
        let worker = Arc::clone(worker);
        let statement = statement.clone();
        set.spawn(async move {
            let id = worker.id();
            let payload = worker.query(statement).await;
            (id, payload)
        });
    }

    let mut answered: BTreeMap<WorkerId, Value> = BTreeMap::new();
    loop {
        let next = timeout_at(deadline, set.join_next()).await;
        match next {
            Ok(Some(Ok((id, Some(payload))))) => {
                answered.entry(id).or_insert(payload);
            }
            Ok(Some(Ok((id, None)))) => {
                debug!(worker = %id, "worker returned no reply");
            }
            Ok(Some(Err(e))) => {
                warn!(statement = %statement.id, error = %e, "worker task failed");
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    statement = %statement.id,
                    pending = set.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "dispatch round timed out"
                );
                set.abort_all();
                break;
            }
        }
    }

    workers
        .iter()
        .map(|worker| {
            let id = worker.id();
            match answered.get(&id) {
                Some(payload) => RawReply::new(id, payload.clone()),
                None => RawReply::missing(id),
            }
        })
        .collect()
}
