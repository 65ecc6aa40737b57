//! Session teardown.

use futures::Sink;
use log::debug;

use super::Registry;
use crate::transport::{Frame, Outbound};

/// Cancel every subscription task, wait for each to exit, then release the
/// transport.
///
/// Tasks are awaited before the sink is closed so none of them can write to
/// a transport the host has already torn down.
pub(super) async fn teardown<S>(registry: &mut Registry, outbound: &Outbound<S>)
where
    S: Sink<Frame> + Unpin + Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let live = registry.len();
    registry.shutdown().await;
    outbound.shutdown().await;
    debug!("session torn down: cancelled_subscriptions={live}");
}
