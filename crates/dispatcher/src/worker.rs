//! Route worker task
//!
//! Each route runs on its own tokio task. Lifecycle commands, data-available
//! wake-ups and periodic ticks are multiplexed there, which serializes every
//! callback of the route. Different routes run concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::RouteState;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::error::{CallbackFailure, DispatchError};
use crate::metrics::RouteMetrics;
use crate::route::RouteCore;
use crate::stream::DataSignal;

/// Lifecycle operation requested from outside the route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOp {
    Enable,
    Start,
    Pause,
    Resume,
    Stop,
    Disable,
    /// Deliver any pending data-available event, then reply
    Flush,
}

struct RouteCommand {
    op: RouteOp,
    reply: oneshot::Sender<Result<Option<RouteState>, DispatchError>>,
}

/// Caller side of a route worker
pub struct RouteHandle {
    name: String,
    commands: mpsc::Sender<RouteCommand>,
    state: watch::Receiver<Option<RouteState>>,
    failure: watch::Receiver<Option<CallbackFailure>>,
    metrics: Arc<RouteMetrics>,
}

impl fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("last_failure", &self.last_failure())
            .finish_non_exhaustive()
    }
}

impl RouteHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, `None` while disabled
    pub fn state(&self) -> Option<RouteState> {
        *self.state.borrow()
    }

    /// Most recent failure of `on_data_available` or `on_periodic_event`
    pub fn last_failure(&self) -> Option<CallbackFailure> {
        self.failure.borrow().clone()
    }

    pub fn metrics(&self) -> &Arc<RouteMetrics> {
        &self.metrics
    }

    /// Wait until the route reaches `target` (`None` = disabled)
    pub async fn wait_for(&self, target: Option<RouteState>) -> Result<(), DispatchError> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| DispatchError::WorkerClosed(self.name.clone()))
    }

    pub async fn enable(&self) -> Result<RouteState, DispatchError> {
        self.transition(RouteOp::Enable).await
    }

    pub async fn start(&self) -> Result<RouteState, DispatchError> {
        self.transition(RouteOp::Start).await
    }

    pub async fn pause(&self) -> Result<RouteState, DispatchError> {
        self.transition(RouteOp::Pause).await
    }

    pub async fn resume(&self) -> Result<RouteState, DispatchError> {
        self.transition(RouteOp::Resume).await
    }

    pub async fn stop(&self) -> Result<RouteState, DispatchError> {
        self.transition(RouteOp::Stop).await
    }

    pub async fn disable(&self) -> Result<(), DispatchError> {
        self.request(RouteOp::Disable).await.map(|_| ())
    }

    /// Returns once every sample delivered before the call has been offered
    /// to the Processor (if the route is running)
    pub async fn flush(&self) -> Result<(), DispatchError> {
        self.request(RouteOp::Flush).await.map(|_| ())
    }

    async fn transition(&self, op: RouteOp) -> Result<RouteState, DispatchError> {
        self.request(op).await?.ok_or_else(|| {
            DispatchError::invalid_transition(&self.name, "report state", "disabled")
        })
    }

    async fn request(&self, op: RouteOp) -> Result<Option<RouteState>, DispatchError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(RouteCommand { op, reply })
            .await
            .map_err(|_| DispatchError::WorkerClosed(self.name.clone()))?;
        response
            .await
            .map_err(|_| DispatchError::WorkerClosed(self.name.clone()))?
    }
}

/// Spawn the worker owning `core`
pub(crate) fn spawn_route(
    core: RouteCore,
    signal: Arc<DataSignal>,
    metrics: Arc<RouteMetrics>,
    period: Option<Duration>,
    queue_capacity: usize,
) -> (RouteHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::channel(queue_capacity.max(1));
    let (state_tx, state) = watch::channel(core.status());
    let (failure_tx, failure) = watch::channel(None);
    let handle = RouteHandle {
        name: core.name().to_string(),
        commands,
        state,
        failure,
        metrics,
    };
    let status = Status {
        state: state_tx,
        failure: failure_tx,
    };
    let task = tokio::spawn(route_worker(core, rx, status, signal, period));
    (handle, task)
}

/// What the worker publishes to its handle
struct Status {
    state: watch::Sender<Option<RouteState>>,
    failure: watch::Sender<Option<CallbackFailure>>,
}

impl Status {
    fn publish(&self, core: &RouteCore) {
        let state = core.status();
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        self.failure.send_if_modified(|current| {
            if current.as_ref() == core.last_failure() {
                return false;
            }
            *current = core.last_failure().cloned();
            true
        });
    }
}

#[instrument(name = "route_worker", skip_all, fields(route = %core.name()))]
async fn route_worker(
    mut core: RouteCore,
    mut commands: mpsc::Receiver<RouteCommand>,
    status: Status,
    signal: Arc<DataSignal>,
    period: Option<Duration>,
) {
    let mut ticker = period.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    debug!(?period, "Route worker started");

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(RouteCommand { op, reply }) = command else {
                    break;
                };
                let result = apply(&mut core, op, &signal);
                status.publish(&core);
                // caller may have given up waiting
                let _ = reply.send(result);
            }

            _ = signal.wait() => {
                if signal.take() {
                    core.dispatch_data_available();
                    status.publish(&core);
                }
            }

            _ = tick(&mut ticker) => {
                core.dispatch_periodic();
                status.publish(&core);
            }
        }
    }

    if core.status().is_some() {
        if let Err(e) = core.disable() {
            warn!(error = %e, "Route still enabled at shutdown");
        }
        status.publish(&core);
    }
    info!("Route worker stopped");
}

fn apply(
    core: &mut RouteCore,
    op: RouteOp,
    signal: &DataSignal,
) -> Result<Option<RouteState>, DispatchError> {
    match op {
        RouteOp::Enable => core.enable().map(Some),
        RouteOp::Start => core.start().map(Some),
        RouteOp::Pause => core.pause().map(Some),
        RouteOp::Resume => core.resume().map(Some),
        RouteOp::Stop => core.stop().map(Some),
        RouteOp::Disable => core.disable().map(|_| None),
        RouteOp::Flush => {
            if signal.take() {
                core.dispatch_data_available();
            }
            Ok(core.status())
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
