//! Background task that performs backend requests on behalf of the app loop.
//!
//! Requests run concurrently in a [`JoinSet`] so a slow history call never
//! holds up the countdown. Each finished request is reported back as a
//! [`WorkerEvent`] carrying whatever tag the request was issued with.

use crate::{
    amount::Amount,
    api::{
        Balance,
        RollsApi,
    },
    error::{
        ApiError,
        ApiResult,
    },
    round::{
        BetTotals,
        Color,
        HistoryEntry,
        Round,
    },
    sync::{
        SyncCommand,
        SyncConfig,
        Ticket,
    },
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinSet,
    time,
};
use tracing::{
    debug,
    warn,
};

/// Requests that only matter to one stay in the Rolls view carry that
/// `visit`; it comes back on the matching [`WorkerEvent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Request {
    Sync(SyncCommand),
    BetTotals { visit: u64, game_number: u64 },
    History { visit: u64 },
    Balance,
    PlaceBet { color: Color, amount: Amount },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerCommand {
    Execute(Request),
    /// Drops every round-loop request still in flight. Bet submissions are kept.
    AbortInFlight,
    Shutdown,
}

#[derive(Debug)]
pub enum WorkerEvent {
    CurrentRound {
        ticket: Ticket,
        result: ApiResult<Round>,
    },
    Outcome {
        ticket: Ticket,
        result: ApiResult<Vec<HistoryEntry>>,
    },
    BetTotals {
        visit: u64,
        game_number: u64,
        result: ApiResult<BetTotals>,
    },
    History {
        visit: u64,
        result: ApiResult<Vec<HistoryEntry>>,
    },
    Balance(ApiResult<Balance>),
    BetPlaced {
        color: Color,
        amount: Amount,
        result: ApiResult<()>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkerLimits {
    pub request_timeout: Duration,
    pub history_limit: usize,
}

impl From<&SyncConfig> for WorkerLimits {
    fn from(config: &SyncConfig) -> Self {
        WorkerLimits {
            request_timeout: config.request_timeout,
            history_limit: config.history_limit,
        }
    }
}

pub async fn run_worker<A>(
    api: A,
    limits: WorkerLimits,
    mut cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
) where
    A: RollsApi + Clone + Send + Sync + 'static,
{
    let mut in_flight = JoinSet::new();
    let mut submissions = JoinSet::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    WorkerCommand::Execute(request) => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        let task = async move {
                            let event = execute(&api, limits, request).await;
                            if event_tx.send(event).is_err() {
                                debug!("worker event receiver dropped");
                            }
                        };
                        if matches!(request, Request::PlaceBet { .. }) {
                            submissions.spawn(task);
                        } else {
                            in_flight.spawn(task);
                        }
                    }
                    WorkerCommand::AbortInFlight => {
                        debug!(tasks = in_flight.len(), "aborting in-flight requests");
                        in_flight.abort_all();
                    }
                    WorkerCommand::Shutdown => break,
                }
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        warn!(%err, "request task panicked");
                    }
                }
            }
            Some(joined) = submissions.join_next(), if !submissions.is_empty() => {
                if let Err(err) = joined {
                    warn!(%err, "bet submission task failed");
                }
            }
        }
    }

    in_flight.shutdown().await;
    submissions.shutdown().await;
    debug!("worker stopped");
}

async fn execute<A: RollsApi>(api: &A, limits: WorkerLimits, request: Request) -> WorkerEvent {
    let after = limits.request_timeout;
    match request {
        Request::Sync(SyncCommand::FetchCurrent { ticket }) => WorkerEvent::CurrentRound {
            ticket,
            result: bounded("current round", after, api.current_round()).await,
        },
        Request::Sync(SyncCommand::FetchOutcome { ticket, delay }) => {
            if !delay.is_zero() {
                time::sleep(delay).await;
            }
            WorkerEvent::Outcome {
                ticket,
                result: bounded("history", after, api.history(limits.history_limit)).await,
            }
        }
        Request::BetTotals { visit, game_number } => WorkerEvent::BetTotals {
            visit,
            game_number,
            result: bounded("bets", after, api.bet_totals(game_number)).await,
        },
        Request::History { visit } => WorkerEvent::History {
            visit,
            result: bounded("history", after, api.history(limits.history_limit)).await,
        },
        Request::Balance => {
            WorkerEvent::Balance(bounded("balance", after, api.balance()).await)
        }
        Request::PlaceBet { color, amount } => WorkerEvent::BetPlaced {
            color,
            amount,
            result: bounded("bet", after, api.place_bet(color, amount)).await,
        },
    }
}

async fn bounded<T>(
    endpoint: &'static str,
    after: Duration,
    request: impl Future<Output = ApiResult<T>>,
) -> ApiResult<T> {
    match time::timeout(after, request).await {
        Ok(result) => result,
        Err(_) => {
            warn!(endpoint, ?after, "request timed out");
            Err(ApiError::timeout(endpoint, after))
        }
    }
}
