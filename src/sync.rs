//! Client-side synchronization of the Rolls round countdown.
//!
//! [`RoundSynchronizer`] never talks to the network itself. Every operation
//! returns the [`SyncCommand`] the driver has to execute, and the driver feeds
//! the result back together with the [`Ticket`] the command was issued under.
//! The ticket's generation guards against responses that outlive a phase
//! change or a cancellation; its game number guards against outcomes for a
//! round other than the one being awaited.

use crate::{
    error::ApiResult,
    round::{
        Color,
        HistoryEntry,
        Round,
        winning_color_for,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a revealed outcome stays on screen before the next round is picked up.
    pub reveal_grace_secs: u32,
    /// Retries of the outcome fetch before falling back to "result pending".
    pub outcome_retries: u32,
    #[serde(with = "millis")]
    pub retry_delay: Duration,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Re-poll the current round every N ticks while counting. Zero disables.
    pub resync_every_ticks: u32,
    /// Refresh the per-color bet totals every N ticks while counting. Zero disables.
    pub bets_every_ticks: u32,
    pub history_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            reveal_grace_secs: 3,
            outcome_retries: 1,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            resync_every_ticks: 5,
            bets_every_ticks: 2,
            history_limit: 100,
        }
    }
}

mod millis {
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Counting,
    AwaitingResult,
    Revealing,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reveal {
    /// Outcome confirmed by the history endpoint.
    Winner(Color),
    /// The outcome could not be confirmed in time.
    Pending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RevealedRound {
    pub game_number: u64,
    pub reveal: Reveal,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimerState {
    pub round: Option<Round>,
    pub seconds_remaining: u32,
    pub phase: Phase,
    pub last_reveal: Option<RevealedRound>,
}

impl Default for TimerState {
    fn default() -> Self {
        TimerState {
            round: None,
            seconds_remaining: 0,
            phase: Phase::Counting,
            last_reveal: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ticket {
    pub generation: u64,
    pub game_number: Option<u64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncCommand {
    FetchCurrent { ticket: Ticket },
    FetchOutcome { ticket: Ticket, delay: Duration },
}

impl SyncCommand {
    pub fn ticket(&self) -> Ticket {
        match self {
            SyncCommand::FetchCurrent { ticket }
            | SyncCommand::FetchOutcome { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug)]
pub struct RoundSynchronizer {
    config: SyncConfig,
    state: TimerState,
    generation: u64,
    active: bool,
    current_in_flight: bool,
    awaiting: Option<u64>,
    outcome_attempts: u32,
    reveal_ticks_left: u32,
    ticks_since_resync: u32,
    resolved_through: Option<u64>,
}

impl RoundSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            state: TimerState::default(),
            generation: 0,
            active: false,
            current_in_flight: false,
            awaiting: None,
            outcome_attempts: 0,
            reveal_ticks_left: 0,
            ticks_since_resync: 0,
            resolved_through: None,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn awaiting(&self) -> Option<u64> {
        self.awaiting
    }

    /// Game number of the round currently being counted, if any.
    pub fn counted_game(&self) -> Option<u64> {
        match self.state.phase {
            Phase::Counting => self.state.round.as_ref().map(|r| r.game_number),
            Phase::AwaitingResult | Phase::Revealing => None,
        }
    }

    /// Begins (or restarts) synchronization by asking for the current round.
    /// While the loop is running the displayed state is kept until the answer
    /// arrives; a cancelled loop starts over from an empty countdown.
    pub fn start(&mut self) -> SyncCommand {
        if !self.active {
            self.state = TimerState {
                last_reveal: self.state.last_reveal,
                ..TimerState::default()
            };
        } else if self.state.phase == Phase::AwaitingResult {
            // an abandoned outcome fetch is re-derived from the next round answer
            self.state.phase = Phase::Counting;
        }
        self.active = true;
        self.generation += 1;
        self.awaiting = None;
        self.outcome_attempts = 0;
        self.ticks_since_resync = 0;
        self.current_in_flight = true;
        debug!(generation = self.generation, "requesting current round");
        SyncCommand::FetchCurrent {
            ticket: self.ticket(None),
        }
    }

    /// Stops the loop. Responses issued before this call are dropped.
    pub fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.generation += 1;
        self.current_in_flight = false;
        self.awaiting = None;
        info!(generation = self.generation, "round synchronization cancelled");
    }

    /// One-second heartbeat of the local countdown.
    pub fn tick(&mut self) -> Option<SyncCommand> {
        if !self.active {
            return None;
        }
        match self.state.phase {
            Phase::Counting => self.tick_counting(),
            Phase::AwaitingResult => None,
            Phase::Revealing => {
                self.reveal_ticks_left = self.reveal_ticks_left.saturating_sub(1);
                if self.reveal_ticks_left == 0 && !self.current_in_flight {
                    Some(self.start())
                } else {
                    None
                }
            }
        }
    }

    pub fn on_current_round(
        &mut self,
        ticket: Ticket,
        result: ApiResult<Round>,
        now: DateTime<Utc>,
    ) -> Option<SyncCommand> {
        if !self.accepts(ticket) {
            debug!(?ticket, generation = self.generation, "dropping stale round response");
            return None;
        }
        self.current_in_flight = false;
        let round = match result {
            Ok(round) => round,
            Err(err) => {
                warn!(%err, "current round fetch failed; keeping displayed state");
                return None;
            }
        };
        match self.state.phase {
            Phase::AwaitingResult => None,
            Phase::Counting | Phase::Revealing => self.observe_round(round, now),
        }
    }

    /// Applies the history answer for the round being awaited. `result` is
    /// borrowed so the caller can reuse the history for display.
    pub fn on_outcome(
        &mut self,
        ticket: Ticket,
        result: &ApiResult<Vec<HistoryEntry>>,
    ) -> Option<SyncCommand> {
        if !self.accepts(ticket) {
            debug!(?ticket, generation = self.generation, "dropping stale outcome response");
            return None;
        }
        let awaited = match (self.state.phase, self.awaiting) {
            (Phase::AwaitingResult, Some(g)) if ticket.game_number == Some(g) => g,
            _ => {
                debug!(?ticket, awaiting = ?self.awaiting, "dropping outcome for another round");
                return None;
            }
        };
        let confirmed = match result {
            Ok(history) => {
                let found = winning_color_for(history, awaited);
                if found.is_none() {
                    debug!(game_number = awaited, "round not resolved in history yet");
                }
                found
            }
            Err(err) => {
                warn!(%err, game_number = awaited, attempt = self.outcome_attempts, "outcome fetch failed");
                None
            }
        };
        match confirmed {
            Some(color) => {
                info!(game_number = awaited, %color, "round outcome confirmed");
                self.reveal(awaited, Reveal::Winner(color));
                None
            }
            None if self.outcome_attempts <= self.config.outcome_retries => {
                self.outcome_attempts += 1;
                Some(SyncCommand::FetchOutcome {
                    ticket,
                    delay: self.config.retry_delay,
                })
            }
            None => {
                warn!(game_number = awaited, "outcome unavailable; showing result pending");
                self.reveal(awaited, Reveal::Pending);
                None
            }
        }
    }

    fn tick_counting(&mut self) -> Option<SyncCommand> {
        let Some(game_number) = self.state.round.as_ref().map(|r| r.game_number) else {
            return self.refetch_current();
        };
        if self.is_resolved(game_number) {
            return self.refetch_current();
        }
        self.state.seconds_remaining = self.state.seconds_remaining.saturating_sub(1);
        if self.state.seconds_remaining == 0 {
            return Some(self.await_outcome(game_number));
        }
        self.ticks_since_resync += 1;
        if self.config.resync_every_ticks > 0
            && self.ticks_since_resync >= self.config.resync_every_ticks
        {
            self.ticks_since_resync = 0;
            return self.refetch_current();
        }
        None
    }

    fn observe_round(&mut self, round: Round, now: DateTime<Utc>) -> Option<SyncCommand> {
        let estimate = round.seconds_remaining_at(now);
        let shown = self.state.round.as_ref().map(|r| r.game_number);

        if self.state.phase == Phase::Counting
            && let Some(counted) = shown
            && !self.is_resolved(counted)
        {
            if round.game_number > counted {
                info!(counted, observed = round.game_number, "newer round observed; closing counted round");
                return Some(self.await_outcome(counted));
            }
            if round.game_number == counted {
                if !round.is_open() {
                    info!(game_number = counted, "backend closed the counted round");
                    return Some(self.await_outcome(counted));
                }
                self.state.seconds_remaining = self.state.seconds_remaining.min(estimate);
                self.state.round = Some(round);
                return None;
            }
            debug!(counted, observed = round.game_number, "ignoring older round");
            return None;
        }

        if self.is_resolved(round.game_number) {
            debug!(game_number = round.game_number, "next round not open yet");
            return None;
        }
        info!(game_number = round.game_number, seconds_remaining = estimate, "counting new round");
        self.state.round = Some(round);
        self.state.seconds_remaining = estimate;
        self.state.phase = Phase::Counting;
        self.ticks_since_resync = 0;
        None
    }

    fn await_outcome(&mut self, game_number: u64) -> SyncCommand {
        self.generation += 1;
        self.current_in_flight = false;
        self.state.phase = Phase::AwaitingResult;
        self.state.seconds_remaining = 0;
        self.awaiting = Some(game_number);
        self.outcome_attempts = 1;
        SyncCommand::FetchOutcome {
            ticket: self.ticket(Some(game_number)),
            delay: Duration::ZERO,
        }
    }

    fn reveal(&mut self, game_number: u64, reveal: Reveal) {
        self.state.phase = Phase::Revealing;
        self.state.last_reveal = Some(RevealedRound {
            game_number,
            reveal,
        });
        self.resolved_through = Some(
            self.resolved_through
                .map_or(game_number, |r| r.max(game_number)),
        );
        self.awaiting = None;
        self.reveal_ticks_left = self.config.reveal_grace_secs.max(1);
    }

    fn refetch_current(&mut self) -> Option<SyncCommand> {
        if self.current_in_flight {
            return None;
        }
        self.current_in_flight = true;
        Some(SyncCommand::FetchCurrent {
            ticket: self.ticket(None),
        })
    }

    fn is_resolved(&self, game_number: u64) -> bool {
        self.resolved_through.is_some_and(|r| game_number <= r)
    }

    fn accepts(&self, ticket: Ticket) -> bool {
        self.active && ticket.generation == self.generation
    }

    fn ticket(&self, game_number: Option<u64>) -> Ticket {
        Ticket {
            generation: self.generation,
            game_number,
        }
    }
}
