use crate::{
    amount::Amount,
    bet::{
        BetSlip,
        GameRules,
    },
    chips::ChipStrip,
    config::AppConfig,
    error::ErrorKind,
    events::{
        EventHandlers,
        ModalAction,
    },
    round::{
        BetTotals,
        Color,
        HistoryEntry,
        HistoryStats,
    },
    session::{
        Notice,
        NoticeLevel,
        SessionContext,
        View,
    },
    sync::{
        Phase,
        Reveal,
        RoundSynchronizer,
        SyncCommand,
        SyncConfig,
        TimerState,
    },
    worker::{
        Request,
        WorkerCommand,
        WorkerEvent,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use tokio::sync::mpsc;
use tracing::{
    debug,
    info,
    warn,
};

/// Chips the strip scrolls per tick while the outcome is being fetched.
const STRIP_STEP: usize = 7;

/// Everything a view needs to render one frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppSnapshot {
    pub view: View,
    pub user_id: u64,
    pub balance: Amount,
    pub ref_balance: Amount,
    pub balance_known: bool,
    pub timer: TimerState,
    pub history: Vec<HistoryEntry>,
    pub stats: HistoryStats,
    pub bet_totals: Option<BetTotals>,
    pub slip: Option<BetSlip>,
    pub strip: Vec<Color>,
    pub rules: GameRules,
    pub status: String,
    pub notices: Vec<Notice>,
}

impl AppSnapshot {
    /// The color to highlight on the strip, only once the backend confirmed it.
    pub fn confirmed_winner(&self) -> Option<Color> {
        match (self.timer.phase, self.timer.last_reveal) {
            (Phase::Revealing, Some(revealed)) => match revealed.reveal {
                Reveal::Winner(color) => Some(color),
                Reveal::Pending => None,
            },
            _ => None,
        }
    }
}

pub struct AppController {
    rules: GameRules,
    sync_config: SyncConfig,
    session: SessionContext,
    sync: RoundSynchronizer,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    history: Vec<HistoryEntry>,
    bet_totals: Option<BetTotals>,
    slip: Option<BetSlip>,
    last_color: Option<Color>,
    strip: ChipStrip,
    ticks_since_bets: u32,
    /// Bumped on every move into or out of the Rolls view.
    visit: u64,
    connecting: bool,
}

impl AppController {
    pub fn new(config: &AppConfig, commands: mpsc::UnboundedSender<WorkerCommand>) -> Self {
        Self {
            rules: config.rules,
            sync_config: config.sync.clone(),
            session: SessionContext::new(config.identity.clone()),
            sync: RoundSynchronizer::new(config.sync.clone()),
            commands,
            history: Vec::new(),
            bet_totals: None,
            slip: None,
            last_color: None,
            strip: ChipStrip::default(),
            ticks_since_bets: 0,
            visit: 0,
            connecting: false,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn synchronizer(&self) -> &RoundSynchronizer {
        &self.sync
    }

    /// Loads what the lobby shows before any game is opened.
    pub fn startup(&mut self) {
        self.connecting = true;
        self.session.set_status("Connecting...");
        self.request(Request::Balance);
    }

    pub fn shutdown(&mut self) {
        self.sync.cancel();
        self.send(WorkerCommand::Shutdown);
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            view: self.session.view(),
            user_id: self.session.identity().user_id,
            balance: self.session.balance(),
            ref_balance: self.session.ref_balance(),
            balance_known: self.session.balance_known(),
            timer: self.sync.state().clone(),
            history: self.history.clone(),
            stats: HistoryStats::from_history(&self.history),
            bet_totals: self.bet_totals,
            slip: self.slip.clone(),
            strip: self.strip.window(self.strip.len()),
            rules: self.rules,
            status: self.session.status().to_string(),
            notices: self.session.notices().cloned().collect(),
        }
    }

    /// One-second heartbeat from the app loop.
    pub fn tick(&mut self) {
        self.session.tick_notices();
        if self.session.view() != View::Rolls {
            return;
        }
        let before = self.sync.state().clone();
        let command = self.sync.tick();
        self.after_sync(&before, command);

        if self.sync.state().phase == Phase::AwaitingResult {
            self.strip.advance(STRIP_STEP);
        }
        if let Some(game_number) = self.sync.counted_game()
            && self.sync_config.bets_every_ticks > 0
        {
            self.ticks_since_bets += 1;
            if self.ticks_since_bets >= self.sync_config.bets_every_ticks {
                self.ticks_since_bets = 0;
                self.request_bet_totals(game_number);
            }
        }
    }

    pub fn handle_worker_event(&mut self, event: WorkerEvent, now: DateTime<Utc>) {
        match event {
            WorkerEvent::CurrentRound { ticket, result } => {
                let before = self.sync.state().clone();
                let command = self.sync.on_current_round(ticket, result, now);
                self.after_sync(&before, command);
            }
            WorkerEvent::Outcome { ticket, result } => {
                let current =
                    self.sync.is_active() && ticket.generation == self.sync.generation();
                let before = self.sync.state().clone();
                let command = self.sync.on_outcome(ticket, &result);
                if current && let Ok(history) = result {
                    self.history = history;
                }
                self.after_sync(&before, command);
            }
            WorkerEvent::BetTotals {
                visit,
                game_number,
                result,
            } => {
                if !self.in_visit(visit) {
                    debug!(visit, game_number, "dropping bet totals from an earlier visit");
                    return;
                }
                match result {
                    Ok(totals) if self.shown_game() == Some(game_number) => {
                        self.bet_totals = Some(totals);
                    }
                    Ok(_) => debug!(game_number, "dropping bet totals for another round"),
                    Err(err) => debug!(%err, game_number, "bet totals refresh failed"),
                }
            }
            WorkerEvent::History { visit, result } => {
                if !self.in_visit(visit) {
                    debug!(visit, "dropping history from an earlier visit");
                    return;
                }
                match result {
                    Ok(history) => self.history = history,
                    Err(err) => warn!(%err, "history refresh failed"),
                }
            }
            WorkerEvent::Balance(result) => match result {
                Ok(balance) => {
                    self.session.set_balance(balance);
                    if self.connecting {
                        self.connecting = false;
                        self.session.set_status("Ready");
                    }
                }
                Err(err) => {
                    warn!(%err, "balance refresh failed");
                    self.session.notify(
                        NoticeLevel::Error,
                        failure_notice("Balance refresh", err.kind(), err.user_message()),
                    );
                }
            },
            WorkerEvent::BetPlaced {
                color,
                amount,
                result,
            } => match result {
                Ok(()) => {
                    info!(%color, %amount, "bet accepted");
                    self.session.debit(amount);
                    self.session.notify(
                        NoticeLevel::Success,
                        format!("Bet placed: {amount} TON on {color}"),
                    );
                    if self.session.view() == View::Rolls
                        && let Some(game_number) = self.shown_game()
                    {
                        self.request_bet_totals(game_number);
                    }
                    self.request(Request::Balance);
                }
                Err(err) => {
                    warn!(%err, %color, %amount, "bet failed");
                    self.session.notify(
                        NoticeLevel::Error,
                        failure_notice("Bet", err.kind(), err.user_message()),
                    );
                }
            },
        }
    }

    fn after_sync(&mut self, before: &TimerState, command: Option<SyncCommand>) {
        if let Some(command) = command {
            self.request(Request::Sync(command));
        }
        let after = self.sync.state();
        let before_game = before.round.as_ref().map(|r| r.game_number);
        let after_game = after.round.as_ref().map(|r| r.game_number);

        match (before.phase, after.phase) {
            (Phase::Counting, Phase::AwaitingResult) => {
                self.strip.shuffle();
                self.session.set_status("Rolling...");
            }
            (Phase::AwaitingResult, Phase::Revealing) => {
                let status = match after.last_reveal {
                    Some(revealed) => match revealed.reveal {
                        Reveal::Winner(color) => {
                            format!("Round {}: {} wins", revealed.game_number, color)
                        }
                        Reveal::Pending => {
                            format!("Round {}: result pending", revealed.game_number)
                        }
                    },
                    None => "Result pending".to_string(),
                };
                self.session.set_status(status);
                self.request(Request::Balance);
            }
            _ => {}
        }

        if after.phase == Phase::Counting
            && let Some(game_number) = after_game
            && before_game != after_game
        {
            self.session.set_status(format!("Round {game_number}: place your bets"));
            self.bet_totals = Some(BetTotals::empty(game_number));
            self.ticks_since_bets = 0;
            self.request_bet_totals(game_number);
        }
    }

    fn shown_game(&self) -> Option<u64> {
        self.sync.state().round.as_ref().map(|r| r.game_number)
    }

    /// Whether an answer tagged with `visit` still belongs on screen.
    fn in_visit(&self, visit: u64) -> bool {
        self.session.view() == View::Rolls && visit == self.visit
    }

    fn request_bet_totals(&self, game_number: u64) {
        self.request(Request::BetTotals {
            visit: self.visit,
            game_number,
        });
    }

    fn request(&self, request: Request) {
        self.send(WorkerCommand::Execute(request));
    }

    fn send(&self, command: WorkerCommand) {
        if self.commands.send(command).is_err() {
            warn!("worker command channel closed");
        }
    }
}

impl EventHandlers for AppController {
    fn on_navigate(&mut self, view: View) {
        let Some(previous) = self.session.navigate(view) else {
            return;
        };
        self.visit += 1;
        self.connecting = false;
        if previous == View::Rolls {
            self.sync.cancel();
            self.send(WorkerCommand::AbortInFlight);
            self.slip = None;
            self.session.set_status("Ready");
        }
        if view == View::Rolls {
            let command = self.sync.start();
            self.request(Request::Sync(command));
            self.request(Request::History { visit: self.visit });
            self.request(Request::Balance);
            self.bet_totals = None;
            self.ticks_since_bets = 0;
            self.session.set_status("Syncing round...");
        }
    }

    fn on_bet_placed(&mut self) {
        if self.session.view() != View::Rolls {
            return;
        }
        let slip = self.slip.clone().unwrap_or_default();
        match slip.validate(&self.rules, self.session.balance()) {
            Ok(bet) => {
                info!(color = %bet.color, amount = %bet.amount, "submitting bet");
                self.last_color = Some(bet.color);
                self.slip = None;
                self.session
                    .set_status(format!("Placing {} TON on {}...", bet.amount, bet.color));
                self.request(Request::PlaceBet {
                    color: bet.color,
                    amount: bet.amount,
                });
            }
            Err(err) => {
                debug!(%err, "bet rejected locally");
                self.session
                    .notify(NoticeLevel::Error, failure_notice("Bet", err.kind(), err.to_string()));
            }
        }
    }

    fn on_modal_action(&mut self, action: ModalAction) {
        match action {
            ModalAction::OpenBetSlip => {
                if self.session.view() == View::Rolls {
                    self.slip = Some(BetSlip {
                        color: self.last_color,
                        amount_input: String::new(),
                    });
                }
            }
            ModalAction::CloseBetSlip => self.slip = None,
            ModalAction::SelectColor(color) => {
                if let Some(slip) = self.slip.as_mut() {
                    slip.select(color);
                }
            }
            ModalAction::CycleColor { forward } => {
                if let Some(slip) = self.slip.as_mut() {
                    slip.cycle(forward);
                }
            }
            ModalAction::Input(c) => {
                if let Some(slip) = self.slip.as_mut() {
                    slip.push_char(c);
                }
            }
            ModalAction::Backspace => {
                if let Some(slip) = self.slip.as_mut() {
                    slip.pop_char();
                }
            }
        }
    }
}

/// Notice text for a failed action, worded by where the failure came from.
fn failure_notice(action: &str, kind: ErrorKind, message: String) -> String {
    match kind {
        ErrorKind::ValidationFailure => message,
        ErrorKind::BackendRejection => format!("{action} rejected: {message}"),
        ErrorKind::NetworkFailure => format!("{action} failed: {message}"),
    }
}
