use crate::amount::Amount;
use chrono::{
    DateTime,
    Utc,
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

pub const DEFAULT_ROUND_DURATION_SECS: u32 = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Red, Color::Blue, Color::Green];

    /// Payout multiplier shown next to the bet option.
    pub fn multiplier(self) -> u64 {
        match self {
            Color::Red | Color::Blue => 2,
            Color::Green => 10,
        }
    }

    /// How many chips of this color sit on the 100-chip strip.
    pub fn chip_count(self) -> usize {
        match self {
            Color::Red | Color::Blue => 49,
            Color::Green => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
        }
    }

    pub fn next(self) -> Color {
        match self {
            Color::Red => Color::Blue,
            Color::Blue => Color::Green,
            Color::Green => Color::Red,
        }
    }

    pub fn prev(self) -> Color {
        match self {
            Color::Red => Color::Green,
            Color::Blue => Color::Red,
            Color::Green => Color::Blue,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    #[default]
    #[serde(alias = "OPEN")]
    Open,
    #[serde(alias = "CLOSED")]
    Closed,
}

fn default_duration() -> u32 {
    DEFAULT_ROUND_DURATION_SECS
}

/// Read-only copy of the backend's current round.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub game_number: u64,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    /// Older backends report the remaining time instead of the opening instant.
    #[serde(default)]
    pub time_remaining: Option<u32>,
    #[serde(default = "default_duration")]
    pub duration_seconds: u32,
    #[serde(default)]
    pub status: RoundStatus,
    #[serde(default)]
    pub winning_color: Option<Color>,
}

impl Round {
    pub fn open(game_number: u64, opened_at: DateTime<Utc>) -> Self {
        Round {
            game_number,
            opened_at: Some(opened_at),
            time_remaining: None,
            duration_seconds: DEFAULT_ROUND_DURATION_SECS,
            status: RoundStatus::Open,
            winning_color: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }

    /// Countdown estimate at `now`, clamped to `[0, duration_seconds]`.
    pub fn seconds_remaining_at(&self, now: DateTime<Utc>) -> u32 {
        if !self.is_open() {
            return 0;
        }
        let duration = self.duration_seconds;
        match (self.opened_at, self.time_remaining) {
            (Some(opened_at), _) => {
                let elapsed = (now - opened_at)
                    .num_seconds()
                    .clamp(0, i64::from(duration));
                duration - elapsed as u32
            }
            (None, Some(remaining)) => remaining.min(duration),
            (None, None) => duration,
        }
    }
}

/// One resolved round as reported by the history endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub game_number: u64,
    pub winning_color: Color,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Finds the confirmed outcome for `game_number`, regardless of history order.
pub fn winning_color_for(history: &[HistoryEntry], game_number: u64) -> Option<Color> {
    history
        .iter()
        .find(|entry| entry.game_number == game_number)
        .map(|entry| entry.winning_color)
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HistoryStats {
    pub red: usize,
    pub blue: usize,
    pub green: usize,
}

impl HistoryStats {
    pub fn from_history(history: &[HistoryEntry]) -> Self {
        history
            .iter()
            .fold(HistoryStats::default(), |mut stats, entry| {
                match entry.winning_color {
                    Color::Red => stats.red += 1,
                    Color::Blue => stats.blue += 1,
                    Color::Green => stats.green += 1,
                }
                stats
            })
    }
}

/// A single bet as listed by the bets endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    #[serde(default)]
    pub game_number: Option<u64>,
    pub color: Color,
    pub amount: Amount,
}

/// Sum of all bets per color for one round.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BetTotals {
    pub game_number: u64,
    pub red: Amount,
    pub blue: Amount,
    pub green: Amount,
}

impl BetTotals {
    pub fn empty(game_number: u64) -> Self {
        BetTotals {
            game_number,
            ..BetTotals::default()
        }
    }

    /// Aggregates the records that belong to `game_number`. Records without a
    /// game number are taken as belonging to the requested round.
    pub fn from_records(game_number: u64, records: &[BetRecord]) -> Self {
        records
            .iter()
            .filter(|r| r.game_number.is_none_or(|g| g == game_number))
            .fold(BetTotals::empty(game_number), |mut totals, record| {
                let slot = totals.slot_mut(record.color);
                *slot = slot.saturating_add(record.amount);
                totals
            })
    }

    pub fn get(&self, color: Color) -> Amount {
        match color {
            Color::Red => self.red,
            Color::Blue => self.blue,
            Color::Green => self.green,
        }
    }

    fn slot_mut(&mut self, color: Color) -> &mut Amount {
        match color {
            Color::Red => &mut self.red,
            Color::Blue => &mut self.blue,
            Color::Green => &mut self.green,
        }
    }
}

/// Compact one-character-per-round rendering of recent outcomes, newest first.
pub fn history_strip(history: &[HistoryEntry], limit: usize) -> String {
    history
        .iter()
        .take(limit)
        .map(|entry| match entry.winning_color {
            Color::Red => 'R',
            Color::Blue => 'B',
            Color::Green => 'G',
        })
        .join("")
}
