use crate::{
    amount::{
        Amount,
        ParseAmountError,
    },
    error::ErrorKind,
    round::Color,
};
use serde::{
    Deserialize,
    Serialize,
};

/// House limits applied before a bet is sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    pub min_bet: Amount,
    pub max_bet: Amount,
}

impl Default for GameRules {
    fn default() -> Self {
        GameRules {
            min_bet: Amount::from_nanotons(10_000_000),
            max_bet: Amount::from_ton(50),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum BetError {
    #[error("Select a color first")]
    NoColorSelected,
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] ParseAmountError),
    #[error("Minimum bet is {min} TON")]
    BelowMinimum { min: Amount },
    #[error("Maximum bet is {max} TON")]
    AboveMaximum { max: Amount },
    #[error("Insufficient balance ({balance} TON available)")]
    InsufficientBalance { balance: Amount },
}

impl BetError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ValidationFailure
    }
}

/// A validated bet, ready to be submitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BetRequest {
    pub color: Color,
    pub amount: Amount,
}

/// Bet modal contents: the chosen color and the amount as typed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BetSlip {
    pub color: Option<Color>,
    pub amount_input: String,
}

impl BetSlip {
    pub fn select(&mut self, color: Color) {
        self.color = Some(color);
    }

    pub fn cycle(&mut self, forward: bool) {
        self.color = Some(match (self.color, forward) {
            (None, _) => Color::Red,
            (Some(c), true) => c.next(),
            (Some(c), false) => c.prev(),
        });
    }

    /// Accepts digits and a single decimal point.
    pub fn push_char(&mut self, c: char) {
        if c.is_ascii_digit() || (c == '.' && !self.amount_input.contains('.')) {
            self.amount_input.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        self.amount_input.pop();
    }

    pub fn validate(&self, rules: &GameRules, balance: Amount) -> Result<BetRequest, BetError> {
        let color = self.color.ok_or(BetError::NoColorSelected)?;
        let amount: Amount = self.amount_input.parse()?;
        validate_amount(rules, amount, balance)?;
        Ok(BetRequest { color, amount })
    }
}

pub fn validate_amount(rules: &GameRules, amount: Amount, balance: Amount) -> Result<(), BetError> {
    if amount < rules.min_bet {
        return Err(BetError::BelowMinimum { min: rules.min_bet });
    }
    if amount > rules.max_bet {
        return Err(BetError::AboveMaximum { max: rules.max_bet });
    }
    if amount > balance {
        return Err(BetError::InsufficientBalance { balance });
    }
    Ok(())
}
