//! Per-user state shared by the views: identity, balance, the active view and
//! the transient notices shown in the status panel. Everything is changed
//! through the methods below so that each mutation is logged in one place.

use crate::{
    amount::Amount,
    api::{
        Balance,
        UserIdentity,
    },
};
use std::collections::VecDeque;
use tracing::{
    debug,
    error,
    info,
};

/// Ticks a notice stays visible.
pub const NOTICE_TTL_TICKS: u32 = 4;
const MAX_NOTICES: usize = 50;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum View {
    #[default]
    Lobby,
    Rolls,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Lobby => "Lobby",
            View::Rolls => "Rolls",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    ticks_left: u32,
}

#[derive(Debug)]
pub struct SessionContext {
    identity: UserIdentity,
    balance: Option<Balance>,
    view: View,
    status: String,
    notices: VecDeque<Notice>,
}

impl SessionContext {
    pub fn new(identity: UserIdentity) -> Self {
        Self {
            identity,
            balance: None,
            view: View::Lobby,
            status: String::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Spendable balance; zero until the first balance answer arrives.
    pub fn balance(&self) -> Amount {
        self.balance.map(|b| b.balance).unwrap_or_default()
    }

    pub fn ref_balance(&self) -> Amount {
        self.balance.map(|b| b.ref_balance).unwrap_or_default()
    }

    pub fn balance_known(&self) -> bool {
        self.balance.is_some()
    }

    pub fn set_balance(&mut self, balance: Balance) {
        debug!(balance = %balance.balance, ref_balance = %balance.ref_balance, "balance updated");
        self.balance = Some(balance);
    }

    /// Optimistically takes an accepted bet off the displayed balance until the
    /// next balance refresh.
    pub fn debit(&mut self, amount: Amount) {
        if let Some(balance) = self.balance.as_mut() {
            balance.balance = balance.balance.saturating_sub(amount);
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Switches view, returning the previous one when it actually changed.
    pub fn navigate(&mut self, view: View) -> Option<View> {
        if self.view == view {
            return None;
        }
        let previous = std::mem::replace(&mut self.view, view);
        info!(from = previous.title(), to = view.title(), "view changed");
        Some(previous)
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        if level == NoticeLevel::Error {
            error!("{}", text);
        }
        self.notices.push_back(Notice {
            level,
            text,
            ticks_left: NOTICE_TTL_TICKS,
        });
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    /// Ages every notice by one tick and drops the expired ones.
    pub fn tick_notices(&mut self) {
        for notice in self.notices.iter_mut() {
            notice.ticks_left = notice.ticks_left.saturating_sub(1);
        }
        self.notices.retain(|n| n.ticks_left > 0);
    }
}
