use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use rolls_client::{
    controller::AppSnapshot,
    events::{
        ModalAction,
        UserEvent,
    },
    round::{
        Color as ChipColor,
        history_strip,
    },
    session::{
        NoticeLevel,
        View,
    },
    sync::{
        Phase,
        Reveal,
    },
};
use std::io::stdout;
use unicode_width::UnicodeWidthStr;

pub type InputEventReceiver = EventStream;

#[derive(Default)]
pub struct UiState {
    view: View,
    slip_open: bool,
    quit_prompt: bool,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // key routing follows what the controller last reported
    state.view = snap.view;
    state.slip_open = snap.slip.is_some();
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: &Event) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }

    if state.quit_prompt {
        return match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.quit_prompt = false;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }

    if state.slip_open {
        let action = match k.code {
            KeyCode::Esc => ModalAction::CloseBetSlip,
            KeyCode::Enter => return Some(UserEvent::PlaceBet),
            KeyCode::Left | KeyCode::Up => ModalAction::CycleColor { forward: false },
            KeyCode::Right | KeyCode::Down | KeyCode::Tab => {
                ModalAction::CycleColor { forward: true }
            }
            KeyCode::Char('r') => ModalAction::SelectColor(ChipColor::Red),
            KeyCode::Char('b') => ModalAction::SelectColor(ChipColor::Blue),
            KeyCode::Char('g') => ModalAction::SelectColor(ChipColor::Green),
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => ModalAction::Input(c),
            KeyCode::Backspace => ModalAction::Backspace,
            _ => return None,
        };
        return Some(UserEvent::Modal(action));
    }

    match (state.view, k.code) {
        (_, KeyCode::Char('q')) | (View::Lobby, KeyCode::Esc) => {
            state.quit_prompt = true;
            Some(UserEvent::Redraw)
        }
        (View::Lobby, KeyCode::Enter | KeyCode::Char('1')) => {
            Some(UserEvent::Navigate(View::Rolls))
        }
        (View::Rolls, KeyCode::Esc | KeyCode::Char('l')) => {
            Some(UserEvent::Navigate(View::Lobby))
        }
        (View::Rolls, KeyCode::Char('b') | KeyCode::Enter) => {
            Some(UserEvent::Modal(ModalAction::OpenBetSlip))
        }
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // account
            Constraint::Min(12),   // active view
            Constraint::Length(7), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_account(f, chunks[0], snap);
    match snap.view {
        View::Lobby => draw_lobby(f, chunks[1], snap),
        View::Rolls => draw_rolls(f, chunks[1], snap),
    }
    draw_status(f, chunks[2], snap);
    draw_help(f, chunks[3], snap.view);
    draw_modals(f, state, snap);
}

fn draw_account(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let balance = if snap.balance_known {
        format!("{} TON", snap.balance)
    } else {
        "...".to_string()
    };
    let text = format!(
        "User: {} | Balance: {} | Referral: {} TON",
        snap.user_id, balance, snap.ref_balance
    );
    let widget = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Casino - {}", snap.view.title())),
    );
    f.render_widget(widget, area);
}

fn draw_lobby(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let odds = ChipColor::ALL
        .iter()
        .map(|c| format!("{} x{}", c.label(), c.multiplier()))
        .collect::<Vec<_>>()
        .join(" | ");
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("> Rolls", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("   {odds}")),
        ]),
        Line::from(format!(
            "  A new round every 10 seconds. Bets from {} to {} TON.",
            snap.rules.min_bet, snap.rules.max_bet
        )),
        Line::from(""),
        Line::from("  Press Enter to play."),
    ];
    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Games"));
    f.render_widget(widget, area);
}

fn draw_rolls(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // countdown
            Constraint::Length(3), // chip strip
            Constraint::Length(4), // history
            Constraint::Min(5),    // bet options
        ])
        .split(area);

    draw_countdown(f, rows[0], snap);
    draw_strip(f, rows[1], snap);
    draw_history(f, rows[2], snap);
    draw_bet_options(f, rows[3], snap);
}

fn draw_countdown(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let timer = &snap.timer;
    let game = timer.round.as_ref().map(|r| r.game_number);
    let (text, style) = match (timer.phase, game) {
        (Phase::Counting, None) => ("Waiting for the next round...".to_string(), Style::default()),
        (Phase::Counting, Some(g)) => (
            format!("Round {g} | ROLLING IN {}", timer.seconds_remaining),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        (Phase::AwaitingResult, _) => (
            format!("Round {} | ROLLING...", game.unwrap_or_default()),
            Style::default().fg(Color::Yellow),
        ),
        (Phase::Revealing, _) => match timer.last_reveal {
            Some(revealed) => match revealed.reveal {
                Reveal::Winner(color) => (
                    format!(
                        "Round {} | {} WINS",
                        revealed.game_number,
                        color.label().to_uppercase()
                    ),
                    Style::default()
                        .fg(chip_color(color))
                        .add_modifier(Modifier::BOLD),
                ),
                Reveal::Pending => (
                    format!("Round {} | RESULT PENDING", revealed.game_number),
                    Style::default().fg(Color::Gray),
                ),
            },
            None => ("RESULT PENDING".to_string(), Style::default().fg(Color::Gray)),
        },
    };
    let inner_width = area.width.saturating_sub(2) as usize;
    let widget = Paragraph::new(center(&text, inner_width))
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("Round"));
    f.render_widget(widget, area);
}

fn draw_strip(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let winner = snap.confirmed_winner();
    let width = area.width.saturating_sub(2) as usize / 2;
    let spans: Vec<Span> = snap
        .strip
        .iter()
        .take(width)
        .map(|chip| {
            let mut style = Style::default().fg(chip_color(*chip));
            match winner {
                Some(w) if w == *chip => style = style.add_modifier(Modifier::BOLD),
                Some(_) => style = style.add_modifier(Modifier::DIM),
                None => {}
            }
            Span::styled("● ", style)
        })
        .collect();
    let widget = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Chips"));
    f.render_widget(widget, area);
}

fn draw_history(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let width = area.width.saturating_sub(2) as usize;
    let strip: Vec<Span> = history_strip(&snap.history, width)
        .chars()
        .map(|c| {
            let color = match c {
                'R' => chip_color(ChipColor::Red),
                'B' => chip_color(ChipColor::Blue),
                _ => chip_color(ChipColor::Green),
            };
            Span::styled(c.to_string(), Style::default().fg(color))
        })
        .collect();
    let stats = format!(
        "Last {}: red {} | blue {} | green {}",
        snap.history.len(),
        snap.stats.red,
        snap.stats.blue,
        snap.stats.green
    );
    let widget = Paragraph::new(vec![Line::from(strip), Line::from(stats)])
        .block(Block::default().borders(Borders::ALL).title("History (newest first)"));
    f.render_widget(widget, area);
}

fn draw_bet_options(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);
    for (i, color) in ChipColor::ALL.iter().enumerate() {
        let total = snap
            .bet_totals
            .map(|t| format!("{} TON", t.get(*color)))
            .unwrap_or_else(|| "-".to_string());
        let lines = vec![
            Line::from(format!("x{}", color.multiplier())),
            Line::from(format!("Total bets: {total}")),
        ];
        let border = Style::default().fg(chip_color(*color));
        let widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(color.label().to_uppercase()),
        );
        f.render_widget(widget, cols[i]);
    }
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let errors: Vec<&str> = snap
        .notices
        .iter()
        .filter(|n| n.level == NoticeLevel::Error)
        .map(|n| n.text.as_str())
        .collect();

    let status_widget = if errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            lines.push(Line::from(snap.status.clone()));
        }
        for notice in snap.notices.iter() {
            lines.push(Line::from(notice.text.clone()));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = errors.into_iter().map(Line::from).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, view: View) {
    let text = match view {
        View::Lobby => "Enter/1 play Rolls | q/Esc quit",
        View::Rolls => "b/Enter place bet | Esc/l lobby | q quit",
    };
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    if state.quit_prompt {
        let area = centered_rect(30, 20, f.area());
        let block = Block::default().borders(Borders::ALL).title("Quit");
        let p = Paragraph::new("Quit the casino? y/n");
        f.render_widget(Clear, area);
        f.render_widget(block.clone(), area);
        f.render_widget(p, block.inner(area));
        return;
    }
    let Some(slip) = snap.slip.as_ref() else {
        return;
    };
    let area = centered_rect(50, 40, f.area());
    let block = Block::default().borders(Borders::ALL).title("Place Bet");
    let choices: Vec<Span> = ChipColor::ALL
        .iter()
        .map(|c| {
            let label = format!(" {} x{} ", c.label(), c.multiplier());
            let style = if slip.color == Some(*c) {
                Style::default()
                    .bg(chip_color(*c))
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(chip_color(*c))
            };
            Span::styled(label, style)
        })
        .collect();
    let lines = vec![
        Line::from(choices),
        Line::from(""),
        Line::from(format!("Amount: {}_ TON", slip.amount_input)),
        Line::from(format!(
            "Min {} | Max {} | Balance {} TON",
            snap.rules.min_bet, snap.rules.max_bet, snap.balance
        )),
        Line::from(""),
        Line::from("Enter=confirm Esc=cancel r/b/g or arrows=color digits=amount"),
    ];
    let p = Paragraph::new(lines).wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(p, block.inner(area));
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

fn center(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.width()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn chip_color(color: ChipColor) -> Color {
    match color {
        ChipColor::Red => Color::Red,
        ChipColor::Blue => Color::Blue,
        ChipColor::Green => Color::Green,
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyEvent;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn interpret_event__open_slip__routes_keys_to_the_modal() {
        // given
        let mut state = UiState {
            view: View::Rolls,
            slip_open: true,
            ..UiState::default()
        };

        // when
        let events: Vec<Option<UserEvent>> = [
            KeyCode::Char('g'),
            KeyCode::Char('5'),
            KeyCode::Char('q'),
            KeyCode::Enter,
        ]
        .into_iter()
        .map(|code| interpret_event(&mut state, &press(code)))
        .collect();

        // then
        assert_eq!(
            events,
            vec![
                Some(UserEvent::Modal(ModalAction::SelectColor(ChipColor::Green))),
                Some(UserEvent::Modal(ModalAction::Input('5'))),
                None,
                Some(UserEvent::PlaceBet),
            ]
        );
    }

    #[test]
    fn interpret_event__quit_prompt__needs_confirmation() {
        let mut state = UiState::default();
        assert_eq!(
            interpret_event(&mut state, &press(KeyCode::Char('q'))),
            Some(UserEvent::Redraw)
        );
        assert_eq!(
            interpret_event(&mut state, &press(KeyCode::Char('n'))),
            Some(UserEvent::Redraw)
        );
        assert!(!state.quit_prompt);
        interpret_event(&mut state, &press(KeyCode::Char('q')));
        assert_eq!(
            interpret_event(&mut state, &press(KeyCode::Char('y'))),
            Some(UserEvent::Quit)
        );
    }

    #[test]
    fn interpret_event__lobby_and_rolls__navigate_between_views() {
        let mut state = UiState::default();
        assert_eq!(
            interpret_event(&mut state, &press(KeyCode::Enter)),
            Some(UserEvent::Navigate(View::Rolls))
        );
        state.view = View::Rolls;
        assert_eq!(
            interpret_event(&mut state, &press(KeyCode::Esc)),
            Some(UserEvent::Navigate(View::Lobby))
        );
    }

    #[test]
    fn center__accounts_for_display_width() {
        assert_eq!(center("ab", 6), "  ab");
        assert_eq!(center("toolong", 3), "toolong");
    }
}
