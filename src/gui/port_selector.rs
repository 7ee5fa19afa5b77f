use std::{io::stdout, path::PathBuf, time::Duration};

use crate::gui::error::BrushGuiError;

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// What the user picked in [port_selector].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortChoice {
    /// Play on the controller at this port
    Port(PathBuf),
    /// Play into a dummy device instead
    DryRun,
    /// Do not play at all
    Quit,
}

/// What the selector shows besides the port list.
#[derive(Debug, Clone, Copy)]
pub struct SelectorInfo {
    /// Baud rate the port will be opened at
    pub baud_rate: u32,
    /// Actuators in the configured layout
    pub actuators: usize,
    /// Seconds the schedule about to be played takes
    pub total_time: f64,
}

/// Let the user pick the serial port the actuator controller is on, or
/// fall back to a dry run. With no ports to pick from, only the dry run
/// and quitting are offered.
pub fn port_selector(
    mut available_ports: Vec<PathBuf>,
    info: SelectorInfo,
) -> Result<PortChoice, BrushGuiError> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let n_ports = available_ports.len();
    let mut list_state = ListState::default().with_selected((n_ports > 0).then_some(0));
    let choice = loop {
        terminal.draw(|frame| draw(frame, &available_ports, &info, &mut list_state))?;

        if !event::poll(Duration::from_millis(16))? {
            continue;
        }
        let event::Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let cursor = list_state.selected();
        match (key.code, cursor) {
            (KeyCode::Down, Some(i)) => list_state.select(Some((i + 1) % n_ports)),
            (KeyCode::Up, Some(i)) => list_state.select(Some((i + n_ports - 1) % n_ports)),
            (KeyCode::Enter, Some(i)) => break PortChoice::Port(available_ports.swap_remove(i)),
            (KeyCode::Char('d'), _) => break PortChoice::DryRun,
            (KeyCode::Char('q') | KeyCode::Esc, _) => break PortChoice::Quit,
            _ => {}
        }
    };

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(choice)
}

fn draw(frame: &mut Frame, ports: &[PathBuf], info: &SelectorInfo, list_state: &mut ListState) {
    let title = Title::from(" Actuator Controller ".magenta().bold());
    let instructions = Title::from(Line::from(vec![
        " Navigate ".into(),
        "<Up>/<Down>".magenta().bold(),
        " Select ".into(),
        "<Enter>".magenta().bold(),
        " Dry run ".into(),
        "<D>".magenta().bold(),
        " Quit ".into(),
        "<Q> ".magenta().bold(),
    ]));
    let block = Block::default()
        .title(title.alignment(Alignment::Center))
        .title(
            instructions
                .alignment(Alignment::Center)
                .position(Position::Bottom),
        )
        .borders(Borders::ALL);

    let area = block.inner(frame.size());
    frame.render_widget(block, frame.size());
    let chunks = Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).split(area);

    let summary = Paragraph::new(Line::from(format!(
        " {} actuators, {:.2}s of playback, {} baud",
        info.actuators, info.total_time, info.baud_rate
    )));
    frame.render_widget(summary, chunks[0]);

    if ports.is_empty() {
        let empty = Paragraph::new(" No serial ports found. Press <D> for a dry run.")
            .style(Style::default().fg(Color::Red));
        frame.render_widget(empty, chunks[1]);
        return;
    }

    let list = List::new(ports.iter().map(|p| p.to_string_lossy()))
        .style(Style::default().fg(Color::White))
        .highlight_symbol(">>")
        .highlight_style(Style::default().fg(Color::Magenta));
    frame.render_stateful_widget(list, chunks[1], list_state);
}
