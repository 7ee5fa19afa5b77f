use std::{io::stdout, time::Duration};

use crate::gui::error::BrushGuiError;
use crate::playback::{PlaybackHandle, PlaybackProgress, PlaybackReport};

use crossterm::{
    event::{self, KeyEventKind},
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

/// Show a running playback until it finishes. Any key press is an
/// emergency stop.
///
/// If the terminal fails, `handle` is dropped on the way out, which also
/// stops playback.
pub fn playback_monitor(handle: PlaybackHandle) -> Result<PlaybackReport, BrushGuiError> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let stopped_by_user = loop {
        if handle.is_finished() {
            break false;
        }
        let progress = handle.progress();
        terminal.draw(|frame| draw(frame, &progress))?;

        if event::poll(Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    break true;
                }
            }
        }
    };

    let report = if stopped_by_user {
        handle.stop()
    } else {
        handle.wait()
    };

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(report)
}

fn draw(frame: &mut Frame, progress: &PlaybackProgress) {
    let title = Title::from(" Playing Motion... ".magenta().bold());
    let instructions = Title::from(Line::from(vec![
        " Emergency stop ".into(),
        "<Any key> ".magenta().bold(),
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

    let chunks = Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).split(area);
    let (gauge_area, text_area) = (chunks[0], chunks[1]);

    let ratio = if progress.total_time > 0.0 {
        (progress.elapsed / progress.total_time).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Magenta))
        .label(format!("{:.2}s / {:.2}s", progress.elapsed, progress.total_time))
        .ratio(ratio);
    frame.render_widget(gauge, gauge_area);

    let active = progress
        .active
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let text = Paragraph::new(vec![
        Line::from(vec![
            " Active actuators: ".into(),
            Span::styled(active, Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(format!(" Commands sent: {}", progress.commands_sent)),
        Line::from(vec![
            " Failed sends: ".into(),
            match progress.failures {
                0 => Span::raw("0"),
                n => Span::styled(
                    n.to_string(),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
            },
        ]),
    ]);
    frame.render_widget(text, text_area);
}
