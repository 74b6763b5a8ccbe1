// Board screen rendering with Ratatui

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::game::board::format_time;
use crate::game::mediator::{BoardSnapshot, GameType};

/// Columns per tile, including spacing
const TILE_WIDTH: usize = 4;

pub fn render_board(frame: &mut Frame, snapshot: &BoardSnapshot, area: Rect) {
    let bg = Block::default().style(Style::default().bg(Color::Rgb(0, 0, 0)));
    frame.render_widget(bg, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),                            // Scores and clock
            Constraint::Length(snapshot.size as u16 * 2 + 1), // Grid
            Constraint::Length(2),                            // Current word
            Constraint::Min(3),                               // Found words
            Constraint::Length(1),                            // Soft buttons
        ])
        .split(area);

    draw_header(frame, snapshot, chunks[0]);
    draw_grid(frame, snapshot, chunks[1]);

    let word = if snapshot.local_word.is_empty() {
        Span::styled("Pick letters with Enter", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            snapshot.local_word.clone(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )
    };
    frame.render_widget(
        Paragraph::new(Line::from(word)).alignment(Alignment::Center),
        chunks[2],
    );

    draw_words(frame, snapshot, chunks[3]);
}

fn draw_header(frame: &mut Frame, snapshot: &BoardSnapshot, area: Rect) {
    let clock = if snapshot.finished {
        Span::styled("finished", Style::default().fg(Color::Red))
    } else {
        Span::styled(format_time(snapshot.time_left), Style::default().fg(Color::Cyan))
    };
    let mut spans = vec![
        Span::styled(
            format!("You {}", snapshot.local.score),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        clock,
    ];
    if let Some((opponent, progress)) = &snapshot.opponent {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            format!("{} {}", opponent.name, progress.score),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));
    }
    let mode = match snapshot.game_type {
        GameType::Local => "solo",
        GameType::RemoteServer => "hosting",
        GameType::RemoteClient => "joined",
    };
    let lines = vec![
        Line::from(spans),
        Line::from(Span::styled(mode, Style::default().fg(Color::DarkGray))),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn draw_grid(frame: &mut Frame, snapshot: &BoardSnapshot, area: Rect) {
    let opponent_path = snapshot
        .opponent
        .as_ref()
        .map(|(_, p)| p.path.as_slice())
        .unwrap_or(&[]);
    let mut lines = Vec::with_capacity(snapshot.size * 2);
    for row in 0..snapshot.size {
        let mut spans = Vec::with_capacity(snapshot.size);
        for col in 0..snapshot.size {
            let index = row * snapshot.size + col;
            let letter = snapshot.letters.get(index).copied().unwrap_or(' ');
            let mut style = Style::default().fg(Color::White);
            if snapshot.local.path.contains(&index) {
                style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
            } else if opponent_path.contains(&index) {
                style = style.fg(Color::Magenta);
            }
            if index == snapshot.cursor && !snapshot.finished {
                style = style.bg(Color::Rgb(60, 60, 60));
            }
            spans.push(Span::styled(format!("{:^width$}", letter, width = TILE_WIDTH), style));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn draw_words(frame: &mut Frame, snapshot: &BoardSnapshot, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mine = Paragraph::new(snapshot.local.words.join(" "))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Green))
        .block(Block::default().borders(Borders::TOP).title(" Your words "));
    frame.render_widget(mine, columns[0]);

    if let Some((opponent, progress)) = &snapshot.opponent {
        let theirs = Paragraph::new(progress.words.join(" "))
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Magenta))
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .title(format!(" {} ", opponent.name)),
            );
        frame.render_widget(theirs, columns[1]);
    }
}
