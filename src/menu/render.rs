// Menu rendering with Ratatui

use std::sync::Arc;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

use super::page::MenuPage;
use super::state::{MenuView, TransitionView};

/// Render the menu, sliding between pages while a transition runs
pub fn render_menu(frame: &mut Frame, view: &MenuView, area: Rect) {
    // Draw background
    let bg = Block::default().style(Style::default().bg(Color::Rgb(0, 0, 0)));
    frame.render_widget(bg, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title area
            Constraint::Min(5),    // Menu items
            Constraint::Length(2), // Controls hint
        ])
        .split(area);

    match &view.transition {
        Some(transition) => draw_transition(frame, transition, chunks[0], chunks[1]),
        None => {
            if let Some(page) = &view.page {
                draw_page(frame, page, chunks[0], chunks[1], 0);
            }
        }
    }

    let controls = vec![Line::from(vec![
        Span::styled("↑/↓", Style::default().fg(Color::Gray)),
        Span::styled(": Navigate  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Enter", Style::default().fg(Color::Gray)),
        Span::styled(": Select  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Esc/←", Style::default().fg(Color::Gray)),
        Span::styled(": Back", Style::default().fg(Color::DarkGray)),
    ])];
    frame.render_widget(
        Paragraph::new(controls).alignment(Alignment::Center),
        chunks[2],
    );
}

/// Columns the pages have moved by at `frame`
fn slide_offset(width: u16, frame: u32, frames: u32) -> u16 {
    if frames == 0 {
        return width;
    }
    (u32::from(width) * frame.min(frames) / frames) as u16
}

fn draw_transition(frame: &mut Frame, transition: &TransitionView, title: Rect, items: Rect) {
    let offset = slide_offset(items.width, transition.frame, transition.frames);
    let remaining = items.width - offset;
    // Forward slides pages left, back slides them right
    let (from_shift, to_shift) = if transition.back {
        (offset as i32, -(remaining as i32))
    } else {
        (-(offset as i32), remaining as i32)
    };
    if let Some(from) = &transition.from {
        draw_page(frame, from, title, items, from_shift);
    }
    draw_page(frame, &transition.to, title, items, to_shift);
}

/// Horizontal part of `area` still visible after shifting by `shift` columns.
fn shifted(area: Rect, shift: i32) -> Option<Rect> {
    let width = area.width as i32 - shift.abs();
    if width <= 0 {
        return None;
    }
    let x = if shift > 0 { area.x as i32 + shift } else { area.x as i32 };
    Some(Rect {
        x: x as u16,
        y: area.y,
        width: width as u16,
        height: area.height,
    })
}

fn draw_page(frame: &mut Frame, page: &Arc<MenuPage>, title: Rect, items: Rect, shift: i32) {
    let (Some(title), Some(items)) = (shifted(title, shift), shifted(items, shift)) else {
        return;
    };

    let title_text = vec![
        Line::from(""),
        Line::from(Span::styled(
            page.title().to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
    ];
    frame.render_widget(Paragraph::new(title_text).alignment(Alignment::Center), title);

    let selected = page.selected_index();
    let lines: Vec<Line> = page
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let is_selected = i as i32 == selected;
            let prefix = if is_selected { "> " } else { "  " };
            let marker = if item.sub_page().is_some() { " ›" } else { "" };
            let text = format!("{}{}{}", prefix, item.label(), marker);

            let style = if !item.is_enabled() {
                Style::default().fg(Color::DarkGray)
            } else if is_selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(text, style))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), items);
}
