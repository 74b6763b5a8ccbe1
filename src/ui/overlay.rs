// Overlays drawn over the active screen
// Popups, the text input dialog and the soft button bar

use ratatui::{
    layout::{Alignment, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::popup::{PopupArea, PopupView};
use super::soft_buttons::ButtonView;
use super::text_input::TextInputView;

/// Popup box width in columns, borders included
const POPUP_WIDTH: u16 = 44;
/// Most text lines a popup shows at once
const POPUP_TEXT_LINES: u16 = 8;

/// Text area the popup layout should use for a screen of `area`.
pub fn popup_area(area: Rect) -> PopupArea {
    let width = POPUP_WIDTH.min(area.width.saturating_sub(4));
    // Borders, padding, and one row for the alternatives
    let lines = POPUP_TEXT_LINES.min(area.height.saturating_sub(8));
    PopupArea {
        width: usize::from(width.saturating_sub(4)).max(1),
        visible_lines: usize::from(lines).max(1),
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Draws a popup in the center of `area`.
pub fn render_popup(frame: &mut Frame, view: &PopupView, area: Rect) {
    let alt_rows = u16::from(!view.alternatives.is_empty()) * 2;
    let height = view.lines.len() as u16 + alt_rows + 2;
    let popup_area = centered(area, POPUP_WIDTH.min(area.width.saturating_sub(4)), height);

    frame.render_widget(Clear, popup_area);

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .style(Style::default().bg(Color::Rgb(20, 20, 20)));
    if view.total_lines > view.lines.len() {
        block = block.title(format!(
            " {}/{} ",
            view.first_line + 1,
            view.total_lines
        ));
    }
    frame.render_widget(block, popup_area);

    let inner = popup_area.inner(Margin::new(1, 1));
    let mut lines: Vec<Line> = view
        .lines
        .iter()
        .map(|line| Line::from(Span::styled(line.clone(), Style::default().fg(Color::White))))
        .collect();

    if !view.alternatives.is_empty() {
        lines.push(Line::from(""));
        let mut spans = Vec::new();
        for (i, alt) in view.alternatives.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw("  "));
            }
            let style = if i == view.current_alt {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(format!("[{alt}]"), style));
        }
        lines.push(Line::from(spans).alignment(Alignment::Center));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Draws the one line text editor in the center of `area`.
pub fn render_text_input(frame: &mut Frame, view: &TextInputView, area: Rect) {
    let dialog_width = 60.min(area.width.saturating_sub(4));
    let dialog_area = centered(area, dialog_width, 6);

    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(format!(" {} ", view.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Rgb(20, 20, 20)));
    frame.render_widget(block, dialog_area);

    let inner = dialog_area.inner(Margin::new(2, 1));
    // Keep the end of long input visible
    let visible = usize::from(inner.width.saturating_sub(1));
    let skip = view.text.chars().count().saturating_sub(visible);
    let shown: String = view.text.chars().skip(skip).collect();

    let input = if shown.is_empty() {
        Span::styled("(type or paste)", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(format!("{shown}_"), Style::default().fg(Color::White))
    };
    let hint = Line::from(vec![
        Span::styled("Enter", Style::default().fg(Color::Gray)),
        Span::styled(": Send  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Ctrl+V", Style::default().fg(Color::Gray)),
        Span::styled(": Paste  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Esc", Style::default().fg(Color::Gray)),
        Span::styled(": Cancel", Style::default().fg(Color::DarkGray)),
    ]);
    let text = vec![Line::from(input), Line::from(""), hint.alignment(Alignment::Center)];
    frame.render_widget(Paragraph::new(text), inner);
}

/// Draws the soft button labels on the bottom row of `area`.
pub fn render_soft_buttons(
    frame: &mut Frame,
    left: Option<&ButtonView>,
    right: Option<&ButtonView>,
    area: Rect,
) {
    if area.height == 0 {
        return;
    }
    let row = Rect {
        x: area.x,
        y: area.y + area.height - 1,
        width: area.width,
        height: 1,
    };
    let style = |button: &ButtonView| {
        if button.enabled {
            Style::default().fg(Color::Black).bg(Color::Gray)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };
    if let Some(button) = left {
        let label = Paragraph::new(Span::styled(format!(" F1 {} ", button.label), style(button)));
        frame.render_widget(label, row);
    }
    if let Some(button) = right {
        let label = Paragraph::new(Span::styled(format!(" {} F2 ", button.label), style(button)))
            .alignment(Alignment::Right);
        frame.render_widget(label, row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_popup_shows_text_and_alternatives() {
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        let view = PopupView {
            lines: vec!["Remote quit".to_string()],
            alternatives: vec!["Give up".to_string(), "Cancel".to_string()],
            current_alt: 1,
            first_line: 0,
            total_lines: 1,
        };
        terminal
            .draw(|frame| render_popup(frame, &view, frame.area()))
            .unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Remote quit"));
        assert!(text.contains("[Give up]"));
        assert!(text.contains("[Cancel]"));
    }

    #[test]
    fn test_soft_buttons_on_bottom_row() {
        let mut terminal = Terminal::new(TestBackend::new(40, 5)).unwrap();
        let exit = ButtonView {
            label: "Exit".to_string(),
            enabled: true,
        };
        terminal
            .draw(|frame| render_soft_buttons(frame, Some(&exit), None, frame.area()))
            .unwrap();
        let text = screen_text(&terminal);
        let bottom = &text[text.len() - 40..];
        assert!(bottom.contains("F1 Exit"));
    }

    #[test]
    fn test_popup_area_fits_small_screens() {
        let area = popup_area(Rect::new(0, 0, 20, 10));
        assert_eq!(area.width, 12);
        assert_eq!(area.visible_lines, 2);
        let tiny = popup_area(Rect::new(0, 0, 2, 2));
        assert_eq!(tiny.width, 1);
        assert_eq!(tiny.visible_lines, 1);
    }
}
