use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Color, Rect};
use std::time::Instant;

pub(super) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Places a `width` x `height` box beside `anchor`, flipping to the left
/// when there is no room on the right, and clamped into `bounds`.
pub(super) fn anchored_rect(anchor: Rect, width: u16, height: u16, bounds: Rect) -> Rect {
    let width = width.min(bounds.width);
    let height = height.min(bounds.height);
    let x = if anchor.right().saturating_add(width) <= bounds.right() {
        anchor.right()
    } else {
        anchor.x.saturating_sub(width).max(bounds.x)
    };
    let max_y = bounds.bottom().saturating_sub(height);
    let y = anchor.y.clamp(bounds.y, max_y.max(bounds.y));
    Rect::new(x, y, width, height)
}

pub(super) fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out = text.chars().take(max - 3).collect::<String>();
    out.push_str("...");
    out
}

pub(super) fn color_for_index(idx: usize) -> Color {
    let palette = [
        Color::Cyan,
        Color::LightGreen,
        Color::LightMagenta,
        Color::LightBlue,
        Color::LightYellow,
        Color::LightRed,
    ];
    palette[idx % palette.len()]
}

/// Category colors are free-form strings; anything unknown falls back to
/// the note yellow.
pub(super) fn parse_color(name: Option<&str>) -> Color {
    match name.map(|n| n.trim().to_lowercase()).as_deref() {
        Some("red") => Color::LightRed,
        Some("green") => Color::LightGreen,
        Some("blue") => Color::LightBlue,
        Some("magenta") | Some("pink") | Some("purple") => Color::LightMagenta,
        Some("cyan") => Color::LightCyan,
        Some("gray") | Some("grey") => Color::Gray,
        _ => Color::Rgb(252, 214, 112),
    }
}

pub(super) fn adjust_offset(selected: usize, current_offset: usize, viewport: usize, len: usize) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let mut offset = current_offset.min(max_offset);
    if selected < offset {
        offset = selected;
    } else if selected >= offset + viewport {
        offset = selected + 1 - viewport;
    }
    offset.min(max_offset)
}

pub(super) fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a longer title", 8), "a lon...");
        assert_eq!(truncate_text("abcdef", 2), "ab");
    }

    #[test]
    fn anchored_rect_flips_left_near_edge() {
        let bounds = Rect::new(0, 0, 80, 24);
        let beside = anchored_rect(Rect::new(10, 5, 20, 1), 30, 8, bounds);
        assert_eq!(beside, Rect::new(30, 5, 30, 8));
        let flipped = anchored_rect(Rect::new(40, 20, 30, 1), 30, 8, bounds);
        assert_eq!(flipped, Rect::new(10, 16, 30, 8));
    }

    #[test]
    fn offset_follows_selection() {
        assert_eq!(adjust_offset(0, 5, 4, 10), 0);
        assert_eq!(adjust_offset(7, 0, 4, 10), 4);
        assert_eq!(adjust_offset(5, 3, 4, 10), 3);
    }
}
