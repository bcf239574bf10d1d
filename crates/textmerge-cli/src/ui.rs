use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use textmerge_engine::{DiffSegment, SegmentKind, SelectionRange};

use crate::app::App;

const HELP: &str = "j/k: move | space: toggle | a/r: accept/reject all | u/ctrl-r: undo/redo | \
                    s/S: select range | c: clear | m: mode | e: edit | esc: cancel | w: write | q: quit";

pub fn draw(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(rows[0]);

    let items: Vec<ListItem> = app
        .session
        .current_segments()
        .iter()
        .map(|segment| {
            ListItem::new(Line::from(Span::styled(
                segment_label(segment),
                segment_style(segment),
            )))
        })
        .collect();

    let segments = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Changes"))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(segments, columns[0], &mut app.list_state);

    let title = if app.session.has_pending_range_edit() {
        "Preview (editing...)"
    } else {
        "Preview"
    };
    let preview = Paragraph::new(highlight_lines(
        &app.preview(),
        app.session.current_ranges(),
    ))
    .block(Block::default().borders(Borders::ALL).title(title))
    .wrap(Wrap { trim: false });

    f.render_widget(preview, columns[1]);

    let footer = Paragraph::new(vec![
        Line::from(Span::raw(app.status.clone())),
        Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    ])
    .block(Block::default());

    f.render_widget(footer, rows[1]);
}

/// One-line list label for a segment, with newlines made visible
pub fn segment_label(segment: &DiffSegment) -> String {
    let marker = match segment.kind {
        SegmentKind::Unchanged => ' ',
        SegmentKind::Added => '+',
        SegmentKind::Removed => '-',
    };
    format!("{marker} {}", segment.value.replace('\n', "⏎"))
}

fn segment_style(segment: &DiffSegment) -> Style {
    let style = match segment.kind {
        SegmentKind::Unchanged => Style::default(),
        SegmentKind::Added => Style::default().fg(Color::Green),
        SegmentKind::Removed => Style::default().fg(Color::Red),
    };
    if segment.included {
        style
    } else {
        style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT)
    }
}

/// Split `text` into display lines, highlighting the selected ranges.
///
/// Ranges that no longer fit the text are skipped.
pub fn highlight_lines(text: &str, ranges: &[SelectionRange]) -> Vec<Line<'static>> {
    let highlight = Style::default().bg(Color::Blue).fg(Color::White);

    let mut sorted: Vec<&SelectionRange> = ranges
        .iter()
        .filter(|range| text.get(range.start..range.end).is_some())
        .collect();
    sorted.sort_by_key(|range| range.start);

    let mut pieces: Vec<(&str, Style)> = Vec::new();
    let mut cursor = 0;
    for range in sorted {
        if range.start < cursor {
            continue;
        }
        pieces.push((&text[cursor..range.start], Style::default()));
        pieces.push((&text[range.start..range.end], highlight));
        cursor = range.end;
    }
    pieces.push((&text[cursor..], Style::default()));

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    for (piece, style) in pieces {
        let mut parts = piece.split('\n');
        if let Some(first) = parts.next()
            && !first.is_empty()
        {
            current.push(Span::styled(first.to_string(), style));
        }
        for part in parts {
            lines.push(Line::from(std::mem::take(&mut current)));
            if !part.is_empty() {
                current.push(Span::styled(part.to_string(), style));
            }
        }
    }
    lines.push(Line::from(current));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use textmerge_engine::{GroupId, RangeId, SegmentId};

    fn range(start: usize, end: usize, text: &str) -> SelectionRange {
        SelectionRange {
            id: RangeId(0),
            start,
            end,
            text: text.to_string(),
        }
    }

    fn rendered(lines: &[Line]) -> Vec<Vec<(String, bool)>> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| (span.content.to_string(), span.style.bg == Some(Color::Blue)))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_highlight_spans_across_lines() {
        let lines = highlight_lines("ab cd\nef gh", &[range(3, 8, "cd\nef")]);

        assert_eq!(
            rendered(&lines),
            vec![
                vec![("ab ".to_string(), false), ("cd".to_string(), true)],
                vec![("ef".to_string(), true), (" gh".to_string(), false)],
            ]
        );
    }

    #[test]
    fn test_stale_range_is_ignored() {
        let lines = highlight_lines("short", &[range(2, 40, "stale")]);

        assert_eq!(rendered(&lines), vec![vec![("short".to_string(), false)]]);
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let lines = highlight_lines("a\n\nb", &[]);

        assert_eq!(lines.len(), 3);
        assert!(lines[1].spans.is_empty());
    }

    #[test]
    fn test_segment_label_marks_kind_and_newlines() {
        let segment = DiffSegment {
            id: SegmentId(1),
            value: "new\nline".to_string(),
            kind: SegmentKind::Added,
            included: true,
            group: Some(GroupId(0)),
        };

        assert_eq!(segment_label(&segment), "+ new⏎line");
    }
}
