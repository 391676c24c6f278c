use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::constants::constants;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ✎ ysw ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  if app.mode == AppMode::History && !app.session.history().is_empty() {
    render_history(frame, app, area);
  } else if app.session.current().is_some() {
    render_script(frame, app, area);
  } else {
    render_welcome(frame, app, area);
  }
}

fn render_welcome(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let mut text = vec![
    Line::from(""),
    Line::from(Span::styled("✎  Welcome to ysw", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("TechFela scripts in Roman Urdu. In the terminal.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Type a topic below and press Enter.", Style::default().fg(theme.muted))),
  ];
  if app.session.api_key.is_empty() {
    text.push(Line::from(""));
    text.push(Line::from(Span::styled(
      "No API key set. Press ^k to add your Gemini key.",
      Style::default().fg(theme.status),
    )));
  }
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered()
      .border_type(ratatui::widgets::BorderType::Rounded)
      .border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_script(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let Some(result) = app.session.current() else { return };

  let title = Line::from(vec![
    Span::styled(" Script ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", result.mode.label()), Style::default().fg(theme.muted)),
  ]);
  let block = Block::bordered()
    .title(title)
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let stats =
    format!("{} words   {} chars   ~{}", result.word_count(), result.char_count(), result.duration_display());

  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(
      truncate_str(&result.topic, inner_w),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    Line::from(Span::styled(stats, Style::default().fg(theme.muted))),
    Line::from(""),
  ];
  for raw in result.script_text.lines() {
    lines.push(Line::from(Span::styled(raw.to_string(), Style::default().fg(theme.fg))));
  }

  let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).scroll((app.script_scroll, 0)).block(block);
  frame.render_widget(paragraph, area);
}

fn render_history(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .session
    .history()
    .entries()
    .iter()
    .enumerate()
    .map(|(i, entry)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let right = format!("{}  {}w  {}", entry.mode.label(), entry.word_count, entry.timestamp_display);
      let right_w = right.chars().count();
      let topic_max = inner_w.saturating_sub(right_w + 2).min(constants().history_topic_width);
      let topic = truncate_str(&entry.topic, topic_max);
      let topic_w = topic.chars().count();
      let gap = inner_w.saturating_sub(topic_w + right_w);

      let line = Line::from(vec![
        Span::styled(topic, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(right, Style::default().fg(theme.muted)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = format!(" History ({}) ", app.session.history().len());
  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(theme.border)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ {}", info), Style::default().fg(theme.status))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let editing_key = app.mode == AppMode::ApiKey;
  let active = editing_key || app.mode == AppMode::Topic;
  let border_color = if active { theme.accent } else { theme.border };

  let title = if editing_key {
    Line::from(Span::styled(" Gemini API Key ", Style::default().fg(border_color)))
  } else {
    Line::from(vec![
      Span::styled(" Topic ", Style::default().fg(border_color)),
      Span::styled(format!("[{}] ", app.session.mode.label()), Style::default().fg(theme.muted)),
    ])
  };
  let input_block = Block::bordered()
    .title(title)
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;

  let (visible, cursor_col, scroll) = if editing_key {
    // The key never shows in the clear; each bullet is width 1, so column
    // math is plain char arithmetic.
    let masked = "•".repeat(app.key_input.chars().count());
    let cursor_col = app.key_cursor;
    if cursor_col < app.key_scroll {
      app.key_scroll = cursor_col;
    } else if cursor_col >= app.key_scroll + inner_w {
      app.key_scroll = cursor_col.saturating_sub(inner_w) + 1;
    }
    let visible: String = masked.chars().skip(app.key_scroll).take(inner_w).collect();
    (visible, cursor_col, app.key_scroll)
  } else {
    let cursor_col = display_width(&app.input, app.cursor_position);
    if cursor_col < app.input_scroll {
      app.input_scroll = cursor_col;
    } else if cursor_col >= app.input_scroll + inner_w {
      app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
    }
    let scroll = app.input_scroll;
    let visible: String = app
      .input
      .chars()
      .scan(0usize, |col, c| {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        let start = *col;
        *col += w;
        Some((start, *col, c))
      })
      .skip_while(|(_, end, _)| *end <= scroll)
      .take_while(|(start, _, _)| *start < scroll + inner_w)
      .map(|(_, _, c)| c)
      .collect();
    (visible, cursor_col, scroll)
  };

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if active {
    // At zero interior width the clamp above pushes the scroll past the
    // cursor; saturate instead of underflowing.
    let cursor_x = area.x + 2 + cursor_col.saturating_sub(scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let has_script = app.session.current().is_some();
  let has_history = !app.session.history().is_empty();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Topic => {
      let mut k = vec![("Enter", "Generate"), ("Tab", "Mode")];
      if has_script {
        k.push(("^y", "Copy"));
        k.push(("^e", "Export"));
        k.push(("^p", "Html"));
      }
      if has_history {
        k.push(("^r", "History"));
      }
      k.push(("^k", "Key"));
      k.push(("^t", "Theme"));
      k.push(("Esc", "Quit"));
      k
    }
    AppMode::ApiKey => vec![("Enter", "Save"), ("Esc", "Cancel")],
    AppMode::History => vec![("Enter", "Load"), ("j/k", "Navigate"), ("d", "Delete"), ("Esc", "Back")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
