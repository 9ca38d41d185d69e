use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Flex, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, List, ListItem, Padding, Paragraph, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, AppMode, InputTarget, StatusKind};
use crate::models::{CONDITIONS, NoteField, unique_formats};
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` columns, appending "…" if truncated.
pub fn truncate_str(s: &str, max_width: usize) -> String {
  if s.width() <= max_width {
    return s.to_string();
  }
  let mut out = String::new();
  let mut used = 0;
  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w + 1 > max_width {
      break;
    }
    used += w;
    out.push(c);
  }
  out.push('…');
  out
}

pub fn rating_stars(rating: u8) -> String {
  let filled = rating.min(5) as usize;
  format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

fn on_off(flag: bool) -> &'static str {
  if flag { "on" } else { "off" }
}

fn rounded(theme: &Theme) -> Block<'static> {
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let input_height = if matches!(app.mode, AppMode::Input(_)) { 3 } else { 1 };
  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(input_height),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  if app.release.is_some() {
    let [info_area, videos_area] =
      Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(main_area);
    render_release(frame, app, info_area);
    render_videos(frame, app, videos_area);
  } else {
    render_welcome(frame, app, main_area);
  }
  render_status(frame, app, status_area);
  match app.mode {
    AppMode::Input(target) => render_input(frame, app, target, input_area),
    _ => render_flags(frame, app, input_area),
  }
  render_footer(frame, app, footer_area);

  if let AppMode::Condition(field) = app.mode {
    render_condition_picker(frame, app, field, main_area);
  }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let user = match app.username() {
    "" => "no user".to_string(),
    name => name.to_string(),
  };
  let left = Line::from(vec![
    Span::styled(" ◉ diggr ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("{} · {}", user, app.config.list_kind.label()), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_welcome(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let hint = if app.is_loading() {
    "Digging..."
  } else if app.username().is_empty() {
    "Press u to enter your Discogs username."
  } else {
    "Press n to pull a random record."
  };
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("◉  Welcome to diggr", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Random records from your Discogs crate. Played from YouTube.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled(hint, Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(rounded(theme));
  frame.render_widget(paragraph, area);
}

fn render_release(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(release) = &app.release else { return };
  let inner_w = area.width.saturating_sub(4) as usize;
  let label = |s: &'static str| Span::styled(format!("{:<9}", s), Style::default().fg(theme.muted));
  let value = |s: String| Span::styled(truncate_str(&s, inner_w.saturating_sub(9)), Style::default().fg(theme.fg));

  let mut lines = vec![
    Line::from(Span::styled(
      truncate_str(&release.artist_line(), inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
    )),
    Line::from(Span::styled(truncate_str(&release.title, inner_w), Style::default().fg(theme.fg).bold())),
    Line::from(""),
  ];

  if let Some(year) = release.year_label() {
    lines.push(Line::from(vec![label("Year"), value(year)]));
  }
  if let Some(country) = &release.country {
    lines.push(Line::from(vec![label("Country"), value(country.clone())]));
  }
  lines.push(Line::from(vec![label("Format"), value(unique_formats(&release.formats))]));
  if let Some(l) = release.labels.first() {
    let text = if l.catno.is_empty() { l.name.clone() } else { format!("{} – {}", l.name, l.catno) };
    lines.push(Line::from(vec![label("Label"), value(text)]));
  }
  let tags: Vec<&str> = release.genres.iter().chain(&release.styles).map(String::as_str).collect();
  if !tags.is_empty() {
    lines.push(Line::from(vec![label("Style"), value(tags.join(", "))]));
  }
  if let Some(stats) = &app.stats {
    lines.push(Line::from(vec![label("Market"), value(stats.summary())]));
  }

  lines.push(Line::from(""));
  match &app.entry {
    Some(entry) => {
      let mut rating = vec![label("Rating"), Span::styled(rating_stars(entry.rating), Style::default().fg(theme.accent))];
      if let Some(status) = &app.rating_status {
        let color = if status.kind == StatusKind::Error { theme.error } else { theme.status };
        rating.push(Span::styled(format!("  {}", status.text), Style::default().fg(color)));
      }
      lines.push(Line::from(rating));
      for (name, field) in [("Media", NoteField::MediaCondition), ("Sleeve", NoteField::SleeveCondition)] {
        let set = entry.note(field).is_some();
        let style = Style::default().fg(if set { theme.fg } else { theme.faint });
        lines.push(Line::from(vec![
          label(name),
          Span::styled(truncate_str(entry.condition(field), inner_w.saturating_sub(9)), style),
        ]));
      }
      if let Some(notes) = entry.note(NoteField::Notes).filter(|n| !n.is_empty()) {
        lines.push(Line::from(vec![label("Notes"), value(notes.to_string())]));
      }
    }
    None => lines.push(Line::from(Span::styled("Not in your collection", Style::default().fg(theme.faint)))),
  }

  let title = Line::from(Span::styled(
    format!(" r{} ", release.id),
    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
  ));
  let paragraph =
    Paragraph::new(lines).wrap(Wrap { trim: false }).block(rounded(theme).title(title).padding(Padding::horizontal(1)));
  frame.render_widget(paragraph, area);
}

fn render_videos(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  // Inner width: area minus 2 borders minus 2 chars for highlight symbol
  let inner_w = area.width.saturating_sub(4) as usize;
  let playing = app.player.current_video().map(str::to_string);

  let items: Vec<ListItem> = app
    .videos
    .iter()
    .enumerate()
    .map(|(i, video)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let marker = if playing.as_deref() == Some(video.id.as_str()) {
        if app.player.paused { "‖ " } else { "♪ " }
      } else if app.sequencer.played().contains(&i) {
        "· "
      } else {
        "  "
      };

      let right = match app.matches.get(i).and_then(Option::as_ref) {
        Some(m) if m.uncertain => format!("{} ?", m.position),
        Some(m) => m.position.clone(),
        None => String::new(),
      };
      let right_style = match app.matches.get(i).and_then(Option::as_ref) {
        Some(m) if m.uncertain => Style::default().fg(theme.faint),
        _ => Style::default().fg(if is_selected { theme.highlight_fg } else { theme.muted }),
      };
      let right_w = right.width();
      let title_max = inner_w.saturating_sub(right_w + 2 + marker.width());
      let title = truncate_str(&video.title, title_max);
      let gap = inner_w.saturating_sub(marker.width() + title.width() + right_w);

      let line = Line::from(vec![
        Span::styled(marker, Style::default().fg(if is_selected { fg } else { theme.accent })),
        Span::styled(title, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(right, right_style),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let dirty = if app.order_dirty { " · unsaved order" } else { "" };
  let title = format!(" Videos ({}){} ", app.videos.len(), dirty);
  let list = List::new(items)
    .block(rounded(theme).title(title).title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_condition_picker(frame: &mut Frame, app: &mut App, field: NoteField, area: Rect) {
  let theme = app.theme();
  let [popup] = Layout::horizontal([Constraint::Length(34)]).flex(Flex::Center).areas(area);
  let [popup] = Layout::vertical([Constraint::Length(CONDITIONS.len() as u16 + 2)]).flex(Flex::Center).areas(popup);

  let items: Vec<ListItem> =
    CONDITIONS.iter().map(|c| ListItem::new(Span::styled(*c, Style::default().fg(theme.fg)))).collect();
  let list = List::new(items)
    .block(
      rounded(theme)
        .title(format!(" {} ", field.label()))
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .style(Style::default().bg(theme.bg)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg));

  frame.render_widget(Clear, popup);
  frame.render_stateful_widget(list, popup, &mut app.condition_state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = match &app.status {
    Some(status) => match status.kind {
      StatusKind::Loading => (format!(" ⏳ {}", status.text), Style::default().fg(theme.status)),
      StatusKind::Info => (format!(" ✓ {}", status.text), Style::default().fg(theme.status)),
      StatusKind::Error => (format!(" ⚠  {}", status.text), Style::default().fg(theme.error)),
    },
    None => match app.player.get_last_mpv_status() {
      Some(status) => (format!(" ♪ {}", status), Style::default().fg(theme.status)),
      None if app.pending_start().is_some() => (" Up next...".to_string(), Style::default().fg(theme.muted)),
      None => (" Ready".to_string(), Style::default().fg(theme.muted)),
    },
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_flags(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let flags = app.flags();
  let token = if app.config.token().is_some() { "set" } else { "none" };
  let spans: Vec<Span> = [
    ("autoplay", on_off(flags.autoplay)),
    ("shuffle", on_off(flags.shuffle)),
    ("continuous", on_off(flags.continuous_play)),
    ("random next", on_off(flags.random_next)),
    ("token", token),
  ]
  .iter()
  .flat_map(|(name, state)| {
    let active = matches!(*state, "on" | "set");
    [
      Span::styled(format!(" {} ", name), Style::default().fg(theme.muted)),
      Span::styled(state.to_string(), Style::default().fg(if active { theme.accent } else { theme.faint })),
      Span::raw("  "),
    ]
  })
  .collect();
  frame.render_widget(Line::from(spans), area);
}

fn render_input(frame: &mut Frame, app: &mut App, target: InputTarget, area: Rect) {
  let theme = app.theme();
  let input_block = rounded(theme)
    .title(target.title())
    .title_style(Style::default().fg(theme.accent))
    .border_style(Style::default().fg(theme.accent))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let masked;
  let shown = if target == InputTarget::Token {
    masked = "•".repeat(app.input.chars().count());
    masked.as_str()
  } else {
    app.input.as_str()
  };

  let visible: String = shown
    .chars()
    .scan(0usize, |col, c| {
      let w = c.width().unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
  frame.set_cursor_position((cursor_x, area.y + 1));
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input(_) => vec![("Enter", "Save"), ("Esc", "Cancel")],
    AppMode::Condition(_) => vec![("j/k", "Navigate"), ("Enter", "Set"), ("Esc", "Cancel")],
    AppMode::Browse => {
      let mut k = vec![("n", "Random")];
      if app.release.is_some() {
        k.push(("Enter", "Play"));
        if app.player.is_playing() {
          k.push(("Space", if app.player.paused { "Resume" } else { "Pause" }));
          k.push(("s", "Stop"));
        }
        k.push(("J/K", "Move"));
        k.push(("w", "Save order"));
        k.push(("0-5", "Rate"));
        k.push(("m/v", "Condition"));
        k.push(("e", "Notes"));
      }
      k.push(("l", app.config.list_kind.toggled().label()));
      k.push(("q", "Quit"));
      k
    }
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
        s.push(Span::raw(" "));
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
