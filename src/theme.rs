use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub status: Color,
  pub error: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  /// Uncertain track matches and unset conditions.
  pub faint: Color,
}

pub const THEMES: [Theme; 2] = [
  Theme {
    name: "crate",
    bg: Color::Rgb(24, 22, 28),
    fg: Color::Rgb(226, 220, 232),
    accent: Color::Rgb(155, 122, 234),
    muted: Color::Rgb(128, 120, 140),
    border: Color::Rgb(70, 62, 86),
    status: Color::Rgb(120, 200, 170),
    error: Color::Rgb(240, 110, 110),
    highlight_fg: Color::Rgb(24, 22, 28),
    highlight_bg: Color::Rgb(155, 122, 234),
    stripe_bg: Color::Rgb(32, 29, 38),
    key_fg: Color::Rgb(24, 22, 28),
    key_bg: Color::Rgb(128, 120, 140),
    faint: Color::Rgb(96, 90, 106),
  },
  Theme {
    name: "sleeve",
    bg: Color::Rgb(246, 241, 230),
    fg: Color::Rgb(48, 40, 32),
    accent: Color::Rgb(186, 84, 42),
    muted: Color::Rgb(130, 118, 104),
    border: Color::Rgb(200, 188, 170),
    status: Color::Rgb(60, 120, 90),
    error: Color::Rgb(180, 40, 40),
    highlight_fg: Color::Rgb(246, 241, 230),
    highlight_bg: Color::Rgb(186, 84, 42),
    stripe_bg: Color::Rgb(238, 232, 218),
    key_fg: Color::Rgb(246, 241, 230),
    key_bg: Color::Rgb(130, 118, 104),
    faint: Color::Rgb(170, 160, 146),
  },
];
