//! Color themes. Everything is explicit RGB so the palette survives
//! terminals with remapped ANSI colors.

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
}

pub const THEMES: &[Theme] = &[
  Theme {
    name: "paper",
    bg: Color::Rgb(250, 246, 238),
    fg: Color::Rgb(60, 54, 48),
    accent: Color::Rgb(196, 92, 58),
    muted: Color::Rgb(150, 140, 126),
    border: Color::Rgb(214, 205, 190),
    status: Color::Rgb(42, 128, 120),
    error: Color::Rgb(186, 48, 48),
    highlight_fg: Color::Rgb(60, 40, 20),
    highlight_bg: Color::Rgb(235, 223, 204),
    stripe_bg: Color::Rgb(243, 237, 226),
    key_fg: Color::Rgb(90, 70, 50),
    key_bg: Color::Rgb(223, 214, 196),
  },
  Theme {
    name: "ink",
    bg: Color::Rgb(24, 26, 33),
    fg: Color::Rgb(205, 209, 217),
    accent: Color::Rgb(138, 180, 248),
    muted: Color::Rgb(120, 126, 140),
    border: Color::Rgb(56, 60, 74),
    status: Color::Rgb(129, 201, 149),
    error: Color::Rgb(242, 139, 130),
    highlight_fg: Color::Rgb(24, 26, 33),
    highlight_bg: Color::Rgb(138, 180, 248),
    stripe_bg: Color::Rgb(30, 33, 42),
    key_fg: Color::Rgb(205, 209, 217),
    key_bg: Color::Rgb(47, 51, 63),
  },
  Theme {
    name: "mint",
    bg: Color::Rgb(22, 30, 28),
    fg: Color::Rgb(198, 214, 206),
    accent: Color::Rgb(118, 208, 170),
    muted: Color::Rgb(110, 130, 122),
    border: Color::Rgb(52, 68, 62),
    status: Color::Rgb(214, 196, 120),
    error: Color::Rgb(230, 130, 120),
    highlight_fg: Color::Rgb(22, 30, 28),
    highlight_bg: Color::Rgb(118, 208, 170),
    stripe_bg: Color::Rgb(27, 37, 34),
    key_fg: Color::Rgb(198, 214, 206),
    key_bg: Color::Rgb(42, 56, 51),
  },
];
