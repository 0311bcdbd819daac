use ratatui::style::{Color, Modifier, Style};
use sesh_core::Theme;

/// Colors used by the view for one [`Theme`].
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub bg: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub error: Color,
    pub selection: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                bg: Color::Rgb(17, 24, 39),
                text: Color::Rgb(229, 231, 235),
                muted: Color::Rgb(156, 163, 175),
                border: Color::Rgb(75, 85, 99),
                accent: Color::Rgb(96, 165, 250),
                ok: Color::Rgb(52, 211, 153),
                warn: Color::Rgb(251, 191, 36),
                error: Color::Rgb(248, 113, 113),
                selection: Color::Rgb(31, 41, 55),
            },
            Theme::Light => Self {
                bg: Color::Rgb(249, 250, 251),
                text: Color::Rgb(17, 24, 39),
                muted: Color::Rgb(107, 114, 128),
                border: Color::Rgb(209, 213, 219),
                accent: Color::Rgb(37, 99, 235),
                ok: Color::Rgb(5, 150, 105),
                warn: Color::Rgb(217, 119, 6),
                error: Color::Rgb(220, 38, 38),
                selection: Color::Rgb(229, 231, 235),
            },
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.bg)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn selected(&self) -> Style {
        Style::default()
            .bg(self.selection)
            .add_modifier(Modifier::BOLD)
    }
}
