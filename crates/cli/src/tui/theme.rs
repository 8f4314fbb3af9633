//! Centralized TUI theme built on ratatui's Tailwind CSS palette.

use ratatui::style::Color;
use ratatui::style::palette::tailwind;

/// The application theme. All visual tokens live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    // ── Base ──
    /// Primary foreground/text color.
    pub fg: Color,
    /// Muted foreground for minimal-emphasis elements.
    pub fg_muted: Color,
    /// Default border color for panels and widgets.
    pub border: Color,
    /// Border color for the active/focused widget.
    pub border_active: Color,

    // ── Accent / Brand ──
    pub accent: Color,

    // ── Semantic ──
    pub warning: Color,
    pub error: Color,

    // ── Transcript ──
    /// Label color for user messages.
    pub user_label: Color,
    /// Label color for assistant replies.
    pub assistant_label: Color,
    /// Informational lines (startup, model switch, clear).
    pub notice: Color,
    /// Help block text.
    pub help: Color,
    /// Cut-off partial replies.
    pub interrupted: Color,

    // ── Status bar ──
    pub status_model: Color,
    pub status_spinner: Color,
    pub status_hint: Color,

    // ── Model selector ──
    pub browser_title: Color,
    pub browser_selected_marker: Color,
    pub browser_selected_bg: Color,
    pub browser_search: Color,
    pub browser_footer: Color,
}

impl Theme {
    /// The default dark theme using Tailwind palette.
    pub const fn default_dark() -> Self {
        Self {
            fg: tailwind::SLATE.c100,
            fg_muted: tailwind::SLATE.c500,
            border: tailwind::SLATE.c700,
            border_active: tailwind::EMERALD.c500,

            accent: tailwind::EMERALD.c500,

            warning: tailwind::AMBER.c500,
            error: tailwind::RED.c500,

            user_label: tailwind::CYAN.c400,
            assistant_label: tailwind::EMERALD.c400,
            notice: tailwind::SKY.c400,
            help: tailwind::SLATE.c300,
            interrupted: tailwind::SLATE.c500,

            status_model: tailwind::SKY.c400,
            status_spinner: tailwind::AMBER.c400,
            status_hint: tailwind::SLATE.c500,

            browser_title: tailwind::EMERALD.c400,
            browser_selected_marker: tailwind::EMERALD.c400,
            browser_selected_bg: tailwind::SLATE.c800,
            browser_search: tailwind::SLATE.c400,
            browser_footer: tailwind::SLATE.c500,
        }
    }

    /// Terminal default colours everywhere, for `--no-color`.
    pub const fn plain() -> Self {
        Self {
            fg: Color::Reset,
            fg_muted: Color::Reset,
            border: Color::Reset,
            border_active: Color::Reset,
            accent: Color::Reset,
            warning: Color::Reset,
            error: Color::Reset,
            user_label: Color::Reset,
            assistant_label: Color::Reset,
            notice: Color::Reset,
            help: Color::Reset,
            interrupted: Color::Reset,
            status_model: Color::Reset,
            status_spinner: Color::Reset,
            status_hint: Color::Reset,
            browser_title: Color::Reset,
            browser_selected_marker: Color::Reset,
            browser_selected_bg: Color::Reset,
            browser_search: Color::Reset,
            browser_footer: Color::Reset,
        }
    }

    pub fn select(no_color: bool) -> &'static Theme {
        if no_color { &PLAIN_THEME } else { &THEME }
    }
}

/// Global theme instance.
pub static THEME: Theme = Theme::default_dark();

/// Colourless variant.
pub static PLAIN_THEME: Theme = Theme::plain();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dark_theme_has_distinct_colors() {
        let theme = Theme::default_dark();
        assert_ne!(theme.fg, theme.fg_muted);
        assert_ne!(theme.accent, theme.error);
        assert_ne!(theme.user_label, theme.assistant_label);
    }

    #[test]
    fn no_color_selects_plain_theme() {
        assert_eq!(Theme::select(true).error, Color::Reset);
        assert_eq!(Theme::select(true).user_label, Color::Reset);
        assert_eq!(*Theme::select(false), THEME);
    }
}
