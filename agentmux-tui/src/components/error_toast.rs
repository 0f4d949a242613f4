use super::popup::Popup;
use crate::theme::Theme;
use ratatui::{Frame, layout::Rect, text::Line};

/// Transient error popup over whatever is on screen. Purely a function
/// of the current error string; the App clears it after the
/// auto-dismiss interval.
pub fn draw(f: &mut Frame, area: Rect, error: Option<&str>, theme: &Theme) {
    let Some(error) = error else {
        return;
    };
    Popup::new(" error ", theme.error)
        .line(Line::from(error))
        .blank()
        .hint("clears in a few seconds", theme.muted)
        .render(f, area);
}
