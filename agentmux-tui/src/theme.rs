use ratatui::style::Color;

/// Dashboard color scheme. Fixed palette; the interesting configuration
/// surface of agentmux is behaviour, not chrome.
pub struct Theme {
    pub accent: Color,
    pub secondary: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub muted: Color,
    pub border: Color,
    pub hint: Color,
    pub highlight_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Magenta,
            secondary: Color::Cyan,
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            muted: Color::DarkGray,
            border: Color::DarkGray,
            hint: Color::Blue,
            highlight_fg: Color::Black,
        }
    }
}
