pub mod error_toast;
pub mod popup;
