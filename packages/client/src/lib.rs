//! Line-oriented terminal client for the Linecast relay.

pub mod error;
pub mod formatter;
mod session;
mod ui;

pub use session::run_client_session;
pub use ui::prompt_display_name;
