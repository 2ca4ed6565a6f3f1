//! Live browser interaction: page controls and the restartable session.

pub mod controls;
pub mod session;

pub use session::{Baseline, BrowserSession};
