//! Kisssub Presenters
//!
//! Each presenter turns one asynchronous GET into a handful of view
//! callbacks:
//! ```text
//! Idle
//!   ↓ get
//! Loading(token)
//!   ↓ deliver / settle
//! Success | Empty | Error
//!   ↓
//! Idle
//! ```
//! Network work runs on a Tokio runtime; callbacks only ever run on the
//! thread that calls `deliver` or `settle`.

mod god_mode;
mod info;
mod slot;

#[cfg(test)]
mod testing;

pub use god_mode::{GodModeOutcome, GodModePresenter, GodModeView};
pub use info::{InfoBean, InfoOutcome, InfoPresenter, InfoView};
pub use slot::{Dispatch, RequestToken};
