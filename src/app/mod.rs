//! Application runtime composition modules.

pub(crate) mod exit_handler;
pub(crate) mod output;
pub(crate) mod progress;
pub(crate) mod replay;
pub(crate) mod runtime;
pub(crate) mod settings;
pub(crate) mod terminal;
