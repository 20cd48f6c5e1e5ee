//! nvr - remote control for Neovim
//!
//! Opens files, sends keys, evaluates expressions and waits for buffers in
//! an already running editor, starting one when none is reachable.

pub mod address;
pub mod batch;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod eval;
pub mod nvim;
pub mod session;
pub mod wait;
