//! Blocking until awaited buffers are gone.
//!
//! Registering a buffer installs autocommands that notify this channel on
//! `BufDelete` of that buffer and when the editor exits, and records the
//! channel id in the buffer-local `b:nvr` list so other tools can see who
//! is waiting on it.

use std::ops::ControlFlow;

use rmpv::Value;

use crate::nvim::{Notification, NvimApi, Rpc, RpcError};
use crate::session::Session;

/// Buffer variable listing the channels waiting on a buffer.
pub const WAIT_VAR: &str = "nvr";

const BUF_DELETE: &str = "BufDelete";
const EXIT: &str = "Exit";

impl<N: NvimApi> Session<N> {
    /// Wait for the current buffer to be deleted.
    pub fn register_wait(&mut self) -> Result<(), RpcError> {
        let chanid = self.nvim.channel_id()?;

        self.nvim.command("augroup nvr")?;
        self.nvim.command(&format!(
            "autocmd {BUF_DELETE} <buffer> silent! call rpcnotify({chanid}, \"{BUF_DELETE}\")"
        ))?;
        self.nvim.command(&format!(
            "autocmd VimLeave * if v:exiting isnot v:null | silent! call rpcnotify({chanid}, \"{EXIT}\", v:exiting) | endif"
        ))?;
        self.nvim.command("augroup END")?;

        let mut waiting = match self.nvim.buf_var(WAIT_VAR)? {
            Some(Value::Array(ids)) => ids,
            _ => Vec::new(),
        };
        if !waiting.iter().any(|id| id.as_i64() == Some(chanid)) {
            waiting.push(Value::from(chanid));
            self.nvim.set_buf_var(WAIT_VAR, Value::Array(waiting))?;
        }

        self.wait += 1;
        tracing::debug!(chanid, outstanding = self.wait, "Registered buffer for wait");
        Ok(())
    }

    /// Block until every awaited buffer is deleted or the editor exits.
    ///
    /// Returns the exit code for this process: 0 (or the status carried by
    /// the last `BufDelete`), the editor's exit status on `Exit`, and 1 when
    /// the connection fails.
    pub fn block_until_done(&mut self) -> i32 {
        if self.wait == 0 {
            return 0;
        }

        let mut remaining = self.wait;
        tracing::info!(outstanding = remaining, "Waiting for buffers to be deleted");

        let code = self.nvim.run_loop(
            |notification: &Notification| match notification.method.as_str() {
                BUF_DELETE => {
                    remaining = remaining.saturating_sub(1);
                    tracing::debug!(remaining, "Buffer deleted");
                    if remaining == 0 {
                        ControlFlow::Break(status(notification.args.first(), 0))
                    } else {
                        ControlFlow::Continue(())
                    }
                }
                EXIT => {
                    tracing::debug!(remaining, "Editor exited");
                    ControlFlow::Break(status(notification.args.first(), 0))
                }
                other => {
                    tracing::debug!(method = other, "Ignoring notification");
                    ControlFlow::Continue(())
                }
            },
            |error| {
                eprintln!("{error}");
                1
            },
        );

        self.wait = remaining;
        code
    }
}

/// An exit status carried by a notification argument.
fn status(arg: Option<&Value>, default: i32) -> i32 {
    match arg {
        None | Some(Value::Nil) => default,
        Some(value) => value
            .as_i64()
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or(1),
    }
}
