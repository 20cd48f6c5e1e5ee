//! CLI module for nvr.
//!
//! - `mod.rs`: argument surface
//! - `remote.rs`: everything done once attached
//! - `serverlist.rs`: `--serverlist`

mod remote;
mod serverlist;

use std::ffi::OsString;

use clap::Parser;

use crate::address::Endpoint;
use crate::batch::Verb;
use crate::config::Config;
use crate::connection::{Attachment, ConnectionManager};
use crate::error::NvrError;
use crate::session::Session;

/// Remote control Neovim processes.
///
/// If no process is found, a new one will be started.
///
/// Any arguments not consumed by options are fed to --remote-silent.
/// All --remote options take optional `+cmd` arguments, except
/// --remote-expr and --remote-send.
#[derive(Parser, Debug)]
#[command(name = "nvr")]
#[command(version)]
#[command(after_help = "Examples:
    $ nvr --remote-send 'iabc<cr><esc>'
    $ nvr --remote-expr 'map([1,2,3], \"v:val + 1\")'
    $ nvr +10 file
    $ nvr -cc split file1 file2
    $ git config --global core.editor 'nvr --remote-wait-silent'")]
pub struct App {
    /// Files to open, and `+cmd` commands to run after opening them
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,

    /// Arguments after `--`: always file names, even when they start with `+` or `-`
    #[arg(last = true, value_name = "FILE")]
    pub literal_files: Vec<String>,

    /// Use :edit to open files. If no process is found, complain and start a new one
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote: Option<Vec<String>>,

    /// Like --remote, but block until all buffers opened by this option get deleted or the process exits
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote_wait: Option<Vec<String>>,

    /// Like --remote, but don't complain if no process is found
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote_silent: Option<Vec<String>>,

    /// Combines --remote-wait and --remote-silent
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote_wait_silent: Option<Vec<String>>,

    /// Like --remote, but use :tabedit
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote_tab: Option<Vec<String>>,

    /// Like --remote-wait, but use :tabedit
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote_tab_wait: Option<Vec<String>>,

    /// Like --remote-silent, but use :tabedit
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote_tab_silent: Option<Vec<String>>,

    /// Like --remote-wait-silent, but use :tabedit
    #[arg(long, num_args = 0.., value_name = "FILE")]
    pub remote_tab_wait_silent: Option<Vec<String>>,

    /// Send key presses
    #[arg(long, value_name = "KEYS")]
    pub remote_send: Option<String>,

    /// Evaluate expression and print the result. `-` reads it from stdin
    #[arg(long, value_name = "EXPR")]
    pub remote_expr: Option<String>,

    /// Address to use, overriding $NVIM, $NVIM_LISTEN_ADDRESS and the default
    #[arg(long, value_name = "ADDR")]
    pub servername: Option<String>,

    /// Print the addresses of all reachable nvim processes
    #[arg(long)]
    pub serverlist: bool,

    /// Execute a command before every other option. Also accepted as -cc
    #[arg(long = "cc", value_name = "CMD")]
    pub cc: Vec<String>,

    /// Execute a command after every other option
    #[arg(short = 'c', value_name = "CMD")]
    pub c: Vec<String>,

    /// Diff mode. Use :diffthis on all to be opened buffers
    #[arg(short = 'd')]
    pub diff: bool,

    /// Change to previous window via ":wincmd p"
    #[arg(short = 'l')]
    pub previous_window: bool,

    /// Open files via ":split"
    #[arg(short = 'o', num_args = 1.., value_name = "FILE")]
    pub split: Option<Vec<String>>,

    /// Open files via ":vsplit"
    #[arg(short = 'O', num_args = 1.., value_name = "FILE")]
    pub vsplit: Option<Vec<String>>,

    /// Open files via ":tabedit"
    #[arg(short = 'p', num_args = 1.., value_name = "FILE")]
    pub tabedit: Option<Vec<String>>,

    /// Read errorfile into quickfix list and display first error. `-` reads stdin
    #[arg(short = 'q', value_name = "ERRORFILE")]
    pub errorfile: Option<String>,

    /// Silence "no server found" message
    #[arg(short = 's')]
    pub silent: bool,

    /// Jump to file and position of given tag
    #[arg(short = 't', value_name = "TAG")]
    pub tag: Option<String>,

    /// If no process is found, do not start a new one
    #[arg(long)]
    pub nostart: bool,

    /// Start a separate process instead of replacing the current one
    #[arg(long)]
    pub start_separate_process: bool,

    /// Run in verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: attach to a just-spawned nvim
    #[arg(long, hide = true)]
    pub attach_spawned: bool,
}

/// What the `--remote*` family asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteMode {
    pub verb: Verb,
    pub silent: bool,
    pub wait: bool,
}

impl App {
    /// Parse arguments from the environment.
    pub fn parse_env() -> (Self, Vec<OsString>) {
        let args: Vec<OsString> = std::env::args_os().skip(1).map(normalize_arg).collect();
        let program = std::env::args_os().next().unwrap_or_else(|| "nvr".into());
        let app = Self::parse_from(std::iter::once(program).chain(args.iter().cloned()));
        (app, args)
    }

    /// The `--remote*` option in effect, with its files.
    pub fn remote_mode(&self) -> Option<(RemoteMode, &[String])> {
        let modes = [
            (&self.remote, Verb::Edit, false, false),
            (&self.remote_wait, Verb::Edit, false, true),
            (&self.remote_silent, Verb::Edit, true, false),
            (&self.remote_wait_silent, Verb::Edit, true, true),
            (&self.remote_tab, Verb::TabEdit, false, false),
            (&self.remote_tab_wait, Verb::TabEdit, false, true),
            (&self.remote_tab_silent, Verb::TabEdit, true, false),
            (&self.remote_tab_wait_silent, Verb::TabEdit, true, true),
        ];
        modes.into_iter().find_map(|(files, verb, silent, wait)| {
            files
                .as_deref()
                .map(|files| (RemoteMode { verb, silent, wait }, files))
        })
    }

    /// Whether the "can't connect" message should be suppressed.
    ///
    /// Bare file arguments count as --remote-silent.
    pub fn is_silent(&self) -> bool {
        match self.remote_mode() {
            Some((mode, _)) => self.silent || mode.silent,
            None => self.silent || !self.file_args().is_empty(),
        }
    }

    /// Positional arguments as a batch sees them, `--` included when given.
    pub fn file_args(&self) -> Vec<String> {
        let mut args = self.files.clone();
        if !self.literal_files.is_empty() {
            args.push("--".to_string());
            args.extend(self.literal_files.iter().cloned());
        }
        args
    }

    /// Run the CLI application. Returns the process exit code.
    pub fn run(self, args: &[OsString]) -> Result<i32, NvrError> {
        if self.serverlist {
            serverlist::print_addresses();
            return Ok(0);
        }

        let config = Config::load()?;
        tracing::debug!(?config, "Loaded configuration");

        let endpoint = Endpoint::resolve(
            self.servername.as_deref(),
            config.servername.as_deref(),
            |var| std::env::var(var).ok(),
        );
        let manager = ConnectionManager::new(endpoint, config)
            .silent(self.is_silent())
            .no_start(self.nostart)
            .separate_process(self.start_separate_process);

        let attachment = if self.attach_spawned {
            manager.attach_spawned()?
        } else {
            manager.attach_or_spawn(args)?
        };

        match attachment {
            Attachment::Attached { client, spawned } => {
                let mut session = Session::new(client, spawned);
                self.proceed_after_attach(&mut session)?;
                Ok(session.block_until_done())
            }
            Attachment::Foreground { exit_code } => Ok(exit_code),
        }
    }
}

/// Accept the historical two-letter `-cc` flag.
fn normalize_arg(arg: OsString) -> OsString {
    if arg == "-cc" {
        OsString::from("--cc")
    } else {
        arg
    }
}
