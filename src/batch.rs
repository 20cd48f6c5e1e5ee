//! Translating file and `+cmd` arguments into editor commands.
//!
//! Arguments are split into file targets and `+cmd` commands. Files are
//! opened in the order given, the commands run afterwards. A lone `-` reads
//! standard input into a new buffer instead of opening a file.

use std::path::Path;

use rmpv::Value;

use crate::error::NvrError;
use crate::nvim::{NvimApi, RpcError};
use crate::session::Session;

/// Marks an argument as a command rather than a file.
const COMMAND_SENTINEL: char = '+';

/// URL schemes netrw opens itself; these are never made absolute.
const REMOTE_SCHEMES: &[&str] = &[
    "dav", "davs", "file", "ftp", "http", "https", "rcp", "rsync", "scp", "sftp",
];

/// How a file gets opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Edit,
    Split,
    VSplit,
    TabEdit,
}

impl Verb {
    /// Ex command that opens a file.
    pub fn command(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Split => "split",
            Self::VSplit => "vsplit",
            Self::TabEdit => "tabedit",
        }
    }

    /// Ex command that opens an empty buffer the same way.
    pub fn new_buffer(self) -> &'static str {
        match self {
            Self::Edit => "enew",
            Self::Split => "new",
            Self::VSplit => "vnew",
            Self::TabEdit => "tabnew",
        }
    }
}

/// A file argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `-`: fill a new buffer from standard input.
    Stdin,
    File(String),
}

/// Files and commands taken from one argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub targets: Vec<Target>,
    /// `+cmd` arguments without the sentinel, in execution order.
    pub commands: Vec<String>,
}

impl Batch {
    /// Split arguments into targets and commands.
    ///
    /// Everything after `--` is a file. Commands are collected from the back
    /// to the front, so `+cmd2 +cmd1 file` runs `cmd1` before `cmd2`.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        let mut batch = Self::default();
        let mut args = args.iter().map(AsRef::<str>::as_ref);

        while let Some(arg) = args.next() {
            if arg == "--" {
                batch.targets.extend(args.by_ref().map(Target::from_arg));
                break;
            }
            match arg.strip_prefix(COMMAND_SENTINEL) {
                Some(cmd) => batch.commands.insert(0, cmd.to_string()),
                None => batch.targets.push(Target::from_arg(arg)),
            }
        }
        batch
    }
}

impl Target {
    fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdin
        } else {
            Self::File(arg.to_string())
        }
    }
}

/// Whether netrw handles this path as a URL.
pub fn is_remote_uri(path: &str) -> bool {
    path.split_once(":/")
        .is_some_and(|(scheme, _)| REMOTE_SCHEMES.contains(&scheme))
}

impl<N: NvimApi> Session<N> {
    /// Open every target of the batch with `verb`, then run its commands.
    ///
    /// With `wait`, every opened buffer is registered for wait. Returns the
    /// number of targets processed.
    pub fn execute(&mut self, batch: Batch, verb: Verb, wait: bool) -> Result<usize, NvrError> {
        let count = batch.targets.len();

        for target in batch.targets {
            let opened = match &target {
                // Stdin always gets a fresh buffer and leaves the placeholder window alone.
                Target::Stdin => self.read_stdin_into_buffer(verb),
                Target::File(name) => {
                    let verb = self.verb_for_next_buffer(verb);
                    self.fnameescaped_command(verb, name)
                        .map(|()| self.handled_first_buffer = true)
                }
            };

            match opened {
                Ok(()) => {}
                Err(NvrError::Remote(e)) if e.is_benign() => {
                    tracing::warn!(file = ?target, error = %e, "Ignoring editor error");
                }
                Err(e) => return Err(e),
            }

            self.diffthis()?;
            if wait {
                self.register_wait()?;
            }
        }

        for cmd in batch.commands {
            let cmd = if cmd.is_empty() { "$".to_string() } else { cmd };
            self.nvim.command(&cmd)?;
        }

        Ok(count)
    }

    /// A freshly spawned editor has one empty window; the first buffer replaces it.
    fn verb_for_next_buffer(&self, verb: Verb) -> Verb {
        if self.started_new_process && !self.handled_first_buffer {
            Verb::Edit
        } else {
            verb
        }
    }

    fn read_stdin_into_buffer(&mut self, verb: Verb) -> Result<(), NvrError> {
        self.nvim.command(verb.new_buffer())?;
        for line in self.input_lines()? {
            self.nvim.append_line(&line)?;
        }
        self.nvim.command("silent 1delete _ | set nomodified")?;
        Ok(())
    }

    /// Run `{verb} {escaped path}` with the "file info" message suppressed.
    fn fnameescaped_command(&mut self, verb: Verb, path: &str) -> Result<(), NvrError> {
        let path = if is_remote_uri(path) {
            path.to_string()
        } else {
            std::path::absolute(Path::new(path))?
                .to_string_lossy()
                .into_owned()
        };
        let escaped = self.nvim.fnameescape(&path)?;

        let shortmess = self.nvim.get_option("shortmess")?;
        let quiet = shortmess.as_str().unwrap_or_default().replace('F', "");
        self.nvim.set_option("shortmess", Value::from(quiet))?;

        let opened = self.nvim.command(&format!("{} {}", verb.command(), escaped));
        self.nvim.set_option("shortmess", shortmess)?;

        tracing::debug!(path = %path, verb = verb.command(), "Opened file");
        opened.map_err(NvrError::from)
    }

    /// In diff mode, add the current buffer to the diff.
    fn diffthis(&mut self) -> Result<(), RpcError> {
        if self.diff_mode {
            self.nvim.command("diffthis")?;
            if !self.started_new_process {
                self.register_wait()?;
            }
        }
        Ok(())
    }
}
