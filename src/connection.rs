//! Attach to a running editor, or start one and attach to that.
//!
//! ```text
//! Idle -> Attaching -> Attached
//!                   -> SpawnNeeded -> (sibling) SpawnedAttaching -> Attached
//!                                                                -> SpawnFailed
//!                                  -> (this process) editor in the foreground
//! ```
//!
//! Spawning splits the work in two processes that share nothing but the
//! endpoint. By default this process re-runs itself as a detached child
//! (with `--attach-spawned`) that retries attaching and executes the rest
//! of the invocation, while this process becomes the editor. With
//! `--start-separate-process` the editor is the background child instead.

use std::env;
use std::ffi::OsString;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::address::{Endpoint, PUBLISH_VAR};
use crate::config::Config;
use crate::error::NvrError;
use crate::nvim::NvimClient;

/// Internal flag marking the sibling that attaches to a spawned editor.
pub const ATTACH_SPAWNED_FLAG: &str = "--attach-spawned";

/// Result of the attach-or-spawn step.
pub enum Attachment {
    /// Connected to an editor. `spawned` is set when this invocation started it.
    Attached { client: NvimClient, spawned: bool },
    /// This process ran the editor in the foreground and it has exited.
    Foreground { exit_code: i32 },
}

/// Owns the attach-or-spawn decision for one invocation.
pub struct ConnectionManager {
    endpoint: Endpoint,
    config: Config,
    silent: bool,
    no_start: bool,
    separate_process: bool,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, config: Config) -> Self {
        Self {
            endpoint,
            config,
            silent: false,
            no_start: false,
            separate_process: false,
        }
    }

    /// Suppress the "no server found" message.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Fail instead of starting an editor.
    pub fn no_start(mut self, no_start: bool) -> Self {
        self.no_start = no_start;
        self
    }

    /// Run the editor as a background child instead of in the foreground.
    pub fn separate_process(mut self, separate: bool) -> Self {
        self.separate_process = separate;
        self
    }

    /// Attach to the endpoint, spawning an editor if nothing listens there.
    ///
    /// `args` are this invocation's arguments (without the program name);
    /// they are handed to the sibling process that attaches to a spawned
    /// editor.
    pub fn attach_or_spawn(mut self, args: &[OsString]) -> Result<Attachment, NvrError> {
        if let Some(client) = NvimClient::try_connect(&self.endpoint) {
            tracing::info!(endpoint = %self.endpoint, "Attached to running nvim");
            return Ok(Attachment::Attached {
                client,
                spawned: false,
            });
        }

        if !self.silent {
            eprintln!("{}", unreachable_message(&self.endpoint));
        }
        if self.no_start {
            return Err(NvrError::Unreachable {
                address: self.endpoint.to_string(),
            });
        }

        self.endpoint = self.endpoint.sanitize();
        self.spawn(args)
    }

    /// Attach to an editor this invocation just started.
    pub fn attach_spawned(&self) -> Result<Attachment, NvrError> {
        let client = retry_attach(
            self.config.attach_attempts,
            self.config.attach_delay(),
            || NvimClient::try_connect(&self.endpoint),
        )
        .ok_or_else(|| NvrError::SpawnTimeout {
            command: self.editor_command().map(|c| c.join(" ")).unwrap_or_default(),
        })?;

        tracing::info!(endpoint = %self.endpoint, "Attached to spawned nvim");
        Ok(Attachment::Attached {
            client,
            spawned: true,
        })
    }

    /// Launch command with the `--listen` address appended.
    pub fn editor_command(&self) -> Result<Vec<String>, NvrError> {
        let mut command = self.config.editor_command()?;
        command.push("--listen".to_string());
        command.push(self.endpoint.to_string());
        Ok(command)
    }

    fn spawn(&self, args: &[OsString]) -> Result<Attachment, NvrError> {
        if !self.silent {
            eprintln!("[*] Starting new nvim process using $NVR_CMD or 'nvim'.\n");
            eprintln!("    Use --nostart to avoid starting a new process.\n");
        }

        let command = self.editor_command()?;
        let program = which::which(&command[0]).map_err(|e| {
            tracing::debug!(program = %command[0], error = %e, "Editor lookup failed");
            NvrError::NotFound {
                program: command[0].clone(),
            }
        })?;

        let mut editor = Command::new(&program);
        editor.args(&command[1..]).env(PUBLISH_VAR, self.endpoint.to_string());

        if self.separate_process {
            tracing::info!(program = %program.display(), "Starting nvim in the background");
            editor
                .stdin(Stdio::null())
                .spawn()
                .map_err(|source| NvrError::Spawn {
                    program: command[0].clone(),
                    source,
                })?;
            return self.attach_spawned();
        }

        self.spawn_attacher(args)?;
        run_foreground(editor, &command[0])
    }

    /// Start the sibling that attaches to the editor we are about to become.
    fn spawn_attacher(&self, args: &[OsString]) -> Result<(), NvrError> {
        let exe = env::current_exe()?;
        let child_args = attacher_args(args, &self.endpoint);

        tracing::debug!(exe = %exe.display(), "Starting attach process");
        Command::new(exe)
            .args(child_args)
            .stdin(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

/// Arguments for the attacher: `args` with `--servername` replaced by the
/// spawned endpoint and the attach flag added, both ahead of any `--`.
fn attacher_args(args: &[OsString], endpoint: &Endpoint) -> Vec<OsString> {
    let split = args.iter().position(|arg| arg == "--").unwrap_or(args.len());
    let (options, literal) = args.split_at(split);

    let mut kept = Vec::with_capacity(args.len() + 3);
    let mut options = options.iter();
    while let Some(arg) = options.next() {
        if arg == "--servername" {
            options.next();
        } else if !arg.to_string_lossy().starts_with("--servername=") {
            kept.push(arg.clone());
        }
    }
    kept.push(OsString::from(ATTACH_SPAWNED_FLAG));
    kept.push(OsString::from("--servername"));
    kept.push(OsString::from(endpoint.to_string()));
    kept.extend(literal.iter().cloned());
    kept
}

/// Replace this process with the editor.
#[cfg(unix)]
fn run_foreground(mut editor: Command, program: &str) -> Result<Attachment, NvrError> {
    use std::os::unix::process::CommandExt;

    tracing::info!(program, "Replacing process with nvim");
    let source = editor.exec();
    Err(NvrError::Spawn {
        program: program.to_string(),
        source,
    })
}

/// Run the editor as a child and forward its exit status.
#[cfg(not(unix))]
fn run_foreground(mut editor: Command, program: &str) -> Result<Attachment, NvrError> {
    tracing::info!(program, "Running nvim in the foreground");
    let status = editor.status().map_err(|source| NvrError::Spawn {
        program: program.to_string(),
        source,
    })?;
    Ok(Attachment::Foreground {
        exit_code: status.code().unwrap_or(1),
    })
}

/// Call `connect` up to `attempts` times, sleeping `delay` after each miss.
pub fn retry_attach<C, F>(attempts: u32, delay: Duration, mut connect: F) -> Option<C>
where
    F: FnMut() -> Option<C>,
{
    for attempt in 1..=attempts {
        if let Some(client) = connect() {
            return Some(client);
        }
        tracing::debug!(attempt, attempts, "Editor not reachable yet");
        thread::sleep(delay);
    }
    None
}

/// Diagnostic shown when nothing listens on the endpoint.
fn unreachable_message(endpoint: &Endpoint) -> String {
    format!(
        "[!] Can't connect to: {endpoint}

    The server (nvim) and client (nvr) have to use the same address.

    Server:

        Specify the server address when starting nvim:

        $ nvim --listen {endpoint}

        Use `:echo v:servername` to verify the address.

    Client:

        Expose $NVIM_LISTEN_ADDRESS to the environment before using nvr or
        use its --servername option. If neither is given, nvr assumes
        \"{default}\".

        $ NVIM_LISTEN_ADDRESS={endpoint} nvr file1 file2
        $ nvr --servername {endpoint} file1 file2
        $ nvr --servername 127.0.0.1:6789 file1 file2

    Use -s to suppress this message.
",
        default = crate::address::DEFAULT_ADDRESS,
    )
}
