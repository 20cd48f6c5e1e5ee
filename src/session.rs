//! Per-invocation state of one attached client.
//!
//! Batch execution lives in [`crate::batch`], wait registration and the
//! blocking notification loop in [`crate::wait`].

use std::io::{self, BufRead, Read};

use crate::nvim::NvimApi;

/// One client invocation attached to one editor.
pub struct Session<N> {
    pub(crate) nvim: N,
    /// This invocation started the editor it is talking to.
    pub(crate) started_new_process: bool,
    /// The spawned editor's placeholder window was already reused.
    pub(crate) handled_first_buffer: bool,
    pub(crate) diff_mode: bool,
    /// Buffers whose deletion we still wait for.
    pub(crate) wait: usize,
    input: Box<dyn BufRead>,
}

impl<N: NvimApi> Session<N> {
    /// Wrap an attached editor. Standard input feeds `-` arguments.
    pub fn new(nvim: N, started_new_process: bool) -> Self {
        Self::with_input(nvim, started_new_process, Box::new(io::stdin().lock()))
    }

    pub fn with_input(nvim: N, started_new_process: bool, input: Box<dyn BufRead>) -> Self {
        Self {
            nvim,
            started_new_process,
            handled_first_buffer: false,
            diff_mode: false,
            wait: 0,
            input,
        }
    }

    pub fn nvim(&mut self) -> &mut N {
        &mut self.nvim
    }

    pub fn started_new_process(&self) -> bool {
        self.started_new_process
    }

    pub fn diff_mode(&self) -> bool {
        self.diff_mode
    }

    pub fn set_diff_mode(&mut self, enabled: bool) {
        self.diff_mode = enabled;
    }

    /// Number of buffer deletions still awaited.
    pub fn outstanding(&self) -> usize {
        self.wait
    }

    /// Consume the rest of the input as one string, minus the final line break.
    pub fn read_input(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.input.read_to_string(&mut text)?;
        let len = text.trim_end_matches(['\r', '\n']).len();
        text.truncate(len);
        Ok(text)
    }

    /// Consume the rest of the input line by line.
    pub fn input_lines(&mut self) -> io::Result<Vec<String>> {
        (&mut self.input).lines().collect()
    }
}
