//! `--serverlist`: find editors that accept remote control.
//!
//! Neovim's automatic `--listen` addresses live under `$XDG_RUNTIME_DIR` or
//! the temp directory (`nvim.<user>/<random>/nvim.<pid>.0`), so those trees
//! are searched a few levels deep for sockets named `nvim*`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::address::{Endpoint, DEFAULT_ADDRESS};
use crate::nvim::NvimClient;

const MAX_DEPTH: usize = 3;

/// Print every reachable address, sorted.
pub fn print_addresses() {
    let mut roots = vec![std::env::temp_dir()];
    if let Some(runtime) = dirs::runtime_dir() {
        roots.push(runtime);
    }

    let mut candidates: BTreeSet<PathBuf> = BTreeSet::new();
    candidates.insert(PathBuf::from(DEFAULT_ADDRESS));
    for root in &roots {
        collect_sockets(root, MAX_DEPTH, &mut candidates);
    }

    for address in reachable(candidates) {
        println!("{address}");
    }
}

fn reachable(candidates: BTreeSet<PathBuf>) -> Vec<String> {
    candidates
        .into_iter()
        .map(|path| Endpoint::parse(&path.to_string_lossy()))
        .filter(|endpoint| NvimClient::try_connect(endpoint).is_some())
        .map(|endpoint| endpoint.to_string())
        .collect()
}

/// Collect `nvim*` sockets below `dir`.
fn collect_sockets(dir: &Path, depth: usize, found: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if file_type.is_dir() && depth > 0 {
            collect_sockets(&path, depth - 1, found);
        } else if name.starts_with("nvim") && is_socket(&file_type) {
            found.insert(path);
        }
    }
}

#[cfg(unix)]
fn is_socket(file_type: &std::fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file_type.is_socket()
}

#[cfg(not(unix))]
fn is_socket(_: &std::fs::FileType) -> bool {
    false
}
