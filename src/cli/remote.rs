//! Everything nvr does once it is attached to an editor.

use std::io::{self, Write};

use rmpv::Value;

use crate::batch::{Batch, Verb};
use crate::error::NvrError;
use crate::eval::EvalResult;
use crate::nvim::NvimApi;
use crate::session::Session;

use super::App;

impl App {
    /// Issue all requested operations, in option order.
    ///
    /// Order: `-cc`, `-l`, `--remote*`, `--remote-send`, `--remote-expr`,
    /// `-o`/`-O`/`-p` or bare files, `-t`, `-q`, `-c`.
    pub fn proceed_after_attach<N: NvimApi>(
        &self,
        session: &mut Session<N>,
    ) -> Result<(), NvrError> {
        if self.diff {
            session.set_diff_mode(true);
        }

        for cmd in &self.cc {
            run_command(session, cmd)?;
        }

        if self.previous_window {
            session.nvim().command("wincmd p")?;
        }

        let mut files = self.file_args();
        let mut vsplit = self.vsplit.clone();

        if let Some((mode, remote_files)) = self.remote_mode() {
            let args: Vec<String> = remote_files.iter().cloned().chain(files.drain(..)).collect();
            session.execute(Batch::from_args(&args), mode.verb, mode.wait)?;
        } else if self.diff && !files.is_empty() && vsplit.is_none() {
            // Emulate `vim -d`.
            vsplit = Some(std::mem::take(&mut files));
        }

        if let Some(keys) = &self.remote_send {
            session.nvim().input(keys)?;
        }

        if let Some(expr) = &self.remote_expr {
            print_expr(session, expr, &mut io::stdout())?;
        }

        if let Some(split) = &self.split {
            open_windows(session, join(split, files), Verb::Split)?;
        } else if let Some(vsplit) = vsplit {
            open_windows(session, join(&vsplit, files), Verb::VSplit)?;
        } else if let Some(tabs) = &self.tabedit {
            session.execute(Batch::from_args(&join(tabs, files)), Verb::TabEdit, false)?;
        } else {
            // Bare arguments act like --remote-silent.
            session.execute(Batch::from_args(&files), Verb::Edit, false)?;
        }

        if let Some(tag) = &self.tag {
            session
                .nvim()
                .command(&format!("tag {tag}"))
                .map_err(NvrError::Tag)?;
        }

        if let Some(errorfile) = &self.errorfile {
            load_quickfix(session, errorfile)?;
        }

        for cmd in &self.c {
            run_command(session, cmd)?;
        }

        Ok(())
    }
}

fn join(head: &[String], tail: Vec<String>) -> Vec<String> {
    head.iter().cloned().chain(tail).collect()
}

/// Run an Ex command; `-` reads the command from standard input.
fn run_command<N: NvimApi>(session: &mut Session<N>, cmd: &str) -> Result<(), NvrError> {
    let cmd = if cmd == "-" {
        session.read_input()?
    } else {
        cmd.to_string()
    };
    session.nvim().command(&cmd)?;
    Ok(())
}

/// Open files in split windows and equalize them.
///
/// Diffing against a running editor puts the files in a new tab first.
fn open_windows<N: NvimApi>(
    session: &mut Session<N>,
    args: Vec<String>,
    verb: Verb,
) -> Result<(), NvrError> {
    let mut batch = Batch::from_args(&args);
    if session.diff_mode() && !session.started_new_process() && !batch.targets.is_empty() {
        let first = Batch {
            targets: vec![batch.targets.remove(0)],
            commands: Vec::new(),
        };
        session.execute(first, Verb::TabEdit, false)?;
    }
    session.execute(batch, verb, false)?;
    session.nvim().command("wincmd =")?;
    Ok(())
}

/// Evaluate `expr` and print the result. A bad expression is only reported.
fn print_expr<N: NvimApi, W: Write>(
    session: &mut Session<N>,
    expr: &str,
    out: &mut W,
) -> Result<(), NvrError> {
    let expr = if expr == "-" {
        session.read_input()?
    } else {
        expr.to_string()
    };

    match session.nvim().eval(&expr) {
        Ok(value) => {
            out.write_all(EvalResult::from(value).to_output().as_bytes())?;
            out.flush()?;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Expression evaluation failed");
            eprintln!("No valid expression: {expr}");
            eprintln!("Test it in Neovim: :echo eval('...')");
            eprintln!("If you want to execute a command, use -c or -cc instead.");
        }
    }
    Ok(())
}

/// Fill the quickfix list from an errorfile (or stdin) and jump to the first entry.
///
/// The editor temporarily changes into our working directory so relative
/// paths in the errorfile resolve the way they do here.
fn load_quickfix<N: NvimApi>(session: &mut Session<N>, errorfile: &str) -> Result<(), NvrError> {
    let lines = if errorfile == "-" {
        session.input_lines()?
    } else {
        std::fs::read_to_string(errorfile)?
            .lines()
            .map(str::to_string)
            .collect()
    };

    let cwd = std::env::current_dir()?;
    let nvim = session.nvim();
    let escaped = nvim.fnameescape(&cwd.to_string_lossy())?;
    nvim.command(&format!("lcd {escaped}"))?;
    nvim.call_function("setqflist", vec![Value::Array(vec![])])?;

    for line in &lines {
        nvim.command(&format!("caddexpr '{}'", quickfix_escape(line)))?;
    }

    nvim.command("silent lcd -")?;
    nvim.command("cfirst")?;
    Ok(())
}

/// Quote an errorfile line as a single-quoted Vim string on a `caddexpr` line.
fn quickfix_escape(line: &str) -> String {
    line.trim_end().replace('\'', "''").replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvim::testing::FakeNvim;
    use clap::Parser;
    use std::io::Cursor;

    fn parse(args: &[&str]) -> App {
        App::parse_from(std::iter::once("nvr").chain(args.iter().copied()))
    }

    fn session(started: bool, input: &str) -> Session<FakeNvim> {
        Session::with_input(
            FakeNvim::new(),
            started,
            Box::new(Cursor::new(input.as_bytes().to_vec())),
        )
    }

    fn abs(name: &str) -> String {
        std::path::absolute(name)
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    fn commands(session: &Session<FakeNvim>) -> Vec<String> {
        session
            .nvim
            .commands()
            .into_iter()
            .filter(|c| !c.starts_with("augroup") && !c.starts_with("autocmd"))
            .collect()
    }

    #[test]
    fn test_option_order() {
        let app = parse(&[
            "--cc", "first", "-c", "last", "-l", "--remote-send", "ihi<esc>", "+cmd", "file",
        ]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();

        assert_eq!(
            commands(&session),
            vec![
                "first".to_string(),
                "wincmd p".to_string(),
                format!("edit {}", abs("file")),
                "cmd".to_string(),
                "last".to_string(),
            ]
        );
        assert!(session
            .nvim
            .calls
            .iter()
            .any(|(m, args)| m == "nvim_input" && args[0].as_str() == Some("ihi<esc>")));
    }

    #[test]
    fn test_remote_wait_counts_buffers() {
        let app = parse(&["--remote-tab-wait", "a", "b"]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();

        assert_eq!(
            commands(&session),
            vec![format!("tabedit {}", abs("a")), format!("tabedit {}", abs("b"))]
        );
        assert_eq!(session.outstanding(), 2);
    }

    #[test]
    fn test_split_equalizes_windows() {
        let app = parse(&["-o", "a", "b"]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();

        assert_eq!(
            commands(&session),
            vec![
                format!("split {}", abs("a")),
                format!("split {}", abs("b")),
                "wincmd =".to_string(),
            ]
        );
        assert_eq!(session.outstanding(), 0);
    }

    #[test]
    fn test_diff_against_running_editor() {
        let app = parse(&["-d", "a", "b"]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();

        assert_eq!(
            commands(&session),
            vec![
                format!("tabedit {}", abs("a")),
                "diffthis".to_string(),
                format!("vsplit {}", abs("b")),
                "diffthis".to_string(),
                "wincmd =".to_string(),
            ]
        );
        assert_eq!(session.outstanding(), 2);
    }

    #[test]
    fn test_diff_in_spawned_editor() {
        let app = parse(&["-d", "a", "b"]);
        let mut session = session(true, "");
        app.proceed_after_attach(&mut session).unwrap();

        assert_eq!(
            commands(&session),
            vec![
                format!("edit {}", abs("a")),
                "diffthis".to_string(),
                format!("vsplit {}", abs("b")),
                "diffthis".to_string(),
                "wincmd =".to_string(),
            ]
        );
        assert_eq!(session.outstanding(), 0);
    }

    #[test]
    fn test_double_dash_opens_plus_file() {
        let app = parse(&["--", "+foo"]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();
        assert_eq!(commands(&session), vec![format!("edit {}", abs("+foo"))]);
    }

    #[test]
    fn test_double_dash_with_remote_wait_and_split() {
        let app = parse(&["--remote-wait", "a", "--", "+b"]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();
        assert_eq!(
            commands(&session),
            vec![format!("edit {}", abs("a")), format!("edit {}", abs("+b"))]
        );
        assert_eq!(session.outstanding(), 2);

        let app = parse(&["-d", "-O", "a", "--", "+b"]);
        let mut session = self::session(false, "");
        app.proceed_after_attach(&mut session).unwrap();
        assert_eq!(
            commands(&session),
            vec![
                format!("tabedit {}", abs("a")),
                "diffthis".to_string(),
                format!("vsplit {}", abs("+b")),
                "diffthis".to_string(),
                "wincmd =".to_string(),
            ]
        );
    }

    #[test]
    fn test_command_from_stdin() {
        let app = parse(&["-c", "-"]);
        let mut session = session(false, "echo 'from stdin'");
        app.proceed_after_attach(&mut session).unwrap();
        assert_eq!(commands(&session), vec!["echo 'from stdin'"]);
    }

    #[test]
    fn test_tag_failure_is_fatal() {
        let app = parse(&["-t", "nosuchtag"]);
        let mut session = session(false, "");
        session.nvim.fail_on("tag", "Vim(tag):E426: Tag not found: nosuchtag");

        let err = app.proceed_after_attach(&mut session).unwrap_err();
        assert!(matches!(err, NvrError::Tag(_)));
    }

    #[test]
    fn test_quickfix_from_stdin() {
        let app = parse(&["-q", "-"]);
        let mut session = session(false, "src/a.rs:1:2: it's | bad  \nsrc/b.rs:3:4: ok\n");
        app.proceed_after_attach(&mut session).unwrap();

        let commands = commands(&session);
        assert!(commands[0].starts_with("lcd "));
        assert_eq!(
            commands[1..].to_vec(),
            vec![
                "caddexpr 'src/a.rs:1:2: it''s \\| bad'",
                "caddexpr 'src/b.rs:3:4: ok'",
                "silent lcd -",
                "cfirst",
            ]
        );
        assert!(session.nvim.functions().contains(&"setqflist".to_string()));
    }

    #[test]
    fn test_quickfix_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let errorfile = dir.path().join("errors.txt");
        std::fs::write(&errorfile, "main.c:10: error\n").unwrap();

        let app = parse(&["-q", errorfile.to_str().unwrap()]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();

        assert!(commands(&session).contains(&"caddexpr 'main.c:10: error'".to_string()));
    }

    #[test]
    fn test_print_expr() {
        let mut session = session(false, "");
        session
            .nvim
            .evals
            .insert("\"hello\"".to_string(), Value::from("hello"));

        let mut out = Vec::new();
        print_expr(&mut session, "\"hello\"", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
    }

    #[test]
    fn test_print_expr_from_stdin() {
        let mut session = session(false, "1 + 1");
        session.nvim.evals.insert("1 + 1".to_string(), Value::from(2));

        let mut out = Vec::new();
        print_expr(&mut session, "-", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2\n");
    }

    #[test]
    fn test_bad_expression_is_recovered() {
        let app = parse(&["--remote-expr", "nope(", "-c", "after"]);
        let mut session = session(false, "");
        app.proceed_after_attach(&mut session).unwrap();
        assert_eq!(commands(&session), vec!["after"]);
    }
}
