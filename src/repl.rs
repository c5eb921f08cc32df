//! The read-eval-print loop.
//!
//! Each line compiles to an anonymous closure and runs on the persistent
//! thread; errors are trapped per line, printed, and the stack cleared.
//! A transcript of the session is appended to the log file.

use std::io::{BufRead, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;
use crate::parser::compile;
use crate::vm::Thread;

fn run_line(th: &mut Thread, line: &str) -> crate::Result<()> {
    let fun = compile(th, line)?;
    th.call_fun(&fun)
}

fn log_line(log: &mut Option<std::fs::File>, line: &str) {
    if let Some(file) = log {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let _ = writeln!(file, "[{stamp}] {line}");
    }
}

/// Run the interactive loop until end of input or `quit`.
pub fn repl(th: &mut Thread, log_path: &Path) {
    println!("------------------------------------------------");
    println!("A tool for the expression of sound as pure form.");
    println!("------------------------------------------------");

    let mut log = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_path)
        .ok();
    if log.is_none() {
        tracing::warn!("no transcript log at {}", log_path.display());
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("sapf> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        log_line(&mut log, &line);
        match run_line(th, &line) {
            Ok(()) => match th.print_stack() {
                Ok(s) if !s.is_empty() => println!("{s}"),
                Ok(_) => {}
                Err(e) => {
                    println!("error : {e}");
                    th.clear_stack();
                }
            },
            Err(Error::UserQuit) => break,
            Err(e) => {
                println!("error : {e}");
                log_line(&mut log, &format!("error : {e}"));
                th.clear_stack();
            }
        }
    }
    #[cfg(feature = "audio")]
    crate::play::stop_all();
}
