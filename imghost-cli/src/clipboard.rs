use std::io::{self, Write};
use std::process::{Command, Stdio};

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Clipboard programs tried in order, with the arguments that make them read
/// stdin into the clipboard.
const PROGRAMS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip", &[]),
];

#[derive(Debug, PartialEq)]
pub enum CopyMethod {
    Program(&'static str),
    /// OSC 52 escape sequence, handled by the terminal emulator.
    Terminal,
}

fn copy_with_program(program: &str, args: &[&str], text: &str) -> io::Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "no stdin")),
    };
    if let Err(err) = written {
        // Reap the child before reporting the failed write.
        let _ = child.kill();
        let _ = child.wait();
        return Err(err);
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exited with {}", program, status),
        ))
    }
}

pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

/// Puts `text` on the clipboard, falling back to asking the terminal to do it
/// when no clipboard program works.
pub fn copy(text: &str, terminal: &mut impl Write) -> io::Result<CopyMethod> {
    for &(program, args) in PROGRAMS {
        match copy_with_program(program, args, text) {
            Ok(()) => return Ok(CopyMethod::Program(program)),
            Err(err) => log::debug!("clipboard via {} failed: {}", program, err),
        }
    }

    terminal.write_all(osc52_sequence(text).as_bytes())?;
    terminal.flush()?;
    Ok(CopyMethod::Terminal)
}
