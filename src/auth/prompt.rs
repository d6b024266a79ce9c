//! Password entry on the controlling terminal.
//!
//! On a terminal the password is read key by key in raw mode so nothing is
//! echoed. Piped input falls back to reading one line.

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use secrecy::SecretString;

#[derive(Debug, PartialEq, Eq)]
enum Entry {
    Pending,
    Done,
    Cancelled,
}

/// Apply one key to the password typed so far.
fn apply_key(buffer: &mut String, key: KeyEvent) -> Entry {
    if key.kind == KeyEventKind::Release {
        return Entry::Pending;
    }
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => Entry::Done,
        KeyCode::Esc => Entry::Cancelled,
        KeyCode::Char('c' | 'd') if control => Entry::Cancelled,
        KeyCode::Char('u') if control => {
            buffer.clear();
            Entry::Pending
        }
        KeyCode::Backspace => {
            buffer.pop();
            Entry::Pending
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            Entry::Pending
        }
        _ => Entry::Pending,
    }
}

/// Print `prompt` to stderr and read a non-empty password.
pub fn prompt_password(prompt: &str) -> Result<SecretString> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let password = if std::io::stdin().is_terminal() {
        let typed = read_hidden();
        // Enter was swallowed along with everything else
        writeln!(stderr)?;
        typed?
    } else {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password")?;
        line.trim_end_matches(['\r', '\n']).to_string()
    };

    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(SecretString::from(password))
}

fn read_hidden() -> Result<String> {
    enable_raw_mode().context("Failed to switch off terminal echo")?;
    let typed = read_keys();
    let restored = disable_raw_mode();
    let password = typed?;
    restored.context("Failed to restore terminal")?;
    Ok(password)
}

fn read_keys() -> Result<String> {
    let mut buffer = String::new();
    loop {
        let Event::Key(key) = event::read().context("Failed to read password")? else {
            continue;
        };
        match apply_key(&mut buffer, key) {
            Entry::Pending => {}
            Entry::Done => return Ok(buffer),
            Entry::Cancelled => bail!("Password entry cancelled"),
        }
    }
}
