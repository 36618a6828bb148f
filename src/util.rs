use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

// -------- environment list/flag parsing --------

/// Split a list value. Commas and semicolons always separate entries; whitespace and `+`
/// separate too when `split_spaces` is set (channel names cannot contain either).
pub fn split_list(raw: &str, split_spaces: bool) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || (split_spaces && (c.is_whitespace() || c == '+')))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read `name` from the environment as a list (empty if unset).
pub fn env_list(name: &str, split_spaces: bool) -> Vec<String> {
    std::env::var(name).map(|s| split_list(&s, split_spaces)).unwrap_or_default()
}

/// Read `name` as a boolean flag. `None` if unset or blank.
pub fn env_bool(name: &str) -> Result<Option<bool>> {
    let Ok(raw) = std::env::var(name) else { return Ok(None) };
    match raw.trim().to_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => bail!("{} must be a boolean, got {:?}", name, other),
    }
}

/// Read a newline-separated list file; blank lines and `#` comments are skipped.
pub fn read_list_file(path: &Path) -> Result<Vec<String>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        let t = line.trim();
        if !t.is_empty() && !t.starts_with('#') {
            out.push(t.to_string());
        }
    }
    Ok(out)
}

// -------- robust append-open with backoff --------

/// Return true for transient I/O errors worth retrying: interrupted calls and, on Windows,
/// the sharing/lock violations seen when AV or backup filter drivers hold a file.
fn is_retriable_io_error(e: &io::Error) -> bool {
    if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) {
        return true;
    }
    is_retriable_os_code(e.raw_os_error())
}

#[cfg(windows)]
fn is_retriable_os_code(code: Option<i32>) -> bool {
    //   32  = Sharing violation
    //   33  = Lock violation
    //   225 = AV/PUA blocked file
    //   21  = Device not ready
    matches!(code, Some(32) | Some(33) | Some(225) | Some(21))
}

// Unix errno values with these numbers (EISDIR, EPIPE, EDOM) are permanent.
#[cfg(not(windows))]
fn is_retriable_os_code(_code: Option<i32>) -> bool {
    false
}

/// Open `path` for appending (creating it if missing) with retries for transient errors.
/// Returns the file and whether it was empty at open time.
pub fn open_append_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<(File, bool)> {
    let mut last_err: Option<io::Error> = None;
    let tries = tries.max(1);
    for i in 0..tries {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => {
                let empty = f.metadata()?.len() == 0;
                return Ok((f, empty));
            }
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                std::thread::sleep(Duration::from_millis(delay_ms.saturating_mul((i + 1) as u64)));
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "open for append failed")))
}
