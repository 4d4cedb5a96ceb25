use crate::error::{Result, ScaffoldError};
use crate::storage::RunRecord;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use unicode_width::UnicodeWidthStr;

const WRAP_WIDTH: usize = 70;
const TAB_WIDTH: usize = 4;

/// Breaks a one-line command into shell continuation lines no wider than
/// 70 columns. Words are never split, so a single long word may overflow.
/// A word starting with `#` never opens a continuation line, since that line
/// would read back as a comment; it stays on the line before instead.
pub fn wrap_command(cmd: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in cmd.split_whitespace() {
        let word_width = UnicodeWidthStr::width(word);
        let indent = if lines.is_empty() { 0 } else { TAB_WIDTH };
        let fits = indent + current_width + 1 + word_width <= WRAP_WIDTH;
        if !current.is_empty() && !fits && !word.starts_with('#') {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_width += 1;
        }
        current.push_str(word);
        current_width += word_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let indent = if idx == 0 { "" } else { "\t" };
            let continuation = if idx == last { "" } else { " \\" };
            format!("{}{}{}", indent, line, continuation)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered listing of `runs` (oldest first). The newest run is numbered
/// 1, matching the index `replay` takes.
pub fn render_history(runs: &[RunRecord]) -> String {
    let mut output = String::new();
    for (idx, run) in runs.iter().enumerate() {
        let status = if run.success { "ok".to_string() } else { format!("exit {}", run.returncode) };
        let header = format!(
            "{}) {}  [{}, {:.2}s]",
            runs.len() - idx,
            run.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status,
            run.elapsed_time_seconds
        );
        output.push_str(&header);
        output.push('\n');
        output.push_str(&"-".repeat(UnicodeWidthStr::width(header.as_str())));
        output.push('\n');
        output.push_str(&wrap_command(&run.cmd));
        output.push('\n');
        if idx + 1 != runs.len() {
            output.push('\n');
        }
    }
    output
}

/// Arguments for paging `path`; `less` is told to start at the end.
pub fn pager_args(pager: &str, path: &Path) -> (String, Vec<String>) {
    let mut parts = pager.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_else(|| "less".to_string());
    let mut args: Vec<String> = parts.collect();
    let is_less = Path::new(&program)
        .file_name()
        .and_then(|s| s.to_str())
        .map_or(false, |name| name == "less");
    if is_less {
        args.push("+G".to_string());
    }
    args.push(path.display().to_string());
    (program, args)
}

/// Shows `path` in the pager and waits for it to exit.
pub fn page_file(pager: &str, path: &Path) -> Result<()> {
    let (program, args) = pager_args(pager, path);
    log::debug!("paging {} with {}", path.display(), program);
    let status = Command::new(&program)
        .args(&args)
        .status()
        .map_err(|source| ScaffoldError::Spawn { program: program.clone(), source })?;
    if !status.success() {
        log::warn!("{} exited with {}", program, status);
    }
    Ok(())
}

/// Writes `text` to a temporary file and pages it.
pub fn page_text(pager: &str, text: &str) -> Result<()> {
    let mut temp_file = tempfile::Builder::new()
        .prefix("scaffold-")
        .suffix(".txt")
        .tempfile()?;
    temp_file.write_all(text.as_bytes())?;
    temp_file.flush()?;
    page_file(pager, temp_file.path())
}
