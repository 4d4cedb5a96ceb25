use crate::error::{Result, ScaffoldError};
use crate::template_store::{is_valid_template_name, TemplateStore};
use regex::Regex;
use std::sync::OnceLock;

fn directive_regex() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| {
        Regex::new(r#"^#\s*template_name\s*=\s*"([^"]*)""#).expect("directive pattern is valid")
    })
}

/// What a single buffer line contributes to the command.
#[derive(Debug, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// First-line `# template_name="..."`, carrying the raw captured name
    Directive(&'a str),
    Comment,
    Blank,
    Content(&'a str),
}

pub fn classify(line: &str, is_first: bool) -> LineKind<'_> {
    if is_first {
        if let Some(caps) = directive_regex().captures(line) {
            if let Some(name) = caps.get(1) {
                return LineKind::Directive(name.as_str());
            }
        }
    }
    let trimmed = line.trim_start();
    if trimmed.trim_end().is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with('#') {
        LineKind::Comment
    } else {
        LineKind::Content(line)
    }
}

/// The sanitized command ready to run. `display` is always the tokens
/// joined by single spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCommand {
    pub tokens: Vec<String>,
    pub display: String,
}

impl CompiledCommand {
    fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(ScaffoldError::EmptyCommand);
        }
        let display = tokens.join(" ");
        Ok(Self { tokens, display })
    }
}

#[derive(Debug)]
pub struct Compilation {
    pub command: CompiledCommand,
    /// Name under which the buffer was stored as a template, if it was
    pub saved_template: Option<String>,
}

/// Drops the line ending and one trailing continuation backslash, then
/// collapses whitespace runs.
fn sanitize_line(line: &str) -> String {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let line = line.strip_suffix('\\').unwrap_or(line);
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns an edited scaffold buffer into a command. A valid first-line
/// directive stores the rest of the buffer in `templates` before the
/// command is compiled.
pub fn compile(buffer: &str, templates: &TemplateStore) -> Result<Compilation> {
    let lines: Vec<&str> = buffer.split_inclusive('\n').collect();

    let mut saved_template = None;
    let mut content = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        match classify(line, idx == 0) {
            LineKind::Directive(name) => {
                if !is_valid_template_name(name) {
                    log::debug!("\"{}\" is not a valid template name, will not be saved as a template.", name);
                    continue;
                }
                let body: String = lines[1..].concat();
                if templates.save(name, &body)? {
                    saved_template = Some(name.to_string());
                }
            }
            LineKind::Comment | LineKind::Blank => {}
            LineKind::Content(text) => content.push(sanitize_line(text)),
        }
    }
    if saved_template.is_none() {
        log::debug!("Will not be saved as a template.");
    }

    let tokens: Vec<String> = content
        .join(" ")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let command = CompiledCommand::from_tokens(tokens)?;
    Ok(Compilation {
        command,
        saved_template,
    })
}
