use crate::compiler::compile;
use crate::display::{page_file, page_text, render_history, wrap_command};
use crate::environment::Environment;
use crate::error::{Result, ScaffoldError};
use crate::executor::ProcessRunner;
use crate::storage::RunRecord;
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Drives the edit → compile → run → record lifecycle against one
/// resolved environment.
pub struct Scaffold<'a> {
    env: &'a Environment,
    runner: ProcessRunner,
}

impl<'a> Scaffold<'a> {
    pub fn with_runner(env: &'a Environment, runner: ProcessRunner) -> Self {
        Self { env, runner }
    }

    /// Opens `text` (or the body of `template` when no text is given) in the
    /// editor, then compiles and runs the result. A run that starts is always
    /// recorded, whatever its exit code.
    pub fn run_scaffold(&self, text: Option<&str>, template: Option<&str>) -> Result<RunRecord> {
        let templates = self.env.template_store();
        let initial = match (text, template) {
            (Some(text), _) => text.to_string(),
            (None, Some(name)) => templates.get(name)?,
            (None, None) => return Err(ScaffoldError::NoTemplateSpecified),
        };

        let buffer = self.edit_buffer(&initial)?;
        let compilation = compile(&buffer, &templates)?;
        let command = compilation.command;
        if let Some(name) = &compilation.saved_template {
            log::debug!("buffer stored as template \"{}\"", name);
        }
        log::debug!("compiled tokens: {:?}", command.tokens);

        log::info!("Running command:\n\n{}\n", wrap_command(&command.display));
        let timestamp = Local::now();
        let outcome = self.runner.run(&command)?;

        let record = RunRecord::new(
            command.display,
            outcome.returncode,
            outcome.stdout,
            outcome.stderr,
            timestamp,
            outcome.elapsed_seconds,
            template.map(str::to_string),
        );
        self.env.history_store().append(&record)?;

        if !record.success {
            log::error!("Process exited with return code {}", record.returncode);
        }
        Ok(record)
    }

    /// Re-opens the k-th most recent run (1 = latest) as a fresh buffer.
    /// The replayed run gets its own history entry.
    pub fn replay(&self, k: usize) -> Result<RunRecord> {
        let previous = self.env.history_store().nth_from_end(k)?;
        log::debug!("replaying run {} from {}", k, previous.timestamp);
        self.run_scaffold(Some(&wrap_command(&previous.cmd)), None)
    }

    /// Pages the last `lines` runs, or every run when `lines` is `None`.
    pub fn show_history(&self, lines: Option<usize>) -> Result<()> {
        let history = self.env.history_store();
        let runs = match lines {
            Some(n) => history.recent(n)?,
            None => history.all()?,
        };
        if runs.is_empty() {
            println!("No runs recorded yet.");
            return Ok(());
        }
        page_text(&self.env.config.pager, &render_history(&runs))
    }

    pub fn clear_history(&self) -> Result<()> {
        self.env.history_store().clear()
    }

    pub fn list_templates(&self) -> Result<Vec<String>> {
        self.env.template_store().list()
    }

    pub fn show_template(&self, name: &str) -> Result<()> {
        let templates = self.env.template_store();
        templates.get(name)?;
        page_file(&self.env.config.pager, &templates.path_of(name))
    }

    pub fn delete_template(&self, name: &str) -> Result<()> {
        self.env.template_store().delete(name)
    }

    pub fn edit_config(&self) -> Result<()> {
        open_in_editor(&self.env.config.editor, &self.env.config_path)
    }

    fn edit_buffer(&self, initial: &str) -> Result<String> {
        let mut buffer = tempfile::Builder::new()
            .prefix("scaffold-")
            .suffix(".sh")
            .tempfile_in(&self.env.state)?;
        buffer.write_all(initial.as_bytes())?;
        buffer.flush()?;

        open_in_editor(&self.env.config.editor, buffer.path())?;
        // Editors may replace the file, so read it back by path.
        Ok(fs::read_to_string(buffer.path())?)
    }
}

/// Runs `<editor> <path>` and blocks until the editor exits. Extra words in
/// the editor setting are passed as leading arguments.
fn open_in_editor(editor: &str, path: &Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("nano");
    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .map_err(|source| ScaffoldError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !status.success() {
        log::warn!("editor {} exited with {}", program, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::full_disk_sink;
    use tempfile::TempDir;

    // `true` leaves the buffer exactly as it was written.
    fn sandbox() -> (TempDir, Environment) {
        let root = TempDir::new().unwrap();
        let mut env = Environment::resolve_in(root.path().join("share"), root.path().join("state")).unwrap();
        env.config.editor = "true".to_string();
        (root, env)
    }

    // Run through `sh` so the script never needs the exec bit.
    fn editor_script(root: &TempDir, body: &str) -> String {
        let path = root.path().join("editor.sh");
        fs::write(&path, format!("{}\n", body)).unwrap();
        format!("sh {}", path.display())
    }

    #[test]
    fn directive_buffer_saves_template_runs_and_records() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());

        let record = scaffold.run_scaffold(Some("# template_name=\"foo\"\necho hi\n"), None)?;

        assert_eq!(env.template_store().get("foo")?, "echo hi\n");
        assert_eq!(record.cmd, "echo hi");
        assert_eq!(record.returncode, 0);
        assert_eq!(record.stdout, "hi\n");

        let runs = env.history_store().all()?;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0], record);
        let line = fs::read_to_string(&env.history)?;
        let stored: serde_json::Value = serde_json::from_str(line.trim_end())?;
        assert_eq!(stored["success"], "True");
        Ok(())
    }

    #[test]
    fn comment_only_buffer_runs_and_records_nothing() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());
        let templates_before = env.template_store().list()?.len();

        let err = scaffold.run_scaffold(Some("   \n# comment\n"), None).unwrap_err();

        assert!(matches!(err, ScaffoldError::EmptyCommand));
        assert!(env.history_store().all()?.is_empty());
        assert_eq!(env.template_store().list()?.len(), templates_before);
        Ok(())
    }

    #[test]
    fn default_template_alone_is_an_empty_command() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());

        let err = scaffold.run_scaffold(None, Some("default")).unwrap_err();
        assert!(matches!(err, ScaffoldError::EmptyCommand));
        Ok(())
    }

    #[test]
    fn named_template_is_recorded_as_used() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        env.template_store().save("greet", "echo \\\n    hello\n")?;
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());

        let record = scaffold.run_scaffold(None, Some("greet"))?;
        assert_eq!(record.cmd, "echo hello");
        assert_eq!(record.template_used.as_deref(), Some("greet"));
        Ok(())
    }

    #[test]
    fn failing_command_is_still_recorded() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());

        let record = scaffold.run_scaffold(Some("echo oops 1>&2; exit 4\n"), None)?;
        assert_eq!(record.returncode, 4);
        assert!(!record.success);
        assert_eq!(record.stderr, "oops\n");
        assert_eq!(env.history_store().len()?, 1);
        Ok(())
    }

    #[test]
    fn run_is_recorded_when_echo_fails() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let runner = ProcessRunner::echoing_to(full_disk_sink, full_disk_sink);
        let scaffold = Scaffold::with_runner(&env, runner);

        let record = scaffold.run_scaffold(Some("echo hi; exit 0\n"), None)?;
        assert_eq!(record.stdout, "hi\n");
        assert_eq!(env.history_store().all()?, vec![record]);
        Ok(())
    }

    #[test]
    fn missing_inputs_are_reported() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());

        assert!(matches!(
            scaffold.run_scaffold(None, None),
            Err(ScaffoldError::NoTemplateSpecified)
        ));
        assert!(matches!(
            scaffold.run_scaffold(None, Some("nope")),
            Err(ScaffoldError::TemplateNotFound { .. })
        ));
        assert!(env.history_store().all()?.is_empty());
        Ok(())
    }

    #[test]
    fn editor_changes_are_what_runs() -> anyhow::Result<()> {
        let (root, mut env) = sandbox();
        env.config.editor = editor_script(&root, "printf 'echo edited\\n' > \"$1\"");
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());

        let record = scaffold.run_scaffold(Some("echo original\n"), None)?;
        assert_eq!(record.stdout, "edited\n");
        Ok(())
    }

    #[test]
    fn replay_writes_a_new_record() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());
        let first = scaffold.run_scaffold(Some("echo first\n"), None)?;
        scaffold.run_scaffold(Some("echo second\n"), None)?;

        let replayed = scaffold.replay(2)?;
        assert_eq!(replayed.cmd, first.cmd);
        assert_eq!(replayed.stdout, "first\n");

        let runs = env.history_store().all()?;
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], first);
        assert_eq!(env.history_store().nth_from_end(1)?, replayed);
        Ok(())
    }

    #[test]
    fn replay_out_of_range_runs_nothing() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());
        scaffold.run_scaffold(Some("echo only\n"), None)?;

        assert!(matches!(
            scaffold.replay(2),
            Err(ScaffoldError::IndexOutOfRange { index: 2, len: 1 })
        ));
        assert_eq!(env.history_store().len()?, 1);
        Ok(())
    }

    #[test]
    fn clear_history_then_nothing_remains() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());
        scaffold.run_scaffold(Some("true\n"), None)?;

        scaffold.clear_history()?;
        assert!(env.history_store().all()?.is_empty());
        Ok(())
    }

    #[test]
    fn template_listing_and_deletion() -> anyhow::Result<()> {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());
        env.template_store().save("extra", "ls\n")?;

        let mut names = scaffold.list_templates()?;
        names.sort();
        assert_eq!(names, ["default", "extra"]);

        scaffold.delete_template("extra")?;
        assert_eq!(scaffold.list_templates()?, ["default"]);
        assert!(scaffold.delete_template("extra").is_err());
        Ok(())
    }

    #[test]
    fn showing_unknown_template_fails_before_paging() {
        let (_root, env) = sandbox();
        let scaffold = Scaffold::with_runner(&env, ProcessRunner::quiet());
        assert!(matches!(
            scaffold.show_template("ghost"),
            Err(ScaffoldError::TemplateNotFound { .. })
        ));
    }
}
