// ABOUTME: Command handlers — wires the session lifecycle, oracle, tracker, and git together.
// ABOUTME: Prints user-facing results; sequence mistakes are warnings with a zero exit code.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::config::{Config, Switches};
use crate::git;
use crate::hook::{self, HookContext, HookVerdict};
use crate::oracle::{
    AlignmentReport, IntentValidator, Oracle, OracleOutcome, VulnerabilityReport, create_oracle,
};
use crate::report;
use crate::session::{
    CloseOutcome, CommitOutcome, Lifecycle, SessionStore, StartOutcome, blocks_commit,
};
use crate::tracker::{JiraClient, extract_issue_ids};

/// Per-invocation state shared by every command.
pub struct App {
    config: Config,
    switches: Switches,
    workdir: PathBuf,
    store: SessionStore,
    /// Used instead of the configured provider when set.
    oracle: Option<Arc<dyn Oracle>>,
}

impl App {
    pub fn new(config: Config, switches: Switches, workdir: PathBuf) -> Self {
        let store = SessionStore::new(workdir.join(crate::session::store::INTENT_DIR_NAME));
        Self {
            config,
            switches,
            workdir,
            store,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// An oracle-backed validator, or `None` (with a warning) when it cannot be built.
    fn validator(&self) -> Option<IntentValidator> {
        if !self.switches.ai_enabled {
            return None;
        }
        let oracle = match &self.oracle {
            Some(oracle) => Ok(Arc::clone(oracle)),
            None => create_oracle(&self.config.llm),
        };
        match oracle {
            Ok(oracle) => {
                let history = self
                    .store
                    .recent_scores(self.config.validation.history_limit);
                Some(IntentValidator::new(oracle).with_history(history))
            }
            Err(e) => {
                println!("⚠️  AI validation unavailable: {e}");
                None
            }
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.llm.timeout_seconds)
    }

    pub fn start(&self, intent: &str) -> anyhow::Result<ExitCode> {
        match Lifecycle::new(&self.store).start(intent)? {
            StartOutcome::Started(session) => {
                println!("✓ Intent started: {}", session.intent_text);
            }
            StartOutcome::AlreadyActive(existing) => {
                println!("⚠️  Active intent already exists: {}", existing.intent_text);
                println!("Please close the current intent before starting a new one.");
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    pub async fn commit(&self, message: &str, validate: bool, scan: bool) -> anyhow::Result<ExitCode> {
        let lifecycle = Lifecycle::new(&self.store);
        let Some(session) = lifecycle.current() else {
            println!("⚠️  No active intent found. Start an intent first with 'intent start'");
            return Ok(ExitCode::SUCCESS);
        };

        let diff = git::staged_diff(&self.workdir).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read staged diff");
            String::new()
        });

        let mut validation = None;
        let mut security = None;
        let wants_oracle = validate || scan;
        if self.switches.skip_validation {
            println!("Validation skipped ({}).", crate::config::SKIP_VALIDATION_ENV);
        } else if wants_oracle && diff.trim().is_empty() {
            println!("No staged changes; skipping validation.");
        } else if wants_oracle {
            if let Some(validator) = self.validator() {
                if validate {
                    let outcome = validator.score_alignment(&session.intent_text, &diff).await;
                    print_alignment(&outcome);
                    validation = outcome.into_ok();
                }
                if scan {
                    let outcome = validator.scan_vulnerabilities(&diff).await;
                    print_scan(&outcome);
                    security = outcome.into_ok();
                }
            }
        }

        // git goes first so a rejected commit never shows up in the session.
        let has_changes = !diff.trim().is_empty();
        if has_changes && !blocks_commit(security.as_ref()) {
            git::commit(&self.workdir, message)
                .context("git commit failed; the commit was not recorded")?;
        }

        match lifecycle.record_commit(message, validation, security)? {
            CommitOutcome::NoActiveSession => {
                println!("⚠️  No active intent found. Start an intent first with 'intent start'");
                Ok(ExitCode::SUCCESS)
            }
            CommitOutcome::Blocked(_) => {
                println!("✗ Commit blocked: critical security findings. The attempt was recorded.");
                Ok(ExitCode::FAILURE)
            }
            CommitOutcome::Recorded(session) => {
                println!("✓ Commit recorded: {message}");
                println!("Intent: {}", session.intent_text);
                if has_changes {
                    println!("✓ Changes committed to git");
                }
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    pub fn close(&self) -> anyhow::Result<ExitCode> {
        match Lifecycle::new(&self.store).close()? {
            CloseOutcome::NoActiveSession => println!("⚠️  No active intent found."),
            CloseOutcome::Closed(summary) => {
                println!();
                println!("{summary}");
                println!();
                println!("✓ Intent session closed");
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    pub fn status(&self) -> anyhow::Result<ExitCode> {
        match self.store.load_current() {
            Some(session) => {
                println!("Intent: {}", session.intent_text);
                println!("Started: {}", session.started_at.to_rfc3339());
                println!("Commits: {}", session.commits.len());
                for (i, commit) in session.commits.iter().enumerate() {
                    let score = commit
                        .validation
                        .as_ref()
                        .map(|v| format!("{}/10", v.score))
                        .unwrap_or_else(|| "-".to_string());
                    let flag = if commit.blocked { " [blocked]" } else { "" };
                    println!("  {}. {} (alignment {score}){flag}", i + 1, commit.message);
                }
            }
            None => println!("No active intent."),
        }
        println!("Closed sessions: {}", self.store.history_paths().len());
        Ok(ExitCode::SUCCESS)
    }

    pub fn install_hooks(&self) -> anyhow::Result<ExitCode> {
        let git_dir = match git::git_dir(&self.workdir) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::debug!(error = %e, "git rev-parse failed");
                println!("[ERROR] Not in a git repository!");
                return Ok(ExitCode::FAILURE);
            }
        };
        let installed = hook::install_commit_msg_hook(&git_dir.join("hooks"))?;
        if let Some(backup) = &installed.backup_path {
            println!("[INFO] Backed up existing hook to {}", backup.display());
        }
        println!("[SUCCESS] Git hook installed: {}", installed.hook_path.display());
        println!();
        println!("The hook will:");
        println!("  1. Require an issue ID in the commit message (e.g., PROJ-123)");
        println!("  2. Fetch the story from Jira");
        println!("  3. Validate the staged changes against the story with AI");
        println!("  4. Block commits that don't match the story");
        println!();
        println!("Configure credentials in .env:");
        println!("  JIRA_URL=https://your-company.atlassian.net");
        println!("  JIRA_EMAIL=your.email@example.com");
        println!("  JIRA_API_TOKEN=your_token_here");
        println!("  OPENAI_API_KEY=your_openai_key");
        println!();
        println!("To skip validation:   SKIP_INTENT_VALIDATION=1 git commit -m 'message'");
        println!("To disable AI checks: ENABLE_AI_VALIDATION=false git commit -m 'PROJ-123: message'");
        Ok(ExitCode::SUCCESS)
    }

    pub async fn check_commit_msg(&self, message_file: &Path) -> anyhow::Result<ExitCode> {
        let raw = std::fs::read_to_string(message_file)
            .with_context(|| format!("failed to read {}", message_file.display()))?;
        let message = hook::strip_comments(&raw);

        let active = !self.switches.skip_validation && self.switches.ai_enabled;
        let diff = if active {
            git::staged_diff(&self.workdir).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not read staged diff");
                String::new()
            })
        } else {
            String::new()
        };
        let tracker = if active {
            JiraClient::from_env(&self.config.jira, self.timeout())
                .map_err(|e| tracing::warn!(error = %e, "issue tracker unavailable"))
                .ok()
        } else {
            None
        };
        let validator = if active { self.validator() } else { None };

        let ctx = HookContext {
            switches: self.switches,
            min_alignment_score: self.config.validation.min_alignment_score,
            scan_security: self.config.validation.scan_security,
            tracker: tracker.as_ref().map(|t| t as &dyn crate::tracker::IssueTracker),
            validator: validator.as_ref(),
        };
        let verdict = hook::check_message(&message, &diff, &ctx).await;
        match &verdict {
            HookVerdict::Pass(m) => println!("[intent] ✓ {m}"),
            HookVerdict::Warn(m) => println!("[intent] ⚠️  {m}"),
            HookVerdict::Block(m) => {
                println!("[intent] ✗ Commit blocked: {m}");
                println!("[intent] Set SKIP_INTENT_VALIDATION=1 to bypass.");
            }
        }
        Ok(if verdict.is_blocked() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    pub async fn validate_pr(&self, base: Option<String>, head: Option<String>) -> anyhow::Result<ExitCode> {
        let base = base.or_else(|| std::env::var("GITHUB_BASE_REF").ok());
        let head = head.or_else(|| std::env::var("GITHUB_SHA").ok());
        let (Some(base), Some(head)) = (base, head) else {
            bail!("a base ref and head sha are required (--base/--head or GITHUB_BASE_REF/GITHUB_SHA)");
        };
        println!("Validating PR: {base}..{head}");

        let subjects = git::commit_subjects(&self.workdir, &base, &head)?;
        let issue_ids = extract_issue_ids(&subjects);
        println!("Found issue IDs: {}", issue_ids.join(", "));
        let diff = git::range_diff(&self.workdir, &base, &head)?;

        let validation = if issue_ids.is_empty() || diff.trim().is_empty() {
            report::PrValidation {
                results: Vec::new(),
                critical_issues: false,
            }
        } else {
            let tracker = JiraClient::from_env(&self.config.jira, self.timeout())?;
            let Some(validator) = self.validator() else {
                bail!("AI validation is required for PR validation");
            };
            report::validate_stories(&issue_ids, &diff, &tracker, &validator).await
        };

        let results_path = self.workdir.join("validation_results.json");
        std::fs::write(&results_path, serde_json::to_string_pretty(&validation)?)
            .with_context(|| format!("failed to write {}", results_path.display()))?;
        let comment = report::render_comment(&validation);
        let comment_path = self.workdir.join("pr_comment.md");
        std::fs::write(&comment_path, &comment)
            .with_context(|| format!("failed to write {}", comment_path.display()))?;

        println!("{comment}");
        if validation.critical_issues {
            println!("CRITICAL: some stories are severely misaligned.");
            return Ok(ExitCode::FAILURE);
        }
        println!("All validations passed.");
        Ok(ExitCode::SUCCESS)
    }
}

fn print_alignment(outcome: &OracleOutcome<AlignmentReport>) {
    match outcome.ok() {
        Some(report) => {
            println!(
                "Alignment: {}/10 ({}, confidence {}%)",
                report.score, report.alignment, report.confidence
            );
            for discrepancy in report.discrepancies.iter().take(3) {
                println!("  - {discrepancy}");
            }
        }
        None => println!(
            "⚠️  Alignment unknown: {}",
            outcome.error().unwrap_or_default()
        ),
    }
}

fn print_scan(outcome: &OracleOutcome<VulnerabilityReport>) {
    match outcome.ok() {
        Some(report) => {
            println!("Security: {}", report.severity);
            for finding in &report.findings {
                let location = finding.location.as_deref().unwrap_or("?");
                println!(
                    "  - [{}] {} ({location})",
                    finding.severity, finding.description
                );
            }
        }
        None => println!(
            "⚠️  Security: {} ({})",
            outcome.severity(),
            outcome.error().unwrap_or_default()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::process::Command;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::oracle::{OracleError, OracleRequest};

    fn app(dir: &Path) -> App {
        App::new(Config::default(), Switches::default(), dir.to_path_buf())
    }

    struct ScriptedOracle {
        replies: Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete(&self, _request: &OracleRequest) -> Result<String, OracleError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .map(String::from)
                .ok_or(OracleError::EmptyReply)
        }
    }

    fn scripted(replies: &[&'static str]) -> Arc<dyn Oracle> {
        Arc::new(ScriptedOracle {
            replies: Mutex::new(replies.iter().copied().collect()),
        })
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git").args(args).current_dir(dir).output().unwrap();
        assert!(out.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&out.stderr));
        String::from_utf8_lossy(&out.stdout).into_owned()
    }

    /// A fresh repository with `login.py` staged and no commits yet.
    fn repo_with_staged_change() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "dev@example.com"]);
        git(dir, &["config", "user.name", "Dev"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
        let hooks = dir.join(".git").join("hooks");
        git(dir, &["config", "core.hooksPath", hooks.to_str().unwrap()]);
        std::fs::write(dir.join("login.py"), "def login():\n    return redirect(oauth_url)\n").unwrap();
        git(dir, &["add", "login.py"]);
        tmp
    }

    fn skipping() -> Switches {
        Switches {
            skip_validation: true,
            ai_enabled: true,
        }
    }

    const ALIGNED: &str = r#"{"score": 9, "confidence": 90, "alignment": "aligned"}"#;
    const CRITICAL_SCAN: &str = r#"{"overall_severity": "CRITICAL", "confidence": 95,
        "vulnerabilities": [{"type": "secrets", "severity": "CRITICAL",
        "description": "hardcoded API key", "location": "login.py:2"}]}"#;

    #[tokio::test]
    async fn commit_runs_git_then_records() {
        if !git_available() {
            return;
        }
        let repo = repo_with_staged_change();
        let app = App::new(Config::default(), skipping(), repo.path().to_path_buf());
        app.start("Add OAuth2 login").unwrap();

        let code = app.commit("PROJ-1: add login", true, true).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(git(repo.path(), &["diff", "--cached"]).is_empty());
        let session = app.store().load_current().unwrap();
        assert_eq!(session.commits.len(), 1);
        assert!(!session.commits[0].blocked);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_git_commit_is_not_recorded() {
        use std::os::unix::fs::PermissionsExt;

        if !git_available() {
            return;
        }
        let repo = repo_with_staged_change();
        let hook = repo.path().join(".git").join("hooks").join("commit-msg");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(&hook, "#!/bin/sh\necho 'missing issue id' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        let app = App::new(Config::default(), skipping(), repo.path().to_path_buf());
        app.start("Add OAuth2 login").unwrap();

        let err = app.commit("add login", true, true).await.unwrap_err();
        assert!(format!("{err:#}").contains("not recorded"));
        assert!(app.store().load_current().unwrap().commits.is_empty());
        assert!(!git(repo.path(), &["diff", "--cached"]).is_empty());
    }

    #[tokio::test]
    async fn critical_scan_blocks_git_commit() {
        if !git_available() {
            return;
        }
        let repo = repo_with_staged_change();
        let app = App::new(Config::default(), Switches::default(), repo.path().to_path_buf())
            .with_oracle(scripted(&[ALIGNED, CRITICAL_SCAN]));
        app.start("Add OAuth2 login").unwrap();

        let code = app.commit("PROJ-1: add login", true, true).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        assert!(git(repo.path(), &["diff", "--cached"]).contains("+def login():"));

        let session = app.store().load_current().unwrap();
        assert_eq!(session.commits.len(), 1);
        assert!(session.commits[0].blocked);
        assert_eq!(session.commits[0].validation.as_ref().unwrap().score, 9);
    }

    #[tokio::test]
    async fn commit_without_intent_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        let code = app.commit("Some commit", true, true).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(!app.store().dir().exists());
    }

    #[test]
    fn start_twice_keeps_first_intent() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        app.start("First intent").unwrap();
        assert_eq!(app.start("Second intent").unwrap(), ExitCode::SUCCESS);
        assert_eq!(app.store().load_current().unwrap().intent_text, "First intent");
    }

    #[test]
    fn close_without_intent_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(app(tmp.path()).close().unwrap(), ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn check_commit_msg_blocks_without_issue_id() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("COMMIT_EDITMSG");
        std::fs::write(&file, "fix stuff\n# comment\n").unwrap();
        let switches = Switches {
            skip_validation: false,
            ai_enabled: false,
        };
        let app = App::new(Config::default(), switches, tmp.path().to_path_buf());
        assert_eq!(app.check_commit_msg(&file).await.unwrap(), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn check_commit_msg_skip_switch_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("COMMIT_EDITMSG");
        std::fs::write(&file, "fix stuff\n").unwrap();
        let switches = Switches {
            skip_validation: true,
            ai_enabled: true,
        };
        let app = App::new(Config::default(), switches, tmp.path().to_path_buf());
        assert_eq!(app.check_commit_msg(&file).await.unwrap(), ExitCode::SUCCESS);
    }
}
