// ABOUTME: Thin wrappers over the git executable — staged diff, commit, log, and range diff.
// ABOUTME: Every call runs in an explicit working directory and fails with git's stderr.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, bail};

/// Run git in `dir` and return stdout.
fn run_git(dir: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// The diff of staged changes (empty when nothing is staged).
pub fn staged_diff(dir: &Path) -> anyhow::Result<String> {
    run_git(dir, &["diff", "--cached"])
}

/// The repository's git directory, resolved against `dir`.
pub fn git_dir(dir: &Path) -> anyhow::Result<PathBuf> {
    let out = run_git(dir, &["rev-parse", "--git-dir"])?;
    let path = PathBuf::from(out.trim());
    Ok(if path.is_absolute() { path } else { dir.join(path) })
}

/// Create a commit from the staged changes.
pub fn commit(dir: &Path, message: &str) -> anyhow::Result<()> {
    run_git(dir, &["commit", "-m", message]).map(|_| ())
}

/// Subjects of the commits in `origin/<base>..<head>`, one per line.
pub fn commit_subjects(dir: &Path, base: &str, head: &str) -> anyhow::Result<String> {
    let range = format!("origin/{base}..{head}");
    run_git(dir, &["log", &range, "--pretty=format:%s"])
}

/// The diff introduced by `head` since it diverged from `origin/<base>`.
pub fn range_diff(dir: &Path, base: &str, head: &str) -> anyhow::Result<String> {
    let range = format!("origin/{base}...{head}");
    run_git(dir, &["diff", &range])
}
