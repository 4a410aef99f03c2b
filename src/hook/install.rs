// ABOUTME: Hook installer — writes the commit-msg script into a repository's hooks directory.
// ABOUTME: An existing hook is copied to commit-msg.backup before being replaced.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub const HOOK_NAME: &str = "commit-msg";
const HOOK_SCRIPT: &str = include_str!("commit-msg.sh");

/// Where the hook went and what it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub hook_path: PathBuf,
    pub backup_path: Option<PathBuf>,
}

/// Install the commit-msg hook into `hooks_dir`, creating the directory if needed.
pub fn install_commit_msg_hook(hooks_dir: &Path) -> anyhow::Result<InstallReport> {
    fs::create_dir_all(hooks_dir)
        .with_context(|| format!("failed to create {}", hooks_dir.display()))?;

    let hook_path = hooks_dir.join(HOOK_NAME);
    let backup_path = if hook_path.exists() {
        let backup = hooks_dir.join(format!("{HOOK_NAME}.backup"));
        fs::copy(&hook_path, &backup)
            .with_context(|| format!("failed to back up {}", hook_path.display()))?;
        Some(backup)
    } else {
        None
    };

    fs::write(&hook_path, HOOK_SCRIPT)
        .with_context(|| format!("failed to write {}", hook_path.display()))?;
    make_executable(&hook_path)?;

    Ok(InstallReport {
        hook_path,
        backup_path,
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
