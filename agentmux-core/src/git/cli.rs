use super::{DiscoveredWorktree, GitOps, parse_worktree_porcelain};
use crate::status::GitStatus;
use anyhow::{Result, bail};
use std::path::Path;
use std::process::Command;

pub struct CliGitOps;

fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).current_dir(repo).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

impl GitOps for CliGitOps {
    fn create_workspace(&self, repo: &Path, branch: &str, base: &str, root: &Path) -> Result<()> {
        run_git(
            repo,
            &[
                "worktree",
                "add",
                "-b",
                branch,
                &root.to_string_lossy(),
                base,
            ],
        )?;
        Ok(())
    }

    fn remove_workspace(&self, repo: &Path, root: &Path) -> Result<()> {
        run_git(
            repo,
            &["worktree", "remove", "--force", &root.to_string_lossy()],
        )?;
        Ok(())
    }

    fn delete_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        run_git(repo, &["branch", "-D", branch])?;
        Ok(())
    }

    fn discover_workspaces(&self, repo: &Path) -> Vec<DiscoveredWorktree> {
        match run_git(repo, &["worktree", "list", "--porcelain"]) {
            Ok(stdout) => parse_worktree_porcelain(&stdout),
            Err(e) => {
                log::warn!("worktree discovery failed for {}: {e}", repo.display());
                Vec::new()
            }
        }
    }

    fn is_git_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn current_branch(&self, repo: &Path) -> Option<String> {
        let stdout = run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).ok()?;
        let branch = stdout.trim().to_string();
        if branch.is_empty() { None } else { Some(branch) }
    }

    fn base_branch(&self, repo: &Path) -> Option<String> {
        // Prefer the remote HEAD when one is recorded.
        if let Ok(stdout) = run_git(repo, &["symbolic-ref", "refs/remotes/origin/HEAD"]) {
            let name = stdout
                .trim()
                .strip_prefix("refs/remotes/origin/")
                .map(ToString::to_string);
            if let Some(name) = name
                && !name.is_empty()
            {
                return Some(name);
            }
        }
        // Fall back to a conventional local branch.
        for candidate in ["main", "master"] {
            let probe = format!("refs/heads/{candidate}");
            if run_git(repo, &["rev-parse", "--verify", "--quiet", &probe]).is_ok() {
                return Some(candidate.to_string());
            }
        }
        None
    }

    fn status(&self, root: &Path, line_stats: bool) -> Result<GitStatus> {
        let porcelain = run_git(root, &["status", "--porcelain=v1", "-b"])?;
        let mut status = parse_status_porcelain(&porcelain);
        if line_stats {
            // Unstaged and staged line churn against HEAD in one pass.
            if let Ok(numstat) = run_git(root, &["diff", "--numstat", "HEAD"]) {
                let (additions, deletions) = parse_numstat(&numstat);
                status.additions = additions;
                status.deletions = deletions;
            }
            status.has_line_stats = true;
        }
        Ok(status)
    }
}

fn parse_status_porcelain(output: &str) -> GitStatus {
    let mut status = GitStatus::default();
    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            let name = header
                .split("...")
                .next()
                .unwrap_or(header)
                .trim()
                .to_string();
            if !name.starts_with("No commits yet") {
                status.branch = Some(name);
            }
            continue;
        }
        let mut chars = line.chars();
        let x = chars.next().unwrap_or(' ');
        let y = chars.next().unwrap_or(' ');
        if x == '?' && y == '?' {
            status.untracked += 1;
            continue;
        }
        if x != ' ' {
            status.staged += 1;
        }
        if y != ' ' {
            status.unstaged += 1;
        }
    }
    status
}

fn parse_numstat(output: &str) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        // Binary files report "-" for both counts; skip them.
        if let (Some(a), Some(d)) = (fields.next(), fields.next()) {
            additions += a.parse::<usize>().unwrap_or(0);
            deletions += d.parse::<usize>().unwrap_or(0);
        }
    }
    (additions, deletions)
}
