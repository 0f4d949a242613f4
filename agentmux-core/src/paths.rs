use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` to the user's home directory.
///
/// Returns `None` when the path starts with `~` but the home directory
/// cannot be determined (e.g. sandboxed environments). Non-tilde paths
/// are always returned as-is.
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if path == "~" {
        dirs::home_dir()
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}

/// Lexically normalise a path: drop `.` components and fold `..` into the
/// preceding component where one exists. Purely textual, no filesystem
/// access, so it works for paths that do not exist yet.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Pop a normal component if there is one; keep leading `..`
                // on relative paths, never pop past a root.
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir | Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Canonical form of a path: trimmed, cleaned, absolutised against the
/// current working directory, symlink-resolved, then cleaned again.
///
/// Every step falls back to the previous form on failure; the function
/// never errors. Two workspaces compare equal iff their canonical
/// (repo, root) pairs compare equal, so this must be total.
pub fn canonical_path(path: &Path) -> PathBuf {
    let trimmed = match path.to_str() {
        Some(s) => PathBuf::from(s.trim()),
        None => path.to_path_buf(),
    };
    let cleaned = clean_path(&trimmed);

    let absolute = if cleaned.is_absolute() {
        cleaned
    } else {
        match std::env::current_dir() {
            Ok(cwd) => clean_path(&cwd.join(&cleaned)),
            Err(_) => cleaned,
        }
    };

    // dunce avoids UNC-mangled results on Windows; on failure (path does
    // not exist, permission denied) the absolute form stands.
    match dunce::canonicalize(&absolute) {
        Ok(resolved) => clean_path(&resolved),
        Err(_) => absolute,
    }
}

/// Canonical equality for two paths that may not both exist on disk.
pub fn same_canonical(a: &Path, b: &Path) -> bool {
    canonical_path(a) == canonical_path(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(
            expand_tilde("/absolute/path"),
            Some(PathBuf::from("/absolute/path"))
        );
    }

    #[test]
    fn tilde_alone_expands_to_home() {
        let result = expand_tilde("~").expect("home dir should exist in test env");
        assert!(!result.to_string_lossy().contains('~'));
    }

    #[test]
    fn tilde_with_rest_expands() {
        let result = expand_tilde("~/test").expect("home dir should exist in test env");
        assert!(result.to_string_lossy().ends_with("test"));
        assert!(!result.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn clean_drops_cur_dir_components() {
        assert_eq!(clean_path(Path::new("/a/./b/./c")), PathBuf::from("/a/b/c"));
    }

    #[test]
    fn clean_folds_parent_components() {
        assert_eq!(clean_path(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn clean_keeps_leading_parent_on_relative() {
        assert_eq!(clean_path(Path::new("../x/./y")), PathBuf::from("../x/y"));
    }

    #[test]
    fn clean_never_pops_past_root() {
        assert_eq!(clean_path(Path::new("/../../a")), PathBuf::from("/a"));
    }

    #[test]
    fn clean_empty_becomes_dot() {
        assert_eq!(clean_path(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn canonical_trims_whitespace() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = format!("  {}  ", tmp.path().display());
        let canon = canonical_path(Path::new(&raw));
        assert_eq!(canon, canonical_path(tmp.path()));
    }

    #[test]
    fn canonical_resolves_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target");
        std::fs::create_dir_all(&target).unwrap();
        let link = tmp.path().join("link");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&target, &link).unwrap();
            assert_eq!(canonical_path(&link), canonical_path(&target));
        }
    }

    #[test]
    fn canonical_missing_path_falls_back_to_absolute() {
        let missing = Path::new("/definitely/not/a/real/dir/../path");
        assert_eq!(
            canonical_path(missing),
            PathBuf::from("/definitely/not/a/real/path")
        );
    }

    #[test]
    fn canonical_relative_is_absolutised() {
        let canon = canonical_path(Path::new("some/rel/dir"));
        assert!(canon.is_absolute());
    }
}
