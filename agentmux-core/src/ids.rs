use crate::paths::canonical_path;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of the hex-encoded workspace ID.
const ID_LEN: usize = 12;

/// Stable workspace identifier derived from the canonical (repo, root)
/// path pair. Two workspaces whose canonical pairs match get the same ID;
/// the ID changes when either canonical path changes (e.g. a relative
/// repo path is later recorded absolute), which callers handle via
/// explicit rebinding.
pub fn workspace_id(repo: &Path, root: &Path) -> String {
    let repo = canonical_path(repo);
    let root = canonical_path(root);
    let mut hasher = Sha256::new();
    hasher.update(repo.as_os_str().as_encoded_bytes());
    hasher.update([0u8]);
    hasher.update(root.as_os_str().as_encoded_bytes());
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    hex[..ID_LEN].to_string()
}

/// Short content hash used to detect pane-output changes between activity
/// scans. Not security-sensitive, just cheap change detection.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    #[test]
    fn id_is_stable_across_calls() {
        let a = workspace_id(Path::new("/tmp/repo"), Path::new("/tmp/ws/repo/feat"));
        let b = workspace_id(Path::new("/tmp/repo"), Path::new("/tmp/ws/repo/feat"));
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_LEN);
    }

    #[test]
    fn id_ignores_lexical_noise() {
        // `.` segments and trailing whitespace vanish under canonicalisation.
        let a = workspace_id(Path::new("/tmp/repo"), Path::new("/tmp/ws/repo/feat"));
        let b = workspace_id(Path::new("/tmp/./repo"), Path::new("/tmp/ws/./repo/feat "));
        assert_eq!(a, b);
    }

    #[test]
    fn id_differs_when_root_differs() {
        let a = workspace_id(Path::new("/tmp/repo"), Path::new("/tmp/ws/repo/one"));
        let b = workspace_id(Path::new("/tmp/repo"), Path::new("/tmp/ws/repo/two"));
        assert_ne!(a, b);
    }

    #[test]
    fn id_separates_repo_and_root() {
        // The pair ("/a/b", "/c") must not collide with ("/a", "/b/c").
        let a = workspace_id(Path::new("/a/b"), Path::new("/c"));
        let b = workspace_id(Path::new("/a"), Path::new("/b/c"));
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_changes_with_content() {
        assert_ne!(content_hash("one"), content_hash("two"));
        assert_eq!(content_hash("same"), content_hash("same"));
    }

    fn path_segment() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,8}"
    }

    fn abs_path() -> impl Strategy<Value = PathBuf> {
        // Rooted under a directory that does not exist, so symlink
        // resolution can never collapse two generated paths together.
        prop::collection::vec(path_segment(), 1..5).prop_map(|segs| {
            let mut p = PathBuf::from("/proptest-void");
            for s in segs {
                p.push(s);
            }
            p
        })
    }

    proptest! {
        #[test]
        fn prop_equal_canonical_pairs_share_id(repo in abs_path(), root in abs_path()) {
            // A noisy spelling of the same pair always hashes identically.
            let noisy_repo = PathBuf::from(format!("{}/.", repo.display()));
            let noisy_root = PathBuf::from(format!(" {}", root.display()));
            prop_assert_eq!(
                workspace_id(&repo, &root),
                workspace_id(&noisy_repo, &noisy_root)
            );
        }

        #[test]
        fn prop_distinct_pairs_get_distinct_ids(repo in abs_path(), a in abs_path(), b in abs_path()) {
            prop_assume!(a != b);
            prop_assert_ne!(workspace_id(&repo, &a), workspace_id(&repo, &b));
        }
    }
}
