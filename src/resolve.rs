use std::path::{Component, Path, PathBuf};

use crate::git::Worktree;

/// Find the worktree the user means by `token`.
///
/// A record matches when its branch equals the token, its path equals the
/// token, or its path ends with `/<token>`. The first match in listing order
/// wins; ambiguous tokens are not reported.
pub fn resolve<'a>(token: &str, worktrees: &'a [Worktree]) -> Option<&'a Worktree> {
    let suffix = format!("/{token}");
    worktrees.iter().find(|wt| {
        let path = wt.path.to_string_lossy();
        wt.branch.as_deref() == Some(token) || path == token || path.ends_with(&suffix)
    })
}

/// Lexically normalize a path: drop `.` components, fold `..` into the
/// preceding component and drop trailing separators. The filesystem is not
/// consulted, so symlinks are left as written.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
