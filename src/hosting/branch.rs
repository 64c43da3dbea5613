//! Source-control branch detection for the deployed content.

use std::path::Path;

/// Name of the branch checked out in the repository enclosing `path`.
///
/// Returns `None` when `path` is not inside a repository, the repository is
/// bare, or HEAD is detached. An unborn HEAD reports the branch it points at.
/// Never fails.
pub fn detect_branch(path: &Path) -> Option<String> {
    let repo = match git2::Repository::discover(path) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No repository found for branch detection");
            return None;
        }
    };

    if repo.is_bare() {
        return None;
    }

    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
            // `refs/heads/<name>` exists symbolically before the first commit.
            return unborn_branch_name(&repo);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read repository HEAD");
            return None;
        }
    };

    if !head.is_branch() {
        return None;
    }

    head.shorthand()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn unborn_branch_name(repo: &git2::Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    let target = head.symbolic_target()?;
    target
        .strip_prefix("refs/heads/")
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_not_a_repository() {
        let dir = TempDir::new().unwrap();
        assert_eq!(detect_branch(dir.path()), None);
    }

    #[test]
    fn test_unborn_branch_in_fresh_repository() {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        repo.set_head("refs/heads/dev/alice").unwrap();

        assert_eq!(detect_branch(dir.path()), Some("dev/alice".to_string()));
    }

    #[test]
    fn test_branch_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();

        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let commit = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        let commit = repo.find_commit(commit).unwrap();
        repo.branch("feature/x", &commit, false).unwrap();
        repo.set_head("refs/heads/feature/x").unwrap();

        let nested = dir.path().join("wwwroot");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(detect_branch(&nested), Some("feature/x".to_string()));
    }

    #[test]
    fn test_detached_head_has_no_branch() {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();

        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let commit = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        repo.set_head_detached(commit).unwrap();

        assert_eq!(detect_branch(dir.path()), None);
    }
}
