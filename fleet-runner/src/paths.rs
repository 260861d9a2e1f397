//! Local path resolution.
//!
//! A configured path is tried as given, then under `resources/` next to the
//! working directory, then under `resources/` next to the executable.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// No candidate for a configured path exists.
#[derive(Debug, Error)]
#[error("cannot resolve {path}; tried {}", join_candidates(.candidates))]
pub struct PathResolutionError {
    /// The path as configured.
    pub path: String,
    /// Every location that was tried, in order.
    pub candidates: Vec<PathBuf>,
}

fn join_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|c| c.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolves configured paths against a list of search roots.
#[derive(Debug, Clone)]
pub struct PathResolver {
    roots: Vec<PathBuf>,
}

impl PathResolver {
    /// Search `resources/` under the working directory and the executable's directory.
    pub fn from_env() -> Self {
        let mut roots = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            roots.push(cwd.join("resources"));
        }
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let candidate = dir.join("resources");
            if !roots.contains(&candidate) {
                roots.push(candidate);
            }
        }
        Self { roots }
    }

    /// Search the given roots after the literal path.
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// First existing candidate for `path`.
    ///
    /// Absolute paths are only tried as given.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathResolutionError> {
        let literal = PathBuf::from(path);
        let mut candidates = vec![literal.clone()];
        if literal.is_relative() {
            candidates.extend(self.roots.iter().map(|root| root.join(&literal)));
        }

        match candidates.iter().find(|c| c.exists()) {
            Some(found) => Ok(found.clone()),
            None => Err(PathResolutionError {
                path: path.to_string(),
                candidates,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plan.jmx");
        std::fs::write(&file, b"<jmeterTestPlan/>").unwrap();

        let resolver = PathResolver::with_roots(vec![]);
        assert_eq!(resolver.resolve(file.to_str().unwrap()).unwrap(), file);
    }

    #[test]
    fn falls_back_to_search_roots_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("users.csv"), b"a,b").unwrap();

        let resolver =
            PathResolver::with_roots(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let found = resolver.resolve("users.csv").unwrap();
        assert_eq!(found, second.path().join("users.csv"));
    }

    #[test]
    fn unresolved_path_lists_every_candidate() {
        let root = tempfile::tempdir().unwrap();
        let resolver = PathResolver::with_roots(vec![root.path().to_path_buf()]);

        let err = resolver.resolve("missing-plan.jmx").unwrap_err();
        assert_eq!(err.path, "missing-plan.jmx");
        assert_eq!(err.candidates.len(), 2);
        assert_eq!(err.candidates[1], root.path().join("missing-plan.jmx"));
        assert!(err.to_string().contains("missing-plan.jmx"));
    }

    #[test]
    fn absolute_path_is_not_searched() {
        let root = tempfile::tempdir().unwrap();
        let resolver = PathResolver::with_roots(vec![root.path().to_path_buf()]);
        let err = resolver.resolve("/nonexistent/plan.jmx").unwrap_err();
        assert_eq!(err.candidates, vec![PathBuf::from("/nonexistent/plan.jmx")]);
    }
}
