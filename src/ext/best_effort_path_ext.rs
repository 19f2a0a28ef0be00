use std::path::{Path, PathBuf};

/// Human-readable form of a filesystem path for logs and error messages.
pub trait BestEffortPathExt {
    /// The canonical path when it exists, the absolute path otherwise.
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        self.canonicalize()
            .or_else(|_| std::path::absolute(self))
            .unwrap_or_else(|_| self.to_path_buf())
            .display()
            .to_string()
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        self.as_path().best_effort_path_display()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paths_are_made_absolute() {
        let shown = Path::new("does/not/exist.yaml").best_effort_path_display();
        assert!(Path::new(&shown).is_absolute());
        assert!(shown.ends_with("exist.yaml"));
    }

    #[test]
    fn existing_paths_are_canonicalized() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();

        let shown = nested.join("..").join("sub").best_effort_path_display();
        assert_eq!(shown, nested.canonicalize().unwrap().display().to_string());
    }
}
