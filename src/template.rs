//! # Placeholder Rendering
//!
//! Substitutes `${VAR}` placeholders in templated files. The variable set
//! is fixed and enumerable - derived repository name, participant username,
//! and the source version and URL - so rendering is a straight literal
//! replacement with no expression language.
//!
//! Unknown placeholders are left untouched: template content legitimately
//! contains `${...}` sequences of its own (shell scripts, CI configs), and
//! rewriting those would corrupt the materialized tree.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// The fixed substitution context for one (participant, repository) pair.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Derived repository name, e.g. `demo-alice`.
    pub repo_name: String,
    /// Participant username, e.g. `alice`.
    pub username: String,
    /// Version of the template content source.
    pub source_version: String,
    /// URL of the template content source.
    pub source_url: String,
}

impl RenderContext {
    /// Enumerate the placeholder/value pairs this context substitutes.
    fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("${REPO_NAME}", &self.repo_name),
            ("${USERNAME}", &self.username),
            ("${SOURCE_VERSION}", &self.source_version),
            ("${SOURCE_URL}", &self.source_url),
        ]
    }

    /// Render a string through the context.
    pub fn render(&self, content: &str) -> String {
        let mut rendered = content.to_string();
        for (placeholder, value) in self.pairs() {
            rendered = rendered.replace(placeholder, value);
        }
        rendered
    }

    /// Render one file in place. Files are read as UTF-8; a templated file
    /// that is not valid UTF-8 is a rendering error (binary files must not
    /// be declared in `templated_files`).
    pub fn render_file(&self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| Error::Render {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, self.render(&content))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context() -> RenderContext {
        RenderContext {
            repo_name: "demo-alice".to_string(),
            username: "alice".to_string(),
            source_version: "1.4.0".to_string(),
            source_url: "https://example.com/templates".to_string(),
        }
    }

    #[test]
    fn test_render_all_placeholders() {
        let rendered = context().render(
            "# ${REPO_NAME}\nOwner: ${USERNAME}\nFrom ${SOURCE_URL} v${SOURCE_VERSION}\n",
        );
        assert_eq!(
            rendered,
            "# demo-alice\nOwner: alice\nFrom https://example.com/templates v1.4.0\n"
        );
    }

    #[test]
    fn test_unknown_placeholders_left_alone() {
        let rendered = context().render("run: echo ${HOME} for ${USERNAME}");
        assert_eq!(rendered, "run: echo ${HOME} for alice");
    }

    #[test]
    fn test_repeated_placeholder() {
        let rendered = context().render("${USERNAME} ${USERNAME}");
        assert_eq!(rendered, "alice alice");
    }

    #[test]
    fn test_render_file_in_place() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("README.md");
        fs::write(&path, "# ${REPO_NAME}").unwrap();

        context().render_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "# demo-alice");
    }

    #[test]
    fn test_render_file_rejects_non_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logo.png");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let err = context().render_file(&path).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }
}
