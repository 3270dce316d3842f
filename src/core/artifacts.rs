//! Append-only collection of generated-file descriptors.

use crate::core::frame::ArtifactDescriptor;

/// Entry-point tiers, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    ShellScript,
    InterpretedScript,
    MarkupDocument,
}

const SHELL_EXTENSIONS: &[&str] = &["sh", "bash", "zsh"];
const SHELL_LANGUAGES: &[&str] = &["bash", "sh", "shell", "zsh"];
const SCRIPT_EXTENSIONS: &[&str] = &["py", "js", "mjs", "cjs", "ts"];
const SCRIPT_LANGUAGES: &[&str] = &[
    "python",
    "py",
    "javascript",
    "js",
    "node",
    "typescript",
    "ts",
];
const MARKUP_EXTENSIONS: &[&str] = &["html", "htm"];
const MARKUP_LANGUAGES: &[&str] = &["html"];

/// Classifies a descriptor into an entry-point tier, by extension first and
/// declared language second.
pub fn entry_kind(artifact: &ArtifactDescriptor) -> Option<EntryKind> {
    if let Some(ext) = artifact.extension() {
        if let Some(kind) = kind_for(&ext, SHELL_EXTENSIONS, SCRIPT_EXTENSIONS, MARKUP_EXTENSIONS)
        {
            return Some(kind);
        }
    }

    let language = artifact.language.trim().to_ascii_lowercase();
    kind_for(&language, SHELL_LANGUAGES, SCRIPT_LANGUAGES, MARKUP_LANGUAGES)
}

fn kind_for(value: &str, shell: &[&str], script: &[&str], markup: &[&str]) -> Option<EntryKind> {
    if shell.contains(&value) {
        Some(EntryKind::ShellScript)
    } else if script.contains(&value) {
        Some(EntryKind::InterpretedScript)
    } else if markup.contains(&value) {
        Some(EntryKind::MarkupDocument)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactCollector {
    artifacts: Vec<ArtifactDescriptor>,
}

impl ArtifactCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, list: impl IntoIterator<Item = ArtifactDescriptor>) {
        self.artifacts.extend(list);
    }

    pub fn all(&self) -> &[ArtifactDescriptor] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Picks the artifact to execute: the first shell script, else the first
    /// interpreted script, else the first markup document.
    pub fn entry_point(&self) -> Option<&ArtifactDescriptor> {
        [
            EntryKind::ShellScript,
            EntryKind::InterpretedScript,
            EntryKind::MarkupDocument,
        ]
        .into_iter()
        .find_map(|wanted| {
            self.artifacts
                .iter()
                .find(|artifact| entry_kind(artifact) == Some(wanted))
        })
    }

    pub fn clear(&mut self) {
        self.artifacts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(filename: &str, language: &str) -> ArtifactDescriptor {
        ArtifactDescriptor::new(filename, language)
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let mut collector = ArtifactCollector::new();
        collector.extend([artifact("a.py", "py"), artifact("a.py", "py")]);
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn shell_wins_over_scripts_regardless_of_order() {
        let mut collector = ArtifactCollector::new();
        collector.extend([
            artifact("index.html", "html"),
            artifact("app.py", "python"),
            artifact("launch.sh", "bash"),
            artifact("second.sh", "bash"),
        ]);
        assert_eq!(collector.entry_point().unwrap().filename, "launch.sh");
    }

    #[test]
    fn script_then_markup_fallback() {
        let mut collector = ArtifactCollector::new();
        collector.extend([artifact("requirements.txt", "txt"), artifact("page.htm", "")]);
        assert_eq!(collector.entry_point().unwrap().filename, "page.htm");

        collector.extend([artifact("server.js", "javascript")]);
        assert_eq!(collector.entry_point().unwrap().filename, "server.js");
    }

    #[test]
    fn language_is_used_when_extension_is_unknown() {
        let mut collector = ArtifactCollector::new();
        collector.extend([artifact("Procfile", "shell")]);
        assert_eq!(collector.entry_point().unwrap().filename, "Procfile");
    }

    #[test]
    fn no_entry_point_without_runnable_artifacts() {
        let mut collector = ArtifactCollector::new();
        collector.extend([artifact("data.json", "json")]);
        assert!(collector.entry_point().is_none());
    }
}
