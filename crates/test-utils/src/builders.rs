#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Writes a throwaway project tree for integration tests.
///
/// The caller owns the directory (usually a `tempfile::TempDir`); this
/// builder only creates files inside it.
pub struct ProjectBuilder {
    root: PathBuf,
}

impl ProjectBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a `package.json` with the given script name/command pairs.
    pub fn with_npm_scripts(self, scripts: &[(&str, &str)]) -> Self {
        self.with_npm_scripts_at("package.json", scripts)
    }

    /// Same, at a nested path such as `web/package.json`.
    pub fn with_npm_scripts_at(self, rel: &str, scripts: &[(&str, &str)]) -> Self {
        let entries: Vec<String> = scripts
            .iter()
            .map(|(name, cmd)| format!("    \"{name}\": \"{}\"", cmd.replace('"', "\\\"")))
            .collect();
        let contents = format!("{{\n  \"scripts\": {{\n{}\n  }}\n}}\n", entries.join(",\n"));
        self.write(rel, &contents)
    }

    /// Write a `Makefile` with the given target/recipe pairs.
    pub fn with_makefile(self, targets: &[(&str, &str)]) -> Self {
        let mut contents = String::new();
        for (target, recipe) in targets {
            contents.push_str(&format!("{target}:\n\t{recipe}\n"));
        }
        self.write("Makefile", &contents)
    }

    /// Write a `.doignore` file from raw lines.
    pub fn with_doignore(self, lines: &[&str]) -> Self {
        let mut contents = lines.join("\n");
        contents.push('\n');
        self.write(".doignore", &contents)
    }

    /// Write a `.domd.yaml` container config from raw YAML.
    pub fn with_container_config(self, yaml: &str) -> Self {
        self.write(".domd.yaml", yaml)
    }

    /// Write an arbitrary file relative to the project root.
    pub fn write(self, rel: &str, contents: &str) -> Self {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("creating fixture directory");
        }
        fs::write(&path, contents).expect("writing fixture file");
        self
    }
}
