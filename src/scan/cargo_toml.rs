// src/scan/cargo_toml.rs

//! Cargo manifests.
//!
//! A `Cargo.toml` with a `[package]` or `[workspace]` table yields the
//! standard build and test commands for that manifest's directory.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::errors::Result;
use crate::model::Command;
use crate::scan::Parser;

#[derive(Debug, Deserialize)]
struct CargoManifest {
    package: Option<toml::Value>,
    workspace: Option<toml::Value>,
}

pub struct CargoTomlParser;

impl Parser for CargoTomlParser {
    fn name(&self) -> &'static str {
        "cargo-toml"
    }

    fn can_parse(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|n| n == "Cargo.toml")
    }

    fn parse_commands(&self, path: &Path) -> Result<Vec<Command>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let manifest: CargoManifest = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;

        if manifest.package.is_none() && manifest.workspace.is_none() {
            return Ok(Vec::new());
        }

        Ok(["cargo build", "cargo test"]
            .into_iter()
            .map(|text| {
                Command::new(text, path).with_description(format!("Cargo: {text}"))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn package_manifest_yields_build_and_test() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Cargo.toml");
        fs::write(&path, "[package]\nname = \"x\"\nversion = \"0.1.0\"\n").unwrap();

        let commands = CargoTomlParser.parse_commands(&path).unwrap();
        let texts: Vec<&str> = commands.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["cargo build", "cargo test"]);
    }

    #[test]
    fn fragment_without_package_or_workspace_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Cargo.toml");
        fs::write(&path, "[dependencies]\nserde = \"1\"\n").unwrap();
        assert!(CargoTomlParser.parse_commands(&path).unwrap().is_empty());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Cargo.toml");
        fs::write(&path, "[package\nbroken").unwrap();
        assert!(CargoTomlParser.parse_commands(&path).is_err());
    }
}
