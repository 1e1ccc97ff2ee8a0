// src/scan/package_json.rs

//! npm `package.json` scripts.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::errors::Result;
use crate::model::Command;
use crate::scan::Parser;

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    scripts: serde_json::Map<String, serde_json::Value>,
}

pub struct PackageJsonParser;

impl Parser for PackageJsonParser {
    fn name(&self) -> &'static str {
        "package.json"
    }

    fn can_parse(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|n| n == "package.json")
    }

    fn parse_commands(&self, path: &Path) -> Result<Vec<Command>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let pkg: PackageJson = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;

        let mut commands = Vec::with_capacity(pkg.scripts.len());
        for (name, value) in &pkg.scripts {
            // Scripts with non-string values are malformed; skip just them.
            if value.as_str().is_none() {
                continue;
            }
            commands.push(
                Command::new(format!("npm run {name}"), path)
                    .with_description(format!("NPM script: {name}"))
                    .with_metadata("script", name.clone()),
            );
        }
        Ok(commands)
    }
}
