//! The command library: a rule database mapping base images and
//! package-manager commands to recipes for extracting package attributes.
//!
//! [`CommandLibrary`] is the in-memory form of two serde_json-backed rule
//! files:
//! - `base.json`: per `name:tag` base image, an optional shell and
//!   attribute listings keyed `names`, `versions`, `licenses`, `src_urls`.
//! - `snippets.json`: per command name, which subcommands install or are
//!   administrative, and attribute listings keyed `version`, `license`,
//!   `src_urls`, `deps`.
//!
//! Lookups never fail: absence is a valid outcome communicated with an
//! explanatory message for downstream notice creation.

use crate::command::{Command, CommandAction};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// How to obtain an attribute value: a literal value list, or a recipe to
/// run inside the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrListing {
    Literal(Vec<String>),
    Invoke(InvokeRecipe),
}

/// Ordered shell snippets executed in the running container. Steps may
/// reference the package under inspection as `$package`; the final step's
/// stdout lines are the attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRecipe {
    pub steps: Vec<String>,
}

/// Attribute listings of one base image or one package snippet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageListing {
    pub attrs: HashMap<String, AttrListing>,
}

/// Base-image entry: shell dialect plus positional attribute listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseListing {
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub attrs: HashMap<String, AttrListing>,
}

/// Snippet entry for one command name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Subcommands that install packages.
    #[serde(default)]
    pub install: Vec<String>,
    /// Administrative subcommands with no package effect.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// How to extract attributes for a package this command installed.
    #[serde(default)]
    pub packages: PackageListing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandLibrary {
    #[serde(default)]
    pub base: HashMap<String, BaseListing>,
    #[serde(default)]
    pub snippets: HashMap<String, CommandEntry>,
}

impl CommandLibrary {
    /// Load `base.json` and `snippets.json` from a library directory.
    /// A missing file leaves that half of the library empty.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut library = CommandLibrary::default();

        let base_path = dir.join("base.json");
        if base_path.exists() {
            let content = fs::read_to_string(&base_path)
                .with_context(|| format!("Failed to read {}", base_path.display()))?;
            library.base = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", base_path.display()))?;
        }

        let snippets_path = dir.join("snippets.json");
        if snippets_path.exists() {
            let content = fs::read_to_string(&snippets_path)
                .with_context(|| format!("Failed to read {}", snippets_path.display()))?;
            library.snippets = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", snippets_path.display()))?;
        }

        Ok(library)
    }

    /// Look up the base listing for an image name and tag.
    pub fn base_listing(&self, image_name: &str, image_tag: &str) -> Option<&BaseListing> {
        self.base.get(&format!("{}:{}", image_name, image_tag))
    }

    /// Look up the snippet entry for a command name.
    pub fn command_entry(&self, command_name: &str) -> Option<&CommandEntry> {
        self.snippets.get(command_name)
    }

    /// Classify a parsed command against the library: sets the recognition
    /// flag when the command name has an entry, and the action from the
    /// entry's install/ignore subcommand lists.
    pub fn classify(&self, command: &mut Command) {
        let Some(entry) = self.command_entry(&command.name) else {
            return;
        };
        let action = match command.subcommand.as_deref() {
            Some(sub) if entry.install.iter().any(|s| s == sub) => CommandAction::Install,
            Some(sub) if entry.ignore.iter().any(|s| s == sub) => CommandAction::Ignore,
            _ => CommandAction::Neither,
        };
        command.recognize(action);
    }
}

/// Resolve one attribute key of a listing. Absence returns `None` plus a
/// message suitable for a notice.
pub fn check_listing_key<'a>(
    listing: &'a PackageListing,
    key: &str,
) -> (Option<&'a AttrListing>, String) {
    match listing.attrs.get(key) {
        Some(attr) => (Some(attr), String::new()),
        None => (
            None,
            format!("No listing for key '{}' in the command library", key),
        ),
    }
}

/// The shell declared for a base listing, if any.
pub fn image_shell(listing: &BaseListing) -> Option<&str> {
    listing.shell.as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_library() -> CommandLibrary {
        let json = r#"{
            "base": {
                "alpine:3.20": {
                    "shell": "/bin/sh",
                    "attrs": {
                        "names": { "invoke": { "steps": ["apk info"] } },
                        "versions": { "invoke": { "steps": ["apk info -v"] } }
                    }
                },
                "scratch:latest": {
                    "attrs": {}
                }
            },
            "snippets": {
                "apk": {
                    "install": ["add"],
                    "ignore": ["update", "upgrade"],
                    "packages": {
                        "version": { "invoke": { "steps": ["apk info -v $package"] } },
                        "license": { "literal": ["MIT"] }
                    }
                }
            }
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_base_listing_lookup() {
        let library = sample_library();
        let listing = library.base_listing("alpine", "3.20").unwrap();
        assert_eq!(image_shell(listing), Some("/bin/sh"));
        assert!(library.base_listing("alpine", "3.19").is_none());
    }

    #[test]
    fn test_missing_shell_is_absent_not_error() {
        let library = sample_library();
        let listing = library.base_listing("scratch", "latest").unwrap();
        assert!(image_shell(listing).is_none());
    }

    #[test]
    fn test_check_listing_key_absent_carries_message() {
        let library = sample_library();
        let entry = library.command_entry("apk").unwrap();

        let (found, msg) = check_listing_key(&entry.packages, "version");
        assert!(found.is_some());
        assert!(msg.is_empty());

        let (missing, msg) = check_listing_key(&entry.packages, "deps");
        assert!(missing.is_none());
        assert!(msg.contains("'deps'"));
    }

    #[test]
    fn test_listing_variants_deserialize() {
        let library = sample_library();
        let entry = library.command_entry("apk").unwrap();
        match entry.packages.attrs.get("license").unwrap() {
            AttrListing::Literal(values) => assert_eq!(values, &vec!["MIT".to_string()]),
            other => panic!("expected literal listing, got {:?}", other),
        }
        match entry.packages.attrs.get("version").unwrap() {
            AttrListing::Invoke(recipe) => assert_eq!(recipe.steps.len(), 1),
            other => panic!("expected invoke listing, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_sets_action_from_subcommand() {
        let library = sample_library();

        let mut install = Command::parse("apk add curl");
        library.classify(&mut install);
        assert!(install.is_install());

        let mut ignore = Command::parse("apk update");
        library.classify(&mut ignore);
        assert!(ignore.is_ignore());

        let mut neither = Command::parse("apk info");
        library.classify(&mut neither);
        assert!(neither.is_recognized());
        assert!(!neither.is_install());
        assert!(!neither.is_ignore());

        let mut unknown = Command::parse("make install");
        library.classify(&mut unknown);
        assert!(!unknown.is_recognized());
    }

    #[test]
    fn test_load_from_dir_with_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = CommandLibrary::load_from_dir(dir.path()).unwrap();
        assert!(library.base.is_empty());
        assert!(library.snippets.is_empty());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("snippets.json"),
            r#"{ "apt-get": { "install": ["install"], "ignore": ["update"] } }"#,
        )
        .unwrap();

        let library = CommandLibrary::load_from_dir(dir.path()).unwrap();
        assert!(library.base.is_empty());
        assert!(library.command_entry("apt-get").is_some());
    }
}
