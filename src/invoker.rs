//! Container runtime boundary and attribute invocation.
//!
//! The resolution core never talks to a container directly; it goes through
//! [`ContainerRuntime`], which checks the running-container precondition and
//! executes shell snippets. [`invoke_listing`] turns an [`AttrListing`] into
//! the `(values, error_message)` pair the metadata filler consumes: empty
//! values with a non-empty message signals failure, both empty signals
//! nothing to do.

use crate::command_lib::AttrListing;
use anyhow::{anyhow, Context, Result};
use std::process::Command;

pub trait ContainerRuntime {
    /// Whether a container is up and ready for command execution.
    fn is_running(&self) -> bool;

    /// Run one shell snippet inside the container, returning its stdout.
    fn exec(&self, shell: &str, snippet: &str) -> Result<String>;
}

/// Runs snippets in a named container via the docker CLI.
pub struct DockerRuntime {
    container: String,
}

impl DockerRuntime {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
        }
    }

    fn run_docker(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("docker")
            .args(args)
            .output()
            .context(format!("Failed to execute docker command: {:?}", args))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Docker command failed: {}", error));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl ContainerRuntime for DockerRuntime {
    fn is_running(&self) -> bool {
        match self.run_docker(&[
            "inspect",
            "--format",
            "{{.State.Running}}",
            self.container.as_str(),
        ]) {
            Ok(state) => state.trim() == "true",
            Err(err) => {
                log::debug!("Container state check failed: {}", err);
                false
            }
        }
    }

    fn exec(&self, shell: &str, snippet: &str) -> Result<String> {
        self.run_docker(&["exec", self.container.as_str(), shell, "-c", snippet])
    }
}

/// Resolve an attribute listing to its ordered value list.
///
/// Literal listings return their values without touching the container.
/// Invoke recipes run step by step with `$package` substituted; the final
/// step's non-empty stdout lines become the values. On any step failure the
/// values are empty and the message describes the failure.
pub fn invoke_listing(
    runtime: &dyn ContainerRuntime,
    shell: &str,
    listing: &AttrListing,
    package_name: Option<&str>,
) -> (Vec<String>, String) {
    match listing {
        AttrListing::Literal(values) => (values.clone(), String::new()),
        AttrListing::Invoke(recipe) => {
            let mut last_output = String::new();
            for step in &recipe.steps {
                let snippet = match package_name {
                    Some(name) => step.replace("$package", name),
                    None => step.clone(),
                };
                match runtime.exec(shell, &snippet) {
                    Ok(output) => last_output = output,
                    Err(err) => {
                        return (
                            Vec::new(),
                            format!("Invocation '{}' failed in {}: {}", snippet, shell, err),
                        );
                    }
                }
            }
            let values: Vec<String> = last_output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            (values, String::new())
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use crate::command_lib::InvokeRecipe;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Scripted runtime for tests: maps an executed snippet to its stdout
    /// and records every call.
    pub struct MockRuntime {
        pub running: bool,
        pub responses: HashMap<String, String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl MockRuntime {
        pub fn new(running: bool) -> Self {
            Self {
                running,
                responses: HashMap::new(),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn respond(mut self, snippet: &str, output: &str) -> Self {
            self.responses.insert(snippet.to_string(), output.to_string());
            self
        }
    }

    impl ContainerRuntime for MockRuntime {
        fn is_running(&self) -> bool {
            self.running
        }

        fn exec(&self, _shell: &str, snippet: &str) -> Result<String> {
            self.calls.borrow_mut().push(snippet.to_string());
            self.responses
                .get(snippet)
                .cloned()
                .ok_or_else(|| anyhow!("no such command: {}", snippet))
        }
    }

    #[test]
    fn test_literal_listing_skips_the_container() {
        let runtime = MockRuntime::new(true);
        let listing = AttrListing::Literal(vec!["GPL-2.0".to_string()]);

        let (values, msg) = invoke_listing(&runtime, "/bin/sh", &listing, None);
        assert_eq!(values, vec!["GPL-2.0"]);
        assert!(msg.is_empty());
        assert!(runtime.calls.borrow().is_empty());
    }

    #[test]
    fn test_invoke_substitutes_package_name() {
        let runtime = MockRuntime::new(true).respond("apk info -v curl", "curl-8.5.0\n");
        let listing = AttrListing::Invoke(InvokeRecipe {
            steps: vec!["apk info -v $package".to_string()],
        });

        let (values, msg) = invoke_listing(&runtime, "/bin/sh", &listing, Some("curl"));
        assert_eq!(values, vec!["curl-8.5.0"]);
        assert!(msg.is_empty());
        assert_eq!(runtime.calls.borrow().as_slice(), ["apk info -v curl"]);
    }

    #[test]
    fn test_invoke_returns_last_step_lines() {
        let runtime = MockRuntime::new(true)
            .respond("step-one", "scratch\n")
            .respond("step-two", "a\n\n  b  \n");
        let listing = AttrListing::Invoke(InvokeRecipe {
            steps: vec!["step-one".to_string(), "step-two".to_string()],
        });

        let (values, msg) = invoke_listing(&runtime, "/bin/sh", &listing, None);
        assert_eq!(values, vec!["a", "b"]);
        assert!(msg.is_empty());
    }

    #[test]
    fn test_invoke_failure_is_empty_values_with_message() {
        let runtime = MockRuntime::new(true);
        let listing = AttrListing::Invoke(InvokeRecipe {
            steps: vec!["missing-tool".to_string()],
        });

        let (values, msg) = invoke_listing(&runtime, "/bin/sh", &listing, None);
        assert!(values.is_empty());
        assert!(msg.contains("missing-tool"));
    }
}
