use anyhow::{anyhow, Result};
use oci2bom::cache::{load_from_cache, MemoryCache, PackageCache};
use oci2bom::inventory::{fill_package_metadata, get_package_dependencies};
use oci2bom::processor::InventoryProcessor;
use oci2bom::tarball::commands_from_created_by;
use oci2bom::{CommandLibrary, ContainerRuntime, Image, Layer, Notifier, NoticeLevel, Package};
use std::cell::RefCell;
use std::collections::HashMap;

/// Scripted container runtime: snippet -> stdout, everything else fails.
struct ScriptedRuntime {
    running: bool,
    responses: HashMap<String, String>,
    calls: RefCell<usize>,
}

impl ScriptedRuntime {
    fn new(running: bool, responses: &[(&str, &str)]) -> Self {
        Self {
            running,
            responses: responses
                .iter()
                .map(|(snippet, output)| (snippet.to_string(), output.to_string()))
                .collect(),
            calls: RefCell::new(0),
        }
    }
}

impl ContainerRuntime for ScriptedRuntime {
    fn is_running(&self) -> bool {
        self.running
    }

    fn exec(&self, _shell: &str, snippet: &str) -> Result<String> {
        *self.calls.borrow_mut() += 1;
        self.responses
            .get(snippet)
            .cloned()
            .ok_or_else(|| anyhow!("no such command: {}", snippet))
    }
}

fn library() -> CommandLibrary {
    serde_json::from_str(
        r#"{
        "base": {
            "debian:bookworm": {
                "shell": "/bin/bash",
                "attrs": {
                    "names": { "invoke": { "steps": ["dpkg-query -f '${binary:Package}\n' -W"] } },
                    "versions": { "invoke": { "steps": ["dpkg-query -f '${Version}\n' -W"] } },
                    "licenses": { "literal": ["GPL-2.0", "GPL-2.0"] },
                    "src_urls": { "literal": ["https://deb.org/base", "https://deb.org/libc"] }
                }
            }
        },
        "snippets": {
            "apt-get": {
                "install": ["install"],
                "ignore": ["update", "clean", "autoremove"],
                "packages": {
                    "version": { "invoke": { "steps": ["dpkg-query -f '${Version}' -W $package"] } },
                    "license": { "invoke": { "steps": ["cat /usr/share/doc/$package/copyright"] } },
                    "deps": { "invoke": { "steps": ["apt-cache depends $package"] } }
                }
            }
        }
    }"#,
    )
    .unwrap()
}

fn image_with_history() -> Image {
    let mut image = Image::new("debian", "bookworm");

    let mut base = Layer::new("sha256:baselayer");
    base.commands = commands_from_created_by("/bin/sh -c #(nop) ADD file:rootfs in /");
    image.layers.push(base);

    let mut install = Layer::new("sha256:installlayer");
    install.commands = commands_from_created_by(
        "/bin/sh -c apt-get update && apt-get install -y vim && custom-build-step --flag",
    );
    image.layers.push(install);

    image
}

fn full_runtime() -> ScriptedRuntime {
    ScriptedRuntime::new(
        true,
        &[
            ("dpkg-query -f '${binary:Package}\n' -W", "base-files\nlibc6\n"),
            ("dpkg-query -f '${Version}\n' -W", "12.4\n2.36-9\n"),
            ("dpkg-query -f '${Version}' -W vim", "2:9.0\n"),
            ("cat /usr/share/doc/vim/copyright", "Vim\n"),
            ("apt-cache depends vim", "vim-common\nlibacl1\nvim-common\n"),
        ],
    )
}

#[test]
fn test_full_resolution_pass() {
    let library = library();
    let runtime = full_runtime();
    let notifier = Notifier::new(1);
    let mut cache = MemoryCache::new();
    let mut image = image_with_history();

    let from_cache =
        InventoryProcessor::new(&library, &runtime, &notifier).resolve(&mut image, &mut cache);
    assert!(!from_cache);

    // base packages are positional and attached to every layer
    for layer in &image.layers {
        let base_files = layer.packages.iter().find(|p| p.name == "base-files").unwrap();
        assert_eq!(base_files.version.as_deref(), Some("12.4"));
        assert_eq!(base_files.license.as_deref(), Some("GPL-2.0"));
        assert_eq!(base_files.src_url.as_deref(), Some("https://deb.org/base"));
    }

    // the install layer additionally carries the command-resolved package
    let install_layer = &image.layers[1];
    let vim = install_layer.packages.iter().find(|p| p.name == "vim").unwrap();
    assert_eq!(vim.version.as_deref(), Some("2:9.0"));
    assert_eq!(vim.license.as_deref(), Some("Vim"));
    // the src_url quirk: resolved from the license listing
    assert_eq!(vim.src_url.as_deref(), Some("Vim"));
    // dependencies deduplicated
    assert_eq!(vim.deps, vec!["vim-common", "libacl1"]);

    // administrative and unknown commands surface as layer notices
    assert!(install_layer
        .notices
        .iter()
        .any(|n| n.level == NoticeLevel::Warning && n.message.contains("apt-get update")));
    assert!(install_layer
        .notices
        .iter()
        .any(|n| n.level == NoticeLevel::Warning && n.message.contains("custom-build-step")));
}

#[test]
fn test_second_pass_is_fully_cache_satisfied() {
    let library = library();
    let notifier = Notifier::new(1);
    let mut cache = MemoryCache::new();

    let runtime = full_runtime();
    let mut first = image_with_history();
    InventoryProcessor::new(&library, &runtime, &notifier).resolve(&mut first, &mut cache);

    // second pass over the same layers runs no container commands at all
    let cold_runtime = ScriptedRuntime::new(true, &[]);
    let mut second = image_with_history();
    let from_cache = InventoryProcessor::new(&library, &cold_runtime, &notifier)
        .resolve(&mut second, &mut cache);

    assert!(from_cache);
    assert_eq!(*cold_runtime.calls.borrow(), 0);

    // cache hits carry the info notice and the rebuilt attributes
    for layer in &second.layers {
        assert!(layer
            .notices
            .iter()
            .any(|n| n.level == NoticeLevel::Info && n.message.contains(&layer.id)));
    }
    let vim = second.layers[1].packages.iter().find(|p| p.name == "vim").unwrap();
    assert_eq!(vim.version.as_deref(), Some("2:9.0"));
    assert_eq!(vim.deps, vec!["vim-common", "libacl1"]);
}

#[test]
fn test_partial_cache_reports_incomplete() {
    let mut cache = MemoryCache::new();
    let mut seeded = Layer::new("sha256:baselayer");
    seeded.add_package(Package::new("base-files"));
    cache.add_layer(&seeded);

    let mut image = image_with_history();
    assert!(!load_from_cache(&mut image, &cache));
    assert_eq!(image.layers[0].packages.len(), 1);
    assert!(image.layers[1].packages.is_empty());
}

#[test]
fn test_no_running_container_aborts_base_loading_without_notices() {
    let library = library();
    let runtime = ScriptedRuntime::new(false, &[]);
    let notifier = Notifier::new(1);
    let mut cache = MemoryCache::new();

    let mut image = Image::new("debian", "bookworm");
    image.layers.push(Layer::new("sha256:baselayer"));

    InventoryProcessor::new(&library, &runtime, &notifier).resolve(&mut image, &mut cache);

    // precondition failure is logged, not recorded as a notice, and the
    // image is left unmodified
    assert!(image.notices.is_empty());
    assert!(image.layers[0].packages.is_empty());
    assert!(cache.get_packages("sha256:baselayer").is_none());
}

#[test]
fn test_unknown_base_image_gets_error_notice() {
    let library = library();
    let runtime = ScriptedRuntime::new(true, &[]);
    let notifier = Notifier::new(1);
    let mut cache = MemoryCache::new();

    let mut image = Image::new("alpine", "3.20");
    image.layers.push(Layer::new("sha256:somelayer"));

    InventoryProcessor::new(&library, &runtime, &notifier).resolve(&mut image, &mut cache);

    assert_eq!(image.notices.len(), 1);
    assert_eq!(image.notices[0].level, NoticeLevel::Error);
    assert!(image.notices[0].message.contains("alpine:3.20"));
}

#[test]
fn test_attribute_filling_tolerates_every_failure_mode() {
    let library = library();
    let entry = library.command_entry("apt-get").unwrap();

    // invocation failures: all three attributes attempted, error notices
    let failing_runtime = ScriptedRuntime::new(true, &[]);
    let mut pkg = Package::new("vim");
    fill_package_metadata(&mut pkg, &entry.packages, "/bin/bash", &failing_runtime);
    assert!(pkg.version.is_none());
    assert!(pkg.license.is_none());
    assert!(pkg.src_url.is_none());
    assert_eq!(pkg.notices.len(), 3);
    assert!(pkg
        .notices
        .iter()
        .all(|n| n.level == NoticeLevel::Error));

    // missing listings entirely: warnings instead of errors
    let empty_listing = oci2bom::command_lib::PackageListing::default();
    let mut pkg = Package::new("vim");
    fill_package_metadata(&mut pkg, &empty_listing, "/bin/bash", &failing_runtime);
    assert_eq!(pkg.notices.len(), 3);
    assert!(pkg
        .notices
        .iter()
        .all(|n| n.level == NoticeLevel::Warning));

    let (deps, msg) =
        get_package_dependencies(&empty_listing, "vim", "/bin/bash", &failing_runtime);
    assert!(deps.is_empty());
    assert!(msg.contains("'deps'"));
}
