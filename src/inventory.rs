//! The metadata-resolution core: rule-driven package attribute filling,
//! dependency extraction, installed-package discovery, and base-image
//! package loading.
//!
//! Everything here is best-effort. Rule absence and invocation failures are
//! recorded as notices on the most specific entity (package over image) and
//! processing always continues; the one fatal-for-the-call condition is a
//! missing running container, which is reported through the [`Notifier`]
//! and leaves the image untouched.

use crate::cache::{store_layers, PackageCache};
use crate::command::Command;
use crate::command_lib::{check_listing_key, image_shell, CommandLibrary, PackageListing};
use crate::image::Image;
use crate::invoker::{invoke_listing, ContainerRuntime};
use crate::notice::{Notice, NoticeLevel};
use crate::notifier::Notifier;
use crate::package::Package;
use std::collections::HashSet;

/// Shell used when a base listing declares none.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Notice origin for base-image rule lookups.
pub const BASE_ORIGIN: &str = "command_lib/base.json";
/// Notice origin for per-command snippet lookups.
pub const SNIPPETS_ORIGIN: &str = "command_lib/snippets.json";

/// Which keys of the base listing hold the positional attribute lists.
#[derive(Debug, Clone)]
pub struct BaseAttrKeys {
    pub names: String,
    pub versions: String,
    pub licenses: String,
    pub src_urls: String,
}

impl Default for BaseAttrKeys {
    fn default() -> Self {
        Self {
            names: "names".to_string(),
            versions: "versions".to_string(),
            licenses: "licenses".to_string(),
            src_urls: "src_urls".to_string(),
        }
    }
}

enum AttrResolution {
    Value(String),
    InvokeFailed(String),
    NoListing(String),
}

/// Resolve one attribute of a package listing to its first value.
/// Invocation may return several candidates; only index 0 is authoritative.
fn resolve_first_value(
    listing: &PackageListing,
    key: &str,
    shell: &str,
    runtime: &dyn ContainerRuntime,
    package_name: &str,
) -> AttrResolution {
    let (attr, listing_msg) = check_listing_key(listing, key);
    match attr {
        None => AttrResolution::NoListing(listing_msg),
        Some(attr) => {
            let (mut values, invoke_msg) =
                invoke_listing(runtime, shell, attr, Some(package_name));
            if values.is_empty() {
                AttrResolution::InvokeFailed(invoke_msg)
            } else {
                AttrResolution::Value(values.swap_remove(0))
            }
        }
    }
}

/// Fill version, license, and source URL of a package from its command
/// library listing.
///
/// The three attributes are attempted independently; a failure on one never
/// short-circuits the others. Invocation failure attaches an `error`
/// notice, a missing listing a `warning`, both naming the snippet source.
pub fn fill_package_metadata(
    pkg: &mut Package,
    pkg_listing: &PackageListing,
    shell: &str,
    runtime: &dyn ContainerRuntime,
) {
    let name = pkg.name.clone();

    match resolve_first_value(pkg_listing, "version", shell, runtime, &name) {
        AttrResolution::Value(value) => pkg.version = Some(value),
        AttrResolution::InvokeFailed(msg) => {
            pkg.add_notice(Notice::new(SNIPPETS_ORIGIN, msg, NoticeLevel::Error))
        }
        AttrResolution::NoListing(msg) => {
            pkg.add_notice(Notice::new(SNIPPETS_ORIGIN, msg, NoticeLevel::Warning))
        }
    }

    match resolve_first_value(pkg_listing, "license", shell, runtime, &name) {
        AttrResolution::Value(value) => pkg.license = Some(value),
        AttrResolution::InvokeFailed(msg) => {
            pkg.add_notice(Notice::new(SNIPPETS_ORIGIN, msg, NoticeLevel::Error))
        }
        AttrResolution::NoListing(msg) => {
            pkg.add_notice(Notice::new(SNIPPETS_ORIGIN, msg, NoticeLevel::Warning))
        }
    }

    // The source URL resolves under the `license` key, not a dedicated url
    // key. Pinned by the quirk regression tests; do not change without
    // flipping those.
    match resolve_first_value(pkg_listing, "license", shell, runtime, &name) {
        AttrResolution::Value(value) => pkg.src_url = Some(value),
        AttrResolution::InvokeFailed(msg) => {
            pkg.add_notice(Notice::new(SNIPPETS_ORIGIN, msg, NoticeLevel::Error))
        }
        AttrResolution::NoListing(msg) => {
            pkg.add_notice(Notice::new(SNIPPETS_ORIGIN, msg, NoticeLevel::Warning))
        }
    }
}

/// Resolve the dependency names of a package from the `deps` listing.
///
/// Returns a deduplicated name sequence and an empty message on success, or
/// an empty sequence plus the diagnostic message on absence or failure.
pub fn get_package_dependencies(
    pkg_listing: &PackageListing,
    package_name: &str,
    shell: &str,
    runtime: &dyn ContainerRuntime,
) -> (Vec<String>, String) {
    let (attr, deps_msg) = check_listing_key(pkg_listing, "deps");
    let Some(attr) = attr else {
        return (Vec::new(), deps_msg);
    };
    let (values, invoke_msg) = invoke_listing(runtime, shell, attr, Some(package_name));
    if values.is_empty() {
        return (Vec::new(), invoke_msg);
    }
    let mut seen = HashSet::new();
    let deps = values
        .into_iter()
        .filter(|dep| seen.insert(dep.clone()))
        .collect();
    (deps, String::new())
}

/// Wrap every word of a recognized install command as a bare package.
/// Metadata filling happens separately, per candidate.
pub fn get_installed_packages(command: &Command) -> Vec<Package> {
    if !(command.is_recognized() && command.is_install()) {
        return Vec::new();
    }
    command.words.iter().map(Package::new).collect()
}

/// Populate the base (first) image from the command library's base-image
/// listings.
///
/// The four attribute listings are invoked once each; results are
/// positional lists aligned by index. An attribute whose list length does
/// not exactly match the names list is silently left unset. Packages are
/// attached to every layer of the image, and every layer is then written to
/// the cache.
pub fn add_base_packages(
    image: &mut Image,
    keys: &BaseAttrKeys,
    library: &CommandLibrary,
    runtime: &dyn ContainerRuntime,
    notifier: &Notifier,
    cache: &mut dyn PackageCache,
) {
    let Some(listing) = library.base_listing(&image.name, &image.tag) else {
        image.add_notice(Notice::new(
            BASE_ORIGIN,
            format!(
                "No listing of {}:{} in the command library",
                image.name, image.tag
            ),
            NoticeLevel::Error,
        ));
        return;
    };

    let shell = match image_shell(listing) {
        Some(shell) => shell.to_string(),
        None => {
            image.add_notice(Notice::new(
                BASE_ORIGIN,
                format!(
                    "No shell listing for {}:{} in the command library. Using default shell {}",
                    image.name, image.tag, DEFAULT_SHELL
                ),
                NoticeLevel::Warning,
            ));
            image.add_notice(Notice::new(
                BASE_ORIGIN,
                "No listing for key 'shell'. Consider adding it to the base command library"
                    .to_string(),
                NoticeLevel::Hint,
            ));
            DEFAULT_SHELL.to_string()
        }
    };

    // The one fatal-for-the-call condition: no running container. Reported
    // through the observability channel, not as a notice, and the image is
    // left unmodified.
    if !runtime.is_running() {
        notifier.error("No running container found. Start a container before resolving base packages");
        return;
    }

    let base_attr = |key: &str| -> (Vec<String>, String) {
        match listing.attrs.get(key) {
            Some(attr) => invoke_listing(runtime, &shell, attr, None),
            None => (
                Vec::new(),
                format!("No listing for key '{}' in the command library", key),
            ),
        }
    };

    let (names, n_msg) = base_attr(&keys.names);
    let (versions, v_msg) = base_attr(&keys.versions);
    let (licenses, l_msg) = base_attr(&keys.licenses);
    let (src_urls, u_msg) = base_attr(&keys.src_urls);

    let invoke_msg = format!("{}{}{}{}", n_msg, v_msg, l_msg, u_msg);
    if !invoke_msg.is_empty() {
        image.add_notice(Notice::new(BASE_ORIGIN, invoke_msg, NoticeLevel::Error));
    }

    if names.len() > 1 {
        for (index, name) in names.iter().enumerate() {
            let mut pkg = Package::new(name);
            if versions.len() == names.len() {
                pkg.version = Some(versions[index].clone());
            }
            if licenses.len() == names.len() {
                pkg.license = Some(licenses[index].clone());
            }
            // Layer attachment is nested under the src_urls alignment
            // check: when source URLs misalign, the constructed packages
            // are dropped entirely. Pinned by a regression test.
            if src_urls.len() == names.len() {
                pkg.src_url = Some(src_urls[index].clone());
                for layer in &mut image.layers {
                    layer.add_package(pkg.clone());
                }
            }
        }
    }

    store_layers(image, cache);
}
