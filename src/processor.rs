//! Per-image resolution pipeline.
//!
//! [`InventoryProcessor`] ties the pieces together for one image:
//! hydrate from the layer cache, resolve base packages from the command
//! library when needed, then walk each remaining layer's commands through
//! the filter pipeline and the metadata filler, writing results back to the
//! cache as each layer completes.

use crate::cache::{load_from_cache, PackageCache};
use crate::command::partition_commands;
use crate::command_lib::{image_shell, CommandLibrary};
use crate::image::Image;
use crate::inventory::{
    add_base_packages, fill_package_metadata, get_installed_packages, get_package_dependencies,
    BaseAttrKeys, DEFAULT_SHELL, SNIPPETS_ORIGIN,
};
use crate::invoker::ContainerRuntime;
use crate::notice::{Notice, NoticeLevel};
use crate::notifier::Notifier;

pub struct InventoryProcessor<'a> {
    library: &'a CommandLibrary,
    runtime: &'a dyn ContainerRuntime,
    notifier: &'a Notifier,
}

impl<'a> InventoryProcessor<'a> {
    pub fn new(
        library: &'a CommandLibrary,
        runtime: &'a dyn ContainerRuntime,
        notifier: &'a Notifier,
    ) -> Self {
        Self {
            library,
            runtime,
            notifier,
        }
    }

    /// Resolve the package inventory of `image`, layer by layer.
    ///
    /// Returns `true` when every layer was satisfied from the cache and no
    /// extraction ran.
    pub fn resolve(&self, image: &mut Image, cache: &mut dyn PackageCache) -> bool {
        self.notifier.info(&format!(
            "Resolving packages for {} ({} layers)",
            image.origin_ref(),
            image.layers.len()
        ));

        if load_from_cache(image, cache) {
            self.notifier
                .info("All layers satisfied from cache, skipping extraction");
            return true;
        }

        // remember which layers still need resolution before the base pass
        // fans packages out across all of them
        let needs_resolution: Vec<bool> = image
            .layers
            .iter()
            .map(|layer| layer.packages.is_empty())
            .collect();

        if needs_resolution.first().copied().unwrap_or(false) {
            self.notifier.debug("Resolving base packages...");
            add_base_packages(
                image,
                &BaseAttrKeys::default(),
                self.library,
                self.runtime,
                self.notifier,
                cache,
            );
        }

        let shell = self
            .library
            .base_listing(&image.name, &image.tag)
            .and_then(image_shell)
            .unwrap_or(DEFAULT_SHELL)
            .to_string();

        for (index, layer) in image.layers.iter_mut().enumerate() {
            if !needs_resolution[index] || layer.commands.is_empty() {
                continue;
            }
            self.notifier.debug(&format!(
                "Layer {}/{}: {} commands",
                index + 1,
                needs_resolution.len(),
                layer.commands.len()
            ));

            let mut commands = layer.commands.clone();
            for command in &mut commands {
                self.library.classify(command);
            }
            let parts = partition_commands(&commands);

            let layer_origin = format!("Layer: {}", layer.id);
            if !parts.ignored.is_empty() {
                layer.add_notice(Notice::new(
                    layer_origin.clone(),
                    format!("Ignored commands:\n{}", parts.ignored),
                    NoticeLevel::Warning,
                ));
            }
            if !parts.unrecognized.is_empty() {
                layer.add_notice(Notice::new(
                    layer_origin.clone(),
                    format!("Unrecognized commands:\n{}", parts.unrecognized),
                    NoticeLevel::Warning,
                ));
            }

            for command in &parts.retained {
                let packages = get_installed_packages(command);
                if packages.is_empty() {
                    continue;
                }
                // retained commands matched a library entry by construction
                let Some(entry) = self.library.command_entry(&command.name) else {
                    continue;
                };
                for mut package in packages {
                    fill_package_metadata(&mut package, &entry.packages, &shell, self.runtime);
                    let (deps, deps_msg) = get_package_dependencies(
                        &entry.packages,
                        &package.name,
                        &shell,
                        self.runtime,
                    );
                    if !deps_msg.is_empty() {
                        package.add_notice(Notice::new(
                            SNIPPETS_ORIGIN,
                            deps_msg,
                            NoticeLevel::Warning,
                        ));
                    }
                    package.deps = deps;
                    layer.add_package(package);
                }
            }

            cache.add_layer(layer);
        }

        self.notifier.info(&format!(
            "Resolved {} packages across {} layers",
            image
                .layers
                .iter()
                .map(|layer| layer.packages.len())
                .sum::<usize>(),
            image.layers.len()
        ));

        false
    }
}
