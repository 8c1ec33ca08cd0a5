pub mod cache;
pub mod command;
pub mod command_lib;
pub mod image;
pub mod inventory;
pub mod invoker;
pub mod notice;
pub mod notifier;
pub mod package;
pub mod processor;
pub mod report;
pub mod tarball;

// Re-exports for easy access
pub use cache::{JsonFileCache, MemoryCache, PackageCache};
pub use command::{partition_commands, Command, CommandAction, FilteredCommands};
pub use command_lib::{AttrListing, CommandLibrary};
pub use image::{Image, Layer};
pub use invoker::{ContainerRuntime, DockerRuntime};
pub use notice::{Notice, NoticeLevel};
pub use notifier::Notifier;
pub use package::{Package, PackageRecord};
pub use processor::InventoryProcessor;
