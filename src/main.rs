use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{debug, info, LevelFilter};
use std::path::PathBuf;

use oci2bom::processor::InventoryProcessor;
use oci2bom::report;
use oci2bom::tarball;
use oci2bom::{CommandLibrary, DockerRuntime, JsonFileCache, Notifier};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(help = "Image reference to inventory (e.g., alpine:3.20)")]
    image: String,

    #[arg(
        short,
        long,
        help = "Read the image from an existing `docker save` tarball instead of the docker daemon"
    )]
    tarball: Option<PathBuf>,

    #[arg(
        short,
        long,
        default_value = "./command_lib",
        help = "Directory holding the command library (base.json, snippets.json)"
    )]
    library: PathBuf,

    #[arg(
        long,
        default_value = "./layer_cache.json",
        help = "Layer cache file"
    )]
    cache: PathBuf,

    #[arg(
        short,
        long,
        help = "Name of the running container to execute extraction recipes in"
    )]
    container: Option<String>,

    #[arg(
        short,
        long,
        default_value = "./inventory.md",
        help = "Output path for the Markdown report"
    )]
    output: PathBuf,

    #[arg(long, help = "Also write the inventory as JSON to this path")]
    json: Option<PathBuf>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to text-based progress"
    )]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(log_level)
        .init();

    info!("Starting oci2bom for image: {}", cli.image);
    debug!("Command library: {}", cli.library.display());
    debug!("Cache file: {}", cli.cache.display());

    let notifier = Notifier::new(cli.verbose);

    let library = CommandLibrary::load_from_dir(&cli.library)?;
    let mut cache = JsonFileCache::open(&cli.cache)?;

    // the tempdir must stay alive while the tarball is read
    let (tarball_path, _temp_dir) = match cli.tarball {
        Some(path) => (path, None),
        None => {
            let (path, temp_dir) = tarball::fetch_image_tarball(&cli.image, &notifier)?;
            (path, Some(temp_dir))
        }
    };

    let mut image = tarball::image_from_tarball(&tarball_path, &cli.image, &notifier)?;

    let runtime = DockerRuntime::new(cli.container.unwrap_or_default());
    let from_cache =
        InventoryProcessor::new(&library, &runtime, &notifier).resolve(&mut image, &mut cache);
    debug!("Fully cache-satisfied: {}", from_cache);

    cache.save()?;

    report::generate_markdown_report(&image, &cli.output)?;
    if let Some(json_path) = &cli.json {
        report::generate_json_report(&image, json_path)?;
    }

    notifier.finish();
    println!("Inventory written to {}", cli.output.display());

    Ok(())
}
