use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thumbnail_maker::dsl::ThumbnailDocument;
use thumbnail_maker::fonts::FontCache;
use thumbnail_maker::overrides::Overrides;
use thumbnail_maker::render::{OutputFormat, Renderer};
use thumbnail_maker::{config, output, package};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "thumbnail-maker")]
#[command(about = "Render thumbnail documents into images")]
#[command(long_about = "\
Render thumbnail documents into images

A document is JSON describing the canvas size, a background (solid color,
gradient or image) and text blocks anchored to a 3x3 grid:

  {
    \"Thumbnail\": {
      \"Resolution\": {\"type\": \"preset\", \"value\": \"16:9\"},
      \"Background\": {\"type\": \"solid\", \"color\": \"#a3e635\"},
      \"Texts\": [{
        \"type\": \"title\", \"content\": \"Hello\\nWorld\", \"gridPosition\": \"mc\",
        \"font\": {\"name\": \"SBAggroB\", \"faces\": [{\"name\": \"SBAggroB\",
                 \"url\": \"https://.../SBAggroB.woff\", \"weight\": \"bold\"}]},
        \"fontSize\": 48, \"color\": \"#ffffff\",
        \"outline\": {\"thickness\": 4, \"color\": \"#000000\"}
      }]
    }
  }

Fonts are downloaded (or read, or decoded from data: URLs) once, converted
to TrueType and kept in the font cache directory. A .thl package bundles a
document with its fonts and can be rendered anywhere without the network.

Run 'thumbnail-maker gen-config' to generate a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Engine config file (default: ./thumbnail-maker.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Font cache directory (overrides the config file)
    #[arg(long, global = true)]
    fonts_dir: Option<PathBuf>,

    /// Log debug detail (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Shared arguments for commands that render.
#[derive(clap::Args, Clone)]
struct RenderArgs {
    /// Document (.json) or package (.thl)
    #[arg(default_value = "thumbnail.json")]
    dsl: PathBuf,

    /// Output image; .png, .jpg or .jpeg picks the format
    #[arg(short, long, default_value = "thumbnail.png")]
    output: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Render a document or package to an image
    Generate(RenderArgs),
    /// Render with the title, subtitle or background image replaced
    Genthumb {
        #[command(flatten)]
        render: RenderArgs,

        /// Replacement title text (`\n` starts a new line)
        #[arg(long)]
        title: Option<String>,

        /// Replacement subtitle text (`\n` starts a new line)
        #[arg(long)]
        subtitle: Option<String>,

        /// Replace the background with this image
        #[arg(long = "bg-img", alias = "bgImg")]
        bg_img: Option<PathBuf>,
    },
    /// Bundle a document and its fonts into a .thl package
    Package {
        /// Document to package
        #[arg(default_value = "thumbnail.json")]
        dsl: PathBuf,

        /// Package to write
        #[arg(short, long, default_value = "thumbnail.thl")]
        output: PathBuf,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir()?;
    let mut engine = config::load_config(cli.config.as_deref(), &cwd)?;
    if let Some(dir) = cli.fonts_dir {
        engine.fonts_dir = dir;
    }
    init_thread_pool(&engine.processing);

    match cli.command {
        Command::Generate(args) => {
            render(&engine, &args, &Overrides::default())?;
        }
        Command::Genthumb {
            render: args,
            title,
            subtitle,
            bg_img,
        } => {
            let overrides = Overrides {
                title,
                subtitle,
                background_image: bg_img,
            };
            render(&engine, &args, &overrides)?;
        }
        Command::Package { dsl, output: out } => {
            let json = read_document(&dsl)?;
            let report = package::write_package(&json, &engine.font_cache(), &out)?;
            output::print_package_report(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn render(
    engine: &config::EngineConfig,
    args: &RenderArgs,
    overrides: &Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let cache = engine.font_cache();
    let mut doc = load_document(&args.dsl, &cache)?;
    overrides.apply(&mut doc);

    let mut options = engine.render_options();
    options.format = OutputFormat::from_path(&args.output).unwrap_or(options.format);
    let renderer = Renderer::new(cache, options);
    renderer.render_to_path(&doc, &args.output)?;
    output::print_render_output(&doc, &args.output);
    Ok(())
}

/// Load a document, installing its fonts first when it is a package.
fn load_document(path: &Path, cache: &FontCache) -> Result<ThumbnailDocument, Box<dyn std::error::Error>> {
    if package::is_package_path(path) {
        let installed = package::install_package(path, cache)?;
        output::print_install_output(&installed, path);
        return Ok(installed.document);
    }
    Ok(ThumbnailDocument::from_json(&read_document(path)?)?)
}

fn read_document(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()).into())
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "thumbnail_maker=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
