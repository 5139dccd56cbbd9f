use clap::{Parser, Subcommand};
use pixpress::config::{self, Config, DEFAULT_CONFIG_FILE};
use pixpress::imaging::{OutputFormat, RustBackend};
use pixpress::output::{self, ImageInfo};
use pixpress::pipeline::Pipeline;
use pixpress::session::{Outcome, Session};
use pixpress::source::ImageSource;
use pixpress::tools::{CompressTool, ResizeTool, ToolError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on how long a single command waits for its result.
const RESULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Release builds report the crate version; anything else the git revision.
fn version_string() -> &'static str {
    if env!("PIXPRESS_RELEASE") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("PIXPRESS_REVISION") {
        "" => "dev@unknown",
        // Called once per process.
        revision => Box::leak(format!("dev@{revision}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "pixpress")]
#[command(about = "Resize and compress images")]
#[command(long_about = "\
Resize and compress images

Every command reads one image (PNG, JPEG, WebP, AVIF, GIF, BMP, TIFF) and
writes the result next to it, or into --out-dir:

  resize    photo.jpg  →  photo-<width>x<height>.png
  compress  photo.jpg  →  photo-compressed.<webp|jpeg|avif>

Resizing keeps the aspect ratio unless --no-lock is given: pass only --width
or --height and the other axis follows.

Run 'pixpress gen-config' to generate a documented pixpress.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (defaults to ./pixpress.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log processing details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Where results are written.
#[derive(clap::Args, Clone)]
struct OutArgs {
    /// Output directory (defaults to the source file's directory)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Show format, size, and natural dimensions
    Info {
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stretch to new dimensions, written as PNG
    Resize {
        file: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Change each axis independently
        #[arg(long)]
        no_lock: bool,
        #[command(flatten)]
        out: OutArgs,
    },
    /// Re-encode at natural size
    Compress {
        file: PathBuf,
        /// webp, jpeg or avif (default from config)
        #[arg(long)]
        format: Option<OutputFormat>,
        /// 1-100 (default from config)
        #[arg(long)]
        quality: Option<u32>,
        #[command(flatten)]
        out: OutArgs,
    },
    /// Print a stock pixpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    init_thread_pool(&config.processing);
    let pipeline = Arc::new(Pipeline::new(RustBackend::with_options(
        config.backend_options(),
    )));

    match cli.command {
        Command::Info { file, json } => {
            let source = ImageSource::open(&file)?;
            let dimensions = pipeline.identify(&source)?;
            let info = ImageInfo::new(&source, dimensions);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                output::print_info(&info);
            }
        }
        Command::Resize {
            file,
            width,
            height,
            no_lock,
            out,
        } => {
            let source = ImageSource::open(&file)?;
            let mut tool = ResizeTool::open(pipeline, source, &config)?;
            if no_lock {
                tool.set_lock(false);
            }
            if let Some(w) = width {
                tool.set_width(w);
            }
            if let Some(h) = height {
                tool.set_height(h);
            }
            if !tool.needs_resize()? {
                let d = tool.dimensions();
                println!(
                    "{}: {}x{} is the natural size, nothing to do",
                    file.display(),
                    d.width,
                    d.height
                );
                return Ok(());
            }

            settle(tool.session_mut())?;
            let (name, result) = tool.download()?;
            let path = write_result(&file, out.out_dir.as_deref(), &name, &result.data)?;
            output::print_resize_result(
                tool.session().source().file_name(),
                &path.display().to_string(),
                tool.original(),
                result.dimensions,
                result.byte_size,
            );
        }
        Command::Compress {
            file,
            format,
            quality,
            out,
        } => {
            let mut config = config;
            if let Some(f) = format {
                config.compress.format = f;
            }
            if let Some(q) = quality {
                config.compress.quality = q;
            }
            let source = ImageSource::open(&file)?;
            let mut tool = CompressTool::open(pipeline, source, &config);

            settle(tool.session_mut())?;
            let (name, result) = tool.download()?;
            let path = write_result(&file, out.out_dir.as_deref(), &name, &result.data)?;
            let report = tool.size_report().ok_or(ToolError::NoResult)?;
            output::print_compress_result(
                tool.session().source().file_name(),
                &path.display().to_string(),
                tool.format(),
                tool.quality(),
                &report,
            );
        }
        Command::GenConfig => unreachable!("handled before config loading"),
    }

    Ok(())
}

/// Wait for the latest request and surface its failure, if any.
fn settle<B>(session: &mut Session<B>) -> Result<(), ToolError>
where
    B: pixpress::imaging::ImageBackend + 'static,
{
    match session.wait_latest(RESULT_TIMEOUT)? {
        Outcome::Failed { error, .. } => Err(error.into()),
        Outcome::Applied(_) | Outcome::Superseded(_) => Ok(()),
        Outcome::Cleared(_) => Err(ToolError::NoResult),
    }
}

fn write_result(
    source_path: &Path,
    out_dir: Option<&Path>,
    name: &str,
    data: &[u8],
) -> std::io::Result<PathBuf> {
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    std::fs::write(&path, data)?;
    Ok(path)
}

/// An explicit `--config` must exist; the default file is optional.
fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) if !path.exists() => {
            Err(format!("config file not found: {}", path.display()).into())
        }
        Some(path) => Ok(config::load_config(path)?),
        None => Ok(config::load_config(Path::new(DEFAULT_CONFIG_FILE))?),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
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
