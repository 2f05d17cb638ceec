mod raster;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_canvas::{CanvasPool, MemoryCanvas};
use folio_core::{archive, Session, SessionConfig};
use folio_model::{PageId, PageSize, PageSpec};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub use raster::PngRasterizer;

const POOL_CAPACITY: usize = 4;

#[derive(Debug, Parser)]
#[command(name = "folio")]
#[command(about = "Folio document tool")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Create a blank document.
    New {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
    /// Convert a single-file document into an archive.
    Convert {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Write the thumbnail of the first page as PNG.
    Thumbnail {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    name: String,
    format: &'static str,
    page_count: usize,
    properties: BTreeMap<String, String>,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    id: String,
    name: String,
    width: u32,
    height: u32,
    parent: Option<String>,
    background: Option<String>,
    children: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::New { output, pages, width, height } => run_new(&output, pages, width, height),
        Commands::Convert { file, output } => run_convert(&file, &output),
        Commands::Thumbnail { file, output } => run_thumbnail(&file, output.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn session() -> Result<Session<MemoryCanvas>> {
    let config = SessionConfig::from_env().context("invalid configuration")?;
    let pool = CanvasPool::with_capacity(POOL_CAPACITY, MemoryCanvas::new)?;
    Ok(Session::new(pool, Box::new(PngRasterizer), config)?)
}

fn open(file: &Path) -> Result<Session<MemoryCanvas>> {
    ensure_file_exists(file)?;
    let mut session = session()?;
    session.open(file).context("failed to open document")?;
    Ok(session)
}

fn run_info(file: &Path) -> Result<()> {
    let session = open(file)?;
    let format = if archive::is_archive(file)? { "archive" } else { "single-file" };

    let ids = |ids: &[PageId]| ids.iter().map(ToString::to_string).collect::<Vec<_>>();
    let pages = session
        .store()
        .pages()
        .map(|page| PageOutput {
            id: page.id().to_string(),
            name: page.meta.name.clone(),
            width: page.meta.width,
            height: page.meta.height,
            parent: page.meta.parent_page_id.map(|id| id.to_string()),
            background: page.meta.background_page_id.map(|id| id.to_string()),
            children: ids(&page.children),
        })
        .collect::<Vec<_>>();

    let payload = InfoOutput {
        path: file.display().to_string(),
        name: file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| session.document_name()),
        format,
        page_count: pages.len(),
        properties: session.properties().clone(),
        pages,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn run_new(output: &Path, pages: u32, width: Option<u32>, height: Option<u32>) -> Result<()> {
    if pages == 0 {
        anyhow::bail!("--pages must be >= 1");
    }

    let mut session = session()?;
    let default = session.config().default_page_size;
    let size = PageSize::new(width.unwrap_or(default.width), height.unwrap_or(default.height));

    let first = session.page_ids()[0];
    if size != default {
        session.resize_page(first, size).context("invalid page size")?;
    }
    for index in 2..=pages {
        session.new_page(PageSpec::new(format!("Page {index}"), size))?;
    }

    save(&mut session, output)
}

fn run_convert(file: &Path, output: &Path) -> Result<()> {
    let mut session = open(file)?;
    save(&mut session, output)
}

fn run_thumbnail(file: &Path, output: Option<&Path>) -> Result<()> {
    ensure_file_exists(file)?;
    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_thumbnail_output(file));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let stored = archive::is_archive(file)? && archive::read_archive_thumbnail(file, &output)?;
    if !stored {
        let mut session = open(file)?;
        let first = session.store().first().context("document has no pages")?;
        let thumbnail = session.update_page_thumbnail(first).context("failed to render thumbnail")?;
        fs::copy(&thumbnail, &output)
            .with_context(|| format!("failed to write image to {}", output.display()))?;
    }

    println!("{}", output.display());
    Ok(())
}

fn save(session: &mut Session<MemoryCanvas>, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    session
        .save_as(output)
        .with_context(|| format!("failed to save document to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_thumbnail_output(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("thumbnail");

    file.with_file_name(format!("{stem}-thumb.png"))
}
