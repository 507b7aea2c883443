use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_stage::{
    FileBlob, FilePartLayout, HttpTransport, Operation, PageId, Rotation, ServiceOptions,
    StagingController, WireFormat,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::watch;

mod selection;

use selection::{PageList, parse_rotation};

#[derive(Parser)]
#[command(name = "pdfs", about = "Stage PDF pages and submit them for merging or extraction", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the staged pages into one document
    Merge(SubmitArgs),

    /// Extract the staged pages into a new document
    Extract(SubmitArgs),

    /// List the pages that would be staged, with their positions
    Pages {
        /// Input PDF files, staged in order
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },

    /// Write a configuration file with the default service settings
    InitConfig {
        /// Output JSON file
        output: PathBuf,

        #[command(flatten)]
        service: ServiceArgs,
    },
}

#[derive(Args)]
struct SubmitArgs {
    /// Input PDF files, staged in order. Unreadable files are skipped
    /// unless a position flag is given.
    #[arg(required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output file or directory (defaults to the service's filename in the
    /// current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Positions to submit, e.g. `1,3-5` (defaults to every page)
    #[arg(long)]
    pages: Option<PageList>,

    /// Rotate the page at a position, e.g. `2:90` (repeatable)
    #[arg(long = "rotate", value_parser = parse_rotation)]
    rotations: Vec<(usize, Rotation)>,

    /// New order as a permutation of every position, e.g. `3,1,2`
    #[arg(long)]
    order: Option<PageList>,

    #[command(flatten)]
    service: ServiceArgs,
}

impl SubmitArgs {
    fn uses_positions(&self) -> bool {
        self.pages.is_some() || !self.rotations.is_empty() || self.order.is_some()
    }
}

#[derive(Args)]
struct ServiceArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the processing service
    #[arg(long)]
    url: Option<String>,

    /// Request layout
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// How file content is attached to structured requests
    #[arg(long, value_enum)]
    file_parts: Option<FilePartsArg>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Structured,
    Legacy,
}

#[derive(Clone, Copy, ValueEnum)]
enum FilePartsArg {
    PerPage,
    Deduplicated,
}

impl From<FormatArg> for WireFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Structured => Self::Structured,
            FormatArg::Legacy => Self::Legacy,
        }
    }
}

impl From<FilePartsArg> for FilePartLayout {
    fn from(arg: FilePartsArg) -> Self {
        match arg {
            FilePartsArg::PerPage => Self::PerPage,
            FilePartsArg::Deduplicated => Self::Deduplicated,
        }
    }
}

impl ServiceArgs {
    async fn resolve(&self) -> Result<ServiceOptions> {
        let mut options = match &self.config {
            Some(path) => ServiceOptions::load(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ServiceOptions::default(),
        };
        if let Some(url) = &self.url {
            options.base_url = url.clone();
        }
        if let Some(format) = self.format {
            options.wire_format = format.into();
        }
        if let Some(file_parts) = self.file_parts {
            options.file_parts = file_parts.into();
        }
        if self.timeout.is_some() {
            options.timeout_secs = self.timeout;
        }
        options.validate()?;
        Ok(options)
    }
}

/// Stage every input that can be read. Unreadable files are reported and
/// skipped, unless `strict`: then any failure aborts, since the positions
/// given on the command line would no longer line up.
async fn stage(controller: &mut StagingController, input: &[PathBuf], strict: bool) -> Result<()> {
    let mut files = Vec::with_capacity(input.len());
    let mut failed = 0;
    for path in input {
        match FileBlob::read(path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                log::warn!("Skipping {}", e);
                failed += 1;
            }
        }
    }

    let report = controller.load_files(files).await?;
    for failure in &report.failures {
        log::warn!("Skipping {}", failure);
    }
    failed += report.failures.len();

    if failed > 0 && strict {
        bail!(
            "{} input file(s) could not be loaded; --pages, --rotate and --order need every file",
            failed
        );
    }
    if controller.registry().is_empty() {
        bail!("No pages could be loaded");
    }
    Ok(())
}

/// Look up the entry staged at each 1-based position
fn resolve_positions(staged: &[PageId], positions: &[usize]) -> Result<Vec<PageId>> {
    positions
        .iter()
        .map(|&position| {
            staged.get(position - 1).copied().with_context(|| {
                format!(
                    "Position {} is out of range ({} pages staged)",
                    position,
                    staged.len()
                )
            })
        })
        .collect()
}

fn apply_edits(controller: &mut StagingController, args: &SubmitArgs) -> Result<()> {
    let staged = controller.registry().order().to_vec();

    for &(position, rotation) in &args.rotations {
        let id = resolve_positions(&staged, &[position])?[0];
        while controller.registry().get(id).map(|e| e.rotation) != Some(rotation) {
            controller.rotate_entry(id)?;
        }
    }

    if let Some(PageList(positions)) = &args.pages {
        let chosen = resolve_positions(&staged, positions)?;
        controller.deselect_all()?;
        for id in chosen {
            if controller.registry().get(id).is_some_and(|e| !e.selected) {
                controller.toggle_select(id)?;
            }
        }
    }

    if let Some(PageList(positions)) = &args.order {
        let sequence = resolve_positions(&staged, positions)?;
        controller
            .reorder_all(sequence)
            .context("--order must list every position exactly once")?;
    }

    Ok(())
}

async fn report_progress(mut progress: watch::Receiver<u8>) {
    while progress.changed().await.is_ok() {
        let percent = *progress.borrow_and_update();
        if percent == 100 {
            eprintln!("\rUploaded, waiting for the service...");
            break;
        }
        eprint!("\rUploading {:>3}%", percent);
        let _ = std::io::stderr().flush();
    }
}

async fn submit(operation: Operation, args: SubmitArgs) -> Result<()> {
    let options = args.service.resolve().await?;
    let transport = HttpTransport::new(options.clone())?;
    let mut controller = StagingController::new(options);

    stage(&mut controller, &args.input, args.uses_positions()).await?;
    apply_edits(&mut controller, &args)?;

    let submission = controller.begin_submit(operation)?;
    let id = submission.id();
    println!(
        "Submitting {} pages for {}",
        submission.page_count(),
        operation
    );

    let progress = tokio::spawn(report_progress(submission.progress().subscribe()));
    let result = submission.send(&transport).await;
    progress.abort();

    let Some(outcome) = controller.finish_submit(id, result) else {
        bail!("Submission was abandoned");
    };
    let artifact = outcome?;

    let target = args.output.unwrap_or_else(|| PathBuf::from("."));
    let path = artifact.save(&target).await?;
    println!("{} → {}", operation, path.display());
    Ok(())
}

async fn list_pages(input: Vec<PathBuf>) -> Result<()> {
    let mut controller = StagingController::default();
    stage(&mut controller, &input, false).await?;

    println!("{:>5}  {:<32} {:>5}  {}", "Pos", "File", "Page", "Size (pt)");
    for (index, entry) in controller.registry().iter().enumerate() {
        let source = entry.source();
        let size = source
            .page_size(entry.source_page_number())
            .map(|s| format!("{:.0} x {:.0}", s.width_pt, s.height_pt))
            .unwrap_or_default();
        println!(
            "{:>5}  {:<32} {:>5}  {}",
            index + 1,
            source.name(),
            entry.source_page_number(),
            size
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Merge(args) => submit(Operation::Merge, args).await?,
        Commands::Extract(args) => submit(Operation::Extract, args).await?,
        Commands::Pages { input } => list_pages(input).await?,
        Commands::InitConfig { output, service } => {
            let options = service.resolve().await?;
            options.save(&output).await?;
            println!("Wrote {}", output.display());
        }
    }

    Ok(())
}
