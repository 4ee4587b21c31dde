use clap::{ArgGroup, Parser, Subcommand};
use photo_relay::aggregate::BatchProgress;
use photo_relay::config::{self, AppConfig};
use photo_relay::imaging::{ImageBackend, RustBackend};
use photo_relay::store::{self, WebhookStore};
use photo_relay::transfer::HttpTransport;
use photo_relay::types::{UploadOutcome, WebhookTarget};
use photo_relay::upload::{UploadOptions, UploadTask, Uploader};
use photo_relay::{logging, metadata, output, payload, scan};
use std::error::Error;
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "photo-relay")]
#[command(about = "Upload world screenshots to a chat webhook, captioned from their metadata")]
#[command(long_about = "\
Upload world screenshots to a chat webhook, captioned from their metadata

Screenshots carrying a scene record in their PNG `Description` text chunk are
posted with a caption naming the world (with launch links) and the players in
the shot. The capture time is taken from the file name
(VRChat_2024-03-09_21-45-07.123_2560x1440.png) or the file's creation time.

Images the webhook rejects as too large (413) are re-encoded as JPEG and sent
once more.

Typical use:

  photo-relay webhooks add friends https://discord.com/api/webhooks/<id>/<token>
  photo-relay upload ~/Pictures/VRChat/2024-03 --webhook friends

Run 'photo-relay gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file [default: <config dir>/photo-relay/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload images (files or directories) to a webhook
    Upload(UploadArgs),
    /// Manage saved webhooks
    #[command(subcommand)]
    Webhooks(WebhookCommand),
    /// Show an image's embedded metadata and the message it would be posted with
    Inspect {
        /// PNG screenshot
        image: PathBuf,
    },
    /// Write a copy of a PNG with a metadata record embedded
    Embed {
        /// Source PNG
        image: PathBuf,
        /// JSON file holding the record
        #[arg(long)]
        metadata: PathBuf,
        /// Destination [default: <stem>_Modified.png next to the source]
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
#[command(group(ArgGroup::new("target").required(true).args(["webhook", "url"])))]
struct UploadArgs {
    /// Image files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Saved webhook to post to
    #[arg(long)]
    webhook: Option<String>,

    /// Webhook URL to post to directly
    #[arg(long)]
    url: Option<String>,

    /// Open a named thread per image (forum and media channels)
    #[arg(long)]
    thread: bool,

    /// Uploads in flight at once
    #[arg(long, conflicts_with = "unbounded")]
    workers: Option<NonZeroUsize>,

    /// One thread per image instead of a worker pool
    #[arg(long)]
    unbounded: bool,

    /// Stop waiting for results after this many seconds
    #[arg(long)]
    deadline: Option<NonZeroU64>,
}

#[derive(Subcommand)]
enum WebhookCommand {
    /// List saved webhooks
    List,
    /// Save a webhook under a name
    Add { name: String, url: String },
    /// Delete a saved webhook
    Remove { name: String },
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let config = config::load_config(cli.config.as_deref())?;
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("warning: logging not initialized: {e}");
    }

    match cli.command {
        Command::Upload(args) => run_upload(args, &config),
        Command::Webhooks(command) => run_webhooks(command, &config),
        Command::Inspect { image } => {
            if !image.is_file() {
                return Err(format!("{} is not a file", image.display()).into());
            }
            let backend = RustBackend::new();
            let record = metadata::extract(&backend, &image);
            let task = UploadTask::from_path(&image);
            let fields = payload::build(&record, task.captured_at, config.upload.thread_mode);
            output::print_inspect(&image, &record, &fields, task.captured_at);
            Ok(ExitCode::SUCCESS)
        }
        Command::Embed {
            image,
            metadata: metadata_path,
            output: destination,
        } => {
            let text = std::fs::read_to_string(&metadata_path)?;
            let record = metadata::decode(&text)?;
            let destination = destination.unwrap_or_else(|| metadata::modified_output_path(&image));
            metadata::embed_into_png(&record, &image, &destination)?;
            println!("Wrote {}", destination.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => Ok(ExitCode::SUCCESS),
    }
}

fn run_upload(args: UploadArgs, config: &AppConfig) -> Result<ExitCode, Box<dyn Error>> {
    let target = resolve_target(&args, config)?;

    let mut upload_config = config.upload.clone();
    upload_config.thread_mode |= args.thread;
    if let Some(workers) = args.workers {
        upload_config.max_workers = Some(workers.get());
        upload_config.unbounded = false;
    }
    upload_config.unbounded |= args.unbounded;
    if let Some(deadline) = args.deadline {
        upload_config.batch_deadline_secs = Some(deadline.get());
    }

    let backend: Arc<dyn ImageBackend> = Arc::new(RustBackend::new());
    let inputs = scan::collect_images(backend.as_ref(), &args.paths);
    output::print_rejections(&inputs);
    if inputs.is_empty() {
        println!("{}", scan::NO_IMAGES_MESSAGE);
        return Ok(ExitCode::FAILURE);
    }

    let transport = Arc::new(HttpTransport::new(upload_config.request_timeout())?);
    let uploader = Uploader::new(
        backend,
        transport,
        UploadOptions::from_config(&upload_config),
    );

    println!(
        "{}",
        output::format_batch_header(inputs.accepted.len(), &target)
    );
    let handle = uploader.start_batch(&inputs.accepted, target)?;
    let mut print_progress = |outcome: &UploadOutcome, progress: &BatchProgress| {
        println!("{}", output::format_progress_line(outcome, progress));
    };
    let report = handle.wait(&mut print_progress);

    println!();
    output::print_batch_report(&report);
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn resolve_target(args: &UploadArgs, config: &AppConfig) -> Result<WebhookTarget, Box<dyn Error>> {
    if let Some(url) = &args.url {
        if !store::is_valid_webhook_url(url) {
            tracing::warn!("--url does not look like a Discord webhook URL");
        }
        return Ok(WebhookTarget::new(url.clone()));
    }
    let name = args.webhook.as_deref().unwrap_or_default();
    let store = WebhookStore::open(&config.store.resolved_path()?)?;
    match store.find(name)? {
        Some(webhook) => Ok(webhook.target()),
        None => Err(format!(
            "no saved webhook named '{name}' (see `photo-relay webhooks list`)"
        )
        .into()),
    }
}

fn run_webhooks(command: WebhookCommand, config: &AppConfig) -> Result<ExitCode, Box<dyn Error>> {
    let store = WebhookStore::open(&config.store.resolved_path()?)?;
    match command {
        WebhookCommand::List => {
            output::print_webhook_list(&store.list()?);
        }
        WebhookCommand::Add { name, url } => {
            let webhook = store.insert(&name, &url)?;
            println!("Added webhook '{}'", webhook.name);
        }
        WebhookCommand::Remove { name } => {
            if !store.delete(&name)? {
                eprintln!("No saved webhook named '{name}'");
                return Ok(ExitCode::FAILURE);
            }
            println!("Removed webhook '{name}'");
        }
    }
    Ok(ExitCode::SUCCESS)
}
