//! agora-compose: headless post composer.
//!
//! Usage:
//!   agora-compose submit --title "Hello World" --community c1 \
//!       --path /c/sample/submit --blocks post.json
//!   agora-compose preview --blocks post.json
//!   agora-compose validate --title "Hello World" --blocks post.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agora_composer::block::RawBlock;
use agora_composer::editor::{BufferHost, SavedOutput};
use agora_composer::form::{self, CommunityId};
use agora_composer::http::ApiClient;
use agora_composer::link::HttpLinkPreview;
use agora_composer::navigate::History;
use agora_composer::notify::{ChannelNotifier, Notification};
use agora_composer::submit::SubmitReport;
use agora_composer::tools::{ToolRegistry, ToolSettings};
use agora_composer::upload::{HttpUploader, LocalFile};
use agora_composer::{Composer, ComposerConfig, LifecyclePhase};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a post and submit it to the community API.
    Submit {
        /// Post title.
        #[arg(long)]
        title: String,

        /// Community the post belongs to.
        #[arg(long)]
        community: String,

        /// Path the composer is shown on; the parent path is the destination.
        #[arg(long, default_value = "/submit")]
        path: String,

        /// JSON file with blocks (`{ "blocks": [...] }` or a bare list).
        #[arg(long)]
        blocks: Option<PathBuf>,

        /// Image file to upload and append as an image block.
        #[arg(long = "image")]
        images: Vec<PathBuf>,

        /// Already-hosted image to append as an image block.
        #[arg(long = "image-url")]
        image_urls: Vec<String>,

        /// Link to append as a link block.
        #[arg(long = "link")]
        links: Vec<String>,
    },

    /// Render a blocks file to HTML.
    Preview {
        #[arg(long)]
        blocks: PathBuf,
    },

    /// Check a title and a blocks file without touching the network.
    Validate {
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        blocks: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = ComposerConfig::from_env().context("failed to load configuration")?;
    debug!(api_url = %config.api_url, "configuration loaded");

    match args.command {
        Command::Submit {
            title,
            community,
            path,
            blocks,
            images,
            image_urls,
            links,
        } => {
            let blocks = match blocks {
                Some(path) => read_blocks(&path).await?,
                None => Vec::new(),
            };
            let attachments = Attachments {
                images,
                image_urls,
                links,
            };
            submit(&config, title, community, path, blocks, attachments).await
        }
        Command::Preview { blocks } => {
            let registry = registry(&config)?;
            let blocks = registry.serialize_blocks(read_blocks(&blocks).await?)?;
            println!("{}", registry.render_blocks(&blocks));
            Ok(())
        }
        Command::Validate { title, blocks } => validate(&config, title, blocks).await,
    }
}

struct Attachments {
    images: Vec<PathBuf>,
    image_urls: Vec<String>,
    links: Vec<String>,
}

async fn submit(
    config: &ComposerConfig,
    title: String,
    community: String,
    path: String,
    blocks: Vec<RawBlock>,
    attachments: Attachments,
) -> Result<()> {
    let host = Arc::new(BufferHost::new());
    let (notifier, mut notifications) = ChannelNotifier::new();

    let composer = Composer::http(
        config,
        CommunityId::new(community),
        host.clone(),
        Arc::new(notifier),
        Arc::new(History::new(path)),
        Arc::new(|| debug!("title focused")),
    )?;

    composer
        .mount(LifecyclePhase::Ready)
        .await
        .context("failed to start the editor")?;
    let surface = host.surface().context("editor surface missing after mount")?;
    surface.load(blocks)?;

    for path in &attachments.images {
        let file = LocalFile::read(path).await?;
        // Upload failures belong to the image block; the rest of the post goes on.
        match surface.attach_image(file).await {
            Ok(id) => info!(path = %path.display(), block = %id, "image attached"),
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "image not attached");
            }
        }
    }
    for url in &attachments.image_urls {
        if let Err(e) = surface.attach_image_url(url).await {
            warn!(url = %url, error = %e, "image not attached");
        }
    }
    for link in &attachments.links {
        surface.attach_link(link).await?;
    }

    composer.set_title(title);
    let report = composer.submit().await;
    composer.unmount();
    print_notifications(&mut notifications);

    match report {
        SubmitReport::Published { destination, .. } => {
            println!("navigated to {destination}");
            Ok(())
        }
        SubmitReport::NotReady => bail!("editor was not ready"),
        SubmitReport::Busy => bail!("a submission is already in progress"),
        SubmitReport::Invalid(errors) => bail!("post is invalid: {errors}"),
        SubmitReport::SerializeFailed(e) => Err(e).context("post content is invalid"),
        SubmitReport::Failed { error, .. } => Err(error).context("post was not published"),
    }
}

async fn validate(
    config: &ComposerConfig,
    title: Option<String>,
    blocks: Option<PathBuf>,
) -> Result<()> {
    let mut problems = Vec::new();

    if let Some(title) = title
        && let Err(message) = form::validate_title(&title)
    {
        problems.push(format!("title: {message}"));
    }

    if let Some(path) = blocks {
        let registry = registry(config)?;
        for (index, block) in read_blocks(&path).await?.iter().enumerate() {
            for message in registry.validate_block(&block.tool, &block.data) {
                problems.push(format!("block {index} ({}): {message}", block.tool));
            }
        }
    }

    if problems.is_empty() {
        println!("ok");
        return Ok(());
    }
    for problem in &problems {
        println!("{problem}");
    }
    bail!("{} problem(s) found", problems.len())
}

/// Build the standard tools with HTTP transports. Nothing is sent until a
/// tool is used.
fn registry(config: &ComposerConfig) -> Result<ToolRegistry> {
    let api = ApiClient::new(config)?;
    let settings = ToolSettings::new(
        config,
        Arc::new(HttpUploader::new(
            &api,
            &config.upload_path,
            config.max_upload_bytes,
        )?),
        Arc::new(HttpLinkPreview::new(api.client().clone())),
    );
    Ok(ToolRegistry::standard(&settings)?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BlocksFile {
    List(Vec<RawBlock>),
    Saved(SavedOutput),
}

async fn read_blocks(path: &Path) -> Result<Vec<RawBlock>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: BlocksFile = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a blocks file", path.display()))?;
    Ok(match file {
        BlocksFile::Saved(saved) => saved.blocks,
        BlocksFile::List(blocks) => blocks,
    })
}

fn print_notifications(rx: &mut UnboundedReceiver<Notification>) {
    while let Ok(notification) = rx.try_recv() {
        println!("{notification}");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("agora_composer=info,agora_compose=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
