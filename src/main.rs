use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use url::Url;

mod app;
mod ui;

use app::{App, AppEvent};
use murmur::config::Config;
use murmur::content::{BlobRegistry, BlobResolver, HttpFetcher, LinkPreview};
use murmur::feed::{FeedView, HttpSearchProvider, PaginatedFeed};
use murmur::inline::{InlineMediaView, Segment};
use murmur::messages::{ChatHistory, Transcript};
use murmur::storage::{Database, DatabaseError, KeyValueStore, TtlCache, PICKER_CACHE_PREFIX};
use murmur::trust::{
    normalize_domain, ConfirmChoice, ConfirmationPrompt, LinkGate, LinkRisk, SystemOpener,
    TrustDecision, TrustPolicy, DEFAULT_TRUSTED_DOMAINS,
};

/// Get the config directory path (~/.config/murmur/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("murmur"))
}

#[derive(Parser, Debug)]
#[command(
    name = "murmur",
    about = "Terminal chat view with trust-gated media embeds and a cached GIF picker"
)]
struct Args {
    /// Use this directory instead of ~/.config/murmur
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse a JSON transcript of chats in the terminal UI
    View {
        #[arg(value_name = "TRANSCRIPT")]
        transcript: PathBuf,
    },
    /// Query the GIF picker and print what it shows
    Gifs {
        /// Search text; empty shows the categories
        query: Option<String>,
        /// Pages of results to reveal
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Manage the trusted domain list
    Trust {
        #[command(subcommand)]
        action: TrustAction,
    },
    /// Show the preview a link would get
    Preview { url: String },
    /// Open a link, asking first if it is not trusted
    Open { url: String },
    /// Extract and resolve the media embedded in a message
    Embeds {
        message_id: String,
        text: String,
    },
    /// Inspect or clear the picker cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum TrustAction {
    /// Print every trusted domain
    List,
    /// Trust a domain permanently
    Add { domain: String },
    /// Show how a URL is classified
    Check { url: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Count cached picker entries
    Status,
    /// Remove every cached picker entry
    Clear,
}

/// Everything the subcommands share, wired once.
struct Services {
    config: Config,
    db: Database,
    policy: Arc<TrustPolicy>,
    resolver: Arc<BlobResolver>,
    gate: Arc<LinkGate>,
}

impl Services {
    async fn open(config_dir: &Path, config: Config) -> Result<Self> {
        let db_path = config_dir.join("murmur.db");
        let db_path_str = db_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
        let db = match Database::open(db_path_str).await {
            Ok(db) => db,
            Err(DatabaseError::InstanceLocked) => {
                eprintln!(
                    "Error: Another instance of murmur appears to be running. Please close it and try again."
                );
                std::process::exit(1);
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
        };
        let store: Arc<dyn KeyValueStore> = Arc::new(db.clone());

        let mut seed: Vec<&str> = DEFAULT_TRUSTED_DOMAINS.to_vec();
        seed.extend(config.trusted_domains.iter().map(String::as_str));
        let policy = Arc::new(TrustPolicy::load_with_seed(Arc::clone(&store), seed).await);

        let fetcher = HttpFetcher::new(config.fetch_timeout(), config.max_media_bytes)
            .context("Failed to create HTTP client")?;
        let resolver = Arc::new(BlobResolver::new(
            Arc::clone(&policy),
            Arc::new(fetcher),
            BlobRegistry::new(),
        ));
        let gate = Arc::new(LinkGate::new(Arc::clone(&policy), Arc::new(SystemOpener)));

        Ok(Self {
            config,
            db,
            policy,
            resolver,
            gate,
        })
    }

    fn feed(&self) -> Result<PaginatedFeed> {
        let client = reqwest::Client::builder()
            .timeout(self.config.fetch_timeout())
            .user_agent(concat!("murmur/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        let provider = HttpSearchProvider::new(
            client,
            &self.config.trending_url,
            &self.config.search_url,
            self.config.api_key(),
            self.config.fetch_timeout(),
        )
        .context("Invalid picker endpoint in config")?;
        let cache = Arc::new(TtlCache::new(
            Arc::new(self.db.clone()),
            PICKER_CACHE_PREFIX,
            self.config.cache_ttl(),
        ));
        Ok(PaginatedFeed::new(
            Arc::new(provider),
            cache,
            self.config.feed_options(),
        ))
    }
}

/// Reads the confirmation answer from stdin.
struct StdinPrompt;

#[async_trait]
impl ConfirmationPrompt for StdinPrompt {
    async fn confirm(&self, url: &Url, risk: LinkRisk) -> ConfirmChoice {
        match risk {
            LinkRisk::UntrustedDomain => {
                eprintln!("{} is not on the trusted list.", url.host_str().unwrap_or("?"));
                eprint!("Open it? [y]es once / [t]rust domain / [N]o: ");
            }
            LinkRisk::FlaggedUnsafe => {
                eprintln!("{} points at a local or private address.", url);
                eprint!("Open it anyway? [y]es once / [N]o: ");
            }
        }
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = stdin.read_line(&mut line).await {
            tracing::warn!(error = %e, "Failed to read confirmation");
            return ConfirmChoice::Cancel;
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => ConfirmChoice::ProceedOnce,
            "t" | "trust" => ConfirmChoice::TrustDomainPermanently,
            _ => ConfirmChoice::Cancel,
        }
    }
}

/// Logs go to stderr normally, and to murmur.log while the TUI owns the
/// terminal.
fn init_logging(config_dir: &Path, tui: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env());
    if tui {
        let log_path = config_dir.join("murmur.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

fn prepare_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    }

    // SEC-007: user-only access; the database holds the trust list
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    prepare_config_dir(&config_dir)?;
    init_logging(&config_dir, matches!(args.command, Command::View { .. }))?;

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;
    tracing::debug!(?config, "Configuration");
    let services = Services::open(&config_dir, config).await?;

    match args.command {
        Command::View { transcript } => run_view(&services, &transcript).await,
        Command::Gifs { query, pages } => run_gifs(&services, query.as_deref(), pages).await,
        Command::Trust { action } => run_trust(&services, action).await,
        Command::Preview { url } => run_preview(&services, &url).await,
        Command::Open { url } => {
            let outcome = services
                .gate
                .navigate(&url, &StdinPrompt)
                .await
                .context("Failed to open link")?;
            println!("{:?}", outcome);
            Ok(())
        }
        Command::Embeds { message_id, text } => run_embeds(&services, &message_id, &text).await,
        Command::Cache { action } => run_cache(&services, action).await,
    }
}

async fn run_view(services: &Services, transcript: &Path) -> Result<()> {
    let transcript = Transcript::load(transcript)
        .with_context(|| format!("Failed to load transcript {}", transcript.display()))?;
    if transcript.chats.is_empty() {
        anyhow::bail!("Transcript has no chats");
    }
    let page_size = services.config.history_page_size;
    let chats: Vec<ChatHistory> = transcript
        .chats
        .into_iter()
        .map(|chat| ChatHistory::new(chat, page_size))
        .collect();

    let mut app = App::new(
        chats,
        Arc::clone(&services.gate),
        Arc::clone(&services.resolver),
        services.feed()?,
        services.config.near_bottom_threshold,
    );

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);
    ui::run(&mut app, event_tx, event_rx).await?;

    let blobs = services.resolver.blobs();
    tracing::info!(
        created = blobs.created(),
        released = blobs.released(),
        "Local media references at exit"
    );
    Ok(())
}

async fn run_gifs(services: &Services, query: Option<&str>, pages: usize) -> Result<()> {
    let mut feed = services.feed()?;
    feed.on_query_change(query.unwrap_or(""));
    feed.settle().await;
    for _ in 1..pages.max(1) {
        if !feed.load_more() {
            break;
        }
    }

    let state = feed.state();
    match state.view {
        FeedView::Categories => {
            if state.categories.is_empty() {
                println!("No categories");
            }
            for category in &state.categories {
                println!("{}", category.name);
            }
        }
        FeedView::Results => {
            let visible = state.visible_results();
            if visible.is_empty() {
                println!("No results");
            }
            for item in visible {
                match (item.width, item.height) {
                    (Some(w), Some(h)) => println!("{}  {}x{}", item.url, w, h),
                    _ => println!("{}", item.url),
                }
            }
            println!(
                "-- {} of {} (page {}/{})",
                visible.len(),
                state.all_results.len(),
                state.page,
                state.max_page()
            );
        }
    }
    Ok(())
}

async fn run_trust(services: &Services, action: TrustAction) -> Result<()> {
    let policy = &services.policy;
    match action {
        TrustAction::List => {
            let user = policy.user_domains();
            for domain in policy.domains() {
                let marker = if user.contains(&domain) { "  (added)" } else { "" };
                println!("{}{}", domain, marker);
            }
        }
        TrustAction::Add { domain } => {
            let normalized = normalize_domain(&domain)?;
            if policy.add_trusted_domain(&domain).await? {
                println!("Trusted {}", normalized);
            } else {
                println!("{} was already trusted", normalized);
            }
        }
        TrustAction::Check { url } => {
            let decision = policy.classify(&url);
            let label = match decision {
                TrustDecision::Trusted => "trusted",
                TrustDecision::Unknown => "unknown (asks before opening)",
                TrustDecision::Blocked => "blocked",
            };
            println!("{}: {}", url, label);
        }
    }
    Ok(())
}

async fn run_preview(services: &Services, raw: &str) -> Result<()> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL: {}", raw))?;
    match services.resolver.preview(&url).await {
        LinkPreview::Media(media) => {
            println!("{:?} {}", media.kind, media.source_url);
            if let Some(local) = &media.local_ref {
                println!(
                    "  downloaded {} bytes ({})",
                    local.len(),
                    local.mime().unwrap_or("unknown type")
                );
            }
        }
        LinkPreview::Page(page) => {
            println!("{}", page.title.as_deref().unwrap_or("(untitled)"));
            if let Some(description) = &page.description {
                println!("  {}", description);
            }
            if let Some(image) = &page.image {
                println!("  image: {}", image);
            }
        }
        LinkPreview::HostOnly { host, .. } => println!("{}", host),
    }
    Ok(())
}

async fn run_embeds(services: &Services, message_id: &str, text: &str) -> Result<()> {
    let mut view = InlineMediaView::new(Arc::clone(&services.resolver));
    for segment in view.segments(text) {
        if let Segment::Link { url, target } = segment {
            println!("link {:?}: {}", target, url);
        }
    }
    for embed in view.show(message_id, text).await {
        println!(
            "embed {:?} ({:?}): {}",
            embed.media.kind,
            embed.action,
            embed.media.display_url()
        );
    }
    view.unmount();
    Ok(())
}

async fn run_cache(services: &Services, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Status => {
            let count = services
                .db
                .count_keys(PICKER_CACHE_PREFIX)
                .await
                .context("Failed to count cache entries")?;
            println!(
                "{} cached picker entries (TTL {}h)",
                count, services.config.cache_ttl_hours
            );
        }
        CacheAction::Clear => {
            let removed = services
                .db
                .clear_prefix(PICKER_CACHE_PREFIX)
                .await
                .context("Failed to clear cache")?;
            println!("Removed {} cached picker entries", removed);
        }
    }
    Ok(())
}
