use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use listaro_portal::config::{self, Config};
use listaro_portal::dashboard::{self, ListingFilter};
use listaro_portal::db;
use listaro_portal::manifest;
use listaro_portal::media::{optimize_image_url, CloudinaryUploader};
use listaro_portal::model::{BatchId, Listing, ListingStatus};
use listaro_portal::pager::Pager;
use listaro_portal::poller::{ConvergencePoller, PollHandle};
use listaro_portal::session::{self, SessionContext, SessionStore};
use listaro_portal::store::{self, RecordStore};
use listaro_portal::submit::BatchSubmitter;
use listaro_portal::text::clean_generated_text;

#[derive(Debug, Parser)]
#[command(author, version, about = "Batch listing submission for the seller portal")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write an example config file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    /// Log in as a seller
    Login {
        #[arg(long)]
        user: String,
        #[arg(long)]
        key: String,
    },
    /// Log in as a branch manager
    ManagerLogin {
        #[arg(long)]
        user: String,
        #[arg(long)]
        key: String,
    },
    /// Forget all stored identities
    Logout,
    /// Submit the drafts of a YAML manifest as one batch
    Submit {
        #[arg(long)]
        drafts: PathBuf,
        /// Return right after the commit instead of watching enrichment
        #[arg(long)]
        no_watch: bool,
        /// Pages of results to reveal
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Watch an already committed batch
    Watch {
        #[arg(long)]
        batch: String,
        /// Stop once this many records are enriched
        #[arg(long, default_value_t = 1)]
        expected: usize,
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Branch overview for the logged-in manager
    Dashboard {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Days covered by the activity table
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

struct App {
    cfg: Config,
    store: Arc<dyn RecordStore>,
    sessions: SessionStore,
    ctx: SessionContext,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::InitConfig { force } = args.command {
        return init_config(&args.config, force);
    }

    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let sessions = SessionStore::new(pool.clone());
    // Logout must work even when the stored context no longer decodes.
    if let Command::Logout = args.command {
        sessions.logout().await?;
        println!("logged out");
        return Ok(());
    }

    let store = store::connect(&cfg, &pool)?;
    let ctx = sessions.load().await?;
    let app = App {
        cfg,
        store,
        sessions,
        ctx,
    };

    match args.command {
        Command::InitConfig { force } => init_config(&args.config, force)?,
        Command::Login { user, key } => {
            let s = session::login_portal(app.store.as_ref(), &app.sessions, &user, &key).await?;
            println!(
                "logged in as {} ({})",
                s.user_id,
                s.branch.as_deref().unwrap_or("no branch")
            );
        }
        Command::ManagerLogin { user, key } => {
            let s = session::login_manager(app.store.as_ref(), &app.sessions, &user, &key).await?;
            println!("branch manager for {}", s.branch);
        }
        Command::Logout => app.sessions.logout().await?,
        Command::Submit {
            drafts,
            no_watch,
            pages,
        } => submit(&app, &drafts, no_watch, pages).await?,
        Command::Watch {
            batch,
            expected,
            pages,
        } => {
            let owner = app
                .ctx
                .portal
                .as_ref()
                .ok_or_else(|| anyhow!("not logged in; run `login` first"))?;
            let poller = ConvergencePoller::new(app.store.clone(), app.cfg.poll_interval());
            let handle = poller.start(BatchId::from(batch), owner.user_id.clone(), Vec::new());
            watch(handle, expected, app.cfg.app.page_size, pages).await;
        }
        Command::Dashboard {
            status,
            user,
            search,
            days,
        } => {
            let status = match status {
                Some(s) => Some(
                    ListingStatus::parse_status(&s)
                        .ok_or_else(|| anyhow!("unknown status '{}'", s))?,
                ),
                None => None,
            };
            let filter = ListingFilter {
                status,
                user_id: user,
                search,
            };
            show_dashboard(&app, &filter, days).await?;
        }
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    std::fs::write(path, config::example())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn submit(app: &App, drafts: &Path, no_watch: bool, pages: usize) -> Result<()> {
    let owner = app
        .ctx
        .portal
        .as_ref()
        .ok_or_else(|| anyhow!("not logged in; run `login` first"))?;
    let mut batch = manifest::load_batch(drafts)?;

    let upload_url = Url::parse(app.cfg.media.upload_url.trim()).context("invalid media.upload_url")?;
    let uploader = CloudinaryUploader::new(
        upload_url,
        app.cfg.media.upload_preset.clone(),
        app.cfg.request_timeout(),
    )?;
    let submitter = BatchSubmitter::new(
        app.store.clone(),
        Arc::new(uploader),
        app.cfg.request_timeout(),
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let submitted = submitter.submit(&mut batch, owner, &cancel).await?;
    println!(
        "batch {} committed with {} listings",
        submitted.batch_id,
        submitted.listings.len()
    );
    if no_watch {
        return Ok(());
    }

    let expected = submitted.listings.len();
    let poller = ConvergencePoller::new(app.store.clone(), app.cfg.poll_interval());
    let handle = poller.start(submitted.batch_id, owner.user_id.clone(), submitted.listings);
    watch(handle, expected, app.cfg.app.page_size, pages).await;
    Ok(())
}

/// Print each snapshot until the batch converges or ctrl-c.
async fn watch(mut handle: PollHandle, expected: usize, page_size: usize, pages: usize) {
    let mut pager = Pager::new(page_size);
    pager.show_pages(pages);
    pager.replace(handle.latest().listings);
    print_page(&pager);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            next = handle.changed() => {
                let Some(snapshot) = next else {
                    warn!("polling ended");
                    break;
                };
                let converged = snapshot.is_converged(expected);
                pager.replace(snapshot.listings);
                print_page(&pager);
                if converged {
                    println!("all {} listings are ready", expected);
                    break;
                }
            }
        }
    }
    handle.stop().await;
}

fn print_page(pager: &Pager<Listing>) {
    println!("--- {} of {} listings ---", pager.visible().len(), pager.total());
    for listing in pager.visible() {
        print_listing(listing);
    }
    if pager.has_more() {
        println!("(more available; pass --pages to reveal them)");
    }
}

fn print_listing(listing: &Listing) {
    println!(
        "[{}] {} - {}",
        listing.status.as_str(),
        clean_generated_text(&listing.title),
        dashboard::format_price(listing.price)
    );
    let description = clean_generated_text(&listing.description);
    if !description.is_empty() {
        println!("    {}", description.replace('\n', "\n    "));
    }
    for url in &listing.images {
        println!("    {}", optimize_image_url(url));
    }
}

async fn show_dashboard(app: &App, filter: &ListingFilter, days: i64) -> Result<()> {
    let manager = app
        .ctx
        .manager
        .as_ref()
        .ok_or_else(|| anyhow!("not logged in as a branch manager; run `manager-login` first"))?;

    let now = Utc::now();
    let since = now - ChronoDuration::days(days.max(1));
    let listings = app.store.listings_for_branch(&manager.branch, None).await?;

    let batches = dashboard::dedupe_batches(listings.clone());
    let summary = dashboard::summarize(&batches, now.date_naive());
    println!("branch {}", manager.branch);
    println!(
        "today: {} listings, {} regenerations, {} active sellers",
        summary.listings_today, summary.regenerations_today, summary.active_users_today
    );

    println!("activity since {}:", since.date_naive());
    for row in dashboard::consistency(&listings, since) {
        println!("  {}  {:<16} {}", row.date, row.user_id, row.count);
    }

    println!("batches ({}):", batches.len());
    for listing in filter.apply(&batches) {
        let mut flags = Vec::new();
        if dashboard::has_empty_title(listing) {
            flags.push("empty title");
        }
        if dashboard::has_duplicate_title(listing, &batches) {
            flags.push("duplicate title");
        }
        print!(
            "  {} {} ",
            listing.user_id.as_deref().unwrap_or("-"),
            listing.original_id.as_deref().unwrap_or("-")
        );
        print_listing(listing);
        if !flags.is_empty() {
            println!("    ! {}", flags.join(", "));
        }
    }
    Ok(())
}
