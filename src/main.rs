use allplay::catalog_store::{CatalogError, CatalogFilter, Combinator, SortKey};
use allplay::config::{resolve_entry_path, resolve_path, AppConfig, CliConfig, FileConfig};
use allplay::media::{MediaItem, Reconciled};
use allplay::remote_sync::{RemoteObjectStore, RemoteSyncCache, S3ObjectStore};
use allplay::{InterruptFlag, Session};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 128 + SIGINT, as shells report it.
const INTERRUPTED_EXIT_CODE: i32 = 130;

fn parse_path(s: &str) -> Result<PathBuf> {
    resolve_path(s)
}

fn parse_entry_path(s: &str) -> Result<PathBuf> {
    resolve_entry_path(s)
}

fn parse_source(s: &str) -> Result<(String, PathBuf)> {
    let (alias, root) = s
        .split_once('=')
        .with_context(|| format!("Expected ALIAS=PATH, got {}", s))?;
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(anyhow!("Empty alias in {}", s));
    }
    Ok((alias.to_string(), resolve_path(root)?))
}

#[derive(Parser, Debug)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
struct CliArgs {
    /// Path to the TOML config file. Defaults to ~/.allplay/config.toml when it exists.
    #[clap(long, short, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite catalog database file.
    #[clap(long, value_parser = parse_path)]
    pub database: Option<PathBuf>,

    /// Media source as ALIAS=PATH, repeat for several sources.
    #[clap(long = "source", value_parser = parse_source)]
    pub sources: Vec<(String, PathBuf)>,

    /// Media file extension, repeat for several.
    #[clap(long = "extension")]
    pub extensions: Vec<String>,

    /// Skip scanning when the catalog was written less than this many seconds ago.
    #[clap(long)]
    pub local_scan_delay_secs: Option<u64>,

    /// Debug logging, unless LOG_LEVEL is set.
    #[clap(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan media sources and catalog new entries.
    Scan,

    /// List catalog entries.
    List {
        /// Only entries with this tag, repeat for several.
        #[clap(long = "tag")]
        tags: Vec<String>,

        #[clap(long, value_enum, default_value_t = Combinator::Any)]
        tag_match: Combinator,

        /// Only entries whose name contains this text, repeat for several.
        #[clap(long = "search")]
        terms: Vec<String>,

        #[clap(long, value_enum, default_value_t = Combinator::Any)]
        search_match: Combinator,

        #[clap(long, value_enum, default_value_t = SortKey::MediaId)]
        sort: SortKey,

        #[clap(long)]
        desc: bool,

        /// Include entries carrying a default exclusion tag.
        #[clap(long)]
        all: bool,
    },

    /// Show one entry. Entries gone from disk are dropped from the catalog.
    Info {
        #[clap(value_parser = parse_entry_path)]
        path: PathBuf,
    },

    /// List every tag in use.
    Tags,

    /// Show or change the tags of one entry.
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Count one more play of an entry.
    Played {
        #[clap(value_parser = parse_entry_path)]
        path: PathBuf,
    },

    /// Remove an entry from the catalog.
    Delete {
        #[clap(value_parser = parse_entry_path)]
        path: PathBuf,

        /// Delete the file or directory from disk as well.
        #[clap(long)]
        from_disk: bool,

        /// Delete only this file of the entry from disk and keep the entry.
        #[clap(long, value_parser = parse_entry_path, conflicts_with = "from_disk")]
        file: Option<PathBuf>,
    },

    /// Move an entry to another media source.
    Move {
        #[clap(value_parser = parse_entry_path)]
        path: PathBuf,

        /// Alias of the destination source.
        alias: String,
    },
}

#[derive(Subcommand, Debug)]
enum TagAction {
    List {
        #[clap(value_parser = parse_entry_path)]
        path: PathBuf,
    },
    /// Add tags, quick tag shortcuts are expanded.
    Add {
        #[clap(value_parser = parse_entry_path)]
        path: PathBuf,
        #[clap(required = true)]
        tags: Vec<String>,
    },
    Remove {
        #[clap(value_parser = parse_entry_path)]
        path: PathBuf,
        #[clap(required = true)]
        tags: Vec<String>,
    },
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".allplay").join("config.toml"))
        .filter(|path| path.is_file())
}

fn connect_remote(
    config: &AppConfig,
    interrupt: &InterruptFlag,
) -> Option<Box<dyn RemoteObjectStore>> {
    let location = config.remote.clone()?;
    match S3ObjectStore::connect(location, interrupt.clone()) {
        Ok(store) => Some(Box::new(store)),
        Err(err) => {
            warn!("Remote sync disabled, cannot create S3 client: {}", err);
            None
        }
    }
}

fn media_id_of(session: &Session, path: &Path) -> Result<i64> {
    session
        .store()
        .entry(path)
        .map(|entry| entry.media_id)
        .ok_or_else(|| anyhow!("{} is not in the catalog", path.display()))
}

fn run_command(session: &mut Session, config: &AppConfig, command: Command) -> Result<()> {
    let interrupt = session.interrupt().clone();
    match command {
        Command::Scan => {
            let report = session.refresh()?;
            if report.skipped {
                println!("Catalog was updated recently, scan skipped");
            } else {
                println!(
                    "{} new entries ({} non-media), {} already cataloged, {} total",
                    report.merged.inserted,
                    report.merged.sentinel_tagged,
                    report.merged.already_present,
                    session.store().len()
                );
            }
            for alias in &report.unreadable_sources {
                println!("Could not read media source {}", alias);
            }
        }
        Command::List {
            tags,
            tag_match,
            terms,
            search_match,
            sort,
            desc,
            all,
        } => {
            let filter = CatalogFilter::default()
                .with_tags(tags.iter().map(|tag| config.expand_tag(tag)), tag_match)
                .with_path_terms(terms, search_match)
                .sorted_by(sort, desc);
            let store = session.store_mut();
            store.load(Some(&filter))?;
            let entries = if all {
                store
                    .entries()
                    .map(|(path, entry)| (path.to_path_buf(), entry.clone()))
                    .collect()
            } else {
                store.entries_excluding(&config.default_exclusion_tags)?
            };
            for (path, entry) in entries {
                println!("{:>4}  {}", entry.times_played, path.display());
            }
        }
        Command::Info { path } => {
            let item = MediaItem::from_store(session.store(), &path)?;
            let files = match item.reconcile(
                session.store_mut(),
                &config.media_extensions,
                &interrupt,
            )? {
                Reconciled::Removed => {
                    println!("{} no longer exists, removed from the catalog", path.display());
                    return Ok(());
                }
                Reconciled::MarkedNonMedia => Vec::new(),
                Reconciled::Present(files) => files,
            };
            let tags = session.store().tags(item.media_id()).list()?;
            let entry = item.entry();
            println!("Path:     {}", item.full_path().display());
            println!("Source:   {}", entry.mount_alias);
            if let Some(modified) = entry.modified_at() {
                println!("Modified: {}", modified.to_rfc3339());
            }
            println!("Played:   {} times", entry.times_played);
            println!(
                "Tags:     {}",
                tags.into_iter().collect::<Vec<_>>().join(", ")
            );
            println!("Size:     {}", MediaItem::size(&files));
            for file in &files {
                println!("  {}", file.display());
            }
        }
        Command::Tags => {
            for name in session.store().tag_names()? {
                println!("{}", name);
            }
        }
        Command::Tag { action } => match action {
            TagAction::List { path } => {
                let media_id = media_id_of(session, &path)?;
                for name in session.store().tags(media_id).list()? {
                    println!("{}", name);
                }
            }
            TagAction::Add { path, tags } => {
                let media_id = media_id_of(session, &path)?;
                let manager = session.store().tags(media_id);
                for tag in &tags {
                    let name = config.expand_tag(tag);
                    if manager.add(name)? {
                        println!("Tagged {}", name);
                    } else {
                        println!("Already tagged {}", name);
                    }
                }
            }
            TagAction::Remove { path, tags } => {
                let media_id = media_id_of(session, &path)?;
                let manager = session.store().tags(media_id);
                for tag in &tags {
                    let name = config.expand_tag(tag);
                    match manager.remove(name) {
                        Ok(_) => println!("Removed {}", name),
                        Err(CatalogError::NotFound(_)) => println!("Not tagged {}", name),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        },
        Command::Played { path } => {
            let media_id = media_id_of(session, &path)?;
            session.store_mut().increment_play_count(media_id)?;
        }
        Command::Delete {
            path,
            file: Some(file),
            ..
        } => {
            let item = MediaItem::from_store(session.store(), &path)?;
            let outcome = item.delete_file(
                session.store_mut(),
                &file,
                &config.media_extensions,
                &interrupt,
            )?;
            println!("Deleted {}", file.display());
            match outcome {
                Reconciled::Present(files) => println!("{} files left", files.len()),
                Reconciled::MarkedNonMedia => println!(
                    "No playable files left, {} marked {}",
                    path.display(),
                    config.non_media_tag
                ),
                Reconciled::Removed => {
                    println!("{} removed from the catalog", path.display())
                }
            }
        }
        Command::Delete {
            path,
            from_disk,
            file: None,
        } => {
            if from_disk {
                MediaItem::from_store(session.store(), &path)?
                    .delete_from_disk(session.store_mut())?;
            } else {
                session.store_mut().delete(&path)?;
            }
            println!("Deleted {}", path.display());
        }
        Command::Move { path, alias } => {
            let moved = MediaItem::from_store(session.store(), &path)?
                .move_to_source(session.store_mut(), &alias, &interrupt)?;
            println!("Moved to {}", moved.full_path().display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let default_level = if cli_args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match cli_args.config.clone().or_else(default_config_path) {
        Some(path) => {
            debug!("Loading config file {:?}", path);
            Some(FileConfig::load(&path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        local_database: cli_args.database.clone(),
        media_sources: cli_args.sources.clone(),
        media_extensions: cli_args.extensions.clone(),
        local_scan_delay_secs: cli_args.local_scan_delay_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let interrupt = InterruptFlag::new();
    let handler_flag = interrupt.clone();
    ctrlc::set_handler(move || {
        if handler_flag.is_triggered() {
            eprintln!("Interrupted again, exiting now");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        warn!("Interrupted, stopping. Press Ctrl-C again to exit immediately");
        handler_flag.trigger();
    })
    .context("Failed to install Ctrl-C handler")?;

    let sync = RemoteSyncCache::new(&config.local_database, connect_remote(&config, &interrupt));
    let mut session = match Session::open(config.session_settings(), sync, interrupt.clone()) {
        Ok(session) => session,
        Err(_) if interrupt.is_triggered() => std::process::exit(INTERRUPTED_EXIT_CODE),
        Err(err) => return Err(err),
    };

    let result = run_command(&mut session, &config, cli_args.command);
    let push_outcome = session.close();
    if interrupt.is_triggered() {
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
    result?;
    debug!("Push finished: {:?}", push_outcome?);
    Ok(())
}
