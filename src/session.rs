//! A catalog session: pull, open, scan, use, close, push.

use crate::catalog_store::{CatalogStore, MediaSources, MergeReport};
use crate::interrupt::InterruptFlag;
use crate::remote_sync::{local_modified, RemoteSyncCache, SyncOutcome};
use crate::scanner::{MediaExtensions, ScanError, Scanner};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a session needs, already resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub database_path: PathBuf,
    pub sources: MediaSources,
    pub extensions: MediaExtensions,
    pub non_media_tag: String,
    /// Skip scanning when the catalog file was written more recently than this.
    pub local_scan_delay: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub scanned_sources: usize,
    pub unreadable_sources: Vec<String>,
    pub merged: MergeReport,
    /// Set when the scan was skipped because of `local_scan_delay`.
    pub skipped: bool,
}

/// Pushes the catalog file when dropped, unless disarmed. Nothing is pushed
/// once the interrupt flag is raised.
struct PushOnDrop {
    sync: RemoteSyncCache,
    interrupt: InterruptFlag,
    armed: bool,
}

impl PushOnDrop {
    fn push(&self) -> SyncOutcome {
        if self.interrupt.is_triggered() {
            info!("Interrupted, not pushing the catalog");
            return SyncOutcome::Interrupted;
        }
        self.sync.push()
    }

    fn push_now(mut self) -> SyncOutcome {
        self.armed = false;
        self.push()
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PushOnDrop {
    fn drop(&mut self) {
        if self.armed {
            debug!("Session dropped without close, pushing catalog");
            self.push();
        }
    }
}

/// An open catalog. Dropping it closes the connection and then pushes, just
/// like [`Session::close`].
pub struct Session {
    // Field order matters: the connection must be closed before the push runs.
    store: CatalogStore,
    push_guard: PushOnDrop,
    settings: SessionSettings,
    interrupt: InterruptFlag,
    pull_outcome: SyncOutcome,
    catalog_age: Option<Duration>,
}

impl Session {
    pub fn open(
        settings: SessionSettings,
        sync: RemoteSyncCache,
        interrupt: InterruptFlag,
    ) -> Result<Self> {
        interrupt.check()?;
        let pull_outcome = sync.pull();
        debug!("Pull finished: {:?}", pull_outcome);
        interrupt.check()?;

        let catalog_age = local_modified(&settings.database_path)
            .with_context(|| format!("Cannot stat {:?}", settings.database_path))?
            .map(|modified| (Utc::now() - modified).to_std().unwrap_or(Duration::ZERO));

        if let Some(parent) = settings.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create catalog directory {:?}", parent))?;
            }
        }
        let mut store = CatalogStore::open(
            &settings.database_path,
            settings.sources.clone(),
            settings.non_media_tag.clone(),
        )?;
        store.load(None)?;

        Ok(Self {
            store,
            push_guard: PushOnDrop {
                sync,
                interrupt: interrupt.clone(),
                armed: true,
            },
            settings,
            interrupt,
            pull_outcome,
            catalog_age,
        })
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CatalogStore {
        &mut self.store
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn interrupt(&self) -> &InterruptFlag {
        &self.interrupt
    }

    pub fn pull_outcome(&self) -> SyncOutcome {
        self.pull_outcome
    }

    fn scan_due(&self) -> bool {
        let delay = self.settings.local_scan_delay;
        if delay.is_zero() {
            return true;
        }
        match self.catalog_age {
            Some(age) if age <= delay => {
                info!(
                    "Catalog is {}s old, below the {}s scan delay, not scanning",
                    age.as_secs(),
                    delay.as_secs()
                );
                false
            }
            _ => true,
        }
    }

    /// Scans every source in configured order and merges what is new.
    ///
    /// An unreadable source is logged and skipped; an interrupt aborts.
    pub fn refresh(&mut self) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();
        if !self.scan_due() {
            report.skipped = true;
            return Ok(report);
        }

        let scanner = Scanner::new(&self.settings.extensions, self.interrupt.clone());
        for (alias, root) in self.settings.sources.iter() {
            let batch = match scanner.scan_root(alias, root, self.store.view()) {
                Ok(batch) => batch,
                Err(err @ ScanError::ReadRoot { .. }) => {
                    warn!("{}", err);
                    report.unreadable_sources.push(alias.to_string());
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let merged = self
                .store
                .merge(&batch)
                .with_context(|| format!("Failed to merge scan of {}", alias))?;
            report.merged.absorb(merged);
            report.scanned_sources += 1;
        }
        info!(
            "Catalog holds {} entries after scanning {} sources",
            self.store.len(),
            report.scanned_sources
        );
        Ok(report)
    }

    /// Closes the catalog and pushes it to the remote if newer.
    ///
    /// When closing fails or the session was interrupted nothing is pushed.
    pub fn close(self) -> Result<SyncOutcome> {
        let Session {
            store, push_guard, ..
        } = self;
        if let Err(err) = store.close() {
            push_guard.disarm();
            return Err(err).context("Failed to close the catalog database");
        }
        Ok(push_guard.push_now())
    }
}
