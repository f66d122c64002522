//! Atomically swappable configuration snapshot with file-watch hot-reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::config::ConfigSnapshot;
use crate::error::Result;

/// Holds the current snapshot. Readers get an `Arc` to a complete snapshot;
/// a reload replaces the `Arc` wholesale, so a reader sees either the old
/// snapshot or the new one and never a mix of fields.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot in effect right now. Holding the returned `Arc` pins it
    /// for as long as the caller needs, regardless of later swaps.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        // The guarded value is a single Arc, so a poisoned lock cannot hold a torn value.
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a new snapshot and return the one it replaced.
    pub fn replace(&self, mut snapshot: ConfigSnapshot) -> Arc<ConfigSnapshot> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.generation = guard.generation + 1;
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }

    /// Re-read `path` and swap the result in. On failure the current
    /// snapshot stays in place.
    pub fn reload_from(&self, path: &Path) -> Result<Arc<ConfigSnapshot>> {
        let snapshot = ConfigSnapshot::load(path)?;
        self.replace(snapshot);
        let current = self.current();
        info!(
            path = %path.display(),
            generation = current.generation,
            enabled = ?current.enabled_channels(),
            "configuration reloaded"
        );
        Ok(current)
    }
}

/// Keeps a filesystem watcher alive that reloads the config file into a
/// [`SnapshotStore`] whenever it changes.
pub struct ConfigWatcher {
    path: PathBuf,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch the directory containing `path` (non-recursively) and reload on
    /// create/modify events for that file.
    pub fn spawn(store: Arc<SnapshotStore>, path: PathBuf) -> Result<Self> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let target = path.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        handle_config_event(&event, &store, &target);
                    }
                    Err(e) => warn!(error = %e, "config watcher error"),
                }
            })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(path = %path.display(), "watching config file for changes");
        Ok(Self {
            path,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Handle one filesystem event; returns whether a new snapshot was swapped in.
pub fn handle_config_event(event: &Event, store: &SnapshotStore, target: &Path) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }

    let touches_target = event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == target.file_name());
    if !touches_target {
        return false;
    }

    match store.reload_from(target) {
        Ok(_) => true,
        Err(e) => {
            warn!(
                path = %target.display(),
                error = %e,
                "failed to reload config, keeping previous snapshot"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelKind;
    use crate::config::ConfigSource;
    use crate::error::CoreError;
    use notify::event::{DataChange, ModifyKind, RemoveKind};

    fn snapshot(json: &str) -> ConfigSnapshot {
        ConfigSnapshot::from_source(&ConfigSource::from_json_str(json).unwrap())
    }

    #[test]
    fn pinned_snapshot_survives_replace() {
        let store = SnapshotStore::new(snapshot(
            r#"{"ENABLE_SMTP": true, "SMTP_SERVER": "old.example.com", "SMTP_PORT": 587,
                "SMTP_USER": "u@example.com", "SMTP_PASSWORD": "p"}"#,
        ));
        let pinned = store.current();

        let previous = store.replace(snapshot(
            r#"{"ENABLE_SMTP": false, "ENABLE_TWILIO": true}"#,
        ));
        assert!(Arc::ptr_eq(&pinned, &previous));

        // The in-flight view is untouched.
        assert!(pinned.is_enabled(ChannelKind::Smtp));
        assert_eq!(pinned.smtp.settings.as_ref().unwrap().server, "old.example.com");
        assert_eq!(pinned.generation, 0);

        let fresh = store.current();
        assert!(!fresh.is_enabled(ChannelKind::Smtp));
        assert!(fresh.is_enabled(ChannelKind::Twilio));
        assert_eq!(fresh.generation, 1);
    }

    #[test]
    fn concurrent_readers_never_see_mixed_snapshots() {
        // Each snapshot's delay encodes which generation of credentials it carries.
        fn build(n: u64) -> ConfigSnapshot {
            snapshot(&format!(
                r#"{{"ENABLE_SMTP": {}, "SMTP_SERVER": "host-{n}", "SMTP_PORT": 587,
                    "SMTP_USER": "u", "SMTP_PASSWORD": "p", "SMTP_DELAY": {n}}}"#,
                n % 2 == 0
            ))
        }

        let store = Arc::new(SnapshotStore::new(build(0)));
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for n in 1..200 {
                    store.replace(build(n));
                }
            })
        };

        for _ in 0..2000 {
            let snap = store.current();
            let n = snap.send_delay.as_secs();
            assert_eq!(snap.smtp.settings.as_ref().unwrap().server, format!("host-{n}"));
            assert_eq!(snap.smtp.enabled, n % 2 == 0);
        }
        writer.join().unwrap();
    }

    #[test]
    fn modify_event_reloads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ENABLE_TWILIO": false}"#).unwrap();

        let store = SnapshotStore::new(ConfigSnapshot::load(&path).unwrap());
        assert!(!store.current().is_enabled(ChannelKind::Twilio));

        std::fs::write(&path, r#"{"ENABLE_TWILIO": true}"#).unwrap();
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.clone());
        assert!(handle_config_event(&event, &store, &path));
        assert!(store.current().is_enabled(ChannelKind::Twilio));
    }

    #[test]
    fn broken_file_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ENABLE_TWILIO": true}"#).unwrap();
        let store = SnapshotStore::new(ConfigSnapshot::load(&path).unwrap());

        std::fs::write(&path, "{ not json").unwrap();
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.clone());
        assert!(!handle_config_event(&event, &store, &path));
        assert!(store.current().is_enabled(ChannelKind::Twilio));
        assert_eq!(store.current().generation, 0);
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        let store = SnapshotStore::new(ConfigSnapshot::load(&path).unwrap());

        let other = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(dir.path().join("contacts.csv"));
        assert!(!handle_config_event(&other, &store, &path));

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.clone());
        assert!(!handle_config_event(&removed, &store, &path));
    }

    #[test]
    fn watcher_starts_on_existing_directory_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        let store = Arc::new(SnapshotStore::new(ConfigSnapshot::load(&path).unwrap()));

        let watcher = ConfigWatcher::spawn(Arc::clone(&store), path.clone()).unwrap();
        assert_eq!(watcher.path(), path.as_path());

        let missing = dir.path().join("gone").join("config.json");
        assert!(matches!(
            ConfigWatcher::spawn(store, missing),
            Err(CoreError::Watch(_))
        ));
    }
}
