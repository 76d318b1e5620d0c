//! Access ticket cache.
//!
//! WSAA refuses a new login while a valid ticket exists for the same
//! service (`coe.alreadyAuthenticated`), so tickets are reused until shortly
//! before they expire, optionally surviving restarts through a JSON file.
//!
//! A ticket is only good for the environment and CUIT it was issued to.
//! A scoped cache prefixes every entry with `{environment}:{cuit}:` so one
//! file can hold tickets for several of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset};

use arca_core::{Cuit, Environment, Error, Result};

use crate::ticket::LoginTicket;

/// Tickets are renewed this long before they expire.
pub const RENEWAL_MARGIN: Duration = Duration::minutes(10);

/// Per-service ticket store.
#[derive(Debug)]
pub struct TicketCache {
    entries: RwLock<HashMap<String, LoginTicket>>,
    path: Option<PathBuf>,
    margin: Duration,
    scope: Option<String>,
}

impl Default for TicketCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TicketCache {
    /// Cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            path: None,
            margin: RENEWAL_MARGIN,
            scope: None,
        }
    }

    /// Cache backed by a JSON file.
    ///
    /// An unreadable or corrupt file is ignored and rewritten on the next store.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_file(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring ticket cache file");
                HashMap::new()
            }
        };
        Self {
            entries: RwLock::new(entries),
            path: Some(path),
            margin: RENEWAL_MARGIN,
            scope: None,
        }
    }

    /// Overrides the renewal margin.
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Keys entries by environment and CUIT as well as service.
    pub fn scoped(mut self, environment: Environment, cuit: Cuit) -> Self {
        self.scope = Some(format!("{environment}:{}", cuit.as_u64()));
        self
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the ticket for `service` if it is still usable at `now`.
    pub fn get(&self, service: &str, now: DateTime<FixedOffset>) -> Option<LoginTicket> {
        let entries = self.entries.read().ok()?;
        entries
            .get(&self.key(service))
            .filter(|t| t.is_valid_at(now, self.margin))
            .cloned()
    }

    /// Stores a ticket and persists the cache when file-backed.
    pub fn store(&self, service: &str, ticket: LoginTicket) -> Result<()> {
        let snapshot = {
            let mut entries = self
                .entries
                .write()
                .map_err(|e| Error::config(format!("ticket cache lock poisoned: {e}")))?;
            entries.insert(self.key(service), ticket);
            entries.clone()
        };
        self.persist(&snapshot)
    }

    /// Drops the ticket for `service`.
    pub fn remove(&self, service: &str) -> Result<()> {
        let snapshot = {
            let mut entries = self
                .entries
                .write()
                .map_err(|e| Error::config(format!("ticket cache lock poisoned: {e}")))?;
            entries.remove(&self.key(service));
            entries.clone()
        };
        self.persist(&snapshot)
    }

    fn key(&self, service: &str) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}:{service}"),
            None => service.to_string(),
        }
    }

    fn persist(&self, entries: &HashMap<String, LoginTicket>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(path, json).map_err(|e| Error::io_with_path(e, path))?;
        tracing::debug!(path = %path.display(), "ticket cache saved");
        Ok(())
    }
}

fn load_file(path: &Path) -> Result<HashMap<String, LoginTicket>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ticket::tests::TICKET_XML;

    fn ticket() -> LoginTicket {
        LoginTicket::parse(TICKET_XML).unwrap()
    }

    #[test]
    fn test_reuses_until_margin() {
        let cache = TicketCache::in_memory();
        let t = ticket();
        cache.store("wsfe", t.clone()).unwrap();

        let early = t.generation_time + Duration::hours(1);
        assert_eq!(cache.get("wsfe", early), Some(t.clone()));

        let late = t.expiration_time - Duration::minutes(9);
        assert_eq!(cache.get("wsfe", late), None);
        assert_eq!(cache.get("wsfex", early), None);
    }

    #[test]
    fn test_remove() {
        let cache = TicketCache::in_memory();
        let t = ticket();
        cache.store("wsfe", t.clone()).unwrap();
        cache.remove("wsfe").unwrap();
        assert!(cache.get("wsfe", t.generation_time).is_none());
    }

    #[test]
    fn test_file_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("tickets.json");
        let t = ticket();

        TicketCache::with_file(&path).store("wsfe", t.clone()).unwrap();
        assert!(path.exists());

        let reopened = TicketCache::with_file(&path);
        assert_eq!(reopened.get("wsfe", t.generation_time), Some(t));
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = TicketCache::with_file(&path);
        let t = ticket();
        assert!(cache.get("wsfe", t.generation_time).is_none());
        cache.store("wsfe", t).unwrap();
        assert!(load_file(&path).unwrap().contains_key("wsfe"));
    }

    #[test]
    fn test_scoped_entries_do_not_cross_environments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        let cuit = Cuit::parse("20291687297").unwrap();
        let t = ticket();

        TicketCache::with_file(&path)
            .scoped(Environment::Homologation, cuit)
            .store("wsfe", t.clone())
            .unwrap();
        assert!(load_file(&path).unwrap().contains_key("homologation:20291687297:wsfe"));

        let production = TicketCache::with_file(&path).scoped(Environment::Production, cuit);
        assert!(production.get("wsfe", t.generation_time).is_none());

        let other_cuit = TicketCache::with_file(&path)
            .scoped(Environment::Homologation, Cuit::parse("30500010912").unwrap());
        assert!(other_cuit.get("wsfe", t.generation_time).is_none());

        let homologation = TicketCache::with_file(&path).scoped(Environment::Homologation, cuit);
        assert_eq!(homologation.get("wsfe", t.generation_time), Some(t));
    }
}
