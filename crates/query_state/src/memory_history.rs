use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::{HostError, Location, LocationChange, NavigationHost, NavigationKind};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

struct HistoryInner {
    entries: Vec<Location>,
    index: usize,
    available: bool,
    push_count: usize,
    replace_count: usize,
}

/// In-process browser history: a stack of entries with a cursor, push/replace
/// navigation and back/forward traversal. Clones share the same history, so
/// several controllers (or a controller and a test) can observe one address bar.
#[derive(Clone)]
pub struct MemoryHistory {
    inner: Arc<Mutex<HistoryInner>>,
    events: broadcast::Sender<LocationChange>,
}

impl MemoryHistory {
    pub fn new(initial_url: &str) -> Result<Self, HostError> {
        Ok(Self::with_entry(Location::parse(initial_url)?, true))
    }

    /// A host that refuses all navigation, as when running outside a browser.
    pub fn detached() -> Self {
        let root = Location {
            pathname: "/".to_string(),
            token: None,
        };
        Self::with_entry(root, false)
    }

    fn with_entry(location: Location, available: bool) -> Self {
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(HistoryInner {
                entries: vec![location],
                index: 0,
                available,
                push_count: 0,
                replace_count: 0,
            })),
            events,
        }
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn current_url(&self) -> String {
        let inner = self.lock();
        inner.entries[inner.index].url()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn push_count(&self) -> usize {
        self.lock().push_count
    }

    pub fn replace_count(&self) -> usize {
        self.lock().replace_count
    }

    /// Moves one entry back. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    /// Moves one entry forward. Returns `false` at the end of history.
    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    fn traverse(&self, delta: isize) -> bool {
        let location = {
            let mut inner = self.lock();
            let Some(target) = inner.index.checked_add_signed(delta) else {
                return false;
            };
            if target >= inner.entries.len() {
                return false;
            }
            inner.index = target;
            inner.entries[target].clone()
        };
        self.notify(location, NavigationKind::Pop);
        true
    }

    fn navigate(&self, url: &str, kind: NavigationKind) -> Result<(), HostError> {
        let location = Location::parse(url)?;
        {
            let mut inner = self.lock();
            if !inner.available {
                return Err(HostError::Unavailable(format!(
                    "history rejected navigation to '{url}'"
                )));
            }
            match kind {
                NavigationKind::Replace => {
                    let index = inner.index;
                    inner.entries[index] = location.clone();
                    inner.replace_count += 1;
                }
                _ => {
                    let next = inner.index + 1;
                    inner.entries.truncate(next);
                    inner.entries.push(location.clone());
                    inner.index = next;
                    inner.push_count += 1;
                }
            }
        }
        self.notify(location, kind);
        Ok(())
    }

    fn notify(&self, location: Location, kind: NavigationKind) {
        // No subscribers is fine.
        let _ = self.events.send(LocationChange { location, kind });
    }

    fn lock(&self) -> MutexGuard<'_, HistoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NavigationHost for MemoryHistory {
    fn ensure_available(&self) -> Result<(), HostError> {
        if self.lock().available {
            Ok(())
        } else {
            Err(HostError::Unavailable(
                "no browser history attached".to_string(),
            ))
        }
    }

    fn location(&self) -> Location {
        let inner = self.lock();
        inner.entries[inner.index].clone()
    }

    fn push(&self, url: &str) -> Result<(), HostError> {
        self.navigate(url, NavigationKind::Push)
    }

    fn replace(&self, url: &str) -> Result<(), HostError> {
        self.navigate(url, NavigationKind::Replace)
    }

    fn subscribe(&self) -> broadcast::Receiver<LocationChange> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_truncates_forward_entries() {
        let history = MemoryHistory::new("/").expect("history");
        history.push("/?q=a").expect("push");
        history.push("/?q=b").expect("push");
        assert!(history.back());
        history.push("/?q=c").expect("push");

        assert_eq!(history.len(), 3);
        assert!(!history.forward());
        assert_eq!(history.current_url(), "/?q=c");
    }

    #[test]
    fn replace_overwrites_current_entry() {
        let history = MemoryHistory::new("/items?q=a").expect("history");
        history.replace("/items?q=b").expect("replace");
        assert_eq!(history.len(), 1);
        assert_eq!(history.replace_count(), 1);
        assert_eq!(history.push_count(), 0);
        assert_eq!(history.location().token.as_deref(), Some("b"));
    }

    #[test]
    fn back_at_start_is_refused() {
        let history = MemoryHistory::new("/").expect("history");
        assert!(!history.back());
    }

    #[test]
    fn traversal_notifies_subscribers() {
        let history = MemoryHistory::new("/").expect("history");
        history.push("/?q=a").expect("push");
        let mut rx = history.subscribe();
        assert!(history.back());

        let change = rx.try_recv().expect("pop event");
        assert_eq!(change.kind, NavigationKind::Pop);
        assert_eq!(change.location.token, None);
    }

    #[test]
    fn detached_history_rejects_navigation() {
        let history = MemoryHistory::detached();
        assert!(history.ensure_available().is_err());
        assert!(matches!(
            history.push("/?q=a"),
            Err(HostError::Unavailable(_))
        ));
        assert_eq!(history.len(), 1);
    }
}
