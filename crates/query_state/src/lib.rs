use query_codec::{EncodeError, QueryCodec};
use shared::{
    domain::QueryState,
    protocol::{location_for, QUERY_PARAM},
};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

mod memory_history;
pub mod page;
pub use memory_history::MemoryHistory;

/// Base used to resolve relative navigation targets into path and query.
const LOCATION_BASE: &str = "http://localhost/";

#[derive(Debug, Error)]
pub enum HostError {
    #[error("navigation host unavailable: {0}")]
    Unavailable(String),
    #[error("invalid navigation target '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("cannot start query state controller: {0}")]
    HostUnavailable(#[source] HostError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("navigation failed: {0}")]
    Navigation(#[source] HostError),
}

/// Path plus the current value of the reserved state parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    pub token: Option<String>,
}

impl Location {
    /// Parses an absolute or root-relative URL. An empty `q` value counts as absent.
    pub fn parse(url: &str) -> Result<Self, HostError> {
        let invalid = |reason: String| HostError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let base = Url::parse(LOCATION_BASE).map_err(|e| invalid(e.to_string()))?;
        let parsed = base.join(url).map_err(|e| invalid(e.to_string()))?;
        let token = parsed
            .query_pairs()
            .find(|(key, _)| key == QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());
        Ok(Self {
            pathname: parsed.path().to_string(),
            token,
        })
    }

    /// Root-relative URL for this location. The token is form-encoded, so a
    /// foreign token holding `&`, `#` or `%` parses back to the same value.
    pub fn url(&self) -> String {
        match &self.token {
            Some(token) => {
                let encoded: String = form_urlencoded::byte_serialize(token.as_bytes()).collect();
                location_for(&self.pathname, &encoded)
            }
            None => self.pathname.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChange {
    pub location: Location,
    pub kind: NavigationKind,
}

/// The routing host the controller runs against: a browser history, a router,
/// or an in-process stand-in.
pub trait NavigationHost {
    /// Fails when the host cannot serve navigation at all.
    fn ensure_available(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn location(&self) -> Location;

    /// Appends a new history entry for `url`.
    fn push(&self, url: &str) -> Result<(), HostError>;

    /// Overwrites the current history entry with `url`.
    fn replace(&self, url: &str) -> Result<(), HostError>;

    /// Notifications for every location change, including ones made through
    /// `push`/`replace` and back/forward traversal.
    fn subscribe(&self) -> broadcast::Receiver<LocationChange>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Overwrite the current history entry instead of appending one.
    pub replace: bool,
}

impl NavigateOptions {
    pub const PUSH: NavigateOptions = NavigateOptions { replace: false };
    pub const REPLACE: NavigateOptions = NavigateOptions { replace: true };
}

/// Keeps in-memory state, history and the `q` parameter in agreement.
///
/// State always follows the URL. The only time both are written together is
/// a mutation, which navigates first and updates memory only once navigation
/// succeeded.
pub struct HashedQuery<H: NavigationHost> {
    host: H,
    codec: QueryCodec,
    initial: QueryState,
    state: QueryState,
    observed_token: Option<String>,
    changes: broadcast::Receiver<LocationChange>,
}

impl<H: NavigationHost> HashedQuery<H> {
    pub fn new(host: H, codec: QueryCodec, initial: QueryState) -> Result<Self, ControllerError> {
        host.ensure_available()
            .map_err(ControllerError::HostUnavailable)?;
        let changes = host.subscribe();
        let location = host.location();
        let state = derive_state(&codec, location.token.as_deref(), &initial);
        debug!(
            pathname = %location.pathname,
            has_token = location.token.is_some(),
            "query state controller attached"
        );

        Ok(Self {
            host,
            codec,
            initial,
            state,
            observed_token: location.token,
            changes,
        })
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn initial(&self) -> &QueryState {
        &self.initial
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// State as described by the URL right now, falling back to the initial
    /// state when the token is missing or does not decode.
    pub fn derive(&self) -> QueryState {
        let location = self.host.location();
        derive_state(&self.codec, location.token.as_deref(), &self.initial)
    }

    pub fn update_params<F>(
        &mut self,
        updater: F,
        options: NavigateOptions,
    ) -> Result<(), ControllerError>
    where
        F: FnOnce(&QueryState) -> QueryState,
    {
        self.catch_up();
        let next = updater(&self.state);
        self.commit(next, options)
    }

    /// Shallow-merges `partial` into the current state.
    pub fn set(
        &mut self,
        partial: &QueryState,
        options: NavigateOptions,
    ) -> Result<(), ControllerError> {
        self.update_params(|prev| prev.merged(partial), options)
    }

    /// Deletes the named fields. When none of them is present nothing is
    /// navigated and history is left as it is.
    pub fn remove<I, S>(&mut self, keys: I, options: NavigateOptions) -> Result<(), ControllerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.catch_up();
        let next = self.state.without(keys);
        if next == self.state {
            debug!("no matching fields to remove");
            return Ok(());
        }
        self.commit(next, options)
    }

    /// Resets to the initial state without adding a history entry.
    pub fn clear(&mut self) -> Result<(), ControllerError> {
        self.catch_up();
        let initial = self.initial.clone();
        self.commit(initial, NavigateOptions::REPLACE)
    }

    /// Applies every queued location notification. Returns whether the
    /// in-memory state changed.
    pub fn sync_pending(&mut self) -> bool {
        self.drain_notifications() && self.resync()
    }

    /// Waits for the next location notification and re-derives from the
    /// host's current location. Returns `None` once the host has gone away.
    pub async fn next_change(&mut self) -> Option<bool> {
        match self.changes.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "location notifications lagged; re-reading host location");
            }
            Err(RecvError::Closed) => return None,
        }
        self.drain_notifications();
        Some(self.resync())
    }

    /// Mutations build on the location the host shows now, not on state left
    /// over from before an unsynced back/forward.
    fn catch_up(&mut self) {
        self.drain_notifications();
        self.resync();
    }

    fn drain_notifications(&mut self) -> bool {
        let mut notified = false;
        loop {
            match self.changes.try_recv() {
                Ok(_) => notified = true,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "location notifications lagged; re-reading host location");
                    notified = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        notified
    }

    fn resync(&mut self) -> bool {
        let location = self.host.location();
        if location.token == self.observed_token {
            return false;
        }
        let next = derive_state(&self.codec, location.token.as_deref(), &self.initial);
        debug!(pathname = %location.pathname, "location changed externally; state re-derived");
        self.observed_token = location.token;
        let changed = next != self.state;
        self.state = next;
        changed
    }

    fn commit(
        &mut self,
        next: QueryState,
        options: NavigateOptions,
    ) -> Result<(), ControllerError> {
        let token = self.codec.encode(&next).inspect_err(|error| {
            warn!(%error, "query state could not be encoded");
        })?;
        let pathname = self.host.location().pathname;
        let url = location_for(&pathname, token.as_str());

        let navigated = if options.replace {
            self.host.replace(&url)
        } else {
            self.host.push(&url)
        };
        navigated.map_err(ControllerError::Navigation)?;

        debug!(%url, replace = options.replace, fields = next.len(), "query state updated");
        self.observed_token = Some(token.into_string());
        self.state = next;
        Ok(())
    }
}

/// Decodes `token` into state, or returns `initial` when there is nothing usable.
pub fn derive_state(codec: &QueryCodec, token: Option<&str>, initial: &QueryState) -> QueryState {
    match token.and_then(|t| codec.decode::<QueryState>(t)) {
        Some(state) => state,
        None => {
            if token.is_some() {
                debug!("query token did not decode; using initial state");
            }
            initial.clone()
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
