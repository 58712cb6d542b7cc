//! Actions offered by the demo page: paging, the flyout toggle, filter chips
//! and a reset. Each action is planned as a pure transition first so the
//! server can render the resulting link without a live history.

use std::{fmt, str::FromStr};

use shared::domain::{FilterKey, QueryState, FLYOUT_FIELD, FLYOUT_OPEN, PAGE_FIELD};
use thiserror::Error;

use crate::{ControllerError, HashedQuery, NavigateOptions, NavigationHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    NextPage,
    PreviousPage,
    ToggleFlyout,
    CloseFlyout,
    ToggleFilter(FilterKey),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub state: QueryState,
    pub options: NavigateOptions,
}

#[derive(Debug, Error)]
#[error("unknown page action '{0}'")]
pub struct UnknownAction(String);

impl PageAction {
    pub fn all() -> Vec<PageAction> {
        let mut actions = vec![Self::PreviousPage, Self::NextPage, Self::ToggleFlyout];
        actions.extend(FilterKey::ALL.into_iter().map(Self::ToggleFilter));
        actions.push(Self::Clear);
        actions
    }

    /// The state this action would produce, or `None` when it is disabled for
    /// `current` (previous page on page 1, closing a closed flyout).
    pub fn plan(self, current: &QueryState, initial: &QueryState) -> Option<PlannedUpdate> {
        let page = current_page(current);
        let (state, options) = match self {
            Self::NextPage => (
                current.merged(&QueryState::new().with(PAGE_FIELD, page + 1)),
                NavigateOptions::PUSH,
            ),
            Self::PreviousPage if page <= 1 => return None,
            Self::PreviousPage => (
                current.merged(&QueryState::new().with(PAGE_FIELD, page - 1)),
                NavigateOptions::PUSH,
            ),
            Self::ToggleFlyout if flyout_open(current) => {
                (current.without([FLYOUT_FIELD]), NavigateOptions::PUSH)
            }
            Self::ToggleFlyout => (
                current.merged(&QueryState::new().with(FLYOUT_FIELD, FLYOUT_OPEN)),
                NavigateOptions::PUSH,
            ),
            Self::CloseFlyout if !flyout_open(current) => return None,
            Self::CloseFlyout => (current.without([FLYOUT_FIELD]), NavigateOptions::PUSH),
            Self::ToggleFilter(key) if current.contains(key.field()) => {
                (current.without([key.field()]), NavigateOptions::REPLACE)
            }
            Self::ToggleFilter(key) => (
                current.merged(&QueryState::new().with(key.field(), key.sample_value())),
                NavigateOptions::REPLACE,
            ),
            Self::Clear => (initial.clone(), NavigateOptions::REPLACE),
        };
        Some(PlannedUpdate { state, options })
    }

    /// Runs the action against a live controller. Returns `false` when the
    /// action was disabled and nothing was navigated.
    pub fn apply<H: NavigationHost>(
        self,
        query: &mut HashedQuery<H>,
    ) -> Result<bool, ControllerError> {
        if self == Self::Clear {
            query.clear()?;
            return Ok(true);
        }
        query.sync_pending();
        let Some(planned) = self.plan(query.state(), query.initial()) else {
            return Ok(false);
        };
        query.update_params(|_| planned.state, planned.options)?;
        Ok(true)
    }

    pub fn label(self) -> String {
        match self {
            Self::NextPage => "Next".to_string(),
            Self::PreviousPage => "Previous".to_string(),
            Self::ToggleFlyout => "Toggle flyout".to_string(),
            Self::CloseFlyout => "Close flyout".to_string(),
            Self::ToggleFilter(key) => format!("Toggle {}", key.label()),
            Self::Clear => "Clear all".to_string(),
        }
    }
}

impl fmt::Display for PageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NextPage => f.write_str("next"),
            Self::PreviousPage => f.write_str("prev"),
            Self::ToggleFlyout => f.write_str("flyout"),
            Self::CloseFlyout => f.write_str("close-flyout"),
            Self::ToggleFilter(key) => f.write_str(key.field()),
            Self::Clear => f.write_str("clear"),
        }
    }
}

impl FromStr for PageAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s.trim().to_ascii_lowercase().as_str() {
            "next" => Self::NextPage,
            "prev" | "previous" => Self::PreviousPage,
            "flyout" => Self::ToggleFlyout,
            "close-flyout" => Self::CloseFlyout,
            "clear" => Self::Clear,
            other => FilterKey::from_field(other)
                .map(Self::ToggleFilter)
                .ok_or_else(|| UnknownAction(s.to_string()))?,
        };
        Ok(action)
    }
}

fn current_page(state: &QueryState) -> i64 {
    state.get_i64(PAGE_FIELD).unwrap_or(1)
}

fn flyout_open(state: &QueryState) -> bool {
    state.get_str(FLYOUT_FIELD) == Some(FLYOUT_OPEN)
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;
