use serde::{Deserialize, Serialize};

use crate::domain::QueryState;

/// The single reserved query parameter that carries the state token.
pub const QUERY_PARAM: &str = "q";

/// Builds the full next URL for a navigation: the current path with only the
/// state parameter attached. The token alphabet is URL-safe, so no escaping
/// is applied.
pub fn location_for(pathname: &str, token: &str) -> String {
    let pathname = if pathname.is_empty() { "/" } else { pathname };
    format!("{pathname}?{QUERY_PARAM}={token}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSource {
    Token,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedStateResponse {
    pub state: QueryState,
    pub source: StateSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeStateResponse {
    pub token: String,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_keeps_path_and_attaches_token() {
        assert_eq!(location_for("/products", "eyJwYWdlIjoyfQ"), "/products?q=eyJwYWdlIjoyfQ");
        assert_eq!(location_for("", "abc"), "/?q=abc");
    }

    #[test]
    fn state_source_serializes_snake_case() {
        let body = DecodedStateResponse {
            state: QueryState::new().with("page", 1),
            source: StateSource::Default,
        };
        let json = serde_json::to_value(&body).expect("json");
        assert_eq!(json["source"], "default");
        assert_eq!(json["state"]["page"], 1);
    }
}
