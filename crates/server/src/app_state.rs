use query_codec::QueryCodec;
use shared::domain::QueryState;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) codec: QueryCodec,
    /// State served whenever a request carries no usable token.
    pub(crate) initial: QueryState,
}
