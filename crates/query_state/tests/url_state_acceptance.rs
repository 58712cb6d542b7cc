use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use query_codec::{CipherKind, CodecConfig, QueryCodec, QuerySecret};
use query_state::{page::PageAction, HashedQuery, MemoryHistory, NavigateOptions, NavigationHost};
use shared::domain::{default_query_state, FilterKey, PageQuery, QueryState};

#[test]
fn page_session_survives_reload_and_history_traversal() {
    let history = MemoryHistory::new("/").expect("history");
    let codec = QueryCodec::default();
    let mut query =
        HashedQuery::new(history.clone(), codec.clone(), default_query_state()).expect("query");

    PageAction::NextPage.apply(&mut query).expect("next");
    PageAction::ToggleFilter(FilterKey::Size)
        .apply(&mut query)
        .expect("size");
    PageAction::ToggleFlyout.apply(&mut query).expect("flyout");

    // A reload builds a new controller from the address bar alone.
    let reloaded =
        HashedQuery::new(history.clone(), codec.clone(), default_query_state()).expect("reload");
    assert_eq!(reloaded.state(), query.state());

    // Server-side typed decode of the same token agrees with the client.
    let token = history.location().token.expect("token");
    let server_view: PageQuery = codec.decode(&token).expect("server decode");
    assert_eq!(server_view.page, 2);
    assert_eq!(server_view.size.as_deref(), Some("M"));
    assert!(server_view.flyout_open());
    assert_eq!(server_view.to_state(), *query.state());

    // Back undoes the flyout push; the size chip replaced the page-2 entry.
    assert!(history.back());
    assert!(query.sync_pending());
    assert!(!query.state().contains("flyout"));
    assert_eq!(query.state().get_str("size"), Some("M"));
}

#[test]
fn token_is_plain_json_under_default_cipher() {
    let history = MemoryHistory::new("/").expect("history");
    let mut query = HashedQuery::new(history.clone(), QueryCodec::default(), default_query_state())
        .expect("query");
    query
        .set(&QueryState::new().with("page", 2), NavigateOptions::PUSH)
        .expect("set");

    let token = history.location().token.expect("token");
    let json = URL_SAFE_NO_PAD.decode(token).expect("base64");
    let value: serde_json::Value = serde_json::from_slice(&json).expect("json");
    assert_eq!(value, serde_json::json!({ "page": 2 }));
}

#[test]
fn sealed_tokens_fall_back_under_other_keys() {
    let sealed = |secret: &str| {
        QueryCodec::from_config(&CodecConfig {
            secret: QuerySecret::new(secret),
            cipher: CipherKind::Sealed,
        })
        .expect("codec")
    };

    let history = MemoryHistory::new("/").expect("history");
    let mut writer =
        HashedQuery::new(history.clone(), sealed("alpha"), default_query_state()).expect("writer");
    writer
        .set(&QueryState::new().with("page", 7), NavigateOptions::PUSH)
        .expect("set");

    let same_key =
        HashedQuery::new(history.clone(), sealed("alpha"), default_query_state()).expect("reader");
    let other_key =
        HashedQuery::new(history.clone(), sealed("beta"), default_query_state()).expect("reader");
    assert_eq!(same_key.state().get_i64("page"), Some(7));
    assert_eq!(other_key.state(), &default_query_state());
}
