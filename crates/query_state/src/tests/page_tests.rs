use super::*;
use crate::MemoryHistory;
use query_codec::QueryCodec;
use shared::domain::default_query_state;

fn page_controller() -> (MemoryHistory, HashedQuery<MemoryHistory>) {
    let history = MemoryHistory::new("/").expect("history");
    let query = HashedQuery::new(history.clone(), QueryCodec::default(), default_query_state())
        .expect("controller");
    (history, query)
}

#[test]
fn previous_is_disabled_on_first_page() {
    let (history, mut query) = page_controller();
    assert!(!PageAction::PreviousPage.apply(&mut query).expect("apply"));
    assert_eq!(history.push_count(), 0);
}

#[test]
fn paging_pushes_history_entries() {
    let (history, mut query) = page_controller();
    PageAction::NextPage.apply(&mut query).expect("next");
    PageAction::NextPage.apply(&mut query).expect("next");
    PageAction::PreviousPage.apply(&mut query).expect("prev");

    assert_eq!(query.state().get_i64("page"), Some(2));
    assert_eq!(history.push_count(), 3);
}

#[test]
fn flyout_toggle_uses_string_flag() {
    let (_history, mut query) = page_controller();
    PageAction::ToggleFlyout.apply(&mut query).expect("open");
    assert_eq!(query.state().get_str("flyout"), Some("true"));

    PageAction::ToggleFlyout.apply(&mut query).expect("close");
    assert!(!query.state().contains("flyout"));
    assert!(!PageAction::CloseFlyout.apply(&mut query).expect("already closed"));
}

#[test]
fn next_page_after_unsynced_back_starts_from_visible_page() {
    let (history, mut query) = page_controller();
    PageAction::NextPage.apply(&mut query).expect("next");
    PageAction::NextPage.apply(&mut query).expect("next");
    assert!(history.back());

    PageAction::NextPage.apply(&mut query).expect("next after back");
    assert_eq!(query.state().get_i64("page"), Some(3));
    assert_eq!(history.len(), 3);
}

#[test]
fn filter_chips_replace_history() {
    let (history, mut query) = page_controller();
    PageAction::ToggleFilter(FilterKey::Brand)
        .apply(&mut query)
        .expect("add brand");
    assert_eq!(query.state().get_str("brand"), Some("Acme"));

    PageAction::ToggleFilter(FilterKey::Brand)
        .apply(&mut query)
        .expect("remove brand");
    assert!(!query.state().contains("brand"));
    assert_eq!(history.replace_count(), 2);
    assert_eq!(history.push_count(), 0);
}

#[test]
fn clear_returns_to_first_page() {
    let (_history, mut query) = page_controller();
    PageAction::NextPage.apply(&mut query).expect("next");
    PageAction::ToggleFilter(FilterKey::Color)
        .apply(&mut query)
        .expect("color");
    PageAction::Clear.apply(&mut query).expect("clear");
    assert_eq!(query.state(), &default_query_state());
}

#[test]
fn plan_is_pure() {
    let current = QueryState::new().with("page", 3).with("size", "M");
    let planned = PageAction::PreviousPage
        .plan(&current, &default_query_state())
        .expect("enabled");
    assert_eq!(planned.state, QueryState::new().with("page", 2).with("size", "M"));
    assert_eq!(planned.options, NavigateOptions::PUSH);
    assert_eq!(current.get_i64("page"), Some(3));
}

#[test]
fn actions_parse_from_display_names() {
    for action in PageAction::all() {
        assert_eq!(action.to_string().parse::<PageAction>().expect("parse"), action);
    }
    assert_eq!(
        "close-flyout".parse::<PageAction>().expect("parse"),
        PageAction::CloseFlyout
    );
    assert!("jump".parse::<PageAction>().is_err());
}
