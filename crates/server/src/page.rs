use query_codec::{EncodeError, QueryCodec};
use query_state::page::PageAction;
use shared::{
    domain::{FilterKey, PageQuery, QueryState},
    protocol::{location_for, StateSource},
};

/// Renders the demo page for server-decoded state. Every action is a plain
/// link carrying the token it would produce, so the page works without a
/// client runtime. Links are planned from the full state, so fields the page
/// does not display survive navigation.
pub(crate) fn render(
    path: &str,
    state: &QueryState,
    source: StateSource,
    codec: &QueryCodec,
    initial: &QueryState,
) -> Result<String, EncodeError> {
    let query = PageQuery::from_state(state);
    let state_json = serde_json::to_string_pretty(state)?;
    let source = match source {
        StateSource::Token => "decoded from q",
        StateSource::Default => "default state",
    };

    let mut chips = String::new();
    for key in FilterKey::ALL {
        if let Some(value) = query.filter(key) {
            chips.push_str(&format!(
                "<li class=\"chip\">{}: {}</li>",
                key.label(),
                escape_html(value)
            ));
        }
    }

    let mut actions = PageAction::all();
    if query.flyout_open() {
        actions.push(PageAction::CloseFlyout);
    }
    let mut links = String::new();
    for action in actions {
        links.push_str(&action_link(path, action, state, codec, initial)?);
    }

    let flyout = if query.flyout_open() {
        "<aside class=\"flyout\">This panel is controlled by the <code>flyout</code> query param.</aside>"
    } else {
        ""
    };

    Ok(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Hashed query state</title></head>\n\
         <body>\n<h1>Hashed query state</h1>\n\
         <section><h2>Current params ({source})</h2><pre>{}</pre></section>\n\
         <section><h2>Page {}</h2><ul class=\"chips\">{chips}</ul><nav>{links}</nav></section>\n\
         {flyout}\n</body></html>\n",
        escape_html(&state_json),
        query.page,
    ))
}

fn action_link(
    path: &str,
    action: PageAction,
    state: &QueryState,
    codec: &QueryCodec,
    initial: &QueryState,
) -> Result<String, EncodeError> {
    let label = escape_html(&action.label());
    let Some(planned) = action.plan(state, initial) else {
        return Ok(format!("<span class=\"disabled\" data-action=\"{action}\">{label}</span>"));
    };
    let token = codec.encode(&planned.state)?;
    let history = if planned.options.replace { "replace" } else { "push" };
    Ok(format!(
        "<a href=\"{}\" data-action=\"{action}\" data-history=\"{history}\">{label}</a>",
        escape_html(&location_for(path, token.as_str())),
    ))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
