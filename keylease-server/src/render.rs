//! HTML rendering of the admin key list.

use keylease_core::{KeyState, KeyView};
use std::fmt::Write;

/// Renders the admin dashboard page for `views`.
#[must_use]
pub fn render_dashboard(views: &[KeyView]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>License Keys</title>\n</head>\n<body>\n<h1>License Keys</h1>\n",
    );

    if views.is_empty() {
        html.push_str("<p>No keys issued.</p>\n");
    } else {
        html.push_str(
            "<table>\n<tr><th>Class</th><th>Key</th><th>Expires</th><th>State</th>\
             <th>Last used</th><th>Owner</th></tr>\n",
        );
        for view in views {
            let _ = writeln!(
                html,
                "<tr{}><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                if view.shadowed { " class=\"shadowed\"" } else { "" },
                view.key_class,
                escape(&view.key),
                format_time(view.record.expiry),
                state_label(view.state, view.record.in_use),
                view.record.last_used.map_or_else(|| "never".to_string(), format_time),
                escape(view.record.owner.as_deref().unwrap_or("")),
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn state_label(state: KeyState, in_use: bool) -> &'static str {
    match state {
        KeyState::Available => "available",
        KeyState::Leased => "in use",
        KeyState::Expired if in_use => "expired (still in use)",
        KeyState::Expired => "expired",
    }
}

fn format_time(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map_or_else(|| secs.to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Escapes text for inclusion in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
