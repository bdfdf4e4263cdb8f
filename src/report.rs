//! Static HTML index of a run

use crate::{format_duration, OutcomeRecord, ReconError};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Render `records` and write them to `path`, replacing any previous report.
pub async fn write_report(records: &[OutcomeRecord], path: &Path) -> Result<(), ReconError> {
    let html = render_html(records);
    tokio::fs::write(path, html)
        .await
        .map_err(|e| ReconError::Report {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    info!("Wrote report with {} entries to {}", records.len(), path.display());
    Ok(())
}

/// Render the report document.
///
/// Rows are ordered by target: workers finish in arbitrary order, so
/// arrival order carries no meaning.
pub fn render_html(records: &[OutcomeRecord]) -> String {
    let mut sorted: Vec<&OutcomeRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.target.cmp(&b.target).then(a.url.cmp(&b.url)));

    let captured = sorted.iter().filter(|r| r.is_success()).count();
    let failed = sorted.len() - captured;

    let mut html = String::with_capacity(4096 + sorted.len() * 1024);
    html.push_str(HEADER);
    let _ = write!(
        html,
        "<h1>peepshot report</h1>\n<p class=\"summary\">{} targets: {} captured, {} failed</p>\n",
        sorted.len(),
        captured,
        failed
    );

    html.push_str("<section id=\"results\">\n");
    if sorted.is_empty() {
        html.push_str("<p class=\"empty\">No targets were captured.</p>\n");
    } else {
        html.push_str("<table>\n<tr><th>Target</th><th>Screenshot</th><th>Details</th></tr>\n");
        for record in sorted {
            render_row(&mut html, record);
        }
        html.push_str("</table>\n");
    }
    html.push_str("</section>\n</body>\n</html>\n");
    html
}

fn render_row(html: &mut String, record: &OutcomeRecord) {
    let row_class = if record.is_success() { "ok" } else { "failed" };
    let _ = write!(
        html,
        "<tr class=\"{}\">\n<td><a href=\"{}\" target=\"_blank\">{}</a></td>\n",
        row_class,
        attr(&record.url),
        text(&record.target)
    );

    match &record.screenshot {
        Some(path) => {
            let src = path.to_string_lossy();
            let _ = write!(
                html,
                "<td><a href=\"{0}\"><img src=\"{0}\" alt=\"{1}\"></a></td>\n",
                attr(&src),
                attr(&record.target)
            );
        }
        None => html.push_str("<td class=\"none\">no screenshot</td>\n"),
    }

    html.push_str("<td>\n");
    if let Some(error) = record.error() {
        let _ = writeln!(html, "<p class=\"error\">{}</p>", text(&error.to_string()));
    }
    if let Some(title) = &record.page_title {
        let _ = writeln!(html, "<p><b>Title:</b> {}</p>", text(title));
    }
    if let Some(final_url) = record.final_url.as_ref().filter(|u| **u != record.url) {
        let _ = writeln!(html, "<p><b>Landed on:</b> {}</p>", text(final_url));
    }
    if let Some(status) = record.http_status {
        let _ = writeln!(html, "<p><b>HTTP status:</b> {status}</p>");
    }
    if !record.headers.is_empty() {
        html.push_str("<pre class=\"headers\">");
        for (name, value) in &record.headers {
            let _ = writeln!(html, "{}: {}", text(name), text(value));
        }
        html.push_str("</pre>\n");
    }
    if let Some(source) = &record.source {
        let _ = writeln!(
            html,
            "<p><a href=\"{}\">page source</a></p>",
            attr(&source.to_string_lossy())
        );
    }
    let _ = writeln!(
        html,
        "<p class=\"meta\">worker {} &middot; {}</p>",
        record.worker_id,
        format_duration(record.duration)
    );
    html.push_str("</td>\n</tr>\n");
}

const HEADER: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>peepshot report</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; width: 100%; }
td, th { border: 1px solid #ccc; padding: 0.5em; vertical-align: top; text-align: left; }
img { max-width: 480px; }
tr.failed { background: #fdecea; }
.error { color: #b00020; }
.headers { font-size: 0.85em; white-space: pre-wrap; }
.meta { color: #777; font-size: 0.8em; }
</style>
</head>
<body>
"#;
