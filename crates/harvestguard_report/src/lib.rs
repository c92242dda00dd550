//! Results view rendering: static HTML page and terminal table.

use harvestguard::{Decision, ResultsView, ScanResult};
use std::io::Write;
use std::path::Path;

/// Render the results page to `out_path`. Embeds the view JSON.
pub fn render_results(view: &ResultsView, out_path: impl AsRef<Path>) -> Result<(), ReportError> {
    let html = build_html(view)?;
    let mut f = std::fs::File::create(out_path.as_ref()).map_err(ReportError::Io)?;
    f.write_all(html.as_bytes()).map_err(ReportError::Io)?;
    Ok(())
}

fn decision_class(r: &ScanResult) -> &'static str {
    match r.decision {
        Decision::Accept => "accepted",
        Decision::Flag => "flagged",
        Decision::Error => "error",
        Decision::Other(_) if r.is_anomaly => "flagged",
        Decision::Other(_) => "",
    }
}

fn html_row(r: &ScanResult) -> String {
    let detail = r
        .error
        .as_deref()
        .map(|e| format!(r#"<div class="detail">{}</div>"#, escape_html(e)))
        .unwrap_or_default();
    format!(
        r#"<tr><td class="mono">{image}</td><td class="{class}">{decision}{detail}</td><td>{confidence}</td><td class="mono">{error}</td><td>{anomaly}</td><td>{timestamp}</td></tr>"#,
        image = escape_html(&r.image),
        class = decision_class(r),
        decision = escape_html(r.decision.as_str()),
        detail = detail,
        confidence = r.display_confidence(),
        error = r.display_reconstruction_error(),
        anomaly = if r.is_anomaly { "Yes" } else { "No" },
        timestamp = escape_html(&r.display_timestamp()),
    )
}

/// Build HTML string from a results view (for testing or in-memory use).
pub fn build_html(view: &ResultsView) -> Result<String, ReportError> {
    let json_embed = serde_json::to_string(view).map_err(ReportError::Json)?;
    let summary = view.summary();
    let message_class = if view.partial_failure { "error" } else { "success" };
    let body = if view.results.is_empty() {
        "<p>No results available. Please upload images to scan.</p>".to_string()
    } else {
        let rows: Vec<String> = view.results.iter().map(html_row).collect();
        format!(
            r#"<table>
<thead><tr><th>Image</th><th>Decision</th><th>Confidence</th><th>Error score</th><th>Anomaly</th><th>Timestamp</th></tr></thead>
<tbody>
{}
</tbody>
</table>"#,
            rows.join("\n")
        )
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>HarvestGuard – Scan Results</title>
<style>
:root {{ font-family: system-ui, sans-serif; background: #0f1419; color: #e6edf3; }}
body {{ max-width: 960px; margin: 0 auto; padding: 1.5rem; }}
h1 {{ font-size: 1.4rem; margin-bottom: 0.5rem; }}
.mono {{ font-family: ui-monospace, monospace; font-size: 0.9em; word-break: break-all; }}
.card {{ background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; margin: 0.5rem 0; }}
table {{ width: 100%; border-collapse: collapse; }}
th, td {{ text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #30363d; }}
th {{ color: #8b949e; font-weight: 500; }}
.accepted {{ color: #3fb950; }}
.flagged {{ color: #d29922; }}
.error {{ color: #f85149; }}
.success {{ color: #3fb950; }}
.detail {{ font-size: 0.8em; color: #8b949e; }}
.footer {{ margin-top: 2rem; font-size: 0.85rem; color: #8b949e; }}
</style>
</head>
<body>
<h1>Scan Results</h1>
<p>Generated: {created}</p>
<p class="{message_class}">{message}</p>

<div class="card">
  {total} images: {accepted} accepted, {flagged} flagged, {errors} errors
</div>

<div class="card">
{body}
</div>

<script type="application/json" id="results-view">{json_embed}</script>
<div class="footer">
  <p>Generated by harvestguard. Scores come from the HarvestGuard backend.</p>
</div>
</body>
</html>"#,
        created = escape_html(&view.generated_utc_rfc3339),
        message_class = message_class,
        message = escape_html(&view.message),
        total = summary.total,
        accepted = summary.accepted,
        flagged = summary.flagged,
        errors = summary.errors,
        body = body,
        json_embed = escape_script_json(&json_embed),
    );
    Ok(html)
}

/// Plain-text table for the terminal, followed by the view's message.
pub fn build_text(view: &ResultsView) -> String {
    if view.results.is_empty() {
        return "No results available. Please upload images to scan.\n".to_string();
    }
    let headers = ["Image", "Decision", "Confidence", "Error", "Anomaly", "Timestamp"];
    let rows: Vec<[String; 6]> = view
        .results
        .iter()
        .map(|r| {
            [
                r.image.clone(),
                r.decision.to_string(),
                r.display_confidence(),
                r.display_reconstruction_error(),
                if r.is_anomaly { "Yes" } else { "No" }.to_string(),
                r.display_timestamp(),
            ]
        })
        .collect();
    let mut widths = headers.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |cells: &[&str]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };
    out.push_str(&line(&headers[..]));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("{}\n", rule.join("  ")));
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&cells[..]));
    }
    for r in view.results.iter().filter(|r| r.error.is_some()) {
        out.push_str(&format!(
            "  {}: {}\n",
            r.image,
            r.error.as_deref().unwrap_or_default()
        ));
    }
    out.push('\n');
    out.push_str(&view.message);
    out.push('\n');
    out
}

/// Script bodies are raw text: keep the JSON valid and unable to close the tag.
fn escape_script_json(json: &str) -> String {
    json.replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "io: {}", e),
            ReportError::Json(e) => write!(f, "json: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}
