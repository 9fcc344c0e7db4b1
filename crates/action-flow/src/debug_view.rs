//! HTML rendering of a run report for offline debugging

use crate::report::{ActionReportEntry, WorkflowReport};

/// Self-contained HTML page for `report`, with screenshots inlined.
pub fn render_html(report: &WorkflowReport) -> String {
    let rows = report
        .entries
        .iter()
        .map(render_row)
        .collect::<Vec<_>>()
        .join("\n");

    let errors = if report.error_log.is_empty() {
        String::new()
    } else {
        format!(
            "<h2>Errors</h2>\n    <ul>\n{}\n    </ul>",
            report
                .error_log
                .iter()
                .map(|line| format!("        <li>{}</li>", escape_html(line)))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Replay Report: {name}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        h1 {{ color: #333; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; vertical-align: top; }}
        th {{ background-color: #f2f2f2; }}
        tr:nth-child(even) {{ background-color: #f9f9f9; }}
        tr.failed td {{ background-color: #fde8e8; }}
        img {{ max-width: 240px; border: 1px solid #ccc; }}
    </style>
</head>
<body>
    <h1>{name}</h1>
    <p>Run {run_id}: <strong>{status}</strong>, {succeeded}/{total} succeeded ({rate:.1}%) in {duration} ms</p>
    <table>
        <tr>
            <th>#</th>
            <th>Action</th>
            <th>Type</th>
            <th>Result</th>
            <th>Method</th>
            <th>Retries</th>
            <th>Duration (ms)</th>
            <th>Error</th>
            <th>Before</th>
            <th>After</th>
        </tr>
{rows}
    </table>
    {errors}
</body>
</html>"#,
        name = escape_html(&report.workflow_name),
        run_id = report.run_id,
        status = report.status,
        succeeded = report.succeeded,
        total = report.total,
        rate = report.success_rate,
        duration = report.duration_ms,
        rows = rows,
        errors = errors,
    )
}

fn render_row(entry: &ActionReportEntry) -> String {
    format!(
        "        <tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        if entry.success { "ok" } else { "failed" },
        entry.index,
        escape_html(&entry.name),
        entry.action_type,
        if entry.success { "ok" } else { "failed" },
        entry.method,
        entry.retries,
        entry.duration_ms,
        entry.error.as_deref().map(escape_html).unwrap_or_default(),
        image(entry.screenshot_before.as_deref().or(entry.capture.as_deref())),
        image(entry.screenshot_after.as_deref()),
    )
}

fn image(base64: Option<&str>) -> String {
    match base64 {
        Some(data) => format!("<img src=\"data:image/png;base64,{}\"/>", data),
        None => String::new(),
    }
}

pub fn escape_html(text: &str) -> String {
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
