//! Terminal rendering: notes, tables, and the detection/ledger views.

use sightline_agent::{InvocationStatus, ToolInvocation};
use sightline_core::{DetectionKind, NormalizedDetection};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Honors `NO_COLOR` and dumb terminals.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn paint(color: &str, s: &str) -> String {
    if supports_color() {
        format!("{color}{s}{RESET}")
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

/// Errors go to stderr.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

pub enum Align {
    Left,
    Right,
}

pub struct Column {
    pub header: String,
    pub align: Align,
    pub max_width: Option<usize>,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Left, max_width: None }
    }

    pub fn right(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Right, max_width: None }
    }

    pub fn truncate_at(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| visible_len(&c.header)).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            let w = row.get(i).map(|cell| visible_len(cell)).unwrap_or(0);
            let w = col.max_width.map_or(w, |max| w.min(max));
            widths[i] = widths[i].max(w);
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| pad_cell(&col.header, widths[i], &col.align))
        .collect();
    out.push_str(&format!("  {}\n", paint(BOLD, header.join("  ").trim_end())));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}\n", sep.join("  ")));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let cell = truncate(cell, widths[i]);
                pad_cell(&cell, widths[i], &col.align)
            })
            .collect();
        out.push_str(&format!("  {}\n", cells.join("  ").trim_end()));
    }
    out
}

fn visible_len(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

fn truncate(s: &str, width: usize) -> String {
    if visible_len(s) <= width {
        return s.to_string();
    }
    let plain = strip_ansi(s);
    let kept: String = plain.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

fn pad_cell(s: &str, width: usize, align: &Align) -> String {
    let pad = " ".repeat(width.saturating_sub(visible_len(s)));
    match align {
        Align::Left => format!("{s}{pad}"),
        Align::Right => format!("{pad}{s}"),
    }
}

// ---------------------------------------------------------------------------
// Domain views
// ---------------------------------------------------------------------------

pub fn detections_table(detections: &[NormalizedDetection]) -> String {
    let columns = [
        Column::right("#"),
        Column::left("kind"),
        Column::left("label").truncate_at(40),
        Column::right("conf"),
        Column::left("box [xmin, ymin, xmax, ymax]"),
    ];
    let rows: Vec<Vec<String>> = detections
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let kind = match d.kind {
                DetectionKind::Object => "object",
                DetectionKind::Text => "text",
            };
            let [x0, y0, x1, y1] = d.bbox.rounded();
            vec![
                (i + 1).to_string(),
                kind.to_string(),
                d.label.clone(),
                d.confidence.map(|c| format!("{c:.2}")).unwrap_or_else(|| "-".into()),
                format!("[{x0}, {y0}, {x1}, {y1}]"),
            ]
        })
        .collect();
    render_table(&columns, &rows)
}

pub fn ledger_table(entries: &[ToolInvocation]) -> String {
    let columns = [
        Column::left("started"),
        Column::left("tool"),
        Column::left("status"),
        Column::right("ms"),
        Column::left("detail").truncate_at(60),
    ];
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let status = match e.status {
                InvocationStatus::Pending => paint(YELLOW, "pending"),
                InvocationStatus::Success => paint(GREEN, "success"),
                InvocationStatus::Error => paint(RED, "error"),
            };
            let elapsed = e
                .completed_at
                .map(|done| (done - e.started_at).num_milliseconds().to_string())
                .unwrap_or_else(|| "-".into());
            let detail = e.error.clone().unwrap_or_else(|| e.arguments.clone());
            vec![
                e.started_at.format("%H:%M:%S").to_string(),
                e.tool_name.clone(),
                status,
                elapsed,
                detail,
            ]
        })
        .collect();
    render_table(&columns, &rows)
}

/// Dimmed footer line, e.g. under an answer.
pub fn footnote(msg: &str) -> String {
    paint(DIM, msg)
}
