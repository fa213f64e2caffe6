//! Alert rendering: plain text for logs and chat, an HTML table for email,
//! and Telegram's restricted HTML markup.

use std::fmt::Write;

use crate::config::AlertFormat;
use crate::notify::AlertMessage;
use crate::types::{AlertEntry, ComparisonReport, Direction};

const DRIFT_COLOUR: &str = "#27ae60";
const SHORTEN_COLOUR: &str = "#e74c3c";

pub fn render(message: &AlertMessage, format: AlertFormat) -> String {
    match format {
        AlertFormat::Text => render_text(message),
        AlertFormat::Html => render_html(message),
    }
}

pub fn subject(message: &AlertMessage) -> String {
    match message {
        AlertMessage::Alerts(report) => format!(
            "Odds alert: {} changes detected ({})",
            report.alerts.len(),
            report.current_date
        ),
        AlertMessage::MissingSnapshot { current_date, .. } => {
            format!("Odds alert: snapshot missing ({current_date})")
        }
    }
}

fn change(pct: f64) -> String {
    format!("{pct:+.2}%")
}

fn summary_line(report: &ComparisonReport) -> String {
    format!(
        "Compared with {} at a {}% threshold: {} of {} matched outcomes moved.",
        report.baseline_date,
        report.threshold_pct,
        report.alerts.len(),
        report.matched
    )
}

fn missing_line(message: &AlertMessage) -> String {
    match message {
        AlertMessage::MissingSnapshot {
            baseline_date,
            current_date,
            missing,
        } => format!("No snapshot stored for {missing}; comparison {baseline_date} -> {current_date} skipped."),
        AlertMessage::Alerts(_) => String::new(),
    }
}

fn entry_text(e: &AlertEntry) -> String {
    format!(
        "{} | {} | {}\nOdds: {:.2} -> {:.2} | Change: {} ({})",
        e.key.match_key.label(),
        e.key.market,
        e.key.selection,
        e.previous_price,
        e.current_price,
        change(e.change_pct),
        e.direction
    )
}

pub fn render_text(message: &AlertMessage) -> String {
    match message {
        AlertMessage::Alerts(report) => {
            let mut out = format!("ODDS CHANGE ALERT ({})\n{}\n", report.current_date, summary_line(report));
            for e in &report.alerts {
                out.push('\n');
                out.push_str(&entry_text(e));
                out.push('\n');
            }
            out
        }
        AlertMessage::MissingSnapshot { current_date, .. } => {
            format!("ODDS SNAPSHOT MISSING ({current_date})\n{}\n", missing_line(message))
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_html(message: &AlertMessage) -> String {
    let mut out = String::from("<html><body style=\"font-family: Arial, sans-serif\">\n");
    match message {
        AlertMessage::Alerts(report) => {
            let _ = writeln!(out, "<h2>Odds changes for {}</h2>", report.current_date);
            let _ = writeln!(out, "<p>{}</p>", escape_html(&summary_line(report)));
            out.push_str("<table style=\"border-collapse: collapse; width: 100%\">\n");
            out.push_str(
                "<tr><th>Match</th><th>Market</th><th>Selection</th><th>Previous</th><th>Current</th><th>Change</th></tr>\n",
            );
            for e in &report.alerts {
                let colour = match e.direction {
                    Direction::Drift => DRIFT_COLOUR,
                    Direction::Shorten => SHORTEN_COLOUR,
                };
                let _ = writeln!(
                    out,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td>\
                     <td style=\"color: {colour}; font-weight: bold\">{}</td></tr>",
                    escape_html(&e.key.match_key.label()),
                    escape_html(&e.key.market),
                    escape_html(&e.key.selection),
                    e.previous_price,
                    e.current_price,
                    change(e.change_pct),
                );
            }
            out.push_str("</table>\n");
        }
        AlertMessage::MissingSnapshot { current_date, .. } => {
            let _ = writeln!(out, "<h2>Odds snapshot missing for {current_date}</h2>");
            let _ = writeln!(out, "<p>{}</p>", escape_html(&missing_line(message)));
        }
    }
    out.push_str("</body></html>\n");
    out
}

/// Telegram HTML (bold only, no tables), cut to at most `max_chars`
/// characters. Whole entries are dropped from the end and replaced by a
/// notice, so markup is never split.
pub fn render_telegram(message: &AlertMessage, max_chars: usize) -> String {
    let report = match message {
        AlertMessage::Alerts(report) => report,
        AlertMessage::MissingSnapshot { current_date, .. } => {
            return format!(
                "<b>ODDS SNAPSHOT MISSING ({current_date})</b>\n{}",
                escape_html(&missing_line(message))
            );
        }
    };

    let mut out = format!(
        "<b>ODDS CHANGE ALERT ({})</b>\n{}",
        report.current_date,
        escape_html(&summary_line(report))
    );
    let mut used = out.chars().count();
    // Room for "\n\n... and NNNNNN more not shown".
    let reserve = 40;

    for (i, e) in report.alerts.iter().enumerate() {
        let block = format!(
            "\n\n<b>{}</b> | {} | {}\nOdds: {:.2} -> {:.2} | Change: {} ({})",
            escape_html(&e.key.match_key.label()),
            escape_html(&e.key.market),
            escape_html(&e.key.selection),
            e.previous_price,
            e.current_price,
            change(e.change_pct),
            e.direction
        );
        let len = block.chars().count();
        if used + len + reserve > max_chars {
            let _ = write!(out, "\n\n... and {} more not shown", report.alerts.len() - i);
            return out;
        }
        out.push_str(&block);
        used += len;
    }
    out
}
