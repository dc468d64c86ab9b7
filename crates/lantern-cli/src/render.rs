use lantern_core::search::file_basename;
use lantern_core::{Suggestion, SuggestionState, UsageStats};
use std::io::{self, Write};

const ISSUE_WIDTH: usize = 60;

pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }

    if max <= 3 {
        return s.chars().take(max).collect();
    }

    let truncated: String = s.chars().take(max - 3).collect();
    format!("{}...", truncated)
}

/// One line per record: status, id, issue, then whatever optional context exists.
pub fn format_row(record: &Suggestion) -> String {
    let mut line = format!(
        "[{}] {}  {}",
        record.status,
        record.id,
        truncate(&record.issue, ISSUE_WIDTH)
    );
    if let Some(file) = &record.file {
        line.push_str(&format!("  ({})", file_basename(file)));
    }
    if let Some(rating) = record.rating {
        line.push_str(&format!("  {}/5", rating));
    }
    for tag in record.tags() {
        line.push_str(&format!("  #{}", tag));
    }
    line
}

pub fn write_list(out: &mut impl Write, state: &SuggestionState) -> io::Result<()> {
    let query = state.query();
    if !query.is_empty() {
        writeln!(
            out,
            "Search: {:?} (matching \"{}\")",
            query.raw(),
            query.normalized()
        )?;
    }
    let visible = state.visible();
    writeln!(out, "{} of {} suggestions", visible.len(), state.len())?;
    for record in visible {
        writeln!(out, "{}", format_row(record))?;
    }
    Ok(())
}

pub fn write_stats(out: &mut impl Write, stats: &UsageStats) -> io::Result<()> {
    writeln!(out, "Requests:       {}", stats.requests)?;
    writeln!(out, "Failures:       {}", stats.failures)?;
    writeln!(out, "Pending:        {}", stats.pending)?;
    writeln!(out, "User messages:  {}", stats.user_messages)?;
    writeln!(out, "Tokens used:    {}", stats.total_tokens)?;
    match stats.average_response_ms {
        Some(ms) => writeln!(out, "Avg response:   {:.0} ms", ms)?,
        None => writeln!(out, "Avg response:   -")?,
    }
    match stats.average_rating {
        Some(rating) => writeln!(out, "Avg rating:     {:.1}/5", rating)?,
        None => writeln!(out, "Avg rating:     -")?,
    }
    Ok(())
}
