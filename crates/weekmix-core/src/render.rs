//! Terminal rendering of calendars.

use std::io::{self, Write};

use crate::calendar::WeeklyCalendar;

const HEADERS: [&str; 5] = ["Day", "Theme", "Pillar", "Engagement", "Format"];

/// Renders the calendar as an aligned plain-text table.
pub fn render_calendar(calendar: &WeeklyCalendar) -> String {
    let rows: Vec<[&str; 5]> = calendar
        .iter()
        .map(|day| {
            [
                day.day.as_str(),
                day.theme.as_str(),
                day.pillar.as_str(),
                day.engagement.as_str(),
                day.format.as_str(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS, &widths);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell.as_ref(), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Writes a unified diff between two rendered calendars.
pub fn diff_calendars(
    writer: &mut dyn Write,
    previous: &WeeklyCalendar,
    next: &WeeklyCalendar,
) -> io::Result<()> {
    let theme = termdiff::SignsColorTheme {};
    termdiff::diff(
        writer,
        &render_calendar(previous),
        &render_calendar(next),
        &theme,
    )?;
    writer.flush()
}
