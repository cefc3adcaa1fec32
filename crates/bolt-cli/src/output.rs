use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// One table column: its header, alignment, and an optional cell width cap.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    pub header: &'a str,
    pub align: Align,
    pub max_width: Option<usize>,
}

impl<'a> Column<'a> {
    pub const fn left(header: &'a str) -> Self {
        Self {
            header,
            align: Align::Left,
            max_width: None,
        }
    }

    pub const fn right(header: &'a str) -> Self {
        Self {
            header,
            align: Align::Right,
            max_width: None,
        }
    }

    /// Cut cells longer than `max` characters, ending them with `…`.
    pub const fn truncate(mut self, max: usize) -> Self {
        self.max_width = Some(max);
        self
    }
}

fn clip(cell: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if max > 0 && cell.chars().count() > max => {
            let mut out: String = cell.chars().take(max - 1).collect();
            out.push('…');
            out
        }
        _ => cell.to_string(),
    }
}

fn pad(cell: &str, width: usize, align: Align) -> String {
    match align {
        Align::Left => format!("{cell:<width$}"),
        Align::Right => format!("{cell:>width$}"),
    }
}

/// Render `rows` under `columns`, two spaces between columns. Cells past
/// the last column are dropped.
pub fn render_table(columns: &[Column<'_>], rows: &[Vec<String>]) -> String {
    let clipped: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| clip(row.get(i).map_or("", String::as_str), col.max_width))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            clipped
                .iter()
                .map(|row| row[i].chars().count())
                .fold(col.header.chars().count(), usize::max)
        })
        .collect();

    let line = |cells: Vec<String>| cells.join("  ").trim_end().to_string();
    let mut out = String::new();
    out.push_str(&line(
        columns
            .iter()
            .zip(&widths)
            .map(|(col, &w)| pad(col.header, w, col.align))
            .collect(),
    ));
    out.push('\n');
    out.push_str(&line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    out.push('\n');
    for row in &clipped {
        out.push_str(&line(
            row.iter()
                .zip(columns.iter().zip(&widths))
                .map(|(cell, (col, &w))| pad(cell, w, col.align))
                .collect(),
        ));
        out.push('\n');
    }
    out
}

pub fn print_table(columns: &[Column<'_>], rows: &[Vec<String>]) {
    print!("{}", render_table(columns, rows));
}
