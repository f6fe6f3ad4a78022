//! Rendering of command output to stdout.

use std::io::{self, Write};

use crate::cli::OutputFormat;
use crate::commands::CommandOutput;
use crate::error::CliError;

pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    render_to(&mut handle, output, format, pretty)?;
    handle.flush()?;
    Ok(())
}

pub fn render_to<W: Write>(
    writer: &mut W,
    output: &CommandOutput,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match (output, format) {
        (CommandOutput::CacheKey(key), _) => writeln!(writer, "{key}")?,
        (_, OutputFormat::Json) => {
            let json = match output {
                CommandOutput::Records(records) => json_string(records, pretty)?,
                CommandOutput::Forecast(points) => json_string(points, pretty)?,
                CommandOutput::CacheKey(_) => String::new(),
            };
            writeln!(writer, "{json}")?;
        }
        (CommandOutput::Records(records), OutputFormat::Table) => {
            let rows = records
                .iter()
                .map(|r| {
                    vec![
                        r.date.to_string(),
                        format!("{:.4}", r.open),
                        format!("{:.4}", r.high),
                        format!("{:.4}", r.low),
                        format!("{:.4}", r.close),
                        format!("{:.4}", r.adjusted_close),
                        r.volume.to_string(),
                    ]
                })
                .collect::<Vec<_>>();
            write_table(
                writer,
                &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
                &rows,
            )?;
        }
        (CommandOutput::Forecast(points), OutputFormat::Table) => {
            let rows = points
                .iter()
                .map(|p| {
                    vec![
                        p.ds.to_string(),
                        format!("{:.4}", p.yhat),
                        format!("{:.4}", p.yhat_lower),
                        format!("{:.4}", p.yhat_upper),
                    ]
                })
                .collect::<Vec<_>>();
            write_table(writer, &["ds", "yhat", "yhat_lower", "yhat_upper"], &rows)?;
        }
    }
    Ok(())
}

fn json_string<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn write_table<W: Write>(writer: &mut W, headers: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let header = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(writer, "{}", header.trim_end())?;
    writeln!(writer, "{}", "-".repeat(header.trim_end().len()))?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}
