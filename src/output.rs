//! Terminal output for search results and index reports

use crate::index::{IndexReport, SearchResults};
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print results grouped under a heading per file
pub fn print_results(results: &SearchResults, open: &str, close: &str, color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);
    write_results(&mut stdout, results, open, close)
}

pub fn write_results<W: WriteColor>(out: &mut W, results: &SearchResults, open: &str, close: &str) -> io::Result<()> {
    for (i, (path, excerpts)) in results.iter().enumerate() {
        if i > 0 {
            // Add blank line between files
            writeln!(out)?;
        }

        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
        writeln!(out, "{}", path)?;
        out.reset()?;

        for excerpt in excerpts {
            write_excerpt(out, excerpt, open, close)?;
        }
    }
    Ok(())
}

/// Print an excerpt with the marked spans highlighted instead of the markers
fn write_excerpt<W: WriteColor>(out: &mut W, excerpt: &str, open: &str, close: &str) -> io::Result<()> {
    let mut rest = excerpt;

    while !open.is_empty()
        && let Some(start) = rest.find(open)
    {
        write!(out, "{}", &rest[..start])?;
        let marked = &rest[start + open.len()..];
        let end = if close.is_empty() {
            None
        } else {
            marked.find(close)
        };
        let Some(end) = end else {
            rest = marked;
            break;
        };

        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "{}", &marked[..end])?;
        out.reset()?;
        rest = &marked[end + close.len()..];
    }

    writeln!(out, "{}", rest.replace('\n', " "))?;
    Ok(())
}

pub fn print_report(report: &IndexReport) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    write_report(&mut stdout, report)
}

pub fn write_report<W: WriteColor>(out: &mut W, report: &IndexReport) -> io::Result<()> {
    if report.is_noop() {
        writeln!(out, "Index up to date ({} documents)", report.unchanged)?;
    } else {
        writeln!(
            out,
            "{} added, {} updated, {} deleted, {} unchanged in {:.2?}",
            report.added, report.updated, report.deleted, report.unchanged, report.duration
        )?;
    }

    if !report.skipped.is_empty() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(out, "Skipped {} unreadable files:", report.skipped.len())?;
        out.reset()?;
        for path in &report.skipped {
            writeln!(out, "  {}", path)?;
        }
    }
    Ok(())
}
