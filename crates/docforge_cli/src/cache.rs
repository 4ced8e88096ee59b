//! `docforge cache` command handlers.

use std::collections::BTreeMap;

use docforge_cache::maintenance;
use tracing::info;

use crate::project;
use crate::{GlobalArgs, ReportFormat, StatsArgs};

/// Renders the bucket histogram as text, marking the current format version.
fn render_text(histogram: &BTreeMap<String, usize>, current: &str) -> String {
    let mut out = String::new();
    let total: usize = histogram.values().sum();
    for (version, count) in histogram {
        let marker = if version == current { " (current)" } else { "" };
        out.push_str(&format!("{version:<12} {count:>8}{marker}\n"));
    }
    out.push_str(&format!("{:<12} {total:>8}\n", "total"));
    out
}

/// Renders the bucket histogram as JSON.
fn render_json(histogram: &BTreeMap<String, usize>, current: &str) -> serde_json::Value {
    serde_json::json!({
        "current_version": current,
        "total": histogram.values().sum::<usize>(),
        "versions": histogram,
    })
}

/// Runs `docforge cache stats`.
pub fn stats(args: &StatsArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global)?;
    let histogram = maintenance::version_histogram(&project.store)?;
    let current = &project.config.cache.format_version;

    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                print!("{}", render_text(&histogram, current));
            }
        }
        ReportFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&render_json(&histogram, current))?
            );
        }
    }
    Ok(0)
}

/// Runs `docforge cache gc`.
pub fn gc(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global)?;
    let version = &project.config.cache.format_version;
    let removed = maintenance::collect_garbage(&project.store, version)?;
    info!(
        "removed {removed} bucket(s) not matching format version {version} in {}",
        project.root.display()
    );
    Ok(0)
}

/// Runs `docforge cache clear`.
pub fn clear(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global)?;
    let removed = maintenance::clear(&project.store)?;
    info!(
        "removed {removed} bucket(s) from {}",
        project.store.dir().display()
    );
    Ok(0)
}
