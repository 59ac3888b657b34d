//! `quack search` and `quack ask`.
//!
//! Both retrieve through [`CodeIndex::retrieve`]; `ask` additionally hands
//! the assembled context to an [`AnswerProvider`]. Output goes to stdout,
//! either human-readable or as JSON with `--json`.

use anyhow::Result;
use chrono::Utc;

use quackstack_core::models::RankedResult;
use quackstack_core::search::{context_header, RankOptions};

use crate::answer::AnswerProvider;
use crate::index::CodeIndex;

const EXCERPT_MAX_CHARS: usize = 160;

pub async fn run_search(
    index: &CodeIndex,
    query: &str,
    project: &str,
    options: &RankOptions,
    json: bool,
) -> Result<()> {
    let results = if query.trim().is_empty() {
        Vec::new()
    } else {
        index.retrieve(query, project, options).await?
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_results(&results);
    Ok(())
}

pub async fn run_ask(
    index: &CodeIndex,
    query: &str,
    project: &str,
    options: &RankOptions,
    provider: &dyn AnswerProvider,
    json: bool,
) -> Result<()> {
    let outcome = index.search(query, project, options, provider).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("{}", outcome.answer.trim());
    if !outcome.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in outcome.sources.iter().enumerate() {
            println!("  [{}] {}{}", i + 1, source.file_path, line_range(source));
        }
    }
    Ok(())
}

fn print_results(results: &[RankedResult]) {
    let now = Utc::now();
    for (i, result) in results.iter().enumerate() {
        let header = context_header(i + 1, result, now);
        let mut lines = header.lines();
        if let Some(first) = lines.next() {
            println!("{}  score {:.3}{}", first, result.score, line_range(result));
        }
        for line in lines {
            println!("    {}", line);
        }
        println!("    excerpt: \"{}\"", excerpt(&result.content));
        println!();
    }
}

fn line_range(result: &RankedResult) -> String {
    match (result.line_start, result.line_end) {
        (Some(start), Some(end)) => format!("  lines {}-{}", start, end),
        _ => String::new(),
    }
}

/// Whitespace-collapsed prefix of `content`.
fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_MAX_CHARS {
        return flat;
    }
    let mut out: String = flat.chars().take(EXCERPT_MAX_CHARS).collect();
    out.push_str("...");
    out
}
