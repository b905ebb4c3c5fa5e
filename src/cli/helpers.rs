//! Shared helper functions for CLI commands.

use std::path::Path;

use console::style;

use crate::extract::{MIME_PDF, MIME_TEXT};
use crate::models::AnalysisResult;

/// Truncate a string to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Guess the media type of a local file from its extension.
pub fn guess_mime(path: &Path) -> String {
    match mime_guess::from_path(path).first() {
        Some(mime) if mime.essence_str() == MIME_PDF => MIME_PDF.to_string(),
        Some(mime) if mime.type_() == mime_guess::mime::TEXT => MIME_TEXT.to_string(),
        Some(mime) => mime.essence_str().to_string(),
        None => "application/octet-stream".to_string(),
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Print an analysis as a readable report.
pub fn print_analysis(result: &AnalysisResult) {
    if result.is_unavailable() {
        println!(
            "{} Analysis unavailable: every model failed",
            style("!").yellow()
        );
    }

    let tone = &result.management_tone;
    println!("\n{}", style("Management tone").bold());
    println!("  {} ({} confidence)", tone.sentiment, tone.confidence);
    for quote in &tone.supporting_quotes {
        println!("  \"{}\"", quote);
    }

    if !result.key_positives.is_empty() {
        println!("\n{}", style("Key positives").bold());
        for positive in &result.key_positives {
            let by = positive
                .mentioned_by
                .map(|s| format!(" [{}]", s))
                .unwrap_or_default();
            println!(
                "  {} {}{}: {}",
                style("+").green(),
                positive.topic,
                by,
                positive.description
            );
        }
    }

    if !result.key_concerns.is_empty() {
        println!("\n{}", style("Key concerns").bold());
        for concern in &result.key_concerns {
            println!(
                "  {} {} [{}]: {}",
                style("-").red(),
                concern.topic,
                concern.severity,
                concern.description
            );
        }
    }

    let guidance = &result.forward_guidance;
    println!("\n{}", style("Forward guidance").bold());
    for (label, value) in [
        ("Revenue", &guidance.revenue_outlook),
        ("Margin", &guidance.margin_outlook),
        ("Capex", &guidance.capex_outlook),
    ] {
        println!("  {:<8} {}", label, value.as_deref().unwrap_or("not discussed"));
    }
    if let Some(confidence) = guidance.confidence {
        println!("  {:<8} {}", "Confidence", confidence);
    }

    if let Some(ref utilization) = result.capacity_utilization {
        println!("\n{} {}", style("Capacity utilization:").bold(), utilization);
    }

    if !result.growth_initiatives.is_empty() {
        println!("\n{}", style("Growth initiatives").bold());
        for initiative in &result.growth_initiatives {
            println!(
                "  {} {} ({}): {}",
                style("*").cyan(),
                initiative.initiative,
                initiative.timeframe,
                initiative.description
            );
        }
    }

    println!("\n{}", style("Summary").bold());
    println!("  {}", result.summary);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long filename.pdf", 10), "a long ...");
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("call.pdf")), "application/pdf");
        assert_eq!(guess_mime(Path::new("call.txt")), "text/plain");
        assert_eq!(guess_mime(Path::new("chart.png")), "image/png");
        assert_eq!(guess_mime(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
