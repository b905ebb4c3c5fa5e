//! Analyze command.

use console::style;

use super::super::helpers::print_analysis;
use crate::config::Settings;
use crate::services::DocumentLifecycle;

/// Analyze a stored document, or print its stored analysis.
pub async fn cmd_analyze(settings: &Settings, document_id: &str, json: bool) -> anyhow::Result<()> {
    let lifecycle = DocumentLifecycle::open(settings).await?;

    if !json {
        println!(
            "{} Analyzing {} with {} ({} candidate models)...",
            style("→").cyan(),
            document_id,
            settings.llm.provider.as_str(),
            settings.llm.candidate_models().len()
        );
    }

    let result = match lifecycle.request_analysis(document_id).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_analysis(&result);
    }

    Ok(())
}
