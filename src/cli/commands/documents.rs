//! Document inspection commands.

use console::style;

use super::super::helpers::{format_bytes, print_analysis, truncate};
use crate::config::Settings;
use crate::models::DocumentStatus;
use crate::services::DocumentLifecycle;

/// Show one document.
pub async fn cmd_show(settings: &Settings, document_id: &str, json: bool) -> anyhow::Result<()> {
    let lifecycle = DocumentLifecycle::open(settings).await?;
    let doc = lifecycle.get(document_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("\n{}", style(&doc.original_name).bold());
    println!("{}", "-".repeat(60));
    println!("{:<12} {}", "ID", doc.id);
    println!("{:<12} {}", "Type", doc.file_type);
    println!("{:<12} {}", "Size", format_bytes(doc.file_size));
    println!(
        "{:<12} {}",
        "Uploaded",
        doc.upload_date.format("%Y-%m-%d %H:%M")
    );
    println!("{:<12} {}", "Status", styled_status(doc.status));

    if let Some(ref text) = doc.text_content {
        println!(
            "{:<12} {}",
            "Text",
            truncate(text, 200)
        );
    }

    match doc.analysis_result {
        Some(ref result) => print_analysis(result),
        None if doc.status == DocumentStatus::Uploaded => println!(
            "\n  Run 'earnings analyze {}' to analyze this document",
            doc.id
        ),
        None => {}
    }

    Ok(())
}

/// List recent documents.
pub async fn cmd_list(settings: &Settings, limit: i64) -> anyhow::Result<()> {
    let lifecycle = DocumentLifecycle::open(settings).await?;
    let docs = lifecycle.recent(limit).await?;

    if docs.is_empty() {
        println!(
            "{} No documents yet. Run 'earnings ingest <file>' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Documents").bold());
    println!("{}", "-".repeat(90));
    println!(
        "{:<38} {:<28} {:<11} Uploaded",
        "ID", "Name", "Status"
    );
    println!("{}", "-".repeat(90));

    for doc in docs {
        println!(
            "{:<38} {:<28} {:<11} {}",
            doc.id,
            truncate(&doc.original_name, 27),
            doc.status.as_str(),
            doc.upload_date.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

fn styled_status(status: DocumentStatus) -> String {
    let label = status.as_str();
    match status {
        DocumentStatus::Completed => style(label).green().to_string(),
        DocumentStatus::Failed => style(label).red().to_string(),
        DocumentStatus::Processing => style(label).yellow().to_string(),
        DocumentStatus::Uploaded => label.to_string(),
    }
}
