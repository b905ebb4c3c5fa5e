//! Ingest command.

use std::path::Path;

use console::style;

use super::super::helpers::{format_bytes, guess_mime};
use crate::config::Settings;
use crate::services::{DocumentLifecycle, Upload};

/// Extract a local transcript and store it as a new document.
pub async fn cmd_ingest(settings: &Settings, path: &Path, mime: Option<&str>) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

    if bytes.len() > settings.server.max_upload_bytes {
        anyhow::bail!(
            "{} is {}, over the {} upload limit",
            path.display(),
            format_bytes(bytes.len() as u64),
            format_bytes(settings.server.max_upload_bytes as u64)
        );
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime_type = mime.map(str::to_string).unwrap_or_else(|| guess_mime(path));

    let lifecycle = DocumentLifecycle::open(settings).await?;
    let doc = match lifecycle
        .ingest(Upload {
            filename,
            mime_type,
            bytes,
        })
        .await
    {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            return Err(e.into());
        }
    };

    println!(
        "{} Stored {} ({}, {} characters)",
        style("✓").green(),
        doc.original_name,
        format_bytes(doc.file_size),
        doc.text_content.as_deref().map_or(0, |t| t.chars().count())
    );
    println!("  Document ID: {}", style(&doc.id).cyan());

    Ok(())
}
