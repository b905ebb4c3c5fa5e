//! Initialize command.

use console::style;

use crate::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    if settings.database_url.is_none() {
        settings.ensure_directories()?;
    }

    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    if settings.llm.credential().is_none() {
        println!(
            "{} No {} API key configured",
            style("!").yellow(),
            settings.llm.provider.as_str()
        );
        println!("  Set LLM_API_KEY (or OPENROUTER_API_KEY / GEMINI_API_KEY) before analyzing");
    }

    println!(
        "{} Initialized earnings relay database at {}",
        style("✓").green(),
        settings.database_url()
    );

    Ok(())
}
