//! `curate edit` and `curate improve`: single-row edits from the terminal.
//!
//! Both run the same session workflow as the HTTP API (select, stage,
//! apply, save) against one row addressed by its key column.

use anyhow::Result;

use crate::config::Config;
use crate::improve::create_improver;
use crate::session::Session;

/// Stage `value` for `field` of the row keyed `key`, apply it and save.
pub fn run_edit(config: &Config, key: &str, field: Option<&str>, value: &str) -> Result<()> {
    let mut session = Session::open(&config.dataset)?;
    let id = session.select_key(key)?;
    let field = field.unwrap_or(config.dataset.edit_field.as_str());

    let before = session.current_value(id, field)?.to_string();
    session.stage_edit(id, Some(field), value)?;
    session.apply_selected()?;
    session.save()?;

    println!("row {} ({} = {})", id, config.dataset.key_column, key);
    println!("  {} before: {}", field, before);
    println!("  {} after:  {}", field, value);
    println!("Dataset saved to {}", session.store().path().display());
    Ok(())
}

/// Print the improvement service's suggestion for the row keyed `key`;
/// with `apply`, also write it to the dataset.
pub async fn run_improve(config: &Config, key: &str, apply: bool) -> Result<()> {
    let improver = create_improver(&config.improver)?;
    let mut session = Session::open(&config.dataset)?;
    let id = session.select_key(key)?;
    let field = config.dataset.edit_field.clone();

    let before = session.current_value(id, &field)?.to_string();
    let improved = session.improve_row(id, improver.as_ref()).await?;

    println!("row {} ({} = {})", id, config.dataset.key_column, key);
    println!("  current:   {}", before);
    println!("  suggested: {}", improved);

    if apply {
        session.apply_selected()?;
        session.save()?;
        println!("Row {} updated and saved to {}", id, session.store().path().display());
    } else {
        println!("(not applied; rerun with --apply to save)");
    }
    Ok(())
}
