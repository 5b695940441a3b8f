//! `curate view` and `curate facets`: read-only browsing from the terminal.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::filter::FilterSpec;
use crate::session::Session;

/// Build a filter from `column=value` pairs and a keyword.
///
/// Pairs naming the same column are OR-ed; different columns are AND-ed.
/// Categorical columns not named keep every value.
pub fn build_filter(
    session: &Session,
    pairs: &[(String, String)],
    keyword: Option<&str>,
) -> FilterSpec {
    let mut spec = session.filter().clone();
    let mut named: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (column, value) in pairs {
        named
            .entry(column.clone())
            .or_default()
            .insert(value.clone());
    }
    spec.categories.extend(named);
    spec.keyword = keyword.unwrap_or_default().to_string();
    spec
}

pub fn run_view(
    config: &Config,
    pairs: &[(String, String)],
    keyword: Option<&str>,
    columns: Option<Vec<String>>,
    width: usize,
) -> Result<()> {
    let mut session = Session::open(&config.dataset)?;
    let spec = build_filter(&session, pairs, keyword);
    session.set_filter(spec)?;

    let columns = columns.unwrap_or_else(|| {
        vec![
            config.dataset.key_column.clone(),
            config.dataset.keyword_column.clone(),
            config.dataset.edit_field.clone(),
        ]
    });
    for c in &columns {
        if session.store().table().column_index(c).is_none() {
            anyhow::bail!("unknown column: {}", c);
        }
    }

    if session.visible().is_empty() {
        println!("No rows.");
        return Ok(());
    }

    let mut header = format!("{:>5}  {:>5}", "POS", "ROW");
    for c in &columns {
        header.push_str(&format!("  {:<w$}", clip(c, width), w = width));
    }
    println!("{}", header.trim_end());

    for r in session.visible_rows() {
        let mut line = format!("{:>5}  {:>5}", r.position, r.row.id);
        for c in &columns {
            let value = r.row.get_or_empty(c);
            line.push_str(&format!("  {:<w$}", clip(value, width), w = width));
        }
        println!("{}", line.trim_end());
    }

    println!();
    println!(
        "{} of {} rows",
        session.visible().len(),
        session.store().len()
    );
    Ok(())
}

pub fn run_facets(config: &Config) -> Result<()> {
    let session = Session::open(&config.dataset)?;
    for (column, values) in session.facets()? {
        println!("{} ({})", column, values.len());
        for v in values {
            if v.is_empty() {
                println!("  (empty)");
            } else {
                println!("  {}", v);
            }
        }
    }
    Ok(())
}

/// First `width` characters of `s` on one line, with an ellipsis when cut.
fn clip(s: &str, width: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= width {
        return flat;
    }
    let mut out: String = flat.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use crate::store::DatasetStore;

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("a longer value", 6), "a lon…");
        assert_eq!(clip("two\nlines", 20), "two lines");
    }

    #[test]
    fn test_build_filter_unions_same_column() {
        let table = fixtures::table(&[
            ("squad", "A", "Apple", "q"),
            ("trivia", "B", "grape", "q"),
            ("nq", "C", "lemon", "q"),
        ]);
        let cfg = Config::for_dataset("unused.csv").dataset;
        let session = Session::new(cfg, DatasetStore::from_table("unused.csv", table)).unwrap();

        let pairs = vec![
            ("dataset_name".to_string(), "squad".to_string()),
            ("dataset_name".to_string(), "nq".to_string()),
        ];
        let spec = build_filter(&session, &pairs, Some("e"));
        assert_eq!(spec.categories["dataset_name"].len(), 2);
        assert_eq!(spec.categories["document_name"].len(), 3);
        assert_eq!(spec.keyword, "e");
    }
}
