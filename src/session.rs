//! One editing session over a dataset file.
//!
//! A [`Session`] owns the [`DatasetStore`] together with the session-scoped
//! state derived from user actions: the current [`FilterSpec`], its
//! [`VisibleSet`], the [`SelectionSet`] and the [`RowEditor`]'s staged edits.
//! The presentation layer (HTTP API or CLI) calls one handler per user
//! action; each handler leaves the state consistent before returning:
//!
//! - selection ⊆ visible set;
//! - staged edits exist only for selected rows. Rows that leave the
//!   selection, by deselection or by a filter change, have their staged
//!   edits discarded without touching the table.
//!
//! Handlers take `&mut self`, so one action is processed at a time.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::DatasetConfig;
use crate::editor::RowEditor;
use crate::error::{EditorError, Result};
use crate::filter::{self, FilterSpec, VisibleSet};
use crate::improve::{ImproveRequest, Improver};
use crate::models::{RowId, RowRef};
use crate::selection::{self, SelectionSet};
use crate::store::DatasetStore;

pub struct Session {
    config: DatasetConfig,
    store: DatasetStore,
    filter: FilterSpec,
    visible: VisibleSet,
    selection: SelectionSet,
    editor: RowEditor,
}

/// What a filter or selection change did to the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionUpdate {
    /// Reported positions that were not in the visible set.
    pub stale_positions: Vec<usize>,
    /// Rows that left the selection.
    pub deselected: Vec<RowId>,
    /// Rows whose staged edits were discarded as a consequence.
    pub discarded_edits: Vec<RowId>,
}

/// Outcome of [`Session::apply_selected`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Applied {
    pub committed: Vec<RowId>,
    /// Rows the filter stopped admitting because of the committed values.
    #[serde(flatten)]
    pub update: SelectionUpdate,
}

/// A visible row as the presentation layer renders it.
#[derive(Debug, Clone, Copy)]
pub struct VisibleRow<'a> {
    pub position: usize,
    pub row: RowRef<'a>,
    pub selected: bool,
    pub pending: Option<&'a BTreeMap<String, String>>,
}

impl Session {
    /// Load `config.path` and start with every row visible and nothing
    /// selected.
    pub fn open(config: &DatasetConfig) -> Result<Self> {
        let store = DatasetStore::load(&config.path)?;
        Self::new(config.clone(), store)
    }

    pub fn new(config: DatasetConfig, store: DatasetStore) -> Result<Self> {
        let filter = FilterSpec::all_values(store.table(), &config.categorical_columns)?;
        let visible = filter::apply(store.table(), &filter, &config.keyword_column);
        Ok(Self {
            config,
            store,
            filter,
            visible,
            selection: SelectionSet::default(),
            editor: RowEditor::new(),
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn visible(&self) -> &VisibleSet {
        &self.visible
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn editor(&self) -> &RowEditor {
        &self.editor
    }

    /// Distinct values of each categorical column, for filter controls.
    pub fn facets(&self) -> Result<BTreeMap<String, BTreeSet<String>>> {
        self.config
            .categorical_columns
            .iter()
            .map(|c| Ok((c.clone(), self.store.column_values(c)?)))
            .collect()
    }

    /// Replace the filter, recompute the visible set and drop selected rows
    /// that are no longer visible.
    pub fn set_filter(&mut self, spec: FilterSpec) -> Result<SelectionUpdate> {
        spec.validate(self.store.table(), &self.config.keyword_column)?;
        self.filter = spec;
        let update = self.refresh_visible();
        log::info!(
            "filter applied: {} of {} rows visible, {} deselected",
            self.visible.len(),
            self.store.len(),
            update.deselected.len()
        );
        Ok(update)
    }

    /// Re-run the current filter over the table and drop selected rows it
    /// no longer admits.
    fn refresh_visible(&mut self) -> SelectionUpdate {
        self.visible = filter::apply(
            self.store.table(),
            &self.filter,
            &self.config.keyword_column,
        );
        let deselected = self.selection.retain_visible(&self.visible);
        let discarded_edits = self.discard_unselected_edits();
        SelectionUpdate {
            stale_positions: Vec::new(),
            deselected,
            discarded_edits,
        }
    }

    /// Replace the selection with the rows at `positions` of the visible set.
    pub fn select(&mut self, positions: &[usize]) -> SelectionUpdate {
        let resolution = selection::resolve(&self.visible, positions);
        let deselected: Vec<RowId> = self
            .selection
            .ids()
            .filter(|id| !resolution.selection.contains(*id))
            .collect();
        self.selection = resolution.selection;
        let discarded_edits = self.discard_unselected_edits();

        SelectionUpdate {
            stale_positions: resolution.stale,
            deselected,
            discarded_edits,
        }
    }

    /// Select the visible row whose key column equals `key`.
    pub fn select_key(&mut self, key: &str) -> Result<RowId> {
        let id = self.store.find_by_key(&self.config.key_column, key)?;
        let position = self.visible.position_of(id).ok_or_else(|| {
            EditorError::NotFound(format!("row {} is hidden by the current filter", id))
        })?;
        let mut positions = self.selection.positions(&self.visible);
        positions.push(position);
        self.select(&positions);
        Ok(id)
    }

    fn discard_unselected_edits(&mut self) -> Vec<RowId> {
        let selection = &self.selection;
        let discarded = self.editor.discard_where(|id| !selection.contains(id));
        if !discarded.is_empty() {
            log::info!("discarded staged edits for rows {:?}", discarded);
        }
        discarded
    }

    fn ensure_selected(&self, id: RowId) -> Result<()> {
        self.store.get(id)?;
        if !self.selection.contains(id) {
            return Err(EditorError::NotFound(format!("row {} is not selected", id)));
        }
        Ok(())
    }

    /// Stage `value` for `field` (default: the configured edit field) of a
    /// selected row.
    pub fn stage_edit(&mut self, id: RowId, field: Option<&str>, value: &str) -> Result<()> {
        self.ensure_selected(id)?;
        let field = field.unwrap_or(self.config.edit_field.as_str());
        self.store.check_field(id, field)?;
        self.editor.stage(id, field, value);
        Ok(())
    }

    pub fn discard_edit(&mut self, id: RowId) -> Result<()> {
        self.store.get(id)?;
        if !self.editor.discard(id) {
            return Err(EditorError::NotFound(format!(
                "no staged edit for row {}",
                id
            )));
        }
        Ok(())
    }

    /// Staged value of `field` if any, else the table value.
    pub fn current_value(&self, id: RowId, field: &str) -> Result<&str> {
        if let Some(v) = self.editor.pending_value(id, field) {
            return Ok(v);
        }
        let row = self.store.get(id)?;
        row.get(field)
            .ok_or_else(|| EditorError::InvalidField(field.to_string()))
    }

    /// Ask `improver` for a better edit-field value for a selected row and
    /// stage the answer. The request carries the staged text when there is
    /// one. On failure nothing changes.
    pub async fn improve_row(&mut self, id: RowId, improver: &dyn Improver) -> Result<String> {
        self.ensure_selected(id)?;
        let request = {
            let row = self.store.get(id)?;
            ImproveRequest {
                question: self.current_value(id, &self.config.edit_field)?.to_string(),
                context: row.get_or_empty("context").to_string(),
                chunk_id: row.get_or_empty("chunk_id").to_string(),
            }
        };

        let improvement = improver.improve(&request).await?;
        log::info!("row {} improved by {}", id, improver.name());
        self.editor
            .stage(id, self.config.edit_field.clone(), improvement.question.clone());
        Ok(improvement.question)
    }

    /// Commit the staged edits of every selected row, then re-filter: a
    /// committed edit to the keyword or a categorical column can move the
    /// row out of the visible set.
    pub fn apply_selected(&mut self) -> Result<Applied> {
        let ids: Vec<RowId> = self
            .selection
            .ids()
            .filter(|id| self.editor.is_staged(*id))
            .collect();
        let result = self.editor.commit_all(&mut self.store, &ids);

        let update = self.refresh_visible();
        if !update.deselected.is_empty() {
            log::info!(
                "rows {:?} no longer pass the filter after commit",
                update.deselected
            );
        }

        let committed = result.map_err(EditorError::Commit)?;
        Ok(Applied { committed, update })
    }

    /// Write the table to its file. Staged edits that were not applied are
    /// not saved; their count is returned.
    pub fn save(&self) -> Result<usize> {
        self.store.save()?;
        let unapplied = self.editor.len();
        if unapplied > 0 {
            log::warn!("{} staged edit(s) were not applied before save", unapplied);
        }
        Ok(unapplied)
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = VisibleRow<'_>> + '_ {
        self.visible
            .ids()
            .iter()
            .enumerate()
            .filter_map(move |(position, id)| {
                let row = self.store.table().row(*id)?;
                Some(VisibleRow {
                    position,
                    row,
                    selected: self.selection.contains(*id),
                    pending: self.editor.pending(*id),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::improve::Improvement;
    use crate::models::fixtures;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn session() -> Session {
        let table = fixtures::table(&[
            ("squad", "A", "Apple", "q-a"),
            ("squad", "B", "grape", "q-b"),
            ("trivia", "C", "lemon", "q-c"),
        ]);
        let cfg = Config::for_dataset("unused.csv").dataset;
        Session::new(cfg, DatasetStore::from_table("unused.csv", table)).unwrap()
    }

    fn question(s: &Session, id: usize) -> String {
        s.store()
            .get(RowId(id))
            .unwrap()
            .get_or_empty("question")
            .to_string()
    }

    struct StubImprover {
        reply: std::result::Result<&'static str, &'static str>,
        seen: Mutex<Vec<ImproveRequest>>,
    }

    impl StubImprover {
        fn ok(text: &'static str) -> Self {
            Self {
                reply: Ok(text),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(msg: &'static str) -> Self {
            Self {
                reply: Err(msg),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Improver for StubImprover {
        fn name(&self) -> &str {
            "stub"
        }

        async fn improve(&self, request: &ImproveRequest) -> Result<Improvement> {
            self.seen.lock().unwrap().push(request.clone());
            match self.reply {
                Ok(q) => Ok(Improvement {
                    question: q.to_string(),
                }),
                Err(m) => Err(EditorError::Service(m.to_string())),
            }
        }
    }

    #[test]
    fn test_new_session_shows_whole_table() {
        let s = session();
        assert_eq!(s.visible().len(), 3);
        assert!(s.selection().is_empty());
        let facets = s.facets().unwrap();
        assert_eq!(facets["dataset_name"].len(), 2);
    }

    #[test]
    fn test_filter_change_drops_selection_and_edits() {
        let mut s = session();
        s.select(&[0, 2]);
        s.stage_edit(RowId(2), None, "lemon question").unwrap();

        let update = s
            .set_filter(FilterSpec::default().with_keyword("ap"))
            .unwrap();
        assert_eq!(update.deselected, vec![RowId(2)]);
        assert_eq!(update.discarded_edits, vec![RowId(2)]);
        assert!(s.selection().is_subset_of(s.visible()));
        assert_eq!(question(&s, 2), "q-c");
    }

    #[test]
    fn test_stage_requires_selection() {
        let mut s = session();
        let err = s.stage_edit(RowId(1), None, "x").unwrap_err();
        assert!(err.to_string().contains("not selected"));

        s.select(&[1]);
        assert!(matches!(
            s.stage_edit(RowId(1), Some("nope"), "x"),
            Err(EditorError::InvalidField(_))
        ));
    }

    #[test]
    fn test_apply_selected_and_save_flow() {
        let mut s = session();
        s.select(&[0, 1]);
        s.stage_edit(RowId(0), None, "new a").unwrap();
        assert_eq!(s.current_value(RowId(0), "question").unwrap(), "new a");
        assert_eq!(question(&s, 0), "q-a");

        let applied = s.apply_selected().unwrap();
        assert_eq!(applied.committed, vec![RowId(0)]);
        assert!(applied.update.deselected.is_empty());
        assert_eq!(question(&s, 0), "new a");
        assert!(s.editor().is_empty());
    }

    #[test]
    fn test_select_key() {
        let mut s = session();
        s.select(&[0]);
        assert_eq!(s.select_key("C").unwrap(), RowId(2));
        assert!(s.selection().contains(RowId(0)));
        assert!(s.selection().contains(RowId(2)));

        s.set_filter(FilterSpec::default().with_keyword("lem"))
            .unwrap();
        assert!(s.select_key("A").is_err());
    }

    #[tokio::test]
    async fn test_improve_stages_suggestion_then_commit_writes_it() {
        let mut s = session();
        s.select(&[1]);
        let stub = StubImprover::ok("What is X?");

        let text = s.improve_row(RowId(1), &stub).await.unwrap();
        assert_eq!(text, "What is X?");
        assert_eq!(
            s.editor().pending_value(RowId(1), "question"),
            Some("What is X?")
        );
        assert_eq!(question(&s, 1), "q-b");

        s.apply_selected().unwrap();
        assert_eq!(question(&s, 1), "What is X?");

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0].chunk_id, "B");
        assert_eq!(seen[0].context, "context for B");
    }

    #[tokio::test]
    async fn test_improve_failure_changes_nothing() {
        let mut s = session();
        s.select(&[0]);
        s.stage_edit(RowId(0), None, "draft").unwrap();
        let stub = StubImprover::failing("malformed response");

        let err = s.improve_row(RowId(0), &stub).await.unwrap_err();
        assert!(matches!(err, EditorError::Service(_)));
        assert_eq!(s.editor().pending_value(RowId(0), "question"), Some("draft"));
        assert_eq!(question(&s, 0), "q-a");
        // The staged draft is what was sent.
        assert_eq!(stub.seen.lock().unwrap()[0].question, "draft");
    }

    #[test]
    fn test_commit_refilters_visible_rows() {
        let mut s = session();
        s.set_filter(FilterSpec::default().with_keyword("ap"))
            .unwrap();
        s.select(&[0, 1]);
        s.stage_edit(RowId(0), Some("chunk_keyword"), "lemon")
            .unwrap();
        s.stage_edit(RowId(1), None, "grape question").unwrap();

        let applied = s.apply_selected().unwrap();
        assert_eq!(applied.committed, vec![RowId(0), RowId(1)]);
        assert_eq!(applied.update.deselected, vec![RowId(0)]);

        let expected = filter::apply(s.store().table(), s.filter(), "chunk_keyword");
        assert_eq!(s.visible(), &expected);
        assert_eq!(s.visible().ids(), &[RowId(1)]);
        assert!(s.selection().is_subset_of(s.visible()));
        assert!(s.selection().contains(RowId(1)));
    }

    #[test]
    fn test_commit_of_new_category_value_hides_row() {
        let mut s = session();
        s.select(&[2]);
        s.stage_edit(RowId(2), Some("dataset_name"), "hotpot")
            .unwrap();

        let applied = s.apply_selected().unwrap();
        assert_eq!(applied.update.deselected, vec![RowId(2)]);
        assert_eq!(s.visible().len(), 2);
        assert!(s.selection().is_empty());
        assert_eq!(
            s.store().get(RowId(2)).unwrap().get("dataset_name"),
            Some("hotpot")
        );
    }

    #[tokio::test]
    async fn test_improve_sends_chunk_id_whatever_the_key_column() {
        let mut s = session();
        s.config.key_column = "dataset_name".to_string();
        s.select(&[1]);
        let stub = StubImprover::ok("What is X?");

        s.improve_row(RowId(1), &stub).await.unwrap();
        assert_eq!(stub.seen.lock().unwrap()[0].chunk_id, "B");
    }

    #[test]
    fn test_visible_rows_reflect_state() {
        let mut s = session();
        s.select(&[2]);
        s.stage_edit(RowId(2), None, "edited").unwrap();

        let rows: Vec<VisibleRow<'_>> = s.visible_rows().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[2].selected && !rows[0].selected);
        assert_eq!(rows[2].pending.unwrap()["question"], "edited");
    }
}
