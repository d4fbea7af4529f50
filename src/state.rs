use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use eframe::egui::Rect;

use crate::data::chart::{build_chart, default_chart_columns, ChartData, ChartError, ChartKind};
use crate::data::export::export_delimited;
use crate::data::filter::{
    filtered_indices, unique_values, FilterError, FilterKind, FilterOp, FilterSpec,
};
use crate::data::jobs::LoadJobs;
use crate::data::loader::SAMPLE_CSV;
use crate::data::model::{Dataset, LoadReport};
use crate::data::sort::{sort_indices, SortSpec};
use crate::session::IdleGuard;
use crate::settings::{KeyValueStore, Settings};
use crate::toast::Toasts;

// ---------------------------------------------------------------------------
// Workflow steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Upload,
    Filter,
    Visualize,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Upload, Step::Filter, Step::Visualize];

    pub fn label(self) -> &'static str {
        match self {
            Step::Upload => "1 Upload",
            Step::Filter => "2 Filter",
            Step::Visualize => "3 Visualize",
        }
    }
}

/// Filter being composed in the side panel.
#[derive(Debug, Clone)]
pub struct FilterDraft {
    pub column: usize,
    pub kind: FilterKind,
    pub text: String,
    /// Values ticked in the multi-select list; used by `OneOf` instead of `text`.
    pub choices: BTreeSet<String>,
}

impl Default for FilterDraft {
    fn default() -> Self {
        Self {
            column: 0,
            kind: FilterKind::Contains,
            text: String::new(),
            choices: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChartConfig {
    pub kind: ChartKind,
    pub category: usize,
    pub series: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub step: Step,

    /// Loaded dataset (None until a load succeeds).
    pub dataset: Option<Dataset>,
    pub report: Option<LoadReport>,

    /// Active filters, all must pass.
    pub filters: Vec<FilterSpec>,
    pub sort: Option<SortSpec>,

    /// Rows passing the filters, in display order (cached).
    pub visible_rows: Vec<usize>,

    /// Per-column visibility for the table and the export.
    pub column_shown: Vec<bool>,

    pub draft: FilterDraft,
    pub chart: ChartConfig,

    pub settings: Settings,
    store: Box<dyn KeyValueStore>,

    pub jobs: LoadJobs,
    pub toasts: Toasts,
    pub idle: IdleGuard,

    /// Screen rect of the last drawn chart, for PNG snapshots.
    pub chart_rect: Option<Rect>,
    /// Destination of a requested chart snapshot.
    pub pending_snapshot: Option<PathBuf>,

    pub show_settings: bool,
}

impl AppState {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let settings = Settings::load(store.as_ref());
        let idle = IdleGuard::new(settings.idle_timeout_minutes, Instant::now());
        Self {
            step: Step::Upload,
            dataset: None,
            report: None,
            filters: Vec::new(),
            sort: None,
            visible_rows: Vec::new(),
            column_shown: Vec::new(),
            draft: FilterDraft::default(),
            chart: ChartConfig::default(),
            settings,
            store,
            jobs: LoadJobs::default(),
            toasts: Toasts::default(),
            idle,
            chart_rect: None,
            pending_snapshot: None,
            show_settings: false,
        }
    }

    // -- Loading --

    /// Start loading a file in the background; supersedes any running load.
    pub fn open_path(&mut self, path: PathBuf) {
        self.jobs.spawn(path, self.settings.analytics.load);
    }

    /// Collect the result of the latest load, if it finished.
    pub fn poll_jobs(&mut self) {
        let Some(outcome) = self.jobs.poll() else {
            return;
        };
        match outcome.result {
            Ok((dataset, report)) => {
                let mut msg = format!(
                    "Loaded {}: {} rows, {} columns",
                    dataset.source,
                    dataset.len(),
                    dataset.column_count()
                );
                let adjusted = report.rows_padded + report.rows_truncated + report.ragged_rows_dropped;
                if adjusted > 0 {
                    log::warn!("{}: {adjusted} ragged row(s) adjusted ({report:?})", dataset.source);
                    msg.push_str(&format!(" ({adjusted} ragged rows adjusted)"));
                }
                self.toasts.success(msg);
                self.set_dataset(dataset, report);
            }
            Err(e) => {
                self.toasts
                    .error(format!("Could not load {}: {e}", outcome.path.display()));
            }
        }
    }

    /// Ingest a newly loaded dataset, reset filters, sort and chart columns.
    pub fn set_dataset(&mut self, dataset: Dataset, report: LoadReport) {
        self.filters.clear();
        self.sort = None;
        self.draft = FilterDraft::default();
        self.column_shown = vec![true; dataset.column_count()];
        self.chart = match default_chart_columns(&dataset) {
            Some((category, series)) => ChartConfig {
                kind: self.chart.kind,
                category,
                series,
            },
            None => ChartConfig {
                kind: self.chart.kind,
                ..ChartConfig::default()
            },
        };
        self.visible_rows = (0..dataset.len()).collect();
        self.dataset = Some(dataset);
        self.report = Some(report);
        self.step = Step::Filter;
    }

    /// Drop the dataset and everything derived from it.
    pub fn close_dataset(&mut self) {
        self.jobs.cancel();
        self.dataset = None;
        self.report = None;
        self.filters.clear();
        self.sort = None;
        self.visible_rows.clear();
        self.column_shown.clear();
        self.draft = FilterDraft::default();
        self.chart = ChartConfig {
            kind: self.chart.kind,
            ..ChartConfig::default()
        };
        self.chart_rect = None;
        self.step = Step::Upload;
    }

    // -- Filter / sort --

    /// Recompute `visible_rows` from the raw dataset and current specs.
    pub fn refilter(&mut self) {
        let Some(ds) = &self.dataset else {
            self.visible_rows.clear();
            return;
        };
        let mut rows = filtered_indices(ds, &self.filters);
        if let Some(spec) = self.sort {
            sort_indices(ds, &mut rows, spec);
        }
        log::debug!(
            "{} of {} rows visible after {} filter(s)",
            rows.len(),
            ds.len(),
            self.filters.len()
        );
        self.visible_rows = rows;
    }

    /// Turn the draft into a filter. Bad input leaves the draft in place.
    pub fn apply_draft(&mut self) -> Result<(), FilterError> {
        let op = if self.draft.kind == FilterKind::OneOf && !self.draft.choices.is_empty() {
            FilterOp::OneOf(std::mem::take(&mut self.draft.choices))
        } else {
            FilterOp::parse(self.draft.kind, &self.draft.text)?
        };
        self.draft.text.clear();
        self.add_filter(FilterSpec::new(self.draft.column, op));
        Ok(())
    }

    /// Tick every distinct value of the draft column, not only the listed ones.
    pub fn select_all_choices(&mut self) {
        if let Some(ds) = &self.dataset {
            self.draft.choices = unique_values(ds, self.draft.column);
        }
    }

    pub fn add_filter(&mut self, spec: FilterSpec) {
        self.filters.push(spec);
        self.refilter();
    }

    pub fn remove_filter(&mut self, index: usize) {
        if index < self.filters.len() {
            self.filters.remove(index);
            self.refilter();
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.draft.text.clear();
        self.draft.choices.clear();
        self.refilter();
    }

    /// Header click: sort by column, toggling direction on repeat clicks.
    pub fn click_sort(&mut self, column: usize) {
        self.sort = Some(SortSpec::clicked(self.sort, column));
        self.refilter();
    }

    pub fn visible_columns(&self) -> Vec<usize> {
        self.column_shown
            .iter()
            .enumerate()
            .filter_map(|(i, shown)| shown.then_some(i))
            .collect()
    }

    // -- Export / chart --

    /// Write the visible columns of the visible rows to `path`.
    pub fn export_to(&self, path: &Path) -> Result<usize> {
        let ds = self.dataset.as_ref().context("no dataset loaded")?;
        let bytes = export_delimited(
            ds,
            &self.visible_columns(),
            &self.visible_rows,
            &self.settings.analytics.export,
        )?;
        std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
        log::info!(
            "Exported {} rows to {}",
            self.visible_rows.len(),
            path.display()
        );
        Ok(self.visible_rows.len())
    }

    pub fn write_sample(&self, path: &Path) -> Result<()> {
        std::fs::write(path, SAMPLE_CSV).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Sample template written to {}", path.display());
        Ok(())
    }

    pub fn chart_data(&self) -> Option<Result<ChartData, ChartError>> {
        let ds = self.dataset.as_ref()?;
        Some(build_chart(
            ds,
            &self.visible_rows,
            self.chart.category,
            &self.chart.series,
        ))
    }

    pub fn toggle_series(&mut self, column: usize) {
        if let Some(pos) = self.chart.series.iter().position(|&c| c == column) {
            self.chart.series.remove(pos);
        } else {
            self.chart.series.push(column);
            self.chart.series.sort_unstable();
        }
    }

    // -- Settings / session --

    /// Replace settings and persist them; failures become toasts.
    pub fn apply_settings(&mut self, settings: Settings) {
        if settings == self.settings {
            return;
        }
        if settings.idle_timeout_minutes != self.settings.idle_timeout_minutes {
            self.idle
                .set_timeout(settings.idle_timeout_minutes, Instant::now());
        }
        self.settings = settings;
        if let Err(e) = self.settings.save(self.store.as_mut()) {
            self.toasts.error(format!("Could not save settings: {e:#}"));
        }
    }

    /// Input seen this frame; returns true when the idle timeout fired.
    pub fn tick_idle(&mut self, had_input: bool, now: Instant) -> bool {
        if had_input {
            self.idle.touch(now);
            return false;
        }
        if !self.idle.check(now) {
            return false;
        }
        if self.dataset.is_some() || self.jobs.is_loading() {
            log::info!(
                "Idle for {} minute(s), clearing workspace",
                self.settings.idle_timeout_minutes
            );
            self.close_dataset();
            self.toasts.info(format!(
                "Workspace cleared after {} minute(s) of inactivity",
                self.settings.idle_timeout_minutes
            ));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;
    use crate::data::sort::SortDirection;
    use crate::settings::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn state_with_fleet() -> AppState {
        let mut state = AppState::new(Box::new(MemoryStore::default()));
        let rows = [("EX-01", 120.0, "ok"), ("DT-07", 95.5, "fault"), ("EX-02", 310.0, "ok")];
        let ds = Dataset {
            source: "fleet.csv".into(),
            headers: vec!["unit".into(), "hours".into(), "status".into()],
            rows: rows
                .iter()
                .map(|(u, h, s)| {
                    vec![
                        CellValue::Text((*u).into()),
                        CellValue::Number(*h),
                        CellValue::Text((*s).into()),
                    ]
                })
                .collect(),
        };
        state.set_dataset(ds, LoadReport::default());
        state
    }

    #[test]
    fn new_dataset_resets_view_and_picks_chart_columns() {
        let state = state_with_fleet();
        assert_eq!(state.step, Step::Filter);
        assert_eq!(state.visible_rows, vec![0, 1, 2]);
        assert_eq!(state.visible_columns(), vec![0, 1, 2]);
        assert_eq!(state.chart.category, 0);
        assert_eq!(state.chart.series, vec![1]);
    }

    #[test]
    fn filters_and_sort_compose() {
        let mut state = state_with_fleet();
        state.draft = FilterDraft {
            column: 2,
            kind: FilterKind::Equals,
            text: "OK".into(),
            ..FilterDraft::default()
        };
        state.apply_draft().unwrap();
        assert!(state.draft.text.is_empty());
        assert_eq!(state.visible_rows, vec![0, 2]);

        state.click_sort(1);
        state.click_sort(1);
        assert_eq!(state.sort.map(|s| s.direction), Some(SortDirection::Descending));
        assert_eq!(state.visible_rows, vec![2, 0]);

        state.remove_filter(0);
        assert_eq!(state.visible_rows, vec![2, 0, 1]);
    }

    #[test]
    fn bad_draft_is_kept() {
        let mut state = state_with_fleet();
        state.draft = FilterDraft {
            column: 1,
            kind: FilterKind::GreaterThan,
            text: "lots".into(),
            ..FilterDraft::default()
        };
        assert!(state.apply_draft().is_err());
        assert_eq!(state.draft.text, "lots");
        assert!(state.filters.is_empty());
    }

    #[test]
    fn one_of_draft_uses_ticked_choices() {
        let mut state = state_with_fleet();
        state.draft.column = 0;
        state.draft.kind = FilterKind::OneOf;
        state.draft.choices = ["DT-07".to_string(), "EX-02".to_string()].into();
        state.apply_draft().unwrap();
        assert!(state.draft.choices.is_empty());
        assert_eq!(state.visible_rows, vec![1, 2]);
    }

    #[test]
    fn select_all_ticks_every_distinct_value() {
        let mut state = AppState::new(Box::new(MemoryStore::default()));
        let ds = Dataset {
            source: "serials.csv".into(),
            headers: vec!["serial".into()],
            rows: (0..450)
                .map(|i| vec![CellValue::Text(format!("SN-{i:04}"))])
                .collect(),
        };
        state.set_dataset(ds, LoadReport::default());
        state.draft.kind = FilterKind::OneOf;
        state.select_all_choices();
        assert_eq!(state.draft.choices.len(), 450);

        state.apply_draft().unwrap();
        assert_eq!(state.visible_rows.len(), 450);
    }

    #[test]
    fn sample_template_reloads() {
        let state = AppState::new(Box::new(MemoryStore::default()));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        state.write_sample(&path).unwrap();
        let progress = std::sync::atomic::AtomicU8::new(0);
        let (ds, _) = crate::data::loader::load_file(&path, &Default::default(), &progress).unwrap();
        assert_eq!(ds.headers[1], "equipment");
        assert_eq!(ds.len(), 5);
    }

    #[test]
    fn export_writes_visible_columns_only() {
        let mut state = state_with_fleet();
        state.column_shown[1] = false;
        state.add_filter(FilterSpec::new(0, FilterOp::Contains("ex".into())));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert_eq!(state.export_to(&path).unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "unit,status\nEX-01,ok\nEX-02,ok\n"
        );
    }

    #[test]
    fn idle_timeout_clears_workspace() {
        let mut state = state_with_fleet();
        let mut settings = state.settings.clone();
        settings.idle_timeout_minutes = 1;
        state.apply_settings(settings);

        let start = Instant::now();
        state.tick_idle(true, start);
        assert!(!state.tick_idle(false, start + Duration::from_secs(30)));
        assert!(state.dataset.is_some());

        assert!(state.tick_idle(false, start + Duration::from_secs(61)));
        assert!(state.dataset.is_none());
        assert_eq!(state.step, Step::Upload);
        assert!(!state.toasts.is_empty());
    }

    #[test]
    fn settings_changes_are_persisted() {
        let mut state = AppState::new(Box::new(MemoryStore::default()));
        let mut settings = state.settings.clone();
        settings.language = "kk".into();
        state.apply_settings(settings.clone());
        assert_eq!(Settings::load(state.store.as_ref()), settings);
    }

    #[test]
    fn series_toggle() {
        let mut state = state_with_fleet();
        state.toggle_series(2);
        assert_eq!(state.chart.series, vec![1, 2]);
        state.toggle_series(1);
        assert_eq!(state.chart.series, vec![2]);
        let chart = state.chart_data().unwrap().unwrap();
        assert_eq!(chart.series[0].name, "status");
    }
}
