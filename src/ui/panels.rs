use std::path::Path;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::chart::ChartKind;
use crate::data::export::{export_file_name, QuoteStyle};
use crate::data::filter::{unique_values, FilterKind};
use crate::data::loader::SUPPORTED_EXTENSIONS;
use crate::data::model::RaggedRows;
use crate::settings::{FontFamily, Theme};
use crate::state::{AppState, Step};
use crate::toast::ToastKind;

/// Cap on the tick list of the multi-select editor.
const MAX_CHOICES: usize = 200;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let has_data = state.dataset.is_some();
            if ui.add_enabled(has_data, egui::Button::new("Export CSV…")).clicked() {
                export_dialog(state);
                ui.close_menu();
            }
            let can_snapshot = state.step == Step::Visualize && state.chart_rect.is_some();
            if ui
                .add_enabled(can_snapshot, egui::Button::new("Save chart as PNG…"))
                .clicked()
            {
                snapshot_dialog(ui.ctx(), state);
                ui.close_menu();
            }
            if ui.add_enabled(has_data, egui::Button::new("Close")).clicked() {
                state.close_dataset();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Settings…").clicked() {
                state.show_settings = true;
                ui.close_menu();
            }
        });

        ui.separator();

        for step in Step::ALL {
            let enabled = step == Step::Upload || state.dataset.is_some();
            let label = ui.add_enabled(
                enabled,
                egui::SelectableLabel::new(state.step == step, step.label()),
            );
            if label.clicked() {
                state.step = step;
            }
        }

        ui.separator();

        if let Some(ds) = &state.dataset {
            let summary = ui.label(format!(
                "{}: {} rows loaded, {} visible",
                ds.source,
                ds.len(),
                state.visible_rows.len()
            ));
            if let Some(r) = &state.report {
                summary.on_hover_text(format!(
                    "{} rows read, {} blank skipped, {} padded, {} truncated, {} dropped",
                    r.rows_read,
                    r.empty_rows_skipped,
                    r.rows_padded,
                    r.rows_truncated,
                    r.ragged_rows_dropped
                ));
            }
        }

        if state.jobs.is_loading() {
            ui.separator();
            ui.add(
                egui::ProgressBar::new(f32::from(state.jobs.progress()) / 100.0)
                    .desired_width(120.0)
                    .show_percentage(),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Upload step
// ---------------------------------------------------------------------------

pub fn upload_page(ui: &mut Ui, state: &mut AppState) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.add_space(60.0);
        ui.heading("Upload data for analysis");
        ui.add_space(8.0);
        ui.label("CSV, TSV, Excel (XLSX/XLS/ODS), PDF or Parquet. Drop a file anywhere in the window.");
        ui.add_space(16.0);

        if state.jobs.is_loading() {
            ui.add(
                egui::ProgressBar::new(f32::from(state.jobs.progress()) / 100.0)
                    .desired_width(320.0)
                    .show_percentage(),
            );
            if ui.button("Cancel").clicked() {
                state.jobs.cancel();
            }
        } else if ui
            .add(egui::Button::new(RichText::new("Choose file…").size(18.0)))
            .clicked()
        {
            open_file_dialog(state);
        }

        ui.add_space(8.0);
        if ui.link("Download a sample CSV template").clicked() {
            sample_dialog(state);
        }

        ui.add_space(24.0);
        ui.label(RichText::new("How it works").strong());
        ui.label("1. Upload a CSV/XLSX or PDF file");
        ui.label("2. Set up the filters you need");
        ui.label("3. Look at the chart and export");
    });
}

// ---------------------------------------------------------------------------
// Left side panel – filters / chart options
// ---------------------------------------------------------------------------

pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    let Some(ds) = &state.dataset else {
        ui.label("No dataset loaded.");
        return;
    };
    // Clone what we need so we can mutate state inside the widgets.
    let headers = ds.headers.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| match state.step {
            Step::Upload => {}
            Step::Filter => filter_editor(ui, state, &headers),
            Step::Visualize => chart_options(ui, state, &headers),
        });
}

fn column_combo(ui: &mut Ui, id: &str, headers: &[String], selected: &mut usize) {
    let current = headers.get(*selected).cloned().unwrap_or_default();
    egui::ComboBox::from_id_salt(id)
        .selected_text(current)
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for (i, h) in headers.iter().enumerate() {
                ui.selectable_value(selected, i, h);
            }
        });
}

fn filter_editor(ui: &mut Ui, state: &mut AppState, headers: &[String]) {
    ui.heading("Filters");
    ui.separator();

    ui.label("Column");
    let before = state.draft.column;
    column_combo(ui, "filter_column", headers, &mut state.draft.column);
    if state.draft.column != before {
        state.draft.choices.clear();
    }

    ui.label("Operator");
    egui::ComboBox::from_id_salt("filter_kind")
        .selected_text(state.draft.kind.label())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in FilterKind::ALL {
                ui.selectable_value(&mut state.draft.kind, kind, kind.label());
            }
        });

    if state.draft.kind == FilterKind::OneOf {
        one_of_choices(ui, state);
    } else {
        let hint = match state.draft.kind {
            FilterKind::DateRange => "2024-01-01..2024-03-31",
            FilterKind::GreaterThan | FilterKind::LessThan => "number",
            _ => "text",
        };
        let edit = ui.add(egui::TextEdit::singleline(&mut state.draft.text).hint_text(hint));
        if edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            apply_draft(state);
        }
    }

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Apply").clicked() {
            apply_draft(state);
        }
        if ui.button("Reset").clicked() {
            state.clear_filters();
        }
    });

    if !state.filters.is_empty() {
        ui.separator();
        ui.strong("Active filters");
        let mut remove = None;
        for (i, f) in state.filters.iter().enumerate() {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("✖").clicked() {
                    remove = Some(i);
                }
                let name = headers.get(f.column).map(String::as_str).unwrap_or("?");
                ui.label(format!("{name} {}", f.op));
            });
        }
        if let Some(i) = remove {
            state.remove_filter(i);
        }
    }

    if let Some(spec) = state.sort {
        ui.separator();
        ui.horizontal(|ui: &mut Ui| {
            let name = headers.get(spec.column).map(String::as_str).unwrap_or("?");
            ui.label(format!("Sorted by {name} {}", spec.direction.arrow()));
            if ui.small_button("Clear").clicked() {
                state.sort = None;
                state.refilter();
            }
        });
    }

    ui.separator();
    egui::CollapsingHeader::new(RichText::new("Columns").strong())
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            for (i, h) in headers.iter().enumerate() {
                if let Some(shown) = state.column_shown.get_mut(i) {
                    ui.checkbox(shown, h);
                }
            }
        });

    ui.separator();
    if ui.button("Visualize →").clicked() {
        state.step = Step::Visualize;
    }
}

fn one_of_choices(ui: &mut Ui, state: &mut AppState) {
    let Some(ds) = &state.dataset else {
        return;
    };
    let values = unique_values(ds, state.draft.column);
    let total = values.len();

    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!("{} / {total} selected", state.draft.choices.len()));
        if ui
            .small_button("All")
            .on_hover_text("Select every value, including those not listed")
            .clicked()
        {
            state.select_all_choices();
        }
        if ui.small_button("None").clicked() {
            state.draft.choices.clear();
        }
    });
    let choices = &mut state.draft.choices;
    ScrollArea::vertical()
        .id_salt("one_of_values")
        .max_height(200.0)
        .show(ui, |ui: &mut Ui| {
            for value in values.iter().take(MAX_CHOICES) {
                let mut checked = choices.contains(value);
                let label = if value.is_empty() { "(empty)" } else { value.as_str() };
                if ui.checkbox(&mut checked, label).changed() {
                    if checked {
                        choices.insert(value.clone());
                    } else {
                        choices.remove(value);
                    }
                }
            }
            if total > MAX_CHOICES {
                ui.weak(format!("{} more not shown", total - MAX_CHOICES));
            }
        });
}

fn apply_draft(state: &mut AppState) {
    if let Err(e) = state.apply_draft() {
        state.toasts.error(format!("Filter not applied: {e}"));
    }
}

fn chart_options(ui: &mut Ui, state: &mut AppState, headers: &[String]) {
    ui.heading("Chart");
    ui.separator();

    ui.label("Type");
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for kind in ChartKind::ALL {
            ui.selectable_value(&mut state.chart.kind, kind, kind.label());
        }
    });

    ui.label("Category axis");
    column_combo(ui, "chart_category", headers, &mut state.chart.category);

    ui.label("Series");
    if state.chart.kind == ChartKind::Pie {
        ui.weak("The pie shows the first selected series.");
    }
    let numeric: Vec<bool> = match &state.dataset {
        Some(ds) => (0..headers.len()).map(|c| ds.is_numeric_column(c)).collect(),
        None => vec![false; headers.len()],
    };
    for (i, h) in headers.iter().enumerate() {
        let mut checked = state.chart.series.contains(&i);
        let text = if numeric[i] {
            RichText::new(h)
        } else {
            RichText::new(h).weak()
        };
        if ui.checkbox(&mut checked, text).changed() {
            state.toggle_series(i);
        }
    }

    ui.separator();
    ui.label(format!("{} rows plotted", state.visible_rows.len()));
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("← Filters").clicked() {
            state.step = Step::Filter;
        }
        if ui
            .add_enabled(state.chart_rect.is_some(), egui::Button::new("Save PNG…"))
            .clicked()
        {
            snapshot_dialog(ui.ctx(), state);
        }
    });
}

// ---------------------------------------------------------------------------
// Toasts
// ---------------------------------------------------------------------------

pub fn toasts(ctx: &egui::Context, state: &AppState) {
    if state.toasts.is_empty() {
        return;
    }
    egui::Area::new(egui::Id::new("toasts"))
        .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
        .interactable(false)
        .show(ctx, |ui: &mut Ui| {
            for toast in state.toasts.iter() {
                let color = match toast.kind {
                    ToastKind::Info => Color32::from_rgb(59, 130, 246),
                    ToastKind::Success => Color32::from_rgb(16, 185, 129),
                    ToastKind::Error => Color32::from_rgb(239, 68, 68),
                };
                egui::Frame::popup(ui.style())
                    .stroke(egui::Stroke::new(1.5, color))
                    .show(ui, |ui: &mut Ui| {
                        ui.set_max_width(360.0);
                        ui.label(RichText::new(&toast.message).color(color));
                    });
                ui.add_space(4.0);
            }
        });
}

// ---------------------------------------------------------------------------
// Settings window
// ---------------------------------------------------------------------------

pub fn settings_window(ctx: &egui::Context, state: &mut AppState) {
    if !state.show_settings {
        return;
    }
    let mut open = true;
    let mut draft = state.settings.clone();

    egui::Window::new("Settings")
        .open(&mut open)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui: &mut Ui| {
            egui::Grid::new("settings_grid")
                .num_columns(2)
                .spacing([12.0, 6.0])
                .show(ui, |ui: &mut Ui| {
                    ui.label("Theme");
                    ui.horizontal(|ui: &mut Ui| {
                        ui.selectable_value(&mut draft.theme, Theme::Light, "Light");
                        ui.selectable_value(&mut draft.theme, Theme::Dark, "Dark");
                    });
                    ui.end_row();

                    ui.label("Font");
                    ui.horizontal(|ui: &mut Ui| {
                        ui.selectable_value(&mut draft.font_family, FontFamily::SansSerif, "Sans-serif");
                        ui.selectable_value(&mut draft.font_family, FontFamily::Monospace, "Monospace");
                    });
                    ui.end_row();

                    ui.label("Font size");
                    ui.add(egui::Slider::new(&mut draft.font_size, 10.0..=28.0).suffix(" pt"));
                    ui.end_row();

                    ui.label("Language");
                    egui::ComboBox::from_id_salt("language")
                        .selected_text(draft.language.clone())
                        .show_ui(ui, |ui: &mut Ui| {
                            for lang in ["ru", "kk", "en"] {
                                ui.selectable_value(&mut draft.language, lang.to_string(), lang);
                            }
                        });
                    ui.end_row();

                    ui.label("Accent colour");
                    let mut accent = draft.accent_rgb();
                    if ui.color_edit_button_srgba(&mut accent).changed() {
                        draft.accent_color =
                            format!("#{:02x}{:02x}{:02x}", accent.r(), accent.g(), accent.b());
                    }
                    ui.end_row();

                    ui.label("High contrast");
                    ui.checkbox(&mut draft.high_contrast, "");
                    ui.end_row();

                    ui.label("Time format");
                    ui.horizontal(|ui: &mut Ui| {
                        ui.selectable_value(&mut draft.time_format, "24".to_string(), "24 h");
                        ui.selectable_value(&mut draft.time_format, "12".to_string(), "12 h");
                    });
                    ui.end_row();

                    ui.label("Idle timeout");
                    ui.add(
                        egui::DragValue::new(&mut draft.idle_timeout_minutes)
                            .range(0..=240)
                            .suffix(" min"),
                    )
                    .on_hover_text("0 disables the timeout");
                    ui.end_row();

                    ui.label("CSV delimiter");
                    ui.horizontal(|ui: &mut Ui| {
                        for (c, name) in [(',', ","), (';', ";"), ('\t', "tab")] {
                            if ui
                                .selectable_label(draft.analytics.load.delimiter == c, name)
                                .clicked()
                            {
                                draft.analytics.load.delimiter = c;
                                draft.analytics.export.delimiter = c;
                            }
                        }
                    });
                    ui.end_row();

                    ui.label("Uneven rows");
                    ui.horizontal(|ui: &mut Ui| {
                        let rr = &mut draft.analytics.load.ragged_rows;
                        ui.selectable_value(rr, RaggedRows::Pad, "Pad");
                        ui.selectable_value(rr, RaggedRows::Skip, "Skip");
                        ui.selectable_value(rr, RaggedRows::Reject, "Reject");
                    });
                    ui.end_row();

                    ui.label("Export quoting");
                    ui.horizontal(|ui: &mut Ui| {
                        let qs = &mut draft.analytics.export.quote_style;
                        ui.selectable_value(qs, QuoteStyle::Rfc4180, "RFC 4180");
                        ui.selectable_value(qs, QuoteStyle::Legacy, "Legacy (unquoted)");
                    });
                    ui.end_row();
                });
        });

    state.show_settings = open;
    state.apply_settings(draft);
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open data file")
        .add_filter("Supported files", SUPPORTED_EXTENSIONS)
        .add_filter("CSV / TSV", &["csv", "tsv", "txt"])
        .add_filter("Spreadsheets", &["xlsx", "xlsm", "xlsb", "xls", "ods"])
        .add_filter("PDF", &["pdf"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open_path(path);
    }
}

fn export_stem(state: &AppState) -> String {
    state
        .dataset
        .as_ref()
        .and_then(|ds| Path::new(&ds.source).file_stem())
        .map(|s| format!("{}_filtered", s.to_string_lossy()))
        .unwrap_or_else(|| "export".to_string())
}

pub fn export_dialog(state: &mut AppState) {
    let name = export_file_name(&export_stem(state), "csv", chrono::Local::now().naive_local());
    let Some(path) = rfd::FileDialog::new()
        .set_title("Export visible rows")
        .set_file_name(name)
        .add_filter("CSV", &["csv"])
        .save_file()
    else {
        return;
    };

    match state.export_to(&path) {
        Ok(n) => state
            .toasts
            .success(format!("Exported {n} rows to {}", path.display())),
        Err(e) => state.toasts.error(format!("Export failed: {e:#}")),
    }
}

pub fn sample_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Save sample template")
        .set_file_name("sample.csv")
        .add_filter("CSV", &["csv"])
        .save_file()
    else {
        return;
    };

    match state.write_sample(&path) {
        Ok(()) => state
            .toasts
            .success(format!("Sample template saved to {}", path.display())),
        Err(e) => state.toasts.error(format!("Could not save sample: {e:#}")),
    }
}

/// Ask for a destination, then request a screenshot; the app crops it to the chart.
pub fn snapshot_dialog(ctx: &egui::Context, state: &mut AppState) {
    let name = export_file_name(&export_stem(state), "png", chrono::Local::now().naive_local());
    if let Some(path) = rfd::FileDialog::new()
        .set_title("Save chart")
        .set_file_name(name)
        .add_filter("PNG image", &["png"])
        .save_file()
    {
        state.pending_snapshot = Some(path);
        ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(Default::default()));
    }
}
