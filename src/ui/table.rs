use eframe::egui::{self, Align, Layout, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Data table (central panel, filter step)
// ---------------------------------------------------------------------------

/// Render the visible rows and columns. Header buttons sort.
pub fn data_table(ui: &mut Ui, state: &mut AppState) {
    let Some(ds) = &state.dataset else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No dataset loaded.");
        });
        return;
    };

    let columns = state.visible_columns();
    if columns.is_empty() {
        ui.label("All columns are hidden.");
        return;
    }
    if state.visible_rows.is_empty() {
        ui.label(RichText::new("No rows match the current filters.").italics());
    }

    let mut clicked = None;
    egui::ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .cell_layout(Layout::left_to_right(Align::Center))
            .column(Column::auto().at_least(40.0))
            .columns(Column::auto().at_least(90.0).clip(true), columns.len())
            .header(24.0, |mut header| {
                header.col(|ui: &mut Ui| {
                    ui.strong("#");
                });
                for &c in &columns {
                    header.col(|ui: &mut Ui| {
                        let arrow = match state.sort {
                            Some(spec) if spec.column == c => spec.direction.arrow(),
                            _ => "",
                        };
                        let label = RichText::new(format!("{} {arrow}", ds.headers[c])).strong();
                        if ui
                            .add(egui::Button::new(label).frame(false))
                            .on_hover_text("Sort by this column")
                            .clicked()
                        {
                            clicked = Some(c);
                        }
                    });
                }
            })
            .body(|body| {
                body.rows(20.0, state.visible_rows.len(), |mut row| {
                    let r = state.visible_rows[row.index()];
                    row.col(|ui: &mut Ui| {
                        ui.weak((r + 1).to_string());
                    });
                    for &c in &columns {
                        row.col(|ui: &mut Ui| {
                            let text = ds.rows[r][c].to_string();
                            ui.label(&text).on_hover_text(&text);
                        });
                    }
                });
            });
    });

    if let Some(column) = clicked {
        state.click_sort(column);
    }
}
