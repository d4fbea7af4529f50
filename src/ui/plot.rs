use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{self, ColorImage, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, PlotUi, Points, Polygon};

use crate::color::series_colors;
use crate::data::chart::{pie_slices, ChartData, ChartKind, PieSlice};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Chart (central panel, visualize step)
// ---------------------------------------------------------------------------

/// Render the chart for the visible rows.
pub fn chart(ui: &mut Ui, state: &mut AppState) {
    let data = match state.chart_data() {
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Open a file to chart it  (File → Open…)");
            });
            return;
        }
        Some(Err(e)) => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading(e.to_string());
            });
            state.chart_rect = None;
            return;
        }
        Some(Ok(data)) => data,
    };

    let kind = state.chart.kind;
    let accent = state.settings.accent_rgb();

    let plot = Plot::new("analytics_chart")
        .legend(Legend::default())
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);

    let response = if kind == ChartKind::Pie {
        let slices = pie_slices(&data);
        if slices.is_empty() {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading(format!("No positive values in \"{}\" to share out", data.series[0].name));
            });
            state.chart_rect = None;
            return;
        }
        let colors = series_colors(accent, slices.len());
        plot.data_aspect(1.0)
            .show_axes(false)
            .show_grid(false)
            .show(ui, |plot_ui| draw_pie(plot_ui, &slices, &colors))
    } else {
        let colors = series_colors(accent, data.series.len());
        let labels = data.categories.clone();
        plot.x_axis_label(data.category_name.clone())
            .x_axis_formatter(move |mark, _range| category_label(&labels, mark.value))
            .show(ui, |plot_ui| draw_series(plot_ui, &data, kind, &colors))
    };

    state.chart_rect = Some(response.response.rect);
}

/// Tick label for integral positions only.
fn category_label(labels: &[String], value: f64) -> String {
    if value < 0.0 || (value - value.round()).abs() > 1e-6 {
        return String::new();
    }
    labels.get(value.round() as usize).cloned().unwrap_or_default()
}

fn draw_series(plot_ui: &mut PlotUi, data: &ChartData, kind: ChartKind, colors: &[egui::Color32]) {
    let n = data.series.len().max(1) as f64;
    let bar_width = 0.8 / n;

    for (i, series) in data.series.iter().enumerate() {
        let color = colors.get(i).copied().unwrap_or(egui::Color32::LIGHT_BLUE);
        // Non-numeric cells have no height and are left out of the drawing.
        let numeric = series
            .points
            .iter()
            .filter_map(|p| p.y().map(|y| (p.x as f64, y)));

        match kind {
            ChartKind::Line | ChartKind::Area => {
                let points: PlotPoints = numeric.map(|(x, y)| [x, y]).collect();
                let mut line = Line::new(points).name(&series.name).color(color).width(1.5);
                if kind == ChartKind::Area {
                    line = line.fill(0.0);
                }
                plot_ui.line(line);
            }
            ChartKind::Scatter => {
                let points: PlotPoints = numeric.map(|(x, y)| [x, y]).collect();
                plot_ui.points(Points::new(points).name(&series.name).color(color).radius(3.0));
            }
            ChartKind::Bar => {
                let offset = (i as f64 - (n - 1.0) / 2.0) * bar_width;
                let bars = numeric
                    .map(|(x, y)| Bar::new(x + offset, y).width(bar_width))
                    .collect();
                plot_ui.bar_chart(BarChart::new(bars).name(&series.name).color(color));
            }
            ChartKind::Pie => {}
        }
    }
}

/// Wedge outline on the unit circle: centre, then the arc.
fn wedge_points(slice: &PieSlice) -> Vec<[f64; 2]> {
    let steps = ((slice.sweep * 120.0).ceil() as usize).max(2);
    let mut points = Vec::with_capacity(steps + 2);
    points.push([0.0, 0.0]);
    for i in 0..=steps {
        // Clockwise from twelve o'clock.
        let turn = slice.start + slice.sweep * i as f64 / steps as f64;
        let angle = std::f64::consts::FRAC_PI_2 - turn * std::f64::consts::TAU;
        points.push([angle.cos(), angle.sin()]);
    }
    points
}

fn draw_pie(plot_ui: &mut PlotUi, slices: &[PieSlice], colors: &[egui::Color32]) {
    for (i, slice) in slices.iter().enumerate() {
        let color = colors.get(i).copied().unwrap_or(egui::Color32::LIGHT_BLUE);
        let name = format!("{} ({:.1}%)", slice.label, slice.sweep * 100.0);
        plot_ui.polygon(
            Polygon::new(PlotPoints::from(wedge_points(slice)))
                .name(name)
                .fill_color(color)
                .stroke(egui::Stroke::new(1.0, color)),
        );
    }
}

// ---------------------------------------------------------------------------
// PNG snapshot
// ---------------------------------------------------------------------------

/// Encode a captured screen region as PNG.
pub fn save_png(image: &ColorImage, path: &Path) -> Result<()> {
    let [w, h] = image.size;
    let raw: Vec<u8> = image.pixels.iter().flat_map(|c| c.to_array()).collect();
    let buffer = ::image::RgbaImage::from_raw(w as u32, h as u32, raw)
        .context("screenshot buffer does not match its size")?;
    buffer
        .save_with_format(path, ::image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Chart snapshot ({w}x{h}) saved to {}", path.display());
    Ok(())
}
