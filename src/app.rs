use std::time::{Duration, Instant};

use eframe::egui;

use crate::settings::{FontFamily, Settings, Theme};
use crate::state::{AppState, Step};
use crate::ui::{panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct MinewatchApp {
    pub state: AppState,
    /// Settings the egui style was last built from.
    applied: Option<Settings>,
}

impl MinewatchApp {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            applied: None,
        }
    }

    /// Push theme, accent, font and zoom into egui when they changed.
    fn apply_look(&mut self, ctx: &egui::Context) {
        let settings = &self.state.settings;
        if self.applied.as_ref() == Some(settings) {
            return;
        }

        let mut visuals = match settings.theme {
            Theme::Light => egui::Visuals::light(),
            Theme::Dark => egui::Visuals::dark(),
        };
        let accent = settings.accent_rgb();
        visuals.selection.bg_fill = accent;
        visuals.hyperlink_color = accent;
        if settings.high_contrast {
            visuals.override_text_color = Some(match settings.theme {
                Theme::Light => egui::Color32::BLACK,
                Theme::Dark => egui::Color32::WHITE,
            });
        }
        ctx.set_visuals(visuals);

        let family = match settings.font_family {
            FontFamily::SansSerif => egui::FontFamily::Proportional,
            FontFamily::Monospace => egui::FontFamily::Monospace,
        };
        ctx.style_mut(|style| {
            for font in style.text_styles.values_mut() {
                font.family = family.clone();
            }
        });
        ctx.set_zoom_factor(settings.zoom_factor());

        log::debug!("Applied look: {:?}, {:?}", settings.theme, settings.font_family);
        self.applied = Some(settings.clone());
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let (had_input, dropped, screenshot) = ctx.input(|i| {
            let had_input = !i.events.is_empty() || i.pointer.is_moving();
            let dropped = i.raw.dropped_files.iter().find_map(|f| f.path.clone());
            let screenshot = i.events.iter().find_map(|e| match e {
                egui::Event::Screenshot { image, .. } => Some((image.clone(), i.pixels_per_point())),
                _ => None,
            });
            (had_input, dropped, screenshot)
        });

        self.state.tick_idle(had_input, Instant::now());

        if let Some(path) = dropped {
            log::info!("File dropped: {}", path.display());
            self.state.open_path(path);
        }

        if let Some((image, ppp)) = screenshot {
            self.save_snapshot(&image, ppp);
        }
    }

    fn save_snapshot(&mut self, image: &egui::ColorImage, pixels_per_point: f32) {
        let Some(path) = self.state.pending_snapshot.take() else {
            return;
        };
        let Some(rect) = self.state.chart_rect else {
            self.state.toasts.error("No chart on screen to save");
            return;
        };
        let region = image.region(&rect, Some(pixels_per_point));
        match plot::save_png(&region, &path) {
            Ok(()) => self
                .state
                .toasts
                .success(format!("Chart saved to {}", path.display())),
            Err(e) => self.state.toasts.error(format!("Could not save chart: {e:#}")),
        }
    }
}

impl eframe::App for MinewatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_look(ctx);
        self.handle_input(ctx);
        self.state.poll_jobs();
        self.state.toasts.prune(Instant::now());

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters / chart options ----
        if self.state.step != Step::Upload && self.state.dataset.is_some() {
            egui::SidePanel::left("options_panel")
                .default_width(240.0)
                .resizable(true)
                .show(ctx, |ui| {
                    panels::side_panel(ui, &mut self.state);
                });
        }

        // ---- Central panel: upload page, table or chart ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.step {
            Step::Upload => {
                self.state.chart_rect = None;
                panels::upload_page(ui, &mut self.state);
            }
            Step::Filter => {
                self.state.chart_rect = None;
                table::data_table(ui, &mut self.state);
            }
            Step::Visualize => plot::chart(ui, &mut self.state),
        });

        panels::settings_window(ctx, &mut self.state);
        panels::toasts(ctx, &self.state);

        // Keep frames coming while something changes without user input.
        if self.state.jobs.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else if !self.state.toasts.is_empty() {
            ctx.request_repaint_after(Duration::from_millis(250));
        } else if let Some(left) = self.state.idle.remaining(Instant::now()) {
            ctx.request_repaint_after(left + Duration::from_millis(50));
        }
    }
}
