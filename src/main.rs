mod app;
mod color;
mod data;
mod session;
mod settings;
mod state;
mod toast;
mod ui;

use app::MinewatchApp;
use eframe::egui;
use settings::{JsonFileStore, KeyValueStore, MemoryStore};
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let store: Box<dyn KeyValueStore> = match JsonFileStore::default_location() {
        Some(store) => {
            log::info!("Settings file: {}", store.path().display());
            Box::new(store)
        }
        None => {
            log::warn!("No config directory found, settings will not be persisted");
            Box::new(MemoryStore::default())
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Minewatch Analytics",
        options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(MinewatchApp::new(AppState::new(store))))
        }),
    )
}
