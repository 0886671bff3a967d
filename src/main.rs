#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use eframe::egui;
use ping_plotter::PingPlotterApp;

fn main() -> eframe::Result {
    env_logger::init();

    let app = PingPlotterApp::new();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 640.0])
            .with_min_inner_size([600.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Ping Plotter",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(app))
        }),
    )
}
