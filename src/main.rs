mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use app::CollisionApp;
use clap::Parser;
use collision_dashboard::data::LoadOptions;
use eframe::egui;
use state::AppState;

/// Interactive dashboard for NYC motor vehicle collisions.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Collision dataset to open on start (.csv, .json or .parquet), as a
    /// path or an http(s) URL.
    path: Option<PathBuf>,

    /// Read at most this many data lines.
    #[arg(long, default_value_t = 50_000)]
    max_rows: usize,

    /// Read the whole file.
    #[arg(long, conflicts_with = "max_rows")]
    all_rows: bool,
}

fn main() -> eframe::Result {
    env_logger::init();
    let args = Args::parse();

    let options = LoadOptions {
        max_rows: (!args.all_rows).then_some(args.max_rows),
    };
    let mut state = AppState::new(options);
    if let Some(path) = &args.path {
        state.load_path(path);
    }

    let native = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "NYC Vehicle Collisions",
        native,
        Box::new(|_cc| Ok(Box::new(CollisionApp::new(state)))),
    )
}
