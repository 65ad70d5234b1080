use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot, tables};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct CollisionApp {
    pub state: AppState,
}

impl CollisionApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for CollisionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.table.is_none() {
                ui.centered_and_justified(|ui| {
                    ui.heading("Open a collision dataset  (File → Open…)");
                });
                return;
            }

            let row = (ui.available_height() / 3.0 - 24.0).max(120.0);
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.strong(format!("Collisions by {}", self.state.group_by));
                plot::view_chart(ui, &self.state, row);
                ui.separator();
                ui.strong("Collision locations");
                plot::location_plot(ui, &self.state, row);
                ui.separator();
                ui.strong("Leading contributing factors by hour");
                panels::hourly_slot_selector(ui, &mut self.state);
                plot::factor_hour_plot(ui, &self.state, row);
                ui.separator();
                ui.strong("Vehicle 1 vs vehicle 2 factors");
                tables::vehicle_comparison(ui, &self.state);
                ui.separator();
                ui.checkbox(&mut self.state.show_sample, "Show sample data");
                if self.state.show_sample {
                    tables::sample_grid(ui, &self.state);
                }
            });
        });
    }
}
