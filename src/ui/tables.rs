use eframe::egui::{self, Align, Layout, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Vehicle 1 vs vehicle 2
// ---------------------------------------------------------------------------

/// Leading factors of each compared vehicle slot, side by side.
pub fn vehicle_comparison(ui: &mut Ui, state: &AppState) {
    if state.vehicle_top.len() < 2 {
        ui.label("The source has fewer than two contributing factor columns.");
        return;
    }

    ui.columns(state.vehicle_top.len(), |columns| {
        for (ui, (slot, top)) in columns.iter_mut().zip(&state.vehicle_top) {
            ui.label(RichText::new(format!("Vehicle {slot}")).strong());
            egui::Grid::new(("vehicle_top", *slot))
                .striped(true)
                .num_columns(2)
                .show(ui, |ui: &mut Ui| {
                    for (factor, count) in top {
                        ui.label(factor.to_string());
                        ui.label(count.to_string());
                        ui.end_row();
                    }
                });
        }
    });
}

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// The first loaded records, unfiltered.
pub fn sample_grid(ui: &mut Ui, state: &AppState) {
    let rows = state.sample();
    let total = state.table.as_ref().map_or(0, |t| t.len());
    ui.label(format!("First {} of {total} records", rows.len()));

    let coord = |v: Option<f64>| v.map(|v| format!("{v:.5}")).unwrap_or_default();

    TableBuilder::new(ui)
        .id_salt("sample_grid")
        .striped(true)
        .resizable(true)
        .vscroll(false)
        .cell_layout(Layout::left_to_right(Align::Center))
        .column(Column::auto().at_least(130.0))
        .columns(Column::auto(), 4)
        .columns(Column::remainder().at_least(120.0), 2)
        .header(20.0, |mut header| {
            for name in [
                "Time",
                "Borough",
                "Latitude",
                "Longitude",
                "Injured",
                "Factor 1",
                "Factor 2",
            ] {
                header.col(|ui| {
                    ui.strong(name);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let record = &rows[row.index()];
                row.col(|ui| {
                    ui.label(record.timestamp.format("%Y-%m-%d %H:%M").to_string());
                });
                row.col(|ui| {
                    ui.label(record.borough.name());
                });
                row.col(|ui| {
                    ui.label(coord(record.latitude));
                });
                row.col(|ui| {
                    ui.label(coord(record.longitude));
                });
                row.col(|ui| {
                    ui.label(record.casualties.persons_injured.to_string());
                });
                row.col(|ui| {
                    ui.label(record.factor(1));
                });
                row.col(|ui| {
                    ui.label(record.factor(2));
                });
            });
        });
}
