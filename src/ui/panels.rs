use collision_dashboard::data::{Borough, GroupBy};
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    if state.table.is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    let mut changed = false;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Grouping ----
            ui.strong("Group by");
            let slots = state
                .table
                .as_ref()
                .map(|t| t.factor_slots.clone())
                .unwrap_or_default();
            let mut choices = vec![GroupBy::HourOfDay, GroupBy::Borough, GroupBy::Date];
            choices.extend(slots.into_iter().map(|slot| GroupBy::Factor { slot }));
            egui::ComboBox::from_id_salt("group_by")
                .selected_text(state.group_by.to_string())
                .show_ui(ui, |ui: &mut Ui| {
                    for choice in choices {
                        changed |= ui
                            .selectable_value(&mut state.group_by, choice, choice.to_string())
                            .changed();
                    }
                });
            ui.separator();

            // ---- Date range ----
            changed |= ui
                .checkbox(&mut state.use_date_range, RichText::new("Date range").strong())
                .changed();
            ui.add_enabled_ui(state.use_date_range, |ui: &mut Ui| {
                ui.horizontal(|ui: &mut Ui| {
                    ui.label("From");
                    changed |= ui
                        .add(DatePickerButton::new(&mut state.date_from).id_salt("date_from"))
                        .changed();
                });
                ui.horizontal(|ui: &mut Ui| {
                    ui.label("To");
                    changed |= ui
                        .add(DatePickerButton::new(&mut state.date_to).id_salt("date_to"))
                        .changed();
                });
            });
            ui.separator();

            // ---- Boroughs ----
            let header_text = format!(
                "Borough  ({}/{})",
                state.boroughs.len(),
                Borough::KNOWN.len()
            );
            egui::CollapsingHeader::new(RichText::new(header_text).strong())
                .id_salt("boroughs")
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    ui.horizontal(|ui: &mut Ui| {
                        if ui.small_button("All").clicked() {
                            state.select_all_boroughs();
                        }
                        if ui.small_button("None").clicked() {
                            state.select_no_boroughs();
                        }
                    });
                    for borough in Borough::KNOWN {
                        let mut checked = state.boroughs.contains(&borough);
                        if ui.checkbox(&mut checked, borough.name()).changed() {
                            state.toggle_borough(borough);
                        }
                    }
                });
            ui.separator();

            // ---- Contributing factor ----
            ui.strong("Contributing factor");
            let current = state.factor.clone().unwrap_or_else(|| "Any".to_string());
            egui::ComboBox::from_id_salt("factor")
                .selected_text(current)
                .width(ui.available_width())
                .show_ui(ui, |ui: &mut Ui| {
                    changed |= ui.selectable_value(&mut state.factor, None, "Any").changed();
                    for f in state.factor_choices.clone() {
                        changed |= ui
                            .selectable_value(&mut state.factor, Some(f.clone()), f)
                            .changed();
                    }
                });
            ui.separator();

            // ---- Injuries ----
            ui.strong("Minimum persons injured");
            changed |= ui
                .add(egui::Slider::new(&mut state.min_injured, 0..=state.max_injured))
                .changed();
            ui.separator();

            summary_section(ui, state);
        });

    if changed {
        state.refresh();
    }
}

fn summary_section(ui: &mut Ui, state: &AppState) {
    let Some(summary) = &state.summary else {
        return;
    };
    egui::CollapsingHeader::new("Dataset summary")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            ui.label(format!("Rows: {}", summary.rows));
            ui.label(format!("Skipped rows: {}", summary.skipped));
            ui.label(format!("Geocoded: {}", summary.with_coordinates));
            if let (Some(first), Some(last)) = (summary.first, summary.last) {
                ui.label(format!("From {first}"));
                ui.label(format!("To {last}"));
            }
            let boroughs: Vec<&str> = summary.boroughs.iter().map(|b| b.name()).collect();
            ui.label(format!("Boroughs: {}", boroughs.join(", ")));
        });
}

/// Vehicle slot picker for the hourly factor breakdown.
pub fn hourly_slot_selector(ui: &mut Ui, state: &mut AppState) {
    let mut slot = state.hourly_slot;
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Factor column");
        egui::ComboBox::from_id_salt("hourly_slot")
            .selected_text(format!("Vehicle {slot}"))
            .show_ui(ui, |ui: &mut Ui| {
                for &choice in state.hourly_slot_choices() {
                    ui.selectable_value(&mut slot, choice, format!("Vehicle {choice}"));
                }
            });
    });
    state.set_hourly_slot(slot);
}

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
        });

        ui.separator();

        if let Some(table) = &state.table {
            ui.label(format!(
                "{} collisions loaded, {} matching",
                table.len(),
                state.matching()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open collision data")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}
