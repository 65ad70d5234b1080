use collision_dashboard::data::{GroupBy, GroupKey};
use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Aggregated view (bar chart)
// ---------------------------------------------------------------------------

/// Bars for the current aggregated view. Hours sit at their own x value,
/// other groupings are laid out left to right in key order.
pub fn view_chart(ui: &mut Ui, state: &AppState, height: f32) {
    let Some(view) = &state.view else {
        return;
    };

    let by_hour = view.group_by() == GroupBy::HourOfDay;
    let labels: Vec<String> = view.counts().keys().map(|k| k.to_string()).collect();
    let bars: Vec<Bar> = view
        .counts()
        .iter()
        .enumerate()
        .map(|(i, (key, count))| {
            let x = match key {
                GroupKey::Hour(h) if by_hour => *h as f64,
                _ => i as f64,
            };
            Bar::new(x, *count as f64)
                .name(key.to_string())
                .fill(state.view_colors.color_for(key))
                .width(0.8)
        })
        .collect();

    Plot::new("view_chart")
        .height(height)
        .x_axis_label(view.group_by().to_string())
        .y_axis_label("Collisions")
        .x_axis_formatter(move |mark, _range| tick_label(&labels, mark.value, by_hour))
        .allow_drag(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
}

/// Axis text for a tick: the hour itself, or the key of the bar sitting on
/// that whole-number position. Ticks off the bars stay blank.
fn tick_label(labels: &[String], value: f64, by_hour: bool) -> String {
    if by_hour || value.fract() != 0.0 {
        return format!("{value}");
    }
    if value < 0.0 {
        return String::new();
    }
    labels.get(value as usize).cloned().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Location scatter
// ---------------------------------------------------------------------------

/// Geocoded collisions, longitude on x and latitude on y.
pub fn location_plot(ui: &mut Ui, state: &AppState, height: f32) {
    let points: PlotPoints = state.points.iter().copied().collect();

    Plot::new("location_plot")
        .height(height)
        .data_aspect(1.0)
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.points(
                Points::new(points)
                    .radius(1.5)
                    .color(Color32::from_rgb(230, 80, 60)),
            );
        });
}

// ---------------------------------------------------------------------------
// Top factors by hour (lines)
// ---------------------------------------------------------------------------

/// One line per leading contributing factor across the 24 hours.
pub fn factor_hour_plot(ui: &mut Ui, state: &AppState, height: f32) {
    Plot::new("factor_hour_plot")
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Hour of day")
        .y_axis_label("Collisions")
        .show(ui, |plot_ui| {
            for (factor, view) in &state.hourly_factors {
                let points: PlotPoints = (0..24)
                    .map(|h| [h as f64, view.get(&GroupKey::Hour(h)) as f64])
                    .collect();
                let color = state
                    .factor_colors
                    .color_for(&GroupKey::Factor(factor.clone()));
                plot_ui.line(Line::new(points).name(factor).color(color).width(1.5));
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_label_maps_positions_to_keys() {
        let labels = vec!["Bronx".to_string(), "Queens".to_string()];
        assert_eq!(tick_label(&labels, 0.0, false), "Bronx");
        assert_eq!(tick_label(&labels, 1.0, false), "Queens");
        assert_eq!(tick_label(&labels, 2.0, false), "");
        assert_eq!(tick_label(&labels, 0.5, false), "0.5");
        assert_eq!(tick_label(&labels, 17.0, true), "17");
    }

    #[test]
    fn test_tick_label_blank_left_of_origin() {
        let labels = vec!["Bronx".to_string()];
        assert_eq!(tick_label(&labels, -1.0, false), "");
        assert_eq!(tick_label(&labels, -2.0, false), "");
    }
}
