//! Sensor group figures.
//!
//! A [`FigurePlan`] holds everything needed to draw one group: the converted
//! series, axis ranges from the test description, an optional secondary axis
//! in alternate units and optional timeline events. [`render_figure`] draws it
//! to a PNG with the plotters library.

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::TimelineEvent;
use crate::processors::sensors::LineStyle;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Figure has no series")]
    EmptyFigure,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// "Tableau 20" palette cycled across series.
const TABLEAU_20: &[(u8, u8, u8)] = &[
    (31, 119, 180),
    (174, 199, 232),
    (255, 127, 14),
    (255, 187, 120),
    (44, 160, 44),
    (152, 223, 138),
    (214, 39, 40),
    (255, 152, 150),
    (148, 103, 189),
    (197, 176, 213),
    (140, 86, 75),
    (196, 156, 148),
    (227, 119, 194),
    (247, 182, 210),
    (127, 127, 127),
    (199, 199, 199),
    (188, 189, 34),
    (219, 219, 141),
    (23, 190, 207),
    (158, 218, 229),
];

/// Event marker color (mid gray).
const EVENT_COLOR: RGBColor = RGBColor(128, 128, 128);

/// Top margin reserved for event labels, in pixels.
const EVENT_LABEL_MARGIN: u32 = 110;

/// One plotted line.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPlan {
    pub label: String,
    pub style: LineStyle,
    /// `(time, value)` pairs.
    pub points: Vec<(f64, f64)>,
}

/// Secondary y-axis range and label.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryAxisPlan {
    pub label: String,
    pub range: (f64, f64),
}

/// Everything needed to draw one sensor-group figure.
#[derive(Debug, Clone, PartialEq)]
pub struct FigurePlan {
    pub output_path: PathBuf,
    pub x_label: String,
    pub y_label: String,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub secondary: Option<SecondaryAxisPlan>,
    pub series: Vec<SeriesPlan>,
    /// Timeline markers; `None` when no timeline exists for the test.
    pub events: Option<Vec<TimelineEvent>>,
}

/// Widen a degenerate range so plotters can build an axis.
fn padded(range: (f64, f64)) -> (f64, f64) {
    if (range.1 - range.0).abs() < f64::EPSILON {
        (range.0 - 1.0, range.1 + 1.0)
    } else {
        range
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Draw a figure plan to a PNG file.
///
/// Parent directories are created if needed; an existing file is replaced.
///
/// # Arguments
///
/// * `plan` - The figure to draw
/// * `size` - Image size in pixels (width, height)
pub fn render_figure(plan: &FigurePlan, size: (u32, u32)) -> Result<()> {
    if plan.series.is_empty() {
        return Err(VisualizationError::EmptyFigure);
    }
    if let Some(parent) = plan.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (x_min, x_max) = padded(plan.x_range);
    let (y_min, y_max) = padded(plan.y_range);
    let (s_min, s_max) = padded(
        plan.secondary
            .as_ref()
            .map(|s| s.range)
            .unwrap_or(plan.y_range),
    );

    let root = BitMapBackend::new(&plan.output_path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .margin_top(if plan.events.is_some() { EVENT_LABEL_MARGIN } else { 15 })
        .x_label_area_size(45)
        .y_label_area_size(70)
        .right_y_label_area_size(if plan.secondary.is_some() { 70 } else { 0 })
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?
        .set_secondary_coord(x_min..x_max, s_min..s_max);

    chart
        .configure_mesh()
        .x_labels(8)
        .x_desc(plan.x_label.as_str())
        .y_desc(plan.y_label.as_str())
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 20))
        .draw()
        .map_err(plot_err)?;

    if let Some(secondary) = &plan.secondary {
        chart
            .configure_secondary_axes()
            .y_desc(secondary.label.as_str())
            .label_style(("sans-serif", 16))
            .axis_desc_style(("sans-serif", 20))
            .draw()
            .map_err(plot_err)?;
    }

    if let Some(events) = &plan.events {
        let visible: Vec<&TimelineEvent> = events
            .iter()
            .filter(|e| e.time >= x_min && e.time <= x_max)
            .collect();

        chart
            .draw_series(visible.iter().map(|e| {
                PathElement::new(vec![(e.time, y_min), (e.time, y_max)], EVENT_COLOR.stroke_width(1))
            }))
            .map_err(plot_err)?;

        // labels sit in the top margin, reading upward from the plot edge
        let label_style = ("sans-serif", 11)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Center));
        for event in &visible {
            let (x, y) = chart.backend_coord(&(event.time, y_max));
            root.draw(&Text::new(event.label.clone(), (x, y - 4), label_style.clone()))
                .map_err(plot_err)?;
        }
    }

    for (i, series) in plan.series.iter().enumerate() {
        let (r, g, b) = TABLEAU_20[i % TABLEAU_20.len()];
        let color = RGBColor(r, g, b);
        let style = color.stroke_width(2);

        let anno = match series.style {
            LineStyle::Solid => chart
                .draw_series(LineSeries::new(series.points.iter().copied(), style))
                .map_err(plot_err)?,
            LineStyle::Dashed => chart
                .draw_series(DashedLineSeries::new(series.points.iter().copied(), 8, 5, style))
                .map_err(plot_err)?,
        };
        anno.label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .label_font(("sans-serif", 12))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;

    Ok(())
}

/// Output path of a group figure: `<dir>/<test>_<tag>.png`.
pub fn figure_path(dir: &Path, test_name: &str, tag: &str) -> PathBuf {
    dir.join(format!("{}_{}.png", test_name, tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_figure_path() {
        let path = figure_path(Path::new("figs"), "Test_27_West_070814", "TC_A1");
        assert_eq!(path, Path::new("figs").join("Test_27_West_070814_TC_A1.png"));
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded((0.0, 10.0)), (0.0, 10.0));
        assert_eq!(padded((5.0, 5.0)), (4.0, 6.0));
    }

    #[test]
    fn test_render_empty_figure() {
        let plan = FigurePlan {
            output_path: PathBuf::from("unused.png"),
            x_label: "Time (s)".to_string(),
            y_label: "Temperature (°C)".to_string(),
            x_range: (0.0, 10.0),
            y_range: (0.0, 100.0),
            secondary: None,
            series: Vec::new(),
            events: None,
        };
        assert!(matches!(
            render_figure(&plan, (800, 600)),
            Err(VisualizationError::EmptyFigure)
        ));
        assert!(!Path::new("unused.png").exists());
    }

    #[test]
    fn test_render_figure_with_data() {
        let dir = tempdir().unwrap();
        let output_path = figure_path(&dir.path().join("figs"), "Test_1", "TC_A1");
        let plan = FigurePlan {
            output_path: output_path.clone(),
            x_label: "Time (s)".to_string(),
            y_label: "Temperature (°C)".to_string(),
            x_range: (0.0, 60.0),
            y_range: (0.0, 1000.0),
            secondary: Some(SecondaryAxisPlan {
                label: "Temperature (°F)".to_string(),
                range: (32.0, 1832.0),
            }),
            series: vec![
                SeriesPlan {
                    label: "TC 1".to_string(),
                    style: LineStyle::Solid,
                    points: (0..60).map(|t| (t as f64, 20.0 + 10.0 * t as f64)).collect(),
                },
                SeriesPlan {
                    label: "RAD 1".to_string(),
                    style: LineStyle::Dashed,
                    points: (0..60).map(|t| (t as f64, 5.0 * t as f64)).collect(),
                },
            ],
            events: Some(vec![
                TimelineEvent {
                    time: 10.0,
                    label: "Ignition".to_string(),
                },
                TimelineEvent {
                    time: 90.0,
                    label: "After window".to_string(),
                },
            ]),
        };

        render_figure(&plan, (800, 600)).unwrap();

        let metadata = std::fs::metadata(&output_path).unwrap();
        assert!(metadata.len() > 0);
        assert!(output_path.ends_with("Test_1_TC_A1.png"));
    }
}
