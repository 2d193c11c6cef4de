//! Figures of a model and the data it describes
//!
//! A [Figure] is plain data: every series is already evaluated, so it can be inspected or
//! compared in tests. [Figure::to_svg] draws it with `plotters`.

use crate::components::CompositeModel;
use crate::error::PlotError;

use itertools::Itertools;
use ndarray::Array1;
use plotters::coord::Shift;
use plotters::prelude::*;

/// Smallest width and height of a rendered figure in pixels
pub const MIN_SIZE: u32 = 64;

const DATA_COLOR: RGBColor = BLACK;
const TOTAL_COLOR: RGBColor = RGBColor(214, 39, 40);
const COMPONENT_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(23, 190, 207),
];

/// How a series is drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesStyle {
    /// Markers with optional error bars
    Data,
    /// Thick line
    Total,
    /// Thin line, the colour cycles with the component index
    Component,
    /// Markers without error bars
    Residual,
    /// Thin black line
    Reference,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Symmetric error bars, drawn only for [SeriesStyle::Data]
    pub y_err: Option<Vec<f64>>,
    pub style: SeriesStyle,
}

impl Series {
    pub fn new(
        label: impl Into<String>,
        x: &Array1<f64>,
        y: &Array1<f64>,
        style: SeriesStyle,
    ) -> Self {
        Self {
            label: label.into(),
            x: x.to_vec(),
            y: y.to_vec(),
            y_err: None,
            style,
        }
    }

    /// Points with both coordinates finite
    fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x
            .iter()
            .copied()
            .zip(self.y.iter().copied())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
    }

    /// `(x, y - err, y + err)` for every finite point
    fn error_bars(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(self.y_err.iter().flatten())
            .map(|((&x, &y), &err)| (x, y - err, y + err))
            .filter(|(x, low, high)| x.is_finite() && low.is_finite() && high.is_finite())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Panel {
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl Panel {
    fn new(x_label: &str, y_label: &str) -> Self {
        Self {
            x_label: x_label.to_owned(),
            y_label: y_label.to_owned(),
            series: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self, label: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.label == label)
    }

    fn x_range(&self) -> Option<(f64, f64)> {
        self.series
            .iter()
            .flat_map(Series::points)
            .map(|(x, _)| x)
            .minmax()
            .into_option()
    }

    fn y_range(&self) -> Option<(f64, f64)> {
        let points = self.series.iter().flat_map(Series::points).map(|(_, y)| y);
        let bars = self
            .series
            .iter()
            .flat_map(Series::error_bars)
            .flat_map(|(_, low, high)| [low, high]);
        points.chain(bars).minmax().into_option()
    }
}

/// Two stacked panels sharing the wavelength axis: model and data on top, residuals below
#[derive(Clone, Debug, PartialEq)]
pub struct Figure {
    pub upper: Panel,
    pub lower: Panel,
    /// Relative heights of the upper and the lower panel
    pub height_ratios: [u32; 2],
}

impl Figure {
    /// Evaluate the model and its components on `wavelength`
    ///
    /// With observed `flux` the upper panel gets the data series and the lower panel the
    /// residuals `flux - model`, otherwise the lower panel stays empty.
    pub fn from_model(
        model: &CompositeModel,
        wavelength: &Array1<f64>,
        flux: Option<&Array1<f64>>,
        uncertainty: Option<&Array1<f64>>,
    ) -> Self {
        let mut upper = Panel::new("wavelength, micron", "flux");
        let mut lower = Panel::new("wavelength, micron", "residual");
        let total = model.evaluate(wavelength);

        if let Some(flux) = flux {
            let mut data = Series::new("data", wavelength, flux, SeriesStyle::Data);
            data.y_err = uncertainty.map(|u| u.to_vec());
            upper.series.push(data);

            let residuals = flux - &total;
            lower
                .series
                .push(Series::new("residual", wavelength, &residuals, SeriesStyle::Residual));
            let zero = Array1::zeros(wavelength.len());
            lower
                .series
                .push(Series::new("zero", wavelength, &zero, SeriesStyle::Reference));
        }
        for (name, curve) in model.component_curves(wavelength) {
            upper
                .series
                .push(Series::new(name, wavelength, &curve, SeriesStyle::Component));
        }
        upper
            .series
            .push(Series::new("model", wavelength, &total, SeriesStyle::Total));

        Self {
            upper,
            lower,
            height_ratios: [3, 1],
        }
    }

    /// Render to an SVG document
    pub fn to_svg(&self, width: u32, height: u32) -> Result<String, PlotError> {
        if width < MIN_SIZE || height < MIN_SIZE {
            return Err(PlotError::InvalidSize { width, height });
        }
        let x_range = padded(self.upper.x_range().or_else(|| self.lower.x_range()));
        let upper_height = match self.height_ratios {
            [0, 0] => height * 3 / 4,
            [upper, lower] => {
                (u64::from(height) * u64::from(upper) / (u64::from(upper) + u64::from(lower)))
                    as u32
            }
        };

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_error)?;
            let (upper_area, lower_area) = root.split_vertically(upper_height);
            draw_panel(&upper_area, &self.upper, x_range, true)?;
            draw_panel(&lower_area, &self.lower, x_range, false)?;
            root.present().map_err(render_error)?;
        }
        Ok(svg)
    }
}

fn render_error<E>(error: DrawingAreaErrorKind<E>) -> PlotError
where
    E: std::error::Error + Send + Sync,
{
    PlotError::Render(error.to_string())
}

/// Axis range with a margin, degenerate and missing ranges get a unit width
fn padded(range: Option<(f64, f64)>) -> (f64, f64) {
    match range {
        Some((min, max)) if max > min => {
            let margin = 0.05 * (max - min);
            (min - margin, max + margin)
        }
        Some((value, _)) => (value - 1.0, value + 1.0),
        None => (-1.0, 1.0),
    }
}

fn draw_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    panel: &Panel,
    x_range: (f64, f64),
    legend: bool,
) -> Result<(), PlotError> {
    let y_range = padded(panel.y_range());
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
        .map_err(render_error)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .draw()
        .map_err(render_error)?;

    let mut components = 0;
    for series in &panel.series {
        match series.style {
            SeriesStyle::Data => {
                if series.y_err.is_some() {
                    chart
                        .draw_series(series.error_bars().map(|(x, low, high)| {
                            ErrorBar::new_vertical(x, low, 0.5 * (low + high), high, DATA_COLOR, 3)
                        }))
                        .map_err(render_error)?;
                }
                chart
                    .draw_series(
                        series
                            .points()
                            .map(|point| Circle::new(point, 2, DATA_COLOR.filled())),
                    )
                    .map_err(render_error)?
                    .label(series.label.as_str())
                    .legend(|(x, y)| Circle::new((x + 10, y), 3, DATA_COLOR.filled()));
            }
            SeriesStyle::Residual => {
                chart
                    .draw_series(
                        series
                            .points()
                            .map(|point| Circle::new(point, 2, DATA_COLOR.filled())),
                    )
                    .map_err(render_error)?;
            }
            SeriesStyle::Total => {
                chart
                    .draw_series(LineSeries::new(
                        series.points(),
                        TOTAL_COLOR.stroke_width(2),
                    ))
                    .map_err(render_error)?
                    .label(series.label.as_str())
                    .legend(|(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], TOTAL_COLOR.stroke_width(2))
                    });
            }
            SeriesStyle::Component => {
                let color = COMPONENT_COLORS[components % COMPONENT_COLORS.len()];
                components += 1;
                chart
                    .draw_series(LineSeries::new(series.points(), color))
                    .map_err(render_error)?;
            }
            SeriesStyle::Reference => {
                chart
                    .draw_series(LineSeries::new(series.points(), BLACK))
                    .map_err(render_error)?;
            }
        }
    }

    if legend && !panel.is_empty() {
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(render_error)?;
    }
    Ok(())
}
