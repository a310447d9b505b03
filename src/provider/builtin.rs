use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;

use crate::{
    export::normalize::fit_to_canvas,
    foundation::{
        core::{Canvas, Rgba8Premul},
        error::{ChartreelError, ChartreelResult},
    },
    provider::{
        registry::FrameProvider,
        svg::{SvgRasterizer, escape_xml, hex_rgb},
    },
    render::frame::FrameRGBA,
};

/// Colours shared by the built-in providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    /// Title card background.
    pub title_bg: [u8; 3],
    /// Chart background.
    pub chart_bg: [u8; 3],
    /// Title card text.
    pub text: [u8; 3],
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title_bg: [0x2c, 0x3e, 0x50],
            chart_bg: [0xec, 0xf0, 0xf1],
            text: [0xff, 0xff, 0xff],
        }
    }
}

/// Constant-colour frames.
#[derive(Clone, Debug)]
pub struct SolidProvider {
    frame: FrameRGBA,
}

impl SolidProvider {
    /// Provider filling `canvas` with `color`.
    pub fn new(canvas: Canvas, color: Rgba8Premul) -> Self {
        Self {
            frame: FrameRGBA::solid(canvas, color),
        }
    }
}

impl FrameProvider for SolidProvider {
    fn get_frame(&self, _scene_id: &str, _local_time: f64) -> ChartreelResult<FrameRGBA> {
        Ok(self.frame.clone())
    }

    fn is_static(&self) -> bool {
        true
    }
}

/// A still image, decoded once and resized to the canvas.
#[derive(Clone, Debug)]
pub struct ImageProvider {
    frame: FrameRGBA,
}

impl ImageProvider {
    /// Decode the image at `path`.
    pub fn from_path(path: &Path, canvas: Canvas) -> ChartreelResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read image '{}'", path.display()))?;
        Self::from_bytes(&bytes, canvas)
    }

    /// Decode an encoded image (PNG, JPEG, ...).
    pub fn from_bytes(bytes: &[u8], canvas: Canvas) -> ChartreelResult<Self> {
        let img = image::load_from_memory(bytes).context("decode image")?;
        Self::from_rgba8(img.to_rgba8(), canvas)
    }

    /// Premultiply a straight-alpha image and fit it to `canvas`.
    pub fn from_rgba8(img: image::RgbaImage, canvas: Canvas) -> ChartreelResult<Self> {
        let (width, height) = img.dimensions();
        let mut data = img.into_raw();
        for px in data.chunks_exact_mut(4) {
            let p = Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]);
            px.copy_from_slice(&p.to_array());
        }
        let frame = fit_to_canvas(
            FrameRGBA {
                width,
                height,
                data,
                premultiplied: true,
            },
            canvas,
        )?;
        Ok(Self { frame })
    }
}

impl FrameProvider for ImageProvider {
    fn get_frame(&self, _scene_id: &str, _local_time: f64) -> ChartreelResult<FrameRGBA> {
        Ok(self.frame.clone())
    }

    fn is_static(&self) -> bool {
        true
    }
}

/// Characters of the title typed per second.
pub const TITLE_CHARS_PER_SEC: f64 = 8.0;
/// Delay before the description starts fading in.
pub const DESCRIPTION_FADE_START: f64 = 0.625;
/// Length of the description fade-in.
pub const DESCRIPTION_FADE_SECS: f64 = 1.25;

/// Opening card: the title typed out character by character, the description fading in below.
#[derive(Clone, Debug)]
pub struct TitleCardProvider {
    raster: SvgRasterizer,
    canvas: Canvas,
    theme: Theme,
    title: String,
    description: String,
}

impl TitleCardProvider {
    /// Build a title card.
    pub fn new(
        raster: SvgRasterizer,
        canvas: Canvas,
        theme: Theme,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            raster,
            canvas,
            theme,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Number of title characters visible at `local_time`.
    pub fn visible_chars(&self, local_time: f64) -> usize {
        let typed = (local_time.max(0.0) * TITLE_CHARS_PER_SEC).floor() as usize;
        typed.min(self.title.chars().count())
    }

    /// Description opacity at `local_time`, in `[0, 1]`.
    pub fn description_alpha(local_time: f64) -> f64 {
        ((local_time - DESCRIPTION_FADE_START) / DESCRIPTION_FADE_SECS).clamp(0.0, 1.0)
    }

    /// SVG document for `local_time`.
    pub fn svg_at(&self, local_time: f64) -> String {
        let (w, h) = (f64::from(self.canvas.width), f64::from(self.canvas.height));
        let s = h / 720.0;
        let typed: String = self
            .title
            .chars()
            .take(self.visible_chars(local_time))
            .collect();
        let alpha = Self::description_alpha(local_time);

        let mut svg = String::new();
        let _ = write!(
            svg,
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##
        );
        let _ = write!(
            svg,
            r##"<rect width="{w}" height="{h}" fill="{}"/>"##,
            hex_rgb(self.theme.title_bg)
        );
        let x = 100.0 * w / 1280.0;
        if !typed.is_empty() {
            let _ = write!(
                svg,
                r##"<text x="{x:.1}" y="{:.1}" font-family="sans-serif" font-weight="bold" font-size="{:.1}" fill="{}">{}</text>"##,
                200.0 * s,
                64.0 * s,
                hex_rgb(self.theme.text),
                escape_xml(&typed)
            );
        }
        if alpha > 0.0 && !self.description.is_empty() {
            let _ = write!(
                svg,
                r##"<text x="{x:.1}" y="{:.1}" font-family="sans-serif" font-size="{:.1}" fill="{}" fill-opacity="{alpha:.4}">{}</text>"##,
                300.0 * s,
                28.0 * s,
                hex_rgb(self.theme.text),
                escape_xml(&self.description)
            );
        }
        svg.push_str("</svg>");
        svg
    }
}

impl FrameProvider for TitleCardProvider {
    fn get_frame(&self, _scene_id: &str, local_time: f64) -> ChartreelResult<FrameRGBA> {
        self.raster.rasterize(&self.svg_at(local_time), self.canvas)
    }

    /// Once the title is typed and the description has faded in.
    fn settled_after(&self) -> Option<f64> {
        let typed = self.title.chars().count() as f64 / TITLE_CHARS_PER_SEC;
        let faded = if self.description.is_empty() {
            0.0
        } else {
            DESCRIPTION_FADE_START + DESCRIPTION_FADE_SECS
        };
        Some(typed.max(faded))
    }
}

/// Chart flavours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    /// Connected line with point markers.
    Line,
    /// One bar per point.
    Bar,
    /// Unconnected markers.
    Scatter,
}

impl ChartKind {
    /// Accepted names.
    pub const NAMES: [&'static str; 3] = ["line", "bar", "scatter"];

    /// Parse a chart type name.
    pub fn parse(name: &str) -> ChartreelResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            "scatter" => Ok(Self::Scatter),
            other => Err(ChartreelError::validation(format!(
                "invalid chart type '{other}', valid types: {}",
                Self::NAMES.join(", ")
            ))),
        }
    }

    fn color(self) -> [u8; 3] {
        match self {
            Self::Line => [0x34, 0x98, 0xdb],
            Self::Bar => [0x2e, 0xcc, 0x71],
            Self::Scatter => [0xe7, 0x4c, 0x3c],
        }
    }
}

/// A `(year, value)` series.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartData {
    years: Vec<f64>,
    values: Vec<f64>,
}

impl ChartData {
    /// Pair up years and values; both must be non-empty, finite and of equal length.
    pub fn new(years: Vec<f64>, values: Vec<f64>) -> ChartreelResult<Self> {
        if years.is_empty() {
            return Err(ChartreelError::validation("chart data must not be empty"));
        }
        if years.len() != values.len() {
            return Err(ChartreelError::validation(format!(
                "chart data has {} years but {} values",
                years.len(),
                values.len()
            )));
        }
        if years.iter().chain(&values).any(|v| !v.is_finite()) {
            return Err(ChartreelError::validation("chart data must be finite"));
        }
        Ok(Self { years, values })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.years.len()
    }

    /// Always `false`; construction rejects empty series.
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    fn x_bounds(&self) -> (f64, f64) {
        let (lo, hi) = min_max(&self.years);
        (lo - 1.0, hi + 1.0)
    }

    fn y_bounds(&self) -> (f64, f64) {
        let (lo, hi) = min_max(&self.values);
        let (lo, hi) = (lo.min(lo * 0.9), hi.max(hi * 1.1));
        if hi - lo < 1e-9 {
            (lo - 1.0, hi + 1.0)
        } else {
            (lo, hi)
        }
    }
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}

/// Animated chart revealing its series over `reveal_secs`.
///
/// Axes are fixed from the whole series so they do not jump while points appear.
#[derive(Clone, Debug)]
pub struct ChartProvider {
    raster: SvgRasterizer,
    canvas: Canvas,
    theme: Theme,
    kind: ChartKind,
    data: ChartData,
    title: String,
    reveal_secs: f64,
}

impl ChartProvider {
    /// Build a chart; the default title is "Economic Trends".
    pub fn new(
        raster: SvgRasterizer,
        canvas: Canvas,
        theme: Theme,
        kind: ChartKind,
        data: ChartData,
        reveal_secs: f64,
    ) -> ChartreelResult<Self> {
        if !reveal_secs.is_finite() || reveal_secs < 0.0 {
            return Err(ChartreelError::validation(
                "chart reveal_secs must be finite and >= 0",
            ));
        }
        Ok(Self {
            raster,
            canvas,
            theme,
            kind,
            data,
            title: "Economic Trends".to_owned(),
            reveal_secs,
        })
    }

    /// Replace the chart title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Number of points shown at `local_time`, fractional for the leading point.
    ///
    /// Starts at one point and reaches the full series at `reveal_secs`.
    pub fn revealed(&self, local_time: f64) -> f64 {
        let n = self.data.len() as f64;
        if self.reveal_secs <= 0.0 {
            return n;
        }
        let p = (local_time / self.reveal_secs).clamp(0.0, 1.0);
        1.0 + (n - 1.0) * p
    }

    /// SVG document for `local_time`.
    pub fn svg_at(&self, local_time: f64) -> String {
        let (w, h) = (f64::from(self.canvas.width), f64::from(self.canvas.height));
        let s = h / 720.0;
        let plot = PlotArea {
            left: 0.10 * w,
            right: 0.95 * w,
            top: 0.12 * h,
            bottom: 0.86 * h,
            x: self.data.x_bounds(),
            y: self.data.y_bounds(),
        };
        let color = hex_rgb(self.kind.color());

        let mut svg = String::new();
        let _ = write!(
            svg,
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##
        );
        let _ = write!(
            svg,
            r##"<rect width="{w}" height="{h}" fill="{}"/>"##,
            hex_rgb(self.theme.chart_bg)
        );
        self.write_axes(&mut svg, &plot, s);

        let revealed = self.revealed(local_time);
        let full = (revealed.floor() as usize).min(self.data.len());
        let frac = revealed - full as f64;
        let points: Vec<(f64, f64)> = self
            .data
            .years
            .iter()
            .zip(&self.data.values)
            .map(|(&x, &y)| (plot.px(x), plot.py(y)))
            .collect();
        let lead = (frac > 1e-9 && full < points.len()).then(|| points[full]);

        match self.kind {
            ChartKind::Line => {
                let mut path: Vec<(f64, f64)> = points[..full].to_vec();
                let last = path.last().copied();
                if let (Some(next), Some(last)) = (lead, last) {
                    path.push((
                        last.0 + (next.0 - last.0) * frac,
                        last.1 + (next.1 - last.1) * frac,
                    ));
                }
                if path.len() > 1 {
                    let pts: Vec<String> =
                        path.iter().map(|(x, y)| format!("{x:.2},{y:.2}")).collect();
                    let _ = write!(
                        svg,
                        r##"<polyline points="{}" fill="none" stroke="{color}" stroke-width="{:.2}" stroke-linejoin="round"/>"##,
                        pts.join(" "),
                        3.0 * s
                    );
                }
                for (x, y) in &points[..full] {
                    let _ = write!(
                        svg,
                        r##"<circle cx="{x:.2}" cy="{y:.2}" r="{:.2}" fill="{color}"/>"##,
                        6.0 * s
                    );
                }
            }
            ChartKind::Bar => {
                let half = 0.4 * (plot.px(1.0) - plot.px(0.0)).abs();
                let base = plot.py(plot.y.0.max(0.0).min(plot.y.1));
                for (i, (x, y)) in points.iter().enumerate().take(full + 1) {
                    let grow = if i < full {
                        1.0
                    } else if lead.is_some() {
                        frac
                    } else {
                        break;
                    };
                    let top = base + (y - base) * grow;
                    let _ = write!(
                        svg,
                        r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{color}"/>"##,
                        x - half,
                        top.min(base),
                        2.0 * half,
                        (base - top).abs()
                    );
                }
            }
            ChartKind::Scatter => {
                for (i, (x, y)) in points.iter().enumerate().take(full + 1) {
                    let opacity = if i < full {
                        1.0
                    } else if lead.is_some() {
                        frac
                    } else {
                        break;
                    };
                    let _ = write!(
                        svg,
                        r##"<circle cx="{x:.2}" cy="{y:.2}" r="{:.2}" fill="{color}" fill-opacity="{opacity:.4}"/>"##,
                        10.0 * s
                    );
                }
            }
        }

        svg.push_str("</svg>");
        svg
    }

    fn write_axes(&self, svg: &mut String, plot: &PlotArea, s: f64) {
        let axis = "#555555";
        let _ = write!(
            svg,
            r##"<path d="M{l:.2},{t:.2} L{l:.2},{b:.2} L{r:.2},{b:.2}" fill="none" stroke="{axis}" stroke-width="{:.2}"/>"##,
            1.5 * s,
            l = plot.left,
            t = plot.top,
            b = plot.bottom,
            r = plot.right,
        );

        let n = self.data.len();
        let step = n.div_ceil(12).max(1);
        for year in self.data.years.iter().step_by(step) {
            let _ = write!(
                svg,
                r##"<text x="{:.2}" y="{:.2}" font-family="sans-serif" font-size="{:.1}" fill="{axis}" text-anchor="middle">{}</text>"##,
                plot.px(*year),
                plot.bottom + 22.0 * s,
                14.0 * s,
                format_tick(*year)
            );
        }
        for k in 0..=4 {
            let v = plot.y.0 + (plot.y.1 - plot.y.0) * f64::from(k) / 4.0;
            let y = plot.py(v);
            let _ = write!(
                svg,
                r##"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="#cccccc" stroke-width="{:.2}"/>"##,
                plot.left,
                plot.right,
                1.0 * s
            );
            let _ = write!(
                svg,
                r##"<text x="{:.2}" y="{:.2}" font-family="sans-serif" font-size="{:.1}" fill="{axis}" text-anchor="end">{}</text>"##,
                plot.left - 8.0 * s,
                y + 5.0 * s,
                14.0 * s,
                format_tick(v)
            );
        }

        let _ = write!(
            svg,
            r##"<text x="{:.2}" y="{:.2}" font-family="sans-serif" font-size="{:.1}" fill="{axis}" text-anchor="middle">Year</text>"##,
            0.5 * (plot.left + plot.right),
            plot.bottom + 52.0 * s,
            17.0 * s
        );
        let (vx, vy) = (plot.left - 62.0 * s, 0.5 * (plot.top + plot.bottom));
        let _ = write!(
            svg,
            r##"<text x="{vx:.2}" y="{vy:.2}" font-family="sans-serif" font-size="{:.1}" fill="{axis}" text-anchor="middle" transform="rotate(-90 {vx:.2} {vy:.2})">Value</text>"##,
            17.0 * s
        );
        let _ = write!(
            svg,
            r##"<text x="{:.2}" y="{:.2}" font-family="sans-serif" font-size="{:.1}" fill="#222222" text-anchor="middle">{}</text>"##,
            0.5 * (plot.left + plot.right),
            plot.top - 24.0 * s,
            22.0 * s,
            escape_xml(&self.title)
        );
    }
}

impl FrameProvider for ChartProvider {
    fn get_frame(&self, _scene_id: &str, local_time: f64) -> ChartreelResult<FrameRGBA> {
        self.raster.rasterize(&self.svg_at(local_time), self.canvas)
    }

    fn settled_after(&self) -> Option<f64> {
        Some(self.reveal_secs)
    }
}

struct PlotArea {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
    x: (f64, f64),
    y: (f64, f64),
}

impl PlotArea {
    fn px(&self, x: f64) -> f64 {
        self.left + (x - self.x.0) / (self.x.1 - self.x.0) * (self.right - self.left)
    }

    fn py(&self, y: f64) -> f64 {
        self.bottom - (y - self.y.0) / (self.y.1 - self.y.0) * (self.bottom - self.top)
    }
}

fn format_tick(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/provider/builtin.rs"]
mod tests;
