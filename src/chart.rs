//! Minimal SVG chart renderer: line series, shaded bands and stacked bars on one plot.
//! Output is a self-contained `<svg>` element that pages inline and `/charts` serves directly.

use std::fmt::Write;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 540.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 190.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 56.0;

/// Matplotlib's `tab20c`; fuel sources pick evenly spaced entries from it.
const TAB20C: [&str; 20] = [
    "#3182bd", "#6baed6", "#9ecae1", "#c6dbef", "#e6550d", "#fd8d3c", "#fdae6b", "#fdd0a2",
    "#31a354", "#74c476", "#a1d99b", "#c7e9c0", "#756bb1", "#9e9ac8", "#bcbddc", "#dadaeb",
    "#636363", "#969696", "#bdbdbd", "#d9d9d9",
];

/// Default line cycle, used for the per-year lines.
const TAB10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Color for entry `idx` of `len` fuel sources, resampling tab20c to `len` colors.
pub fn fuel_color(idx: usize, len: usize) -> &'static str {
    if len <= 1 {
        return TAB20C[0];
    }
    let x = idx as f64 / (len - 1) as f64;
    let slot = ((x * TAB20C.len() as f64) as usize).min(TAB20C.len() - 1);
    TAB20C[slot]
}

pub fn cycle_color(idx: usize) -> &'static str {
    TAB10[idx % TAB10.len()]
}

#[derive(Clone, Debug)]
pub struct Axis {
    pub title: String,
    pub min: f64,
    pub max: f64,
    pub ticks: Vec<(f64, String)>,
}

#[derive(Clone, Debug)]
pub struct LineSeries {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    pub dashed: bool,
}

#[derive(Clone, Debug)]
pub struct Band {
    pub label: String,
    /// `(x, lower, upper)`
    pub points: Vec<(f64, f64, f64)>,
    pub color: String,
}

#[derive(Clone, Debug)]
pub struct BarLayer {
    pub label: String,
    pub color: String,
    /// `(x, bottom, top)`
    pub segments: Vec<(f64, f64, f64)>,
}

#[derive(Clone, Debug)]
pub struct Chart {
    pub title: String,
    pub x: Axis,
    pub y_title: String,
    pub legend_title: String,
    pub lines: Vec<LineSeries>,
    pub bands: Vec<Band>,
    pub bars: Vec<BarLayer>,
    pub bar_width: f64,
    pub note: Option<String>,
}

impl Chart {
    pub fn new(title: impl Into<String>, x: Axis, y_title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x,
            y_title: y_title.into(),
            legend_title: String::new(),
            lines: Vec::new(),
            bands: Vec::new(),
            bars: Vec::new(),
            bar_width: 1.0,
            note: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.points.is_empty())
            && self.bands.iter().all(|b| b.points.is_empty())
            && self.bars.iter().all(|b| b.segments.is_empty())
    }

    /// Data extent on the y axis. Bars always start from zero.
    fn y_extent(&self) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        let mut include = |v: f64| {
            if v.is_finite() {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        };
        for line in &self.lines {
            line.points.iter().for_each(|&(_, y)| include(y));
        }
        for band in &self.bands {
            band.points.iter().for_each(|&(_, l, u)| {
                include(l);
                include(u);
            });
        }
        if self.bars.iter().any(|b| !b.segments.is_empty()) {
            include(0.0);
        }
        for bar in &self.bars {
            bar.segments.iter().for_each(|&(_, b, t)| {
                include(b);
                include(t);
            });
        }
        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        if (hi - lo).abs() < f64::EPSILON {
            return (lo - 1.0, hi + 1.0);
        }
        let pad = (hi - lo) * 0.05;
        let lo = if lo >= 0.0 && lo - pad < 0.0 { 0.0 } else { lo - pad };
        (lo, hi + pad)
    }

    pub fn render_svg(&self) -> String {
        let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let (y_min, y_max) = self.y_extent();
        let y_ticks = nice_ticks(y_min, y_max, 6);
        let (y_min, y_max) = match (y_ticks.first(), y_ticks.last()) {
            (Some(&first), Some(&last)) => (first.min(y_min), last.max(y_max)),
            _ => (y_min, y_max),
        };
        let x_span = (self.x.max - self.x.min).max(f64::EPSILON);
        let sx = |x: f64| MARGIN_LEFT + (x - self.x.min) / x_span * plot_w;
        let sy = |y: f64| MARGIN_TOP + plot_h - (y - y_min) / (y_max - y_min) * plot_h;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" class="chart" role="img" aria-label="{title}">"#,
            title = escape(&self.title)
        );
        svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="26" text-anchor="middle" font-size="18" font-weight="600">{title}</text>"#,
            x = MARGIN_LEFT + plot_w / 2.0,
            title = escape(&self.title)
        );
        svg.push_str(r#"<defs><clipPath id="plot"><rect x="80" y="44" width="690" height="440"/></clipPath></defs>"#);

        // Grid and axes.
        for &tick in &y_ticks {
            let y = sy(tick);
            let _ = write!(
                svg,
                r##"<line x1="{x1:.1}" y1="{y:.1}" x2="{x2:.1}" y2="{y:.1}" stroke="#e5e5e5"/><text x="{tx:.1}" y="{ty:.1}" text-anchor="end" font-size="11">{label}</text>"##,
                x1 = MARGIN_LEFT,
                x2 = MARGIN_LEFT + plot_w,
                tx = MARGIN_LEFT - 6.0,
                ty = y + 4.0,
                label = format_tick(tick)
            );
        }
        for (tick, label) in &self.x.ticks {
            if *tick < self.x.min || *tick > self.x.max {
                continue;
            }
            let x = sx(*tick);
            let _ = write!(
                svg,
                r##"<line x1="{x:.1}" y1="{y1:.1}" x2="{x:.1}" y2="{y2:.1}" stroke="#e5e5e5"/><text x="{x:.1}" y="{ty:.1}" text-anchor="middle" font-size="11">{label}</text>"##,
                y1 = MARGIN_TOP,
                y2 = MARGIN_TOP + plot_h,
                ty = MARGIN_TOP + plot_h + 16.0,
                label = escape(label)
            );
        }
        let _ = write!(
            svg,
            r##"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w}" height="{plot_h}" fill="none" stroke="#999"/>"##
        );
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" font-size="13">{title}</text>"#,
            x = MARGIN_LEFT + plot_w / 2.0,
            y = HEIGHT - 14.0,
            title = escape(&self.x.title)
        );
        let _ = write!(
            svg,
            r#"<text x="18" y="{y:.1}" text-anchor="middle" font-size="13" transform="rotate(-90 18 {y:.1})">{title}</text>"#,
            y = MARGIN_TOP + plot_h / 2.0,
            title = escape(&self.y_title)
        );

        svg.push_str(r#"<g clip-path="url(#plot)">"#);
        for band in &self.bands {
            if band.points.is_empty() {
                continue;
            }
            let upper = band.points.iter().map(|&(x, _, u)| format!("{:.1},{:.1}", sx(x), sy(u)));
            let lower = band
                .points
                .iter()
                .rev()
                .map(|&(x, l, _)| format!("{:.1},{:.1}", sx(x), sy(l)));
            let points: Vec<String> = upper.chain(lower).collect();
            let _ = write!(
                svg,
                r#"<polygon points="{}" fill="{}" fill-opacity="0.2" stroke="none"/>"#,
                points.join(" "),
                band.color
            );
        }

        let bar_px = (self.bar_width / x_span * plot_w).max(1.0);
        for layer in &self.bars {
            for &(x, bottom, top) in &layer.segments {
                if top <= bottom {
                    continue;
                }
                let _ = write!(
                    svg,
                    r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" fill-opacity="0.85"/>"#,
                    sx(x) - bar_px / 2.0,
                    sy(top),
                    bar_px,
                    sy(bottom) - sy(top),
                    layer.color
                );
            }
        }

        for line in &self.lines {
            if line.points.is_empty() {
                continue;
            }
            let points: Vec<String> = line
                .points
                .iter()
                .filter(|(_, y)| y.is_finite())
                .map(|&(x, y)| format!("{:.1},{:.1}", sx(x), sy(y)))
                .collect();
            let dash = if line.dashed { r#" stroke-dasharray="6,4""# } else { "" };
            let _ = write!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="{}" stroke-opacity="{}"{dash}/>"#,
                points.join(" "),
                line.color,
                line.width,
                line.opacity
            );
        }
        svg.push_str("</g>");

        if self.is_empty() || self.note.is_some() {
            let note = self.note.as_deref().unwrap_or("No data");
            let _ = write!(
                svg,
                r##"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" font-size="16" fill="#666">{note}</text>"##,
                x = MARGIN_LEFT + plot_w / 2.0,
                y = MARGIN_TOP + plot_h / 2.0,
                note = escape(note)
            );
        }

        self.render_legend(&mut svg);
        svg.push_str("</svg>");
        svg
    }

    fn render_legend(&self, svg: &mut String) {
        let entries: Vec<(&str, &str, bool)> = self
            .bars
            .iter()
            .map(|b| (b.label.as_str(), b.color.as_str(), true))
            .chain(self.bands.iter().map(|b| (b.label.as_str(), b.color.as_str(), true)))
            .chain(self.lines.iter().map(|l| (l.label.as_str(), l.color.as_str(), false)))
            .filter(|(label, _, _)| !label.is_empty())
            .collect();
        if entries.is_empty() {
            return;
        }
        let x = WIDTH - MARGIN_RIGHT + 14.0;
        let mut y = MARGIN_TOP + 4.0;
        if !self.legend_title.is_empty() {
            let _ = write!(
                svg,
                r#"<text x="{x:.1}" y="{y:.1}" font-size="12" font-weight="600">{}</text>"#,
                escape(&self.legend_title)
            );
            y += 18.0;
        }
        for (label, color, filled) in entries {
            if filled {
                let _ = write!(
                    svg,
                    r#"<rect x="{x:.1}" y="{:.1}" width="14" height="10" fill="{color}"/>"#,
                    y - 9.0
                );
            } else {
                let _ = write!(
                    svg,
                    r#"<line x1="{x:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{color}" stroke-width="3"/>"#,
                    y - 4.0,
                    x + 14.0,
                    y - 4.0
                );
            }
            let _ = write!(
                svg,
                r#"<text x="{:.1}" y="{y:.1}" font-size="11">{}</text>"#,
                x + 20.0,
                escape(label)
            );
            y += 16.0;
        }
    }
}

/// Evenly spaced "nice" tick values (1, 2, 5 × 10^k steps) covering `[lo, hi]`.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    if !(hi > lo) || target == 0 {
        return vec![lo];
    }
    let raw = (hi - lo) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let first = (lo / step).floor() * step;
    let mut ticks = Vec::new();
    let mut t = first;
    while t <= hi + step * 0.5 {
        ticks.push(t);
        if t >= hi {
            break;
        }
        t += step;
    }
    ticks
}

fn format_tick(v: f64) -> String {
    if v.abs() >= 1000.0 || v.fract().abs() < 1e-9 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
