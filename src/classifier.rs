//! Plot-kind detection over sanitized source text.
//!
//! Pure pattern matching: the generated code is never parsed, only scanned
//! for the handful of markers that decide projection and canvas size.

use once_cell::sync::Lazy;
use regex::Regex;

/// Method names that only appear in 3D plotting code.
const THREE_D_MARKERS: &[&str] = &["set_zlabel", "plot3D", "scatter3D", "plot_surface"];

static PROJECTION_3D: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"projection\s*=\s*['"]3d['"]"#).unwrap());

static PROJECTION_POLAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"projection\s*=\s*['"]polar['"]"#).unwrap());

static FIGSIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"figsize\s*=\s*\(\s*([0-9]+(?:\.[0-9]+)?)\s*,\s*([0-9]+(?:\.[0-9]+)?)\s*\)")
        .unwrap()
});

/// Derived shape of the figure the pipeline will create.
///
/// `is_3d` and `is_polar` are mutually exclusive; when markers for both are
/// present, 3D wins (an axes region has exactly one projection).
#[derive(Debug, Clone, PartialEq)]
pub struct PlotShape {
    pub is_3d: bool,
    pub is_polar: bool,
    /// Explicit `figsize=(w, h)` found in the raw source, if any
    pub figure_size: Option<(f64, f64)>,
}

impl PlotShape {
    /// Effective canvas size: the explicit directive when present, otherwise
    /// a per-projection default.
    pub fn figure_size_or_default(&self) -> (f64, f64) {
        if let Some(size) = self.figure_size {
            return size;
        }
        if self.is_3d {
            (10.0, 8.0)
        } else if self.is_polar {
            (8.0, 8.0)
        } else {
            (10.0, 6.0)
        }
    }
}

/// Classify generated source into a [`PlotShape`].
///
/// Deterministic for identical input; no side effects.
pub fn classify(source: &str) -> PlotShape {
    let is_3d = THREE_D_MARKERS.iter().any(|m| source.contains(m))
        || PROJECTION_3D.is_match(source);
    let is_polar = !is_3d && PROJECTION_POLAR.is_match(source);

    PlotShape {
        is_3d,
        is_polar,
        figure_size: extract_figure_size(source),
    }
}

/// Pull an explicit `figsize=(w, h)` directive out of raw source text.
///
/// Run against the text *before* sanitization: the directive usually rides
/// on a `plt.figure(...)` line that the sanitizer strips. Unparseable
/// numbers are treated as absent.
pub fn extract_figure_size(source: &str) -> Option<(f64, f64)> {
    let caps = FIGSIZE.captures(source)?;
    let width = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let height = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some((width, height))
}
