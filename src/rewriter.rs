//! Textual normalization of axis-handle references.
//!
//! Generated code is told to draw on "the current axes"; the pipeline owns
//! the axes it actually renders to, so every `plt.gca(...)` is rewritten to
//! the injected `ax` handle. Substitution is textual, not semantic; code
//! that reaches the current axes through an alias is not rewritten.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::classifier::PlotShape;

static CURRENT_AXES: Lazy<Regex> = Lazy::new(|| Regex::new(r"plt\.gca\([^)]*\)").unwrap());

/// Rewrite current-axes references so the code binds to the pipeline's
/// axes handle. Figure-creation lines were already removed by the sanitizer.
pub fn rewrite(source: &str, shape: &PlotShape) -> String {
    debug!(
        is_3d = shape.is_3d,
        is_polar = shape.is_polar,
        "rewriting axis references"
    );
    CURRENT_AXES.replace_all(source, "ax").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    fn rewrite_plain(source: &str) -> String {
        rewrite(source, &classify(source))
    }

    #[test]
    fn gca_call_becomes_ax() {
        assert_eq!(rewrite_plain("axes = plt.gca()"), "axes = ax");
    }

    #[test]
    fn gca_with_arguments_is_consumed() {
        assert_eq!(
            rewrite_plain("axes = plt.gca(projection='polar')"),
            "axes = ax"
        );
    }

    #[test]
    fn all_occurrences_are_replaced() {
        let source = "plt.gca().set_title('a')\nplt.gca().plot(x, y)";
        assert_eq!(rewrite_plain(source), "ax.set_title('a')\nax.plot(x, y)");
    }

    #[test]
    fn code_without_gca_is_untouched() {
        let source = "ax.plot(x, y)";
        assert_eq!(rewrite_plain(source), source);
    }
}
