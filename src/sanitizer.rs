//! Denylist filter over generated plotting code.
//!
//! Substring matching, not parsing: a variable named `reopen` is a false
//! positive and an aliased import slips through. The denylist is a guardrail
//! for honest model output; real isolation comes from the rendering
//! subprocess limits.

use tracing::warn;

use crate::errors::{GraphError, Result};

/// Modules the generated code must not import.
const FORBIDDEN_IMPORTS: &[&str] = &["os", "sys", "subprocess", "eval", "exec"];

/// Calls that reject the whole input when they appear anywhere in a line.
const FORBIDDEN_CALLS: &[&str] = &["eval", "exec", "open"];

/// Figure-lifecycle commands the pipeline owns; matching lines are dropped,
/// not rejected, so model output that sets its own figure size still renders.
const STRIPPED_COMMANDS: &[&str] = &["plt.figure", "plt.show", "plt.close"];

/// Validate generated source and strip figure-lifecycle lines.
///
/// Fails with [`GraphError::Validation`] on the first forbidden import or
/// dangerous call; never returns partially filtered text in that case.
pub fn sanitize(source: &str) -> Result<String> {
    let kept: Vec<&str> = source
        .lines()
        .filter(|line| !STRIPPED_COMMANDS.iter().any(|cmd| line.contains(cmd)))
        .collect();

    for line in &kept {
        for module in FORBIDDEN_IMPORTS {
            if line.contains(&format!("import {module}")) || line.contains(&format!("from {module}"))
            {
                warn!("forbidden import detected: {module}");
                return Err(GraphError::Validation(format!(
                    "forbidden import detected: {module}"
                )));
            }
        }

        if FORBIDDEN_CALLS.iter().any(|call| line.contains(call)) {
            warn!("potentially dangerous function call detected");
            return Err(GraphError::Validation(
                "potentially dangerous function calls detected".to_string(),
            ));
        }
    }

    Ok(kept.join("\n"))
}
