//! Guarded subprocess execution of rewritten plotting code.
//!
//! The generated source never runs in this process. A wrapper script is
//! written to a scratch workspace together with the source; the wrapper
//! forces the Agg backend, installs an import denylist hook, creates the
//! figure and axes the pipeline owns, executes the source against a
//! namespace of exactly `plt`, `np` and `ax`, and ships the rendered PNG
//! back over stdout as base64 between fixed markers. The figure is closed
//! on every exit path and the whole interpreter dies with the subprocess,
//! so no canvas state survives a failed render.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::classifier::PlotShape;
use crate::config::ResourceLimits;
use crate::errors::{GraphError, Result};

const PNG_START: &str = "PLOT_PNG_START";
const PNG_END: &str = "PLOT_PNG_END";
const ERROR_START: &str = "PLOT_ERROR_START";
const ERROR_END: &str = "PLOT_ERROR_END";

/// Rendering seam: turns rewritten source + shape into PNG bytes.
#[async_trait]
pub trait PlotRenderer: Send + Sync {
    async fn render(&self, source: &str, shape: &PlotShape) -> Result<Vec<u8>>;
}

/// Production renderer backed by a resource-limited Python subprocess.
pub struct PythonPlotRenderer {
    python_path: PathBuf,
    limits: ResourceLimits,
}

impl PythonPlotRenderer {
    /// Create a renderer, resolving the interpreter from PATH.
    pub fn new() -> Result<Self> {
        let python_path = which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| GraphError::PythonNotFound)?;
        Ok(Self {
            python_path,
            limits: ResourceLimits::default(),
        })
    }

    /// Create with an explicit interpreter path (bundled Python).
    pub fn with_python_path(python_path: PathBuf) -> Result<Self> {
        if !python_path.exists() {
            return Err(GraphError::PythonNotFound);
        }
        Ok(Self {
            python_path,
            limits: ResourceLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn python_path(&self) -> &PathBuf {
        &self.python_path
    }

    /// Build the wrapper script for one execution.
    ///
    /// The import hook is installed only around the user code: the wrapper's
    /// own matplotlib/numpy imports must run unhooked, and restoring before
    /// `savefig` keeps renderer-internal imports working.
    fn wrapper_script(shape: &PlotShape) -> String {
        let (width, height) = shape.figure_size_or_default();
        let projection = if shape.is_3d {
            ", projection='3d'"
        } else if shape.is_polar {
            ", projection='polar'"
        } else {
            ""
        };

        format!(
            r#"
import sys
import builtins

BLACKLIST = {{'os', 'subprocess', 'socket', 'shutil', 'ctypes', 'urllib', 'requests', 'pty', 'fcntl'}}

original_import = builtins.__import__

def guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if level > 0:
        return original_import(name, globals, locals, fromlist, level)
    root = name.split('.')[0]
    if root in BLACKLIST:
        raise ImportError(f"module '{{root}}' is not allowed")
    return original_import(name, globals, locals, fromlist, level)

import matplotlib
matplotlib.use('Agg')
import matplotlib.pyplot as plt
import numpy as np
import base64
import io

with open(sys.argv[1], 'r', encoding='utf-8') as fh:
    source = fh.read()

fig = plt.figure(figsize=({width}, {height}))
try:
    ax = fig.add_subplot(111{projection})
    namespace = {{'plt': plt, 'np': np, 'ax': ax}}
    builtins.__import__ = guarded_import
    try:
        exec(compile(source, '<generated>', 'exec'), namespace)
    except Exception as exc:
        print('{error_start}')
        print(f'{{type(exc).__name__}}: {{exc}}')
        print('{error_end}')
        sys.exit(1)
    finally:
        builtins.__import__ = original_import
    buf = io.BytesIO()
    fig.savefig(buf, format='png', dpi=100, bbox_inches='tight')
    print('{png_start}')
    print(base64.b64encode(buf.getvalue()).decode('ascii'))
    print('{png_end}')
finally:
    plt.close(fig)
"#,
            width = width,
            height = height,
            projection = projection,
            error_start = ERROR_START,
            error_end = ERROR_END,
            png_start = PNG_START,
            png_end = PNG_END,
        )
    }

    #[cfg(unix)]
    fn apply_resource_limits(&self, cmd: &mut Command) {
        let cpu_seconds = self.limits.cpu_seconds;
        #[cfg(not(target_os = "macos"))]
        let memory_bytes = self.limits.memory_mb * 1024 * 1024;
        #[cfg(not(target_os = "macos"))]
        let max_processes = self.limits.max_processes;

        unsafe {
            cmd.pre_exec(move || {
                // New process group so a timeout kill takes children too
                libc::setpgid(0, 0);

                // macOS does not honor RLIMIT_AS / RLIMIT_NPROC properly
                #[cfg(not(target_os = "macos"))]
                {
                    let rlimit = libc::rlimit {
                        rlim_cur: memory_bytes as libc::rlim_t,
                        rlim_max: memory_bytes as libc::rlim_t,
                    };
                    if libc::setrlimit(libc::RLIMIT_AS, &rlimit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                let rlimit = libc::rlimit {
                    rlim_cur: cpu_seconds as libc::rlim_t,
                    rlim_max: cpu_seconds as libc::rlim_t,
                };
                if libc::setrlimit(libc::RLIMIT_CPU, &rlimit) != 0 {
                    return Err(std::io::Error::last_os_error());
                }

                #[cfg(not(target_os = "macos"))]
                {
                    let rlimit = libc::rlimit {
                        rlim_cur: max_processes as libc::rlim_t,
                        rlim_max: max_processes as libc::rlim_t,
                    };
                    if libc::setrlimit(libc::RLIMIT_NPROC, &rlimit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                Ok(())
            });
        }
    }

    #[cfg(not(unix))]
    fn apply_resource_limits(&self, _cmd: &mut Command) {
        // Non-unix platforms rely on the wall-clock timeout only
    }
}

/// Extract the text between two stdout markers, if both are present.
fn extract_between<'a>(stdout: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let begin = stdout.find(start)? + start.len();
    let finish = stdout[begin..].find(end)? + begin;
    Some(stdout[begin..finish].trim())
}

#[async_trait]
impl PlotRenderer for PythonPlotRenderer {
    async fn render(&self, source: &str, shape: &PlotShape) -> Result<Vec<u8>> {
        // Scratch workspace holding the wrapper and the source; removed on drop
        let workspace = tempfile::Builder::new().prefix("plotbot-").tempdir()?;
        let runner_path = workspace.path().join("runner.py");
        let source_path = workspace.path().join("plot_source.py");
        tokio::fs::write(&runner_path, Self::wrapper_script(shape)).await?;
        tokio::fs::write(&source_path, source).await?;

        let mut cmd = Command::new(&self.python_path);
        cmd.arg(&runner_path)
            .arg(&source_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PYTHONIOENCODING", "utf-8")
            .env("MPLBACKEND", "Agg")
            .env("OMP_NUM_THREADS", self.limits.max_threads.to_string())
            .env("OPENBLAS_NUM_THREADS", self.limits.max_threads.to_string())
            .env("MKL_NUM_THREADS", self.limits.max_threads.to_string());

        self.apply_resource_limits(&mut cmd);

        let child = cmd.spawn()?;
        let pid = child.id();

        let output = match tokio::time::timeout(self.limits.timeout, child.wait_with_output()).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("plot execution exceeded {:?}, killing", self.limits.timeout);
                #[cfg(unix)]
                {
                    if let Some(pid) = pid {
                        unsafe {
                            libc::kill(-(pid as i32), libc::SIGKILL);
                        }
                    }
                }
                #[cfg(not(unix))]
                let _ = pid;
                return Err(GraphError::Timeout);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if let Some(message) = extract_between(&stdout, ERROR_START, ERROR_END) {
            return Err(GraphError::Execution(message.to_string()));
        }

        if let Some(encoded) = extract_between(&stdout, PNG_START, PNG_END) {
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| GraphError::Execution(format!("invalid image payload: {e}")))?;
            info!("rendered plot ({} bytes)", bytes.len());
            return Ok(bytes);
        }

        if stderr.contains("MemoryError") {
            return Err(GraphError::Execution("memory limit exceeded".to_string()));
        }
        let detail = stderr.trim();
        if detail.is_empty() {
            return Err(GraphError::Execution(format!(
                "plot process exited with {}",
                output.status
            )));
        }
        Err(GraphError::Execution(detail.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    #[test]
    fn wrapper_uses_default_2d_subplot() {
        let script = PythonPlotRenderer::wrapper_script(&classify("ax.plot(x, y)"));
        assert!(script.contains("fig.add_subplot(111)"));
        assert!(script.contains("figsize=(10, 6)"));
    }

    #[test]
    fn wrapper_selects_3d_projection() {
        let script = PythonPlotRenderer::wrapper_script(&classify("ax.plot3D(x, y, z)"));
        assert!(script.contains("projection='3d'"));
        assert!(script.contains("figsize=(10, 8)"));
    }

    #[test]
    fn wrapper_selects_polar_projection() {
        let script =
            PythonPlotRenderer::wrapper_script(&classify("ax = plt.gca(projection='polar')"));
        assert!(script.contains("projection='polar'"));
    }

    #[test]
    fn wrapper_honors_explicit_figsize() {
        let script = PythonPlotRenderer::wrapper_script(&classify("figsize=(12, 7)\nax.plot(x)"));
        assert!(script.contains("figsize=(12, 7)"));
    }

    #[test]
    fn wrapper_namespace_is_exactly_three_names() {
        let script = PythonPlotRenderer::wrapper_script(&classify("ax.plot(x, y)"));
        assert!(script.contains("namespace = {'plt': plt, 'np': np, 'ax': ax}"));
        assert!(script.contains("plt.close(fig)"));
    }

    #[test]
    fn marker_extraction() {
        let stdout = format!("noise\n{PNG_START}\nYWJj\n{PNG_END}\n");
        assert_eq!(extract_between(&stdout, PNG_START, PNG_END), Some("YWJj"));
        assert_eq!(extract_between("no markers", PNG_START, PNG_END), None);
    }

    #[test]
    fn marker_extraction_requires_closing_marker() {
        let stdout = format!("{ERROR_START}\nNameError: x");
        assert_eq!(extract_between(&stdout, ERROR_START, ERROR_END), None);
    }

    // Requires a system python3 with matplotlib + numpy installed.
    #[tokio::test]
    #[ignore]
    async fn renders_a_real_line_plot() {
        let renderer = PythonPlotRenderer::new().unwrap();
        let source = "ax.plot([0, 1, 2], [0, 1, 4])\nax.set_title('squares')";
        let shape = classify(source);
        let bytes = renderer.render(source, &shape).await.unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    // Requires a system python3 with matplotlib + numpy installed.
    #[tokio::test]
    #[ignore]
    async fn runtime_error_is_reported_not_raised() {
        let renderer = PythonPlotRenderer::new().unwrap();
        let source = "ax.plot(undefined_name)";
        let shape = classify(source);
        let err = renderer.render(source, &shape).await.unwrap_err();
        assert!(matches!(err, GraphError::Execution(_)));
        assert!(err.to_string().contains("NameError"));
    }
}
