//! Render-through flow for diagrams.
//!
//! The cache is passive: callers look it up, render on a miss, and store the
//! result. [`render_cached`] packages that sequence. Render failures reach the
//! caller; cache failures never do.

mod mermaid;

use std::io;
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{Clock, DiagramCache, SessionStorage};

pub use mermaid::MermaidCliRenderer;

pub(crate) const METRIC_RENDER_MS: &str = "mermaid_render_ms";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("diagram source is empty")]
    EmptySource,
    #[error("failed to stage diagram files: {0}")]
    Io(io::Error),
    #[error("mermaid CLI invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("mermaid CLI unavailable: {0}")]
    NotFound(io::Error),
    #[error("failed to read rendered SVG: {0}")]
    Read(io::Error),
    #[error("render task aborted: {0}")]
    Join(String),
}

/// Turns diagram source text into SVG markup.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, source: &str) -> Result<String, RenderError>;
}

/// SVG for a diagram and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub svg: String,
    pub from_cache: bool,
}

/// Serve `source` from `cache`, rendering and storing it on a miss.
pub async fn render_cached<S, C, R>(
    cache: &DiagramCache<S, C>,
    renderer: &R,
    source: &str,
) -> Result<RenderedDiagram, RenderError>
where
    S: SessionStorage,
    C: Clock,
    R: DiagramRenderer + ?Sized,
{
    if source.trim().is_empty() {
        return Err(RenderError::EmptySource);
    }

    if let Some(svg) = cache.get(source) {
        return Ok(RenderedDiagram {
            svg,
            from_cache: true,
        });
    }

    let started_at = Instant::now();
    let svg = match renderer.render(source).await {
        Ok(svg) => svg,
        Err(err) => {
            warn!(
                target = "application::render",
                op = "render::render_cached",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Diagram render failed"
            );
            return Err(err);
        }
    };
    histogram!(METRIC_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

    cache.set(source, &svg);
    info!(
        target = "application::render",
        op = "render::render_cached",
        result = "rendered",
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        svg_bytes = svg.len(),
        "Diagram rendered and cached"
    );

    Ok(RenderedDiagram {
        svg,
        from_cache: false,
    })
}
