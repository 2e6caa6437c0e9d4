//! Render job specification and metadata.
//!
//! This module defines the structures for offline rendering jobs: the job
//! spec itself, the metadata written next to rendered frames, and structured
//! render errors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::visualiser::VisualiserConfig;

/// Default FPS for rendering.
fn default_fps() -> f32 {
    60.0
}

/// Default duration in seconds.
fn default_duration() -> f32 {
    2.0
}

/// Default output width.
fn default_width() -> u32 {
    800
}

/// Default output height.
fn default_height() -> u32 {
    600
}

/// Specification for a single render job.
/// Contains all information needed to deterministically render a sequence of frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJobSpec {
    /// Output directory for frames.
    pub output_dir: PathBuf,

    /// Frames per second.
    #[serde(default = "default_fps")]
    pub fps: f32,

    /// Duration in seconds.
    #[serde(default = "default_duration")]
    pub duration: f32,

    /// Output width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Graph settings for the render.
    #[serde(default)]
    pub graph: VisualiserConfig,
}

impl RenderJobSpec {
    /// Create a new render job spec with default settings.
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            fps: default_fps(),
            duration: default_duration(),
            width: default_width(),
            height: default_height(),
            graph: VisualiserConfig::default(),
        }
    }

    /// Load a job spec from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read job file {:?}: {}", path, e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse job file {:?}: {}", path, e))
    }

    /// Validate the job specification.
    pub fn validate(&self) -> Result<(), String> {
        if self.fps <= 0.0 {
            return Err("FPS must be positive".to_string());
        }
        if self.duration <= 0.0 {
            return Err("Duration must be positive".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("Width and height must be positive".to_string());
        }
        if self.graph.resolution == 0 {
            return Err("Resolution must be at least 1".to_string());
        }
        if self.graph.spawn_budget == Some(0) {
            return Err("Spawn budget must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn total_frames(&self) -> usize {
        (self.duration * self.fps).ceil() as usize
    }

    /// SHA-256 of the job's canonical JSON form.
    pub fn hash(&self) -> Result<String, String> {
        let json = serde_json::to_vec(self).map_err(|e| format!("Failed to serialize job: {}", e))?;
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Metadata for a completed render.
/// Written as metadata.json alongside rendered frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    /// The job specification used.
    pub job: RenderJobSpec,

    /// Timestamp when render started (ISO 8601).
    pub started_at: DateTime<Utc>,

    /// Timestamp when render completed (ISO 8601).
    pub completed_at: DateTime<Utc>,

    /// Total render duration in seconds.
    pub render_duration_secs: f64,

    /// Total frames rendered.
    pub frame_count: usize,

    /// Average rendering FPS (frames / render_duration).
    pub average_render_fps: f64,

    /// SHA-256 hash of the job spec.
    pub job_hash: String,

    /// Crate version that produced the frames.
    pub version: String,

    /// GPU adapter info.
    pub gpu_adapter: String,

    /// Any warnings or issues during render.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RenderMetadata {
    /// Save metadata to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize metadata: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write metadata: {}", e))
    }
}

/// Render phase for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Initialization,
    GpuSetup,
    FrameRender,
    FrameSave,
    MetadataSave,
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderPhase::Initialization => write!(f, "Initialization"),
            RenderPhase::GpuSetup => write!(f, "GPU Setup"),
            RenderPhase::FrameRender => write!(f, "Frame Render"),
            RenderPhase::FrameSave => write!(f, "Frame Save"),
            RenderPhase::MetadataSave => write!(f, "Metadata Save"),
        }
    }
}

/// Structured error for render failures.
#[derive(Debug)]
pub struct RenderError {
    pub phase: RenderPhase,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl RenderError {
    /// Create a new render error.
    pub fn new(phase: RenderPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            source: None,
        }
    }

    /// Create a render error with a source error.
    pub fn with_source(
        phase: RenderPhase,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            phase,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Progress information for render callbacks.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// Current frame number (1-indexed).
    pub current_frame: usize,
    /// Total frames to render.
    pub total_frames: usize,
    /// Elapsed time in seconds.
    pub elapsed_secs: f64,
}

impl RenderProgress {
    /// Get progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_frames == 0 {
            100.0
        } else {
            (self.current_frame as f64 / self.total_frames as f64) * 100.0
        }
    }

    /// Estimated seconds remaining, assuming a constant frame rate.
    pub fn eta_secs(&self) -> Option<f64> {
        if self.current_frame == 0 {
            return None;
        }
        let per_frame = self.elapsed_secs / self.current_frame as f64;
        Some(per_frame * self.total_frames.saturating_sub(self.current_frame) as f64)
    }
}
