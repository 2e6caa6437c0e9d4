use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use crate::gpu::renderer::Renderer;
use crate::graph_function::GraphFunction;
use crate::render_job::{RenderError, RenderJobSpec, RenderMetadata, RenderPhase, RenderProgress};
use crate::scene_graph::MeshType;
use crate::snapshot::FrameSnapshot;
use crate::visualiser::{VisualiserConfig, VisualiserState};

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with graph settings; flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to disk as PNG
    Render {
        /// Render job JSON; flags override its fields. Not combinable with --config
        #[arg(long)]
        job: Option<PathBuf>,

        /// Output directory for frames
        #[arg(long)]
        out: Option<PathBuf>,

        /// Frames per second
        #[arg(long)]
        fps: Option<f32>,

        /// Duration in seconds
        #[arg(long)]
        duration: Option<f32>,

        /// Output width
        #[arg(long)]
        width: Option<u32>,

        /// Output height
        #[arg(long)]
        height: Option<u32>,

        #[command(flatten)]
        graph: GraphArgs,
    },
    /// Write point positions as JSON lines, one frame per line
    Dump {
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,

        /// Number of frames to simulate
        #[arg(long, default_value_t = 1)]
        frames: usize,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        #[command(flatten)]
        graph: GraphArgs,
    },
    /// List the available functions and their selector indices
    Functions,
}

#[derive(Args, Debug, Default)]
struct GraphArgs {
    /// Points per grid axis
    #[arg(long, value_parser = clap::value_parser!(u32).range(10..=100))]
    resolution: Option<u32>,

    /// Function name or selector index
    #[arg(long)]
    function: Option<GraphFunction>,

    /// Multiplier applied to elapsed time
    #[arg(long)]
    time_scale: Option<f32>,

    /// Root spin around Y in radians per second
    #[arg(long)]
    rotation_speed: Option<f32>,

    /// Maximum points created per frame while growing
    #[arg(long)]
    spawn_budget: Option<usize>,

    /// Point mesh: cube or sphere
    #[arg(long)]
    point_mesh: Option<MeshType>,
}

impl GraphArgs {
    fn apply(&self, config: &mut VisualiserConfig) {
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(function) = self.function {
            config.function = function;
        }
        if let Some(time_scale) = self.time_scale {
            config.time_scale = time_scale;
        }
        if let Some(rotation_speed) = self.rotation_speed {
            config.rotation_speed = rotation_speed;
        }
        if let Some(budget) = self.spawn_budget {
            config.spawn_budget = Some(budget);
        }
        if let Some(mesh) = self.point_mesh {
            config.point_mesh = mesh;
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let base_config = cli.config.as_deref().map(VisualiserConfig::from_file).transpose()?;

    match cli.command {
        Commands::Render {
            job,
            out,
            fps,
            duration,
            width,
            height,
            graph,
        } => {
            let mut spec = base_render_spec(job, base_config)?;
            if let Some(out) = out {
                spec.output_dir = out;
            }
            if let Some(fps) = fps {
                spec.fps = fps;
            }
            if let Some(duration) = duration {
                spec.duration = duration;
            }
            if let Some(width) = width {
                spec.width = width;
            }
            if let Some(height) = height {
                spec.height = height;
            }
            graph.apply(&mut spec.graph);
            spec.validate()
                .map_err(|e| RenderError::new(RenderPhase::Initialization, e))?;

            pollster::block_on(render_offline(spec))?;
        }
        Commands::Dump {
            out,
            frames,
            fps,
            graph,
        } => {
            let mut config = base_config.unwrap_or_default();
            graph.apply(&mut config);
            dump_points(config, out, frames, fps)?;
        }
        Commands::Functions => {
            for function in GraphFunction::ALL {
                println!("{:>2}  {}", function.index(), function.name());
            }
        }
    }
    Ok(())
}

/// Starting job for `render`: the job file, or defaults with the graph
/// settings from `--config`. A job file carries its own graph settings, so
/// the two cannot be combined.
fn base_render_spec(job: Option<PathBuf>, config: Option<VisualiserConfig>) -> Result<RenderJobSpec> {
    match (job, config) {
        (Some(path), Some(_)) => anyhow::bail!(
            "--config cannot be combined with --job {:?}; put graph settings in the job file",
            path
        ),
        (Some(path), None) => RenderJobSpec::from_file(&path).map_err(anyhow::Error::msg),
        (None, config) => {
            let mut spec = RenderJobSpec::new(PathBuf::from("frames"));
            spec.graph = config.unwrap_or_default();
            Ok(spec)
        }
    }
}

/// Simulate `frames` frames and write a snapshot of every frame.
fn dump_points(config: VisualiserConfig, out: Option<PathBuf>, frames: usize, fps: f32) -> Result<()> {
    if fps <= 0.0 {
        anyhow::bail!("FPS must be positive");
    }

    let mut writer: Box<dyn Write> = match &out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let dt = 1.0 / fps;
    let mut state = VisualiserState::new(config);
    for frame in 0..frames {
        // Frame 0 samples t = 0.
        state.update(if frame == 0 { 0.0 } else { dt });
        FrameSnapshot::capture(&state, frame).write_line(&mut writer)?;
    }
    writer.flush()?;

    if let Some(path) = out {
        log::info!("Wrote {} frames to {:?}", frames, path);
    }
    Ok(())
}

async fn render_offline(spec: RenderJobSpec) -> Result<()> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let width = spec.width;
    let height = spec.height;
    let total_frames = spec.total_frames();
    let dt = 1.0 / spec.fps;
    let out_dir = spec.output_dir.clone();

    std::fs::create_dir_all(&out_dir).map_err(|e| {
        RenderError::with_source(
            RenderPhase::Initialization,
            format!("Failed to create output directory {:?}", out_dir),
            e,
        )
    })?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None, // Headless
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| RenderError::new(RenderPhase::GpuSetup, "No adapter found"))?;
    let adapter_name = adapter.get_info().name;
    log::info!("Using adapter {}", adapter_name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .map_err(|e| RenderError::with_source(RenderPhase::GpuSetup, "Failed to create device", e))?;

    let texture_desc = wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTPUT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    };
    let texture = device.create_texture(&texture_desc);
    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Rows in the readback buffer are padded to the copy alignment.
    let unpadded_bytes_per_row = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut renderer = Renderer::new(device, queue, OUTPUT_FORMAT, width, height);
    let mut state = VisualiserState::new(spec.graph.clone());

    log::info!("Rendering {} frames to {:?}", total_frames, out_dir);

    for i in 0..total_frames {
        state.update(if i == 0 { 0.0 } else { dt });
        renderer.render(&texture_view, &state);

        let mut encoder = renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture_desc.size,
        );
        renderer.queue().submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        renderer.device().poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| RenderError::with_source(RenderPhase::FrameRender, "Readback channel closed", e))?
            .map_err(|e| RenderError::with_source(RenderPhase::FrameRender, "Failed to map output buffer", e))?;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
            for row in 0..height {
                let start = (row * padded_bytes_per_row) as usize;
                pixels.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
            }
            pixels
        };
        output_buffer.unmap();

        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(&frame_path, &pixels, width, height, image::ColorType::Rgba8).map_err(|e| {
            RenderError::with_source(RenderPhase::FrameSave, format!("Failed to save {:?}", frame_path), e)
        })?;

        let done = i + 1;
        if done % 60 == 0 || done == total_frames {
            let progress = RenderProgress {
                current_frame: done,
                total_frames,
                elapsed_secs: clock.elapsed().as_secs_f64(),
            };
            log::info!(
                "Frame {}/{} ({:.0}%), eta {:.1}s",
                progress.current_frame,
                progress.total_frames,
                progress.percentage(),
                progress.eta_secs().unwrap_or(0.0)
            );
        }
    }

    let render_duration_secs = clock.elapsed().as_secs_f64();
    let mut warnings = Vec::new();
    if !state.graph().is_settled() {
        warnings.push(format!(
            "Grid still growing at the last frame: {} of {} points",
            state.graph().len(),
            state.graph().target_count()
        ));
    }

    let metadata = RenderMetadata {
        job_hash: spec.hash().map_err(|e| RenderError::new(RenderPhase::MetadataSave, e))?,
        job: spec,
        started_at,
        completed_at: Utc::now(),
        render_duration_secs,
        frame_count: total_frames,
        average_render_fps: if render_duration_secs > 0.0 {
            total_frames as f64 / render_duration_secs
        } else {
            0.0
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        gpu_adapter: adapter_name,
        warnings,
    };
    metadata
        .save(&out_dir.join("metadata.json"))
        .map_err(|e| RenderError::new(RenderPhase::MetadataSave, e))?;

    log::info!(
        "Rendered {} frames in {:.2}s ({:.1} fps)",
        total_frames,
        render_duration_secs,
        metadata.average_render_fps
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_graph_args_override_config() {
        let cli = Cli::try_parse_from([
            "surface-graph",
            "dump",
            "--resolution",
            "20",
            "--function",
            "torus",
            "--point-mesh",
            "sphere",
        ])
        .unwrap();
        let Commands::Dump { graph, frames, .. } = cli.command else {
            panic!("expected dump");
        };
        assert_eq!(frames, 1);

        let mut config = VisualiserConfig::default();
        graph.apply(&mut config);
        assert_eq!(config.resolution, 20);
        assert_eq!(config.function, GraphFunction::Torus);
        assert_eq!(config.point_mesh, MeshType::Sphere);
        assert_eq!(config.time_scale, 1.0);
    }

    #[test]
    fn test_function_accepts_selector_index() {
        let cli = Cli::try_parse_from(["surface-graph", "dump", "--function", "6"]).unwrap();
        let Commands::Dump { graph, .. } = cli.command else {
            panic!("expected dump");
        };
        assert_eq!(graph.function, Some(GraphFunction::Sphere));
    }

    #[test]
    fn test_render_job_and_config_are_exclusive() {
        let config = VisualiserConfig {
            resolution: 30,
            ..VisualiserConfig::default()
        };
        assert!(base_render_spec(Some(PathBuf::from("job.json")), Some(config.clone())).is_err());

        let spec = base_render_spec(None, Some(config)).unwrap();
        assert_eq!(spec.graph.resolution, 30);
        assert_eq!(spec.output_dir, PathBuf::from("frames"));

        let spec = base_render_spec(None, None).unwrap();
        assert_eq!(spec.graph, VisualiserConfig::default());
    }

    #[test]
    fn test_resolution_outside_range_is_rejected() {
        assert!(Cli::try_parse_from(["surface-graph", "dump", "--resolution", "9"]).is_err());
        assert!(Cli::try_parse_from(["surface-graph", "dump", "--resolution", "101"]).is_err());
        assert!(Cli::try_parse_from(["surface-graph", "render", "--resolution", "100"]).is_ok());
    }
}
