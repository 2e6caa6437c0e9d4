//! Serializable snapshots of the graph's points for offline inspection.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::graph_function::GraphFunction;
use crate::visualiser::VisualiserState;

/// The state of every point at one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub frame: usize,
    pub time: f32,
    pub resolution: u32,
    pub function: GraphFunction,
    /// Local positions in grid order (`index = z * resolution + x`).
    pub points: Vec<[f32; 3]>,
}

impl FrameSnapshot {
    pub fn capture(state: &VisualiserState, frame: usize) -> Self {
        Self {
            frame,
            time: state.time,
            resolution: state.graph().resolution(),
            function: state.graph().function(),
            points: state.point_positions().into_iter().map(|p| p.to_array()).collect(),
        }
    }

    /// Write as a single JSON line.
    pub fn write_line<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}
