//! Frame-to-frame state of the graph visualiser.
//!
//! [`VisualiserState`] owns the scene, the graph's root group and the grid of
//! points, and pushes [`VisualiserConfig`] changes into the grid each frame.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::graph::Graph;
use crate::graph_function::GraphFunction;
use crate::scene_graph::{EntityId, MeshType, SceneGraph, ScenePoints};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualiserConfig {
    /// Points per grid axis.
    pub resolution: u32,
    pub function: GraphFunction,
    /// Multiplier applied to frame time before it reaches the graph.
    pub time_scale: f32,
    /// Spin of the graph's root frame around Y, radians per second.
    pub rotation_speed: f32,
    /// Maximum points created per frame while growing. None grows at once.
    pub spawn_budget: Option<usize>,
    /// Mesh used for each point.
    pub point_mesh: MeshType,
}

impl Default for VisualiserConfig {
    fn default() -> Self {
        Self {
            resolution: 10,
            function: GraphFunction::default(),
            time_scale: 1.0,
            rotation_speed: 0.0,
            spawn_budget: None,
            point_mesh: MeshType::default(),
        }
    }
}

impl VisualiserConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {:?}: {}", path, e))?;
        let config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {:?}: {}", path, e))?;
        Ok(config)
    }
}

pub struct VisualiserState {
    pub time: f32,
    pub rotation: f32,
    pub config: VisualiserConfig,
    pub camera: Camera,
    scene: SceneGraph,
    root: EntityId,
    graph: Graph<EntityId>,
}

impl VisualiserState {
    pub fn new(config: VisualiserConfig) -> Self {
        let mut scene = SceneGraph::new();
        let root = scene.create_group();
        let graph = Graph::new(config.resolution, config.function).with_spawn_budget(config.spawn_budget);
        log::info!(
            "Graph visualiser: resolution {}, function {}",
            config.resolution,
            config.function
        );
        Self {
            time: 0.0,
            rotation: 0.0,
            config,
            camera: Camera::new(),
            scene,
            root,
            graph,
        }
    }

    /// Rewind time and the root frame. Existing points are kept.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.rotation = 0.0;
        self.apply_root_rotation();
    }

    pub fn set_resolution(&mut self, resolution: u32) {
        if resolution != self.config.resolution {
            log::info!("Resolution {} -> {}", self.config.resolution, resolution);
        }
        self.config.resolution = resolution;
    }

    pub fn set_function(&mut self, function: GraphFunction) {
        self.config.function = function;
    }

    pub fn scene_graph(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn graph(&self) -> &Graph<EntityId> {
        &self.graph
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Advance one frame. Returns true if the points were repositioned.
    pub fn update(&mut self, dt: f32) -> bool {
        self.time += dt * self.config.time_scale;

        if self.config.rotation_speed != 0.0 {
            self.rotation += self.config.rotation_speed * dt;
            self.rotation %= std::f32::consts::TAU;
            self.apply_root_rotation();
        }

        self.graph.set_resolution(self.config.resolution);
        self.graph.set_function(self.config.function);
        self.graph.set_spawn_budget(self.config.spawn_budget);

        let mut host = ScenePoints::new(&mut self.scene, self.root, self.config.point_mesh);
        self.graph.update(&mut host, self.time)
    }

    /// Local positions of all points in grid order.
    pub fn point_positions(&self) -> Vec<Vec3> {
        self.graph
            .points()
            .iter()
            .filter_map(|&id| self.scene.get(id).map(|e| e.transform().position))
            .collect()
    }

    fn apply_root_rotation(&mut self) {
        if let Some(root) = self.scene.get_mut(self.root) {
            root.transform_mut().rotation = Vec3::new(0.0, self.rotation, 0.0);
        }
    }
}

impl Default for VisualiserState {
    fn default() -> Self {
        Self::new(VisualiserConfig::default())
    }
}
