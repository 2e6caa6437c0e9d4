pub mod camera;
pub mod cli;
pub mod gpu;
pub mod graph;
pub mod graph_function;
pub mod render_job;
pub mod scene_graph;
pub mod snapshot;
pub mod visualiser;
