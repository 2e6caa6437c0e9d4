//! GPU renderer for the scene graph.
//!
//! Every visible mesh in the scene is drawn as an instance of its mesh type's
//! shared geometry, one instanced draw call per mesh type.

use std::collections::HashMap;
use std::iter;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::Camera;
use crate::gpu::mesh::{self, PointInstance};
use crate::gpu::pipeline::{self, DEPTH_FORMAT};
use crate::scene_graph::{MeshType, SceneGraph};
use crate::visualiser::VisualiserState;

/// Instance slots allocated up front; the buffer grows on demand.
const INITIAL_INSTANCE_CAPACITY: usize = 1024;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
}

impl Uniforms {
    fn new() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
        }
    }

    fn update_view_proj(&mut self, size: wgpu::Extent3d, camera: &Camera) {
        let aspect = size.width as f32 / size.height as f32;
        self.view_proj = camera.view_projection_matrix(aspect).to_cols_array_2d();
    }
}

/// Shared geometry for a mesh type.
struct MeshGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

impl MeshGeometry {
    fn new(device: &wgpu::Device, mesh_type: MeshType) -> Self {
        let (vertices, indices) = mesh::geometry_for(mesh_type);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
        }
    }
}

/// Gather instance data for every visible mesh, batched by mesh type in
/// order of first appearance.
pub fn collect_instances(scene: &SceneGraph) -> Vec<(MeshType, Vec<PointInstance>)> {
    let mut batches: Vec<(MeshType, Vec<PointInstance>)> = Vec::new();
    for (id, mesh) in scene.meshes() {
        if !scene.is_visible(id) {
            continue;
        }
        let instance = PointInstance::new(scene.world_matrix(id), mesh.transform.position);
        match batches.iter_mut().find(|(mesh_type, _)| *mesh_type == mesh.mesh_type) {
            Some((_, instances)) => instances.push(instance),
            None => batches.push((mesh.mesh_type, vec![instance])),
        }
    }
    batches
}

fn create_depth_view(device: &wgpu::Device, size: wgpu::Extent3d) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Point Instance Buffer"),
        size: (capacity * std::mem::size_of::<PointInstance>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: wgpu::Extent3d,

    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    uniforms: Uniforms,
    depth_view: wgpu::TextureView,

    geometry: HashMap<MeshType, MeshGeometry>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
}

impl Renderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let uniforms = Uniforms::new();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                },
                count: None,
            }],
            label: Some("point_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("point_bind_group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = pipeline::create_point_pipeline(&device, &pipeline_layout, format);

        let geometry = [MeshType::Cube, MeshType::Sphere]
            .into_iter()
            .map(|mesh_type| (mesh_type, MeshGeometry::new(&device, mesh_type)))
            .collect();

        let depth_view = create_depth_view(&device, size);
        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCE_CAPACITY);

        Self {
            device,
            queue,
            size,
            pipeline,
            uniform_buffer,
            bind_group,
            uniforms,
            depth_view,
            geometry,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn ensure_instance_capacity(&mut self, count: usize) {
        if count <= self.instance_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        log::debug!("Growing instance buffer {} -> {}", self.instance_capacity, capacity);
        self.instance_buffer = create_instance_buffer(&self.device, capacity);
        self.instance_capacity = capacity;
    }

    pub fn render(&mut self, view: &wgpu::TextureView, state: &VisualiserState) {
        self.uniforms.update_view_proj(self.size, state.camera());
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        let batches = collect_instances(state.scene_graph());
        let mut instances: Vec<PointInstance> = Vec::new();
        let mut draws: Vec<(MeshType, Range<u32>)> = Vec::with_capacity(batches.len());
        for (mesh_type, batch) in batches {
            let start = instances.len() as u32;
            instances.extend(batch);
            draws.push((mesh_type, start..instances.len() as u32));
        }

        // queue.write_buffer() is immediate, so all instance data goes in
        // before the pass is recorded.
        self.ensure_instance_capacity(instances.len());
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

            for (mesh_type, range) in draws {
                let Some(geometry) = self.geometry.get(&mesh_type) else {
                    log::warn!("No geometry for {:?}, skipping {} points", mesh_type, range.len());
                    continue;
                };
                render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                render_pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..geometry.num_indices, 0, range);
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
    }
}
