use bytemuck::{Pod, Zeroable};

use crate::scene_graph::MeshType;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Per-vertex shade, multiplied with the point's position colour.
    pub shade: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 3], shade: [f32; 3]) -> Self {
        Self { position, shade }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12, // [f32; 3] is 12 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Per-point instance data: world matrix columns plus the point's local
/// position, which drives its colour.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PointInstance {
    pub model: [[f32; 4]; 4],
    pub local_position: [f32; 4],
}

impl PointInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4
    ];

    pub fn new(model: glam::Mat4, local_position: glam::Vec3) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            local_position: local_position.extend(1.0).to_array(),
        }
    }

    /// Layout for the second vertex buffer (slot 1), stepped per instance.
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Geometry for a point mesh type, centred at the origin with unit extent.
pub fn geometry_for(mesh_type: MeshType) -> (Vec<Vertex>, Vec<u16>) {
    match mesh_type {
        MeshType::Cube => create_cube_geometry(),
        MeshType::Sphere => create_sphere_geometry(),
    }
}

pub fn create_cube_geometry() -> (Vec<Vertex>, Vec<u16>) {
    // Faces are shaded like a fixed light from above.
    let top = [1.0, 1.0, 1.0];
    let side_a = [0.8, 0.8, 0.8];
    let side_b = [0.65, 0.65, 0.65];
    let bottom = [0.45, 0.45, 0.45];

    let vertices = vec![
        // Front face (Z+)
        Vertex::new([-0.5, -0.5, 0.5], side_a),
        Vertex::new([0.5, -0.5, 0.5], side_a),
        Vertex::new([0.5, 0.5, 0.5], side_a),
        Vertex::new([-0.5, 0.5, 0.5], side_a),
        // Back face (Z-)
        Vertex::new([-0.5, -0.5, -0.5], side_a),
        Vertex::new([-0.5, 0.5, -0.5], side_a),
        Vertex::new([0.5, 0.5, -0.5], side_a),
        Vertex::new([0.5, -0.5, -0.5], side_a),
        // Top face (Y+)
        Vertex::new([-0.5, 0.5, -0.5], top),
        Vertex::new([-0.5, 0.5, 0.5], top),
        Vertex::new([0.5, 0.5, 0.5], top),
        Vertex::new([0.5, 0.5, -0.5], top),
        // Bottom face (Y-)
        Vertex::new([-0.5, -0.5, -0.5], bottom),
        Vertex::new([0.5, -0.5, -0.5], bottom),
        Vertex::new([0.5, -0.5, 0.5], bottom),
        Vertex::new([-0.5, -0.5, 0.5], bottom),
        // Right face (X+)
        Vertex::new([0.5, -0.5, -0.5], side_b),
        Vertex::new([0.5, 0.5, -0.5], side_b),
        Vertex::new([0.5, 0.5, 0.5], side_b),
        Vertex::new([0.5, -0.5, 0.5], side_b),
        // Left face (X-)
        Vertex::new([-0.5, -0.5, -0.5], side_b),
        Vertex::new([-0.5, -0.5, 0.5], side_b),
        Vertex::new([-0.5, 0.5, 0.5], side_b),
        Vertex::new([-0.5, 0.5, -0.5], side_b),
    ];

    let indices = vec![
        0, 1, 2, 2, 3, 0, // Front
        4, 5, 6, 6, 7, 4, // Back
        8, 9, 10, 10, 11, 8, // Top
        12, 13, 14, 14, 15, 12, // Bottom
        16, 17, 18, 18, 19, 16, // Right
        20, 21, 22, 22, 23, 20, // Left
    ];

    (vertices, indices)
}

/// Create a UV sphere centered at origin with radius 0.5.
/// Uses 8 latitude rings and 16 longitude segments; points are small on screen.
pub fn create_sphere_geometry() -> (Vec<Vertex>, Vec<u16>) {
    let lat_segments = 8;
    let lon_segments = 16;
    let radius = 0.5;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for lat in 0..=lat_segments {
        let theta = std::f32::consts::PI * (lat as f32) / (lat_segments as f32);
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        for lon in 0..=lon_segments {
            let phi = 2.0 * std::f32::consts::PI * (lon as f32) / (lon_segments as f32);

            let x = phi.cos() * sin_theta;
            let y = cos_theta;
            let z = phi.sin() * sin_theta;

            // Lit from above: 0.45 at the bottom pole, 1.0 at the top.
            let shade = 0.45 + 0.55 * (y + 1.0) / 2.0;
            vertices.push(Vertex::new([x * radius, y * radius, z * radius], [shade; 3]));
        }
    }

    for lat in 0..lat_segments {
        for lon in 0..lon_segments {
            let first = (lat * (lon_segments + 1) + lon) as u16;
            let second = first + lon_segments as u16 + 1;

            // Two triangles per quad, counter-clockwise seen from outside
            indices.push(first);
            indices.push(first + 1);
            indices.push(second);

            indices.push(second);
            indices.push(first + 1);
            indices.push(second + 1);
        }
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_indices_in_range() {
        for mesh_type in [MeshType::Cube, MeshType::Sphere] {
            let (vertices, indices) = geometry_for(mesh_type);
            assert_eq!(indices.len() % 3, 0);
            assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        }
    }

    #[test]
    fn test_geometry_fits_unit_cube() {
        for mesh_type in [MeshType::Cube, MeshType::Sphere] {
            let (vertices, _) = geometry_for(mesh_type);
            for v in vertices {
                assert!(v.position.iter().all(|c| c.abs() <= 0.5 + 1e-6));
            }
        }
    }

    #[test]
    fn test_point_instance_layout() {
        assert_eq!(std::mem::size_of::<PointInstance>(), 80);
        let instance = PointInstance::new(glam::Mat4::IDENTITY, glam::Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(instance.local_position, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(instance.model[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
