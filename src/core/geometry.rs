use std::f32::consts::{PI, TAU};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// UV sphere centred at the origin. `v = 0` is the north pole (+Y), which maps
/// to the top row of an equirectangular image.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let ws = width_segments.max(3);
    let hs = height_segments.max(2);
    let mut vertices = Vec::with_capacity(((ws + 1) * (hs + 1)) as usize);
    for iy in 0..=hs {
        let v = iy as f32 / hs as f32;
        for ix in 0..=ws {
            let u = ix as f32 / ws as f32;
            let x = -radius * (u * TAU).cos() * (v * PI).sin();
            let y = radius * (v * PI).cos();
            let z = radius * (u * TAU).sin() * (v * PI).sin();
            vertices.push(Vertex {
                position: [x, y, z],
                uv: [u, v],
            });
        }
    }

    let row = ws + 1;
    let mut indices = Vec::new();
    for iy in 0..hs {
        for ix in 0..ws {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != hs - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    MeshData { vertices, indices }
}

/// Sphere meant to be viewed from its centre: mirrored on X so the texture
/// reads left-to-right from inside, with winding flipped to match.
pub fn panorama_sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let mut mesh = uv_sphere(radius, width_segments, height_segments);
    for v in &mut mesh.vertices {
        v.position[0] = -v.position[0];
    }
    for tri in mesh.indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
    mesh
}

pub fn ring(inner_radius: f32, outer_radius: f32, segments: u32) -> MeshData {
    let segs = segments.max(3);
    let mut vertices = Vec::with_capacity(((segs + 1) * 2) as usize);
    for i in 0..=segs {
        let t = i as f32 / segs as f32;
        let (s, c) = (t * TAU).sin_cos();
        for (r, v) in [(inner_radius, 0.0), (outer_radius, 1.0)] {
            vertices.push(Vertex {
                position: [c * r, s * r, 0.0],
                uv: [t, v],
            });
        }
    }
    let mut indices = Vec::with_capacity((segs * 6) as usize);
    for i in 0..segs {
        let inner0 = i * 2;
        let outer0 = inner0 + 1;
        let inner1 = inner0 + 2;
        let outer1 = inner0 + 3;
        indices.extend_from_slice(&[inner0, outer0, outer1, inner0, outer1, inner1]);
    }
    MeshData { vertices, indices }
}

pub fn quad(width: f32, height: f32) -> MeshData {
    let hw = width * 0.5;
    let hh = height * 0.5;
    let vertices = vec![
        Vertex {
            position: [-hw, -hh, 0.0],
            uv: [0.0, 1.0],
        },
        Vertex {
            position: [hw, -hh, 0.0],
            uv: [1.0, 1.0],
        },
        Vertex {
            position: [hw, hh, 0.0],
            uv: [1.0, 0.0],
        },
        Vertex {
            position: [-hw, hh, 0.0],
            uv: [0.0, 0.0],
        },
    ];
    MeshData {
        vertices,
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}
