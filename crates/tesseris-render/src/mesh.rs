// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use std::path::{Path, PathBuf};
use tesseris_math::Vec3;
use tracing::info;

/// Interleaved vertex: location 0 position, 1 color, 2 normal.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
    pub normal: [f32; 3],
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("failed to load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("{} contains no triangles", .0.display())]
    Empty(PathBuf),
}

/// Non-indexed triangle list ready for a vertex buffer.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
}

const OBJ_DEFAULT_COLOR: [f32; 3] = [0.8, 0.8, 0.8];

impl Mesh {
    /// Unit cube centred on the origin, one flat color per face, wound
    /// counter-clockwise seen from outside.
    pub fn cube() -> Self {
        // (normal, u, v, color) with u x v == normal
        const FACES: [([f32; 3], [f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.9, 0.2, 0.2]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.2, 0.9, 0.2]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.2, 0.2, 0.9]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.9, 0.9, 0.2]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.9, 0.2, 0.9]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.2, 0.9, 0.9]),
        ];

        let mut vertices = Vec::with_capacity(36);
        for (n, u, v, color) in FACES {
            let (n, u, v) = (Vec3::from(n), Vec3::from(u), Vec3::from(v));
            let c = n * 0.5;
            let corners = [
                c - u * 0.5 - v * 0.5,
                c + u * 0.5 - v * 0.5,
                c + u * 0.5 + v * 0.5,
                c - u * 0.5 + v * 0.5,
            ];
            for i in [0, 1, 2, 0, 2, 3] {
                vertices.push(Vertex {
                    pos: corners[i].to_array(),
                    color,
                    normal: n.to_array(),
                });
            }
        }
        Self { vertices }
    }

    /// Loads every model in an OBJ file, triangulated and flattened.
    /// Faces without normals get their geometric normal.
    pub fn from_obj(path: &Path) -> Result<Self, MeshError> {
        let (models, _materials) =
            tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| MeshError::Load {
                path: path.to_path_buf(),
                source,
            })?;

        let mut vertices = Vec::new();
        for model in &models {
            let m = &model.mesh;
            let at = |data: &[f32], i: u32| {
                let i = i as usize * 3;
                Vec3::new(data[i], data[i + 1], data[i + 2])
            };
            let has_normals = m.normals.len() == m.positions.len();
            let has_colors = m.vertex_color.len() == m.positions.len();

            for tri in m.indices.chunks_exact(3) {
                let p = [at(&m.positions, tri[0]), at(&m.positions, tri[1]), at(&m.positions, tri[2])];
                let face_normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();
                for (k, &idx) in tri.iter().enumerate() {
                    let normal = if has_normals { at(&m.normals, idx) } else { face_normal };
                    let color = if has_colors {
                        at(&m.vertex_color, idx).to_array()
                    } else {
                        OBJ_DEFAULT_COLOR
                    };
                    vertices.push(Vertex {
                        pos: p[k].to_array(),
                        color,
                        normal: normal.to_array(),
                    });
                }
            }
        }

        if vertices.is_empty() {
            return Err(MeshError::Empty(path.to_path_buf()));
        }
        info!(
            "loaded {} ({} models, {} triangles)",
            path.display(),
            models.len(),
            vertices.len() / 3
        );
        Ok(Self { vertices })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_obj(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tesseris-{}-{name}.obj", std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 24);
    }

    #[test]
    fn cube_faces_wind_outward() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertex_count(), 36);
        for tri in cube.vertices.chunks_exact(3) {
            let [a, b, c] = [tri[0].pos, tri[1].pos, tri[2].pos].map(Vec3::from);
            let n = Vec3::from(tri[0].normal);
            assert!((b - a).cross(c - a).dot(n) > 0.0);
            for v in tri {
                assert!(Vec3::from(v.pos).abs().max_element() <= 0.5 + 1e-6);
            }
        }
    }

    #[test]
    fn cube_bytes_cover_every_vertex() {
        let cube = Mesh::cube();
        assert_eq!(cube.as_bytes().len(), 36 * 36);
    }

    #[test]
    fn obj_quad_is_triangulated_with_face_normals() {
        let path = write_obj(
            "quad",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        );
        let mesh = Mesh::from_obj(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(mesh.vertex_count(), 6);
        for v in &mesh.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
            assert_eq!(v.color, OBJ_DEFAULT_COLOR);
        }
    }

    #[test]
    fn obj_normals_are_kept_when_present() {
        let path = write_obj(
            "normals",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1//1 2//1 3//1\n",
        );
        let mesh = Mesh::from_obj(&path).unwrap();
        fs::remove_file(&path).ok();
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn obj_without_faces_is_rejected() {
        let path = write_obj("points", "v 0 0 0\nv 1 0 0\n");
        let err = Mesh::from_obj(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, MeshError::Empty(_)));
    }

    #[test]
    fn missing_obj_reports_load_error() {
        let err = Mesh::from_obj(Path::new("/nonexistent/tesseris/model.obj")).unwrap_err();
        assert!(matches!(err, MeshError::Load { .. }));
    }
}
