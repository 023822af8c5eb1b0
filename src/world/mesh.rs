use glam::{Mat4, Vec2, Vec3, vec2, vec3};

use crate::world::texture::TextureId;

pub type NodeId = u16;
pub type MeshId = u16;
pub type MaterialId = u16;
pub type TextureSlotId = u16;

/// Runtime snapshot of one renderable scene (immutable while a frame is
/// in flight). Node-local transforms are the only part an external
/// animation collaborator rewrites, and only between frames.
#[derive(Debug, Default)]
pub struct Scene {
    pub nodes: Vec<Node>,
    pub roots: Vec<NodeId>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub texture_slots: Vec<TextureSlot>,
}

/*--------------------------- node graph -----------------------------*/

#[derive(Clone, Debug)]
pub struct Node {
    /// Transform relative to the parent node.
    pub local: Mat4,
    pub mesh: Option<MeshId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn with_mesh(local: Mat4, mesh: MeshId) -> Self {
        Self {
            local,
            mesh: Some(mesh),
            children: Vec::new(),
        }
    }

    pub fn group(local: Mat4, children: Vec<NodeId>) -> Self {
        Self {
            local,
            mesh: None,
            children,
        }
    }
}

/*---------------------------- geometry ------------------------------*/

#[derive(Clone, Debug)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

/// One indexed triangle list with a single material.
///
/// Positions/uvs/indices are owned here but the extractor only ever
/// borrows them as slices; nothing is copied per frame.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Indices,
    pub material: Option<MaterialId>,
}

/// Index buffer in its on-disk width. Decoded triple by triple, never
/// widened up front.
#[derive(Clone, Debug)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the `n`-th triangle as three vertex indices.
    #[inline]
    pub fn triple(&self, n: usize) -> [usize; 3] {
        let i = n * 3;
        match self {
            Indices::U16(v) => [v[i] as usize, v[i + 1] as usize, v[i + 2] as usize],
            Indices::U32(v) => [v[i] as usize, v[i + 1] as usize, v[i + 2] as usize],
        }
    }
}

/*--------------------------- materials ------------------------------*/

/// Flat-textured material. The id chain is
/// material → texture slot → bank image; each hop may dangle, in which
/// case the extractor falls back to the bank's placeholder.
#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub base_color: Option<TextureSlotId>,
}

/// Indirection between materials and bank images, so several materials
/// can share one image with different future sampler state.
#[derive(Clone, Copy, Debug)]
pub struct TextureSlot {
    pub image: TextureId,
}

/*-------------------------- validation ------------------------------*/

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0} refers to missing child {1}")]
    BadChild(NodeId, NodeId),
    #[error("node {0} refers to missing mesh {1}")]
    BadMesh(NodeId, MeshId),
    #[error("primitive index {index} out of range for {verts} vertices")]
    IndexOutOfRange { index: usize, verts: usize },
    #[error("primitive has {indices} indices, not a multiple of three")]
    PartialTriangle { indices: usize },
    #[error("primitive has {uvs} uvs for {verts} vertices")]
    UvMismatch { uvs: usize, verts: usize },
}

impl Scene {
    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        (self.nodes.len() - 1) as NodeId
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        (self.meshes.len() - 1) as MeshId
    }

    /// Register a material backed by a bank image, creating its slot.
    pub fn add_textured_material(&mut self, image: TextureId) -> MaterialId {
        self.texture_slots.push(TextureSlot { image });
        let slot = (self.texture_slots.len() - 1) as TextureSlotId;
        self.materials.push(Material {
            base_color: Some(slot),
        });
        (self.materials.len() - 1) as MaterialId
    }

    /// Structural check, meant for after scene construction — the render
    /// path itself assumes a valid scene and only falls back on the
    /// material chain.
    pub fn validate(&self) -> Result<(), SceneError> {
        for (id, node) in self.nodes.iter().enumerate() {
            for &c in &node.children {
                if c as usize >= self.nodes.len() {
                    return Err(SceneError::BadChild(id as NodeId, c));
                }
            }
            if let Some(m) = node.mesh {
                if m as usize >= self.meshes.len() {
                    return Err(SceneError::BadMesh(id as NodeId, m));
                }
            }
        }
        for mesh in &self.meshes {
            for prim in &mesh.primitives {
                if prim.indices.len() % 3 != 0 {
                    return Err(SceneError::PartialTriangle {
                        indices: prim.indices.len(),
                    });
                }
                if prim.uvs.len() != prim.positions.len() {
                    return Err(SceneError::UvMismatch {
                        uvs: prim.uvs.len(),
                        verts: prim.positions.len(),
                    });
                }
                for t in 0..prim.indices.len() / 3 {
                    for idx in prim.indices.triple(t) {
                        if idx >= prim.positions.len() {
                            return Err(SceneError::IndexOutOfRange {
                                index: idx,
                                verts: prim.positions.len(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/*------------------------ builder helpers ---------------------------*/
//
// Stand-ins for the out-of-scope asset loader, used by the demo viewer
// and by tests that need real content.

/// Axis-aligned unit cube centred on the origin, one uv square per face,
/// counter-clockwise windings facing outward.
pub fn unit_cube(material: Option<MaterialId>) -> Primitive {
    // (face normal axis, two in-plane axes)
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), // +Z
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), // -Z
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]), // +X
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]), // -X
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]), // +Y
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]), // -Y
    ];

    let mut positions = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (n, u, v) in FACES {
        let n = Vec3::from(n) * 0.5;
        let u = Vec3::from(u) * 0.5;
        let v = Vec3::from(v) * 0.5;
        let base = positions.len() as u16;

        positions.push(n - u - v);
        positions.push(n + u - v);
        positions.push(n + u + v);
        positions.push(n - u + v);
        uvs.push(vec2(0.0, 1.0));
        uvs.push(vec2(1.0, 1.0));
        uvs.push(vec2(1.0, 0.0));
        uvs.push(vec2(0.0, 0.0));

        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Primitive {
        positions,
        uvs,
        indices: Indices::U16(indices),
        material,
    }
}

/// Flat quad in the XZ plane (a floor), `extent` wide, uv tiled `tile`
/// times across.
pub fn ground_quad(extent: f32, tile: f32, material: Option<MaterialId>) -> Primitive {
    let e = extent * 0.5;
    Primitive {
        positions: vec![
            vec3(-e, 0.0, e),
            vec3(e, 0.0, e),
            vec3(e, 0.0, -e),
            vec3(-e, 0.0, -e),
        ],
        uvs: vec![
            vec2(0.0, tile),
            vec2(tile, tile),
            vec2(tile, 0.0),
            vec2(0.0, 0.0),
        ],
        indices: Indices::U16(vec![0, 1, 2, 0, 2, 3]),
        material,
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_is_structurally_sound() {
        let cube = unit_cube(None);
        assert_eq!(cube.positions.len(), 24);
        assert_eq!(cube.uvs.len(), 24);
        assert_eq!(cube.indices.len(), 36); // 12 triangles

        let mut scene = Scene::default();
        let mesh = scene.add_mesh(Mesh {
            primitives: vec![cube],
        });
        let root = scene.add_node(Node::with_mesh(Mat4::IDENTITY, mesh));
        scene.roots.push(root);
        assert_eq!(scene.validate(), Ok(()));
    }

    #[test]
    fn index_triple_decodes_both_widths() {
        let narrow = Indices::U16(vec![0, 1, 2, 2, 1, 3]);
        let wide = Indices::U32(vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(narrow.triple(1), [2, 1, 3]);
        assert_eq!(narrow.triple(1), wide.triple(1));
    }

    #[test]
    fn validate_catches_dangling_index() {
        let mut scene = Scene::default();
        let mesh = scene.add_mesh(Mesh {
            primitives: vec![Primitive {
                positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                uvs: vec![Vec2::ZERO; 3],
                indices: Indices::U16(vec![0, 1, 7]),
                material: None,
            }],
        });
        let root = scene.add_node(Node::with_mesh(Mat4::IDENTITY, mesh));
        scene.roots.push(root);
        assert_eq!(
            scene.validate(),
            Err(SceneError::IndexOutOfRange { index: 7, verts: 3 })
        );
    }

    #[test]
    fn material_chain_ids_line_up() {
        let mut scene = Scene::default();
        let mat = scene.add_textured_material(5);
        let slot = scene.materials[mat as usize].base_color.unwrap();
        assert_eq!(scene.texture_slots[slot as usize].image, 5);
    }
}
