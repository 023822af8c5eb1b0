mod camera;
mod mesh;
mod texture;

pub use mesh::{
    Indices, Material, MaterialId, Mesh, MeshId, Node, NodeId, Primitive, Scene, SceneError,
    TextureSlot, TextureSlotId, ground_quad, unit_cube,
};

pub use camera::Camera;

pub use texture::{NO_TEXTURE, Texture, TextureBank, TextureError, TextureId};
