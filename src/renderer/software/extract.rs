//! Walks a scene graph and feeds its triangles through the pipeline:
//! accumulate transforms, decode index triples, clip, divide, fill.
//!
//! The walk allocates nothing; the only mutable state is the clipper's
//! ping/pong scratch, which the backend owns and resets per frame.

use glam::Mat4;

use crate::renderer::software::clip::{ClipTriangle, ClipVertex, FrameScratch, clip_triangle};
use crate::renderer::software::frame::{FrameView, TextureView};
use crate::renderer::software::lanes::LaneWidth;
use crate::renderer::software::raster::{Filter, RasterVertex, fill_triangle_dispatch};
use crate::world::{NO_TEXTURE, Primitive, Scene, Texture, TextureBank};

/// Everything one frame's extraction needs, borrowed from the backend.
pub(crate) struct ExtractCtx<'a> {
    pub frame: FrameView<'a>,
    pub scratch: &'a mut FrameScratch,
    pub bank: &'a TextureBank,
    pub filter: Filter,
    pub lanes: LaneWidth,
    pub view_proj: Mat4,
}

/// Draw every mesh reachable from the scene roots.
pub(crate) fn draw_scene(ctx: &mut ExtractCtx, scene: &Scene) {
    for &root in &scene.roots {
        draw_node(ctx, scene, root as usize, Mat4::IDENTITY);
    }
}

fn draw_node(ctx: &mut ExtractCtx, scene: &Scene, id: usize, parent: Mat4) {
    let node = &scene.nodes[id];
    let world = parent * node.local;

    // children first, then this node's own mesh
    for &child in &node.children {
        draw_node(ctx, scene, child as usize, world);
    }

    if let Some(mesh) = node.mesh {
        let mvp = ctx.view_proj * world;
        for prim in &scene.meshes[mesh as usize].primitives {
            draw_primitive(ctx, scene, prim, &mvp);
        }
    }
}

/// material → texture slot → bank image, falling back to the
/// checkerboard placeholder wherever the chain dangles.
fn resolve_texture<'b>(scene: &Scene, bank: &'b TextureBank, prim: &Primitive) -> &'b Texture {
    let image = prim
        .material
        .and_then(|m| scene.materials.get(m as usize))
        .and_then(|mat| mat.base_color)
        .and_then(|slot| scene.texture_slots.get(slot as usize))
        .map(|slot| slot.image)
        .unwrap_or(NO_TEXTURE);
    bank.texture_or_missing(image)
}

fn draw_primitive(ctx: &mut ExtractCtx, scene: &Scene, prim: &Primitive, mvp: &Mat4) {
    let tex = TextureView::of(resolve_texture(scene, ctx.bank, prim));

    for t in 0..prim.indices.len() / 3 {
        let [i0, i1, i2] = prim.indices.triple(t);
        let tri: ClipTriangle = [
            ClipVertex::new(*mvp * prim.positions[i0].extend(1.0), prim.uvs[i0]),
            ClipVertex::new(*mvp * prim.positions[i1].extend(1.0), prim.uvs[i1]),
            ClipVertex::new(*mvp * prim.positions[i2].extend(1.0), prim.uvs[i2]),
        ];
        submit(ctx, &tri, tex);
    }
}

/// Clip one world triangle and rasterize the surviving pieces.
fn submit(ctx: &mut ExtractCtx, tri: &ClipTriangle, tex: TextureView) {
    for piece in clip_triangle(tri, &mut *ctx.scratch) {
        let post = [
            RasterVertex::from_clip(&piece[0]),
            RasterVertex::from_clip(&piece[1]),
            RasterVertex::from_clip(&piece[2]),
        ];
        fill_triangle_dispatch(ctx.lanes, &mut ctx.frame, &post, tex, ctx.filter);
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{
        Camera, Indices, Mesh, Node, Scene, Texture, TextureBank, ground_quad, unit_cube,
    };
    use glam::{Vec3, vec3};

    const W: usize = 64;
    const H: usize = 64;
    const STRIDE: usize = (W + 7) & !7;

    struct Harness {
        color: Vec<u32>,
        depth: Vec<f32>,
        scratch: FrameScratch,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                color: vec![0; STRIDE * H],
                depth: vec![f32::INFINITY; STRIDE * H],
                scratch: FrameScratch::default(),
            }
        }

        fn draw(&mut self, scene: &Scene, bank: &TextureBank) {
            let camera = Camera::default();
            let mut ctx = ExtractCtx {
                frame: FrameView::new(&mut self.color, &mut self.depth, W, H, STRIDE),
                scratch: &mut self.scratch,
                bank,
                filter: Filter::Nearest,
                lanes: LaneWidth::X4,
                view_proj: camera.view_projection(W as f32 / H as f32),
            };
            draw_scene(&mut ctx, scene);
        }

        fn center(&self) -> u32 {
            self.color[(H / 2) * STRIDE + W / 2]
        }

        fn center_covered(&self) -> bool {
            self.depth[(H / 2) * STRIDE + W / 2].is_finite()
        }
    }

    fn solid_bank(color: u32) -> (TextureBank, crate::world::TextureId) {
        let mut bank = TextureBank::default_with_checker();
        let id = bank
            .insert("SOLID", Texture::from_fn("SOLID", 1, 1, |_, _| color))
            .unwrap();
        (bank, id)
    }

    /// A quad facing the default camera, 3 units down the view axis.
    fn facing_quad(scene: &mut Scene, material: Option<u16>) -> Node {
        let mut prim = ground_quad(2.0, 1.0, material);
        // stand the floor quad up to face +Z
        for p in &mut prim.positions {
            *p = vec3(p.x, -p.z, 0.0);
        }
        let mesh = scene.add_mesh(Mesh {
            primitives: vec![prim],
        });
        Node::with_mesh(Mat4::from_translation(vec3(0.0, 0.0, -3.0)), mesh)
    }

    #[test]
    fn cube_lands_in_frame_center() {
        let (bank, tex) = solid_bank(0xFF_12_34_56);
        let mut scene = Scene::default();
        let mat = scene.add_textured_material(tex);
        let mesh = scene.add_mesh(Mesh {
            primitives: vec![unit_cube(Some(mat))],
        });
        let node = scene.add_node(Node::with_mesh(
            Mat4::from_translation(vec3(0.0, 0.0, -3.0)),
            mesh,
        ));
        scene.roots.push(node);
        scene.validate().unwrap();

        let mut h = Harness::new();
        h.draw(&scene, &bank);
        assert!(h.center_covered());
        assert_eq!(h.center(), 0xFF_12_34_56);
        // corners stay background
        assert!(!h.depth[0].is_finite());
    }

    #[test]
    fn parent_and_local_transforms_compose() {
        let (bank, tex) = solid_bank(0xFF_AA_AA_AA);
        let mut scene = Scene::default();
        let mat = scene.add_textured_material(tex);
        let mesh = scene.add_mesh(Mesh {
            primitives: vec![unit_cube(Some(mat))],
        });

        // parent pushes far off-screen, child local pulls back in front
        // of the camera; only `parent × local` lands in view
        let child = scene.add_node(Node::with_mesh(
            Mat4::from_translation(vec3(-50.0, 0.0, -3.0)),
            mesh,
        ));
        let root = scene.add_node(Node::group(
            Mat4::from_translation(vec3(50.0, 0.0, 0.0)),
            vec![child],
        ));
        scene.roots.push(root);

        let mut h = Harness::new();
        h.draw(&scene, &bank);
        assert!(h.center_covered());
    }

    #[test]
    fn children_draw_before_their_parent() {
        // same plane, same depth: whoever draws first wins the strict
        // depth test, and that must be the child
        let mut bank = TextureBank::default_with_checker();
        let red = bank
            .insert("RED", Texture::from_fn("RED", 1, 1, |_, _| 0xFF_FF_00_00))
            .unwrap();
        let blue = bank
            .insert("BLUE", Texture::from_fn("BLUE", 1, 1, |_, _| 0xFF_00_00_FF))
            .unwrap();

        let mut scene = Scene::default();
        let red_mat = scene.add_textured_material(red);
        let blue_mat = scene.add_textured_material(blue);

        let parent_quad = facing_quad(&mut scene, Some(red_mat));
        let child_quad = facing_quad(&mut scene, Some(blue_mat));

        let child = scene.add_node(Node {
            local: Mat4::IDENTITY,
            ..child_quad
        });
        let mut parent = parent_quad;
        parent.children = vec![child];
        let root = scene.add_node(parent);
        scene.roots.push(root);

        let mut h = Harness::new();
        h.draw(&scene, &bank);
        assert_eq!(h.center(), 0xFF_00_00_FF);
    }

    #[test]
    fn dangling_material_falls_back_to_checkerboard() {
        let bank = TextureBank::default_with_checker();
        let mut scene = Scene::default();
        // material id 7 does not exist
        let quad = facing_quad(&mut scene, Some(7));
        let root = scene.add_node(quad);
        scene.roots.push(root);

        let mut h = Harness::new();
        h.draw(&scene, &bank);
        assert!(h.center_covered());
        let checker = Texture::default();
        assert!(checker.pixels.contains(&h.center()));
    }

    #[test]
    fn index_width_does_not_change_the_image() {
        let (bank, tex) = solid_bank(0xFF_77_88_99);

        let mut buffers = Vec::new();
        for wide in [false, true] {
            let mut scene = Scene::default();
            let mat = scene.add_textured_material(tex);
            let mut prim = unit_cube(Some(mat));
            if wide {
                prim.indices = match prim.indices {
                    Indices::U16(v) => Indices::U32(v.into_iter().map(u32::from).collect()),
                    already @ Indices::U32(_) => already,
                };
            }
            let mesh = scene.add_mesh(Mesh {
                primitives: vec![prim],
            });
            let node = scene.add_node(Node::with_mesh(
                Mat4::from_translation(vec3(0.0, 0.5, -4.0)) * Mat4::from_rotation_y(0.7),
                mesh,
            ));
            scene.roots.push(node);

            let mut h = Harness::new();
            h.draw(&scene, &bank);
            buffers.push((h.color, h.depth));
        }

        assert_eq!(buffers[0].0, buffers[1].0);
        assert_eq!(
            buffers[0].1.iter().map(|d| d.to_bits()).collect::<Vec<_>>(),
            buffers[1].1.iter().map(|d| d.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn geometry_behind_the_camera_is_clipped_away() {
        let (bank, tex) = solid_bank(0xFF_FF_FF_FF);
        let mut scene = Scene::default();
        let mat = scene.add_textured_material(tex);
        let mesh = scene.add_mesh(Mesh {
            primitives: vec![unit_cube(Some(mat))],
        });
        let node = scene.add_node(Node::with_mesh(
            Mat4::from_translation(vec3(0.0, 0.0, 3.0)), // behind the eye
            mesh,
        ));
        scene.roots.push(node);

        let mut h = Harness::new();
        h.draw(&scene, &bank);
        assert!(h.depth.iter().all(|d| d.is_infinite()));
    }

    #[test]
    fn camera_straddling_cube_still_renders() {
        // cube pierced by the near plane exercises the quad-split path
        // end to end; must cover pixels without panicking
        let (bank, tex) = solid_bank(0xFF_C0_FF_EE);
        let mut scene = Scene::default();
        let mat = scene.add_textured_material(tex);
        let mesh = scene.add_mesh(Mesh {
            primitives: vec![unit_cube(Some(mat))],
        });
        // spans x 1..5, z -3.6..0.4: crosses both the eye plane and the
        // near plane, with the camera itself outside the volume
        let node = scene.add_node(Node::with_mesh(
            Mat4::from_translation(vec3(3.0, 0.0, -1.6)) * Mat4::from_scale(Vec3::splat(4.0)),
            mesh,
        ));
        scene.roots.push(node);

        let mut h = Harness::new();
        h.draw(&scene, &bank);
        assert!(h.depth.iter().any(|d| d.is_finite()));
    }
}
