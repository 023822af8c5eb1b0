//! Lane-parallel triangle filler with perspective-correct texturing.
//!
//! Coverage comes from three fixed-point edge functions (8 sub-pixel
//! bits), evaluated at pixel centers in integer arithmetic so adjacent
//! triangles meet crack-free and both lane widths agree bit for bit.
//! Each edge carries a top-left-rule bias: a pixel center exactly on a
//! shared edge belongs to exactly one of the two triangles touching it.
//!
//! Pixels are visited in lane groups. Inside-ness, the depth test and
//! the framebuffer merge are all mask operations in lockstep across the
//! group; nothing branches per lane.

use glam::{Vec2, Vec3};

use crate::renderer::software::clip::ClipVertex;
use crate::renderer::software::frame::{FrameView, TextureView};
use crate::renderer::software::lanes::{self as ln, LaneWidth};

/// Texture sampling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    Nearest,
    Bilinear,
}

/// Sub-pixel precision of the fixed-point pipeline.
const SUB_BITS: i32 = 8;
const SUB_ONE: i32 = 1 << SUB_BITS;
const SUB_HALF: i32 = SUB_ONE / 2;

/// One vertex after clipping and perspective divide.
///
/// `ndc.z` is already divided (so it interpolates affinely on screen),
/// w is replaced by its reciprocal and the uv is pre-multiplied by that
/// reciprocal — the two halves of perspective-correct interpolation.
#[derive(Clone, Copy, Debug)]
pub struct RasterVertex {
    pub ndc: Vec3,
    pub inv_w: f32,
    pub uv_over_w: Vec2,
}

impl RasterVertex {
    pub fn from_clip(v: &ClipVertex) -> Self {
        // w ≥ ε is guaranteed by the clipper's last plane
        let inv_w = 1.0 / v.pos.w;
        Self {
            ndc: v.pos.truncate() * inv_w,
            inv_w,
            uv_over_w: v.uv * inv_w,
        }
    }
}

pub type RasterTriangle = [RasterVertex; 3];

/*---------------------- edge functions ------------------------------*/

/// `E(p) = (yb-ya)·(px-xa) - (xb-xa)·(py-ya)` for the directed edge
/// a→b, positive on the interior side for front-facing windings.
#[derive(Clone, Copy)]
struct EdgeFn {
    step_x: i64,
    step_y: i64,
    /// Biased value at the traversal origin's pixel center.
    row: i64,
}

impl EdgeFn {
    fn new(a: (i32, i32), b: (i32, i32), origin: (i32, i32)) -> Self {
        let dx = b.0 - a.0;
        let dy = b.1 - a.1;
        // Top-left ownership: left edges (dy > 0) and top edges
        // (dy == 0, dx < 0) keep pixels that land exactly on them;
        // every other edge gives them up via a one-unit bias.
        let bias = if dy > 0 || (dy == 0 && dx < 0) { 0 } else { -1 };
        let row = dy as i64 * (origin.0 - a.0) as i64 - dx as i64 * (origin.1 - a.1) as i64 + bias;
        Self {
            step_x: dy as i64 * SUB_ONE as i64,
            step_y: -(dx as i64) * SUB_ONE as i64,
            row,
        }
    }
}

/// Doubled signed area of (a, b, c) in fixed-point units².
#[inline]
fn cross_fixed(a: (i32, i32), b: (i32, i32), c: (i32, i32)) -> i64 {
    (b.1 - a.1) as i64 * (c.0 - a.0) as i64 - (b.0 - a.0) as i64 * (c.1 - a.1) as i64
}

/*---------------------------- filler --------------------------------*/

/// Rasterize one post-clip triangle into `frame`, `N` pixels at a time.
///
/// `N` is a throughput knob only: every lane op has per-lane scalar
/// semantics, so any two widths produce bit-identical framebuffers.
/// Inlined so the AVX2 entry point below compiles its own copy of the
/// 8-wide body.
#[inline(always)]
pub fn fill_triangle<const N: usize>(
    frame: &mut FrameView,
    tri: &RasterTriangle,
    tex: TextureView,
    filter: Filter,
) {
    // NaN/Inf never comes out of the clipper, but a caller feeding the
    // filler directly must not corrupt pixels either
    if tri
        .iter()
        .any(|v| !v.ndc.is_finite() || !v.inv_w.is_finite())
    {
        return;
    }

    // 1. NDC → pixel space, snapped to the fixed-point grid
    let wf = frame.width as f32;
    let hf = frame.height as f32;
    let snap = |v: &RasterVertex| -> (i32, i32) {
        let sx = (v.ndc.x * 0.5 + 0.5) * wf;
        let sy = (0.5 - v.ndc.y * 0.5) * hf;
        ((sx * SUB_ONE as f32).round() as i32, (sy * SUB_ONE as f32).round() as i32)
    };
    let p0 = snap(&tri[0]);
    let p1 = snap(&tri[1]);
    let p2 = snap(&tri[2]);

    // 2. backface / degenerate rejection before any per-pixel work
    let area2 = cross_fixed(p0, p1, p2);
    if area2 <= 0 {
        return;
    }
    let inv_area = 1.0 / area2 as f32;

    // 3. clamped integer bounding box over pixel indices
    let min_x = ((p0.0.min(p1.0).min(p2.0)) >> SUB_BITS).max(0);
    let max_x = ((p0.0.max(p1.0).max(p2.0) + SUB_ONE - 1) >> SUB_BITS).min(frame.width as i32 - 1);
    let min_y = ((p0.1.min(p1.1).min(p2.1)) >> SUB_BITS).max(0);
    let max_y = ((p0.1.max(p1.1).max(p2.1) + SUB_ONE - 1) >> SUB_BITS).min(frame.height as i32 - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    // Lane groups start on a lane-aligned column; the stride padding
    // guarantees the final group's store stays inside the row.
    let start_x = min_x as usize & !(N - 1);
    let origin = (
        start_x as i32 * SUB_ONE + SUB_HALF,
        min_y * SUB_ONE + SUB_HALF,
    );

    // edge k is opposite vertex k, so its value weights that vertex
    let e0 = EdgeFn::new(p1, p2, origin);
    let e1 = EdgeFn::new(p2, p0, origin);
    let e2 = EdgeFn::new(p0, p1, origin);

    let (z0, z1, z2) = (tri[0].ndc.z, tri[1].ndc.z, tri[2].ndc.z);
    let (iw0, iw1, iw2) = (tri[0].inv_w, tri[1].inv_w, tri[2].inv_w);
    let (uv0, uv1, uv2) = (tri[0].uv_over_w, tri[1].uv_over_w, tri[2].uv_over_w);

    let mut row0 = e0.row;
    let mut row1 = e1.row;
    let mut row2 = e2.row;

    for y in min_y..=max_y {
        let off = frame.row_offset(y as usize);

        let mut ev0 = ln::ramp::<N>(row0, e0.step_x);
        let mut ev1 = ln::ramp::<N>(row1, e1.step_x);
        let mut ev2 = ln::ramp::<N>(row2, e2.step_x);

        let mut x = start_x;
        while x as i32 <= max_x {
            // 4. a lane is inside iff all three edges are non-negative
            let inside = ln::mask_and(
                ln::mask_and(ln::mask_ge_zero(ev0), ln::mask_ge_zero(ev1)),
                ln::mask_ge_zero(ev2),
            );
            if ln::mask_any(inside) {
                // barycentric weights; closing the third against one
                // keeps their sum exact
                let l0 = ln::scale(ln::i64_to_f32(ev0), inv_area);
                let l1 = ln::scale(ln::i64_to_f32(ev1), inv_area);
                let l2: [f32; N] = std::array::from_fn(|k| 1.0 - l0[k] - l1[k]);

                // 5. depth test in lockstep; merge decides, not a branch
                let zs = ln::interp3(l0, l1, l2, z0, z1, z2);
                let depth_old = ln::load_f32::<N>(frame.depth, off + x);
                let pass = ln::mask_and(inside, ln::mask_lt(zs, depth_old));

                if ln::mask_any(pass) {
                    // 6. true uv = interpolated uv/w over interpolated 1/w
                    let iw = ln::interp3(l0, l1, l2, iw0, iw1, iw2);
                    let wr = ln::recip(iw);
                    let us = ln::mul(ln::interp3(l0, l1, l2, uv0.x, uv1.x, uv2.x), wr);
                    let vs = ln::mul(ln::interp3(l0, l1, l2, uv0.y, uv1.y, uv2.y), wr);

                    // 7. gather one (or four) texels per lane
                    let texel = match filter {
                        Filter::Nearest => gather_nearest::<N>(tex, us, vs),
                        Filter::Bilinear => gather_bilinear::<N>(tex, us, vs),
                    };

                    // 8. bitwise-select merge for passing lanes only
                    let color_old = ln::load_u32::<N>(frame.color, off + x);
                    let color_new = ln::select_u32(pass, texel, color_old);
                    let depth_new = ln::select_f32(pass, zs, depth_old);
                    frame.color[off + x..off + x + N].copy_from_slice(&color_new);
                    frame.depth[off + x..off + x + N].copy_from_slice(&depth_new);
                }
            }

            ev0 = ln::add_i64(ev0, ln::splat(e0.step_x * N as i64));
            ev1 = ln::add_i64(ev1, ln::splat(e1.step_x * N as i64));
            ev2 = ln::add_i64(ev2, ln::splat(e2.step_x * N as i64));
            x += N;
        }

        row0 += e0.step_y;
        row1 += e1.step_y;
        row2 += e2.step_y;
    }
}

/*--------------------------- dispatch -------------------------------*/

/// Run the filler at the width chosen when the backend was built.
pub fn fill_triangle_dispatch(
    width: LaneWidth,
    frame: &mut FrameView,
    tri: &RasterTriangle,
    tex: TextureView,
    filter: Filter,
) {
    match width {
        LaneWidth::X4 => fill_triangle::<4>(frame, tri, tex, filter),
        // X8 is only ever selected by `LaneWidth::detect` on machines
        // that report AVX2, which satisfies the target-feature contract.
        #[cfg(target_arch = "x86_64")]
        LaneWidth::X8 => unsafe { fill_triangle_x8_avx2(frame, tri, tex, filter) },
        #[cfg(not(target_arch = "x86_64"))]
        LaneWidth::X8 => fill_triangle::<8>(frame, tri, tex, filter),
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn fill_triangle_x8_avx2(
    frame: &mut FrameView,
    tri: &RasterTriangle,
    tex: TextureView,
    filter: Filter,
) {
    fill_triangle::<8>(frame, tri, tex, filter)
}

/*--------------------------- sampling -------------------------------*/

#[inline(always)]
fn wrap(i: i32, n: usize) -> usize {
    i.rem_euclid(n as i32) as usize
}

/// Nearest texel per lane: floor to the texel grid, wrap out-of-range
/// coordinates back into the texture.
#[inline(always)]
fn gather_nearest<const N: usize>(tex: TextureView, u: [f32; N], v: [f32; N]) -> [u32; N] {
    std::array::from_fn(|k| {
        let tx = wrap((u[k] * tex.width as f32).floor() as i32, tex.width);
        let ty = wrap((v[k] * tex.height as f32).floor() as i32, tex.height);
        tex.texels[ty * tex.width + tx]
    })
}

/// Four wrapped neighbour texels per lane — an independent gather, not
/// a broadcast — lerped in float, x then y.
#[inline(always)]
fn gather_bilinear<const N: usize>(tex: TextureView, u: [f32; N], v: [f32; N]) -> [u32; N] {
    std::array::from_fn(|k| {
        let uf = u[k] * tex.width as f32 - 0.5;
        let vf = v[k] * tex.height as f32 - 0.5;
        let fx = uf - uf.floor();
        let fy = vf - vf.floor();
        let x0 = uf.floor() as i32;
        let y0 = vf.floor() as i32;

        let xa = wrap(x0, tex.width);
        let xb = wrap(x0 + 1, tex.width);
        let ya = wrap(y0, tex.height);
        let yb = wrap(y0 + 1, tex.height);

        let c00 = unpack(tex.texels[ya * tex.width + xa]);
        let c10 = unpack(tex.texels[ya * tex.width + xb]);
        let c01 = unpack(tex.texels[yb * tex.width + xa]);
        let c11 = unpack(tex.texels[yb * tex.width + xb]);

        let top = lerp4(c00, c10, fx);
        let bot = lerp4(c01, c11, fx);
        pack(lerp4(top, bot, fy))
    })
}

#[inline(always)]
fn unpack(c: u32) -> [f32; 4] {
    [
        (c >> 24 & 0xFF) as f32,
        (c >> 16 & 0xFF) as f32,
        (c >> 8 & 0xFF) as f32,
        (c & 0xFF) as f32,
    ]
}

#[inline(always)]
fn pack(c: [f32; 4]) -> u32 {
    ((c[0] + 0.5) as u32) << 24
        | ((c[1] + 0.5) as u32) << 16
        | ((c[2] + 0.5) as u32) << 8
        | (c[3] + 0.5) as u32
}

#[inline(always)]
fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|k| a[k] + (b[k] - a[k]) * t)
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Texture;
    use glam::{vec2, vec4};

    const W: usize = 100;
    const H: usize = 100;
    const STRIDE: usize = (W + 7) & !7;

    struct Buf {
        color: Vec<u32>,
        depth: Vec<f32>,
    }

    impl Buf {
        fn new() -> Self {
            Self {
                color: vec![0; STRIDE * H],
                depth: vec![f32::INFINITY; STRIDE * H],
            }
        }

        fn view(&mut self) -> FrameView<'_> {
            FrameView::new(&mut self.color, &mut self.depth, W, H, STRIDE)
        }

        fn covered(&self, x: usize, y: usize) -> bool {
            self.depth[y * STRIDE + x].is_finite()
        }

        /// covered x-range of a row, checking contiguity
        fn row_span(&self, y: usize) -> Option<(usize, usize)> {
            let xs: Vec<usize> = (0..W).filter(|&x| self.covered(x, y)).collect();
            let (&lo, &hi) = (xs.first()?, xs.last()?);
            assert_eq!(xs.len(), hi - lo + 1, "row {y} has holes");
            Some((lo, hi))
        }
    }

    fn solid_tex(c: u32) -> Texture {
        Texture::from_fn("SOLID", 1, 1, |_, _| c)
    }

    fn tri(verts: [(f32, f32, f32, f32); 3]) -> RasterTriangle {
        let uvs = [vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(0.5, 1.0)];
        std::array::from_fn(|i| {
            let (x, y, z, w) = verts[i];
            RasterVertex::from_clip(&ClipVertex::new(vec4(x, y, z, w), uvs[i]))
        })
    }

    #[test]
    fn scenario_full_screen_triangle() {
        let tex = solid_tex(0xFF_FF_FF_FF);
        let mut buf = Buf::new();
        let t = tri([
            (-1.0, -1.0, 0.5, 1.0),
            (1.0, -1.0, 0.5, 1.0),
            (0.0, 1.0, 0.5, 1.0),
        ]);
        fill_triangle::<4>(&mut buf.view(), &t, TextureView::of(&tex), Filter::Nearest);

        // apex near (50, 0): the topmost covered row is within a pixel
        // or two of the top, and hugs column 50
        let top = (0..H).find(|&y| buf.row_span(y).is_some()).unwrap();
        assert!(top <= 2, "apex row {top}");
        let (lo, hi) = buf.row_span(top).unwrap();
        assert!((48..=52).contains(&lo) && (48..=52).contains(&hi));

        // base near y = 99, spanning essentially the whole width
        let (lo, hi) = buf.row_span(99).unwrap();
        assert!(lo <= 1 && hi >= 98, "base spans {lo}..={hi}");

        // every covered pixel sits at depth 0.5, rows are contiguous,
        // and nothing leaked into the stride padding
        for y in 0..H {
            let _ = buf.row_span(y);
            for x in 0..W {
                if buf.covered(x, y) {
                    assert!((buf.depth[y * STRIDE + x] - 0.5).abs() < 1e-4);
                    assert_eq!(buf.color[y * STRIDE + x], 0xFF_FF_FF_FF);
                }
            }
            for x in W..STRIDE {
                assert_eq!(buf.color[y * STRIDE + x], 0);
                assert!(buf.depth[y * STRIDE + x].is_infinite());
            }
        }
    }

    #[test]
    fn shared_edge_draws_every_pixel_exactly_once() {
        // square split along its diagonal; many pixel centers lie
        // exactly on the shared edge
        let a = (-0.5, -0.5, 0.5, 1.0);
        let b = (0.5, -0.5, 0.5, 1.0);
        let c = (0.5, 0.5, 0.5, 1.0);
        let d = (-0.5, 0.5, 0.5, 1.0);
        let tex = solid_tex(0xFF_FF_FF_FF);

        let mut one = Buf::new();
        let mut two = Buf::new();
        fill_triangle::<4>(&mut one.view(), &tri([a, b, c]), TextureView::of(&tex), Filter::Nearest);
        fill_triangle::<4>(&mut two.view(), &tri([a, c, d]), TextureView::of(&tex), Filter::Nearest);

        for y in 0..H {
            for x in 0..W {
                let n = one.covered(x, y) as u8 + two.covered(x, y) as u8;
                let in_square = (25..75).contains(&x) && (25..75).contains(&y);
                assert_eq!(
                    n,
                    in_square as u8,
                    "pixel ({x},{y}) drawn {n} times"
                );
            }
        }
    }

    #[test]
    fn reversed_winding_is_culled() {
        let tex = solid_tex(0xFF_FF_FF_FF);
        let verts = [
            (-0.5, -0.5, 0.5, 1.0),
            (0.5, -0.5, 0.5, 1.0),
            (0.0, 0.5, 0.5, 1.0),
        ];
        let mut fwd = Buf::new();
        fill_triangle::<4>(&mut fwd.view(), &tri(verts), TextureView::of(&tex), Filter::Nearest);
        assert!((0..H).any(|y| fwd.row_span(y).is_some()));

        let mut rev = Buf::new();
        let flipped = [verts[0], verts[2], verts[1]];
        fill_triangle::<4>(&mut rev.view(), &tri(flipped), TextureView::of(&tex), Filter::Nearest);
        assert!((0..H).all(|y| rev.row_span(y).is_none()));
    }

    #[test]
    fn depth_test_is_order_independent() {
        let near = tri([
            (-0.8, -0.8, 0.3, 1.0),
            (0.8, -0.8, 0.3, 1.0),
            (0.0, 0.8, 0.3, 1.0),
        ]);
        let far = tri([
            (-0.8, 0.8, 0.7, 1.0),
            (0.0, -0.8, 0.7, 1.0),
            (0.8, 0.8, 0.7, 1.0),
        ]);
        let red = solid_tex(0xFF_FF_00_00);
        let blue = solid_tex(0xFF_00_00_FF);

        let mut ab = Buf::new();
        fill_triangle::<4>(&mut ab.view(), &near, TextureView::of(&red), Filter::Nearest);
        fill_triangle::<4>(&mut ab.view(), &far, TextureView::of(&blue), Filter::Nearest);

        let mut ba = Buf::new();
        fill_triangle::<4>(&mut ba.view(), &far, TextureView::of(&blue), Filter::Nearest);
        fill_triangle::<4>(&mut ba.view(), &near, TextureView::of(&red), Filter::Nearest);

        assert_eq!(ab.color, ba.color);
        assert_eq!(
            ab.depth.iter().map(|d| d.to_bits()).collect::<Vec<_>>(),
            ba.depth.iter().map(|d| d.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn lane_widths_match_bit_for_bit() {
        // awkward sliver + bilinear sampling to stress both paths
        let t = tri([
            (-0.93, -0.61, 0.27, 1.3),
            (0.88, -0.4, 0.66, 2.1),
            (0.05, 0.97, 0.4, 0.7),
        ]);
        let tex = Texture::default(); // checkerboard

        let mut four = Buf::new();
        let mut eight = Buf::new();
        fill_triangle::<4>(&mut four.view(), &t, TextureView::of(&tex), Filter::Bilinear);
        fill_triangle::<8>(&mut eight.view(), &t, TextureView::of(&tex), Filter::Bilinear);

        assert_eq!(four.color, eight.color);
        assert_eq!(
            four.depth.iter().map(|d| d.to_bits()).collect::<Vec<_>>(),
            eight.depth.iter().map(|d| d.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn degenerate_and_nan_triangles_touch_nothing() {
        let tex = solid_tex(0xFF_FF_FF_FF);

        let mut buf = Buf::new();
        // collinear
        let t = tri([
            (-0.5, -0.5, 0.5, 1.0),
            (0.0, 0.0, 0.5, 1.0),
            (0.5, 0.5, 0.5, 1.0),
        ]);
        fill_triangle::<4>(&mut buf.view(), &t, TextureView::of(&tex), Filter::Nearest);
        // NaN position
        let t = tri([
            (f32::NAN, -0.5, 0.5, 1.0),
            (0.5, -0.5, 0.5, 1.0),
            (0.0, 0.5, 0.5, 1.0),
        ]);
        fill_triangle::<4>(&mut buf.view(), &t, TextureView::of(&tex), Filter::Nearest);

        assert!(buf.depth.iter().all(|d| d.is_infinite()));
        assert!(buf.color.iter().all(|&c| c == 0));
    }

    #[test]
    fn sampling_wraps_past_texture_edge() {
        let tex = Texture::from_fn("RAMP", 8, 8, |x, y| (x * 8 + y) as u32);
        let view = TextureView::of(&tex);

        // texel coordinate (width + 3) lands on texel 3
        let inside = gather_nearest::<1>(view, [3.5 / 8.0], [2.5 / 8.0]);
        let beyond = gather_nearest::<1>(view, [(8.0 + 3.5) / 8.0], [2.5 / 8.0]);
        assert_eq!(inside, beyond);
        assert_eq!(inside[0], 3 * 8 + 2);

        // bilinear wraps its whole 2×2 footprint the same way
        let inside = gather_bilinear::<1>(view, [3.2 / 8.0], [2.7 / 8.0]);
        let beyond = gather_bilinear::<1>(view, [(8.0 + 3.2) / 8.0], [(16.0 + 2.7) / 8.0]);
        assert_eq!(inside, beyond);
    }

    #[test]
    fn bilinear_blends_neighbours() {
        let tex = Texture::from_fn("BW", 2, 1, |x, _| {
            if x == 0 { 0xFF_00_00_00 } else { 0xFF_FF_FF_FF }
        });
        // u = 0.5 sits exactly between the two texels
        let mid = gather_bilinear::<1>(TextureView::of(&tex), [0.5], [0.5]);
        let r = mid[0] >> 16 & 0xFF;
        assert_eq!(r, 128);
        // and the alpha channel stays opaque
        assert_eq!(mid[0] >> 24, 0xFF);
    }
}
