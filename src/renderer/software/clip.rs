//! Homogeneous-space triangle clipping.
//!
//! Clipping happens in clip space, after projection and *before* the
//! perspective divide, so every intersection is an exact linear solve —
//! no FOV-dependent plane angles, no w-sign surprises. The canonical
//! volume is
//!
//! ```text
//! -w ≤ x ≤ w      -w ≤ y ≤ w      0 ≤ z ≤ w      w ≥ ε
//! ```
//!
//! (depth already mapped to [0, 1] by the projection). The last plane
//! rejects w-degenerate vertices so the divide downstream is always
//! well-defined.

use bitflags::bitflags;
use glam::{Vec2, Vec4};
use smallvec::SmallVec;

/// Vertices closer to the eye plane than this are treated as behind it.
pub const W_EPSILON: f32 = 1e-5;

/// One pre-clip vertex: clip-space position plus the attributes that
/// survive clipping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipVertex {
    pub pos: Vec4,
    pub uv: Vec2,
}

impl ClipVertex {
    pub fn new(pos: Vec4, uv: Vec2) -> Self {
        Self { pos, uv }
    }

    /// Linearly interpolate position and uv. Valid before the divide
    /// because both are linear in clip coordinates.
    #[inline]
    fn lerp(&self, other: &Self, s: f32) -> Self {
        Self {
            pos: self.pos.lerp(other.pos, s),
            uv: self.uv.lerp(other.uv, s),
        }
    }
}

pub type ClipTriangle = [ClipVertex; 3];

/*------------------------- clip planes ------------------------------*/

/// The ordered plane list. Order is part of the output contract: the
/// quad-split diagonals depend on it, and tests pin it down.
pub const CLIP_PLANES: [ClipPlane; 7] = [
    ClipPlane::Left,
    ClipPlane::Right,
    ClipPlane::Top,
    ClipPlane::Bottom,
    ClipPlane::Near,
    ClipPlane::Far,
    ClipPlane::WPositive,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipPlane {
    /// x ≥ -w
    Left,
    /// x ≤ w
    Right,
    /// y ≤ w
    Top,
    /// y ≥ -w
    Bottom,
    /// z ≥ 0
    Near,
    /// z ≤ w
    Far,
    /// w ≥ ε — guards the perspective divide
    WPositive,
}

impl ClipPlane {
    /// Signed distance; ≥ 0 inside. Linear in (x, y, z, w), which is
    /// what makes `s = d0 / (d0 - d1)` an exact intersection solve.
    #[inline]
    pub fn signed_distance(self, p: Vec4) -> f32 {
        match self {
            Self::Left => p.w + p.x,   // x ≥ -w  ⇒  w + x ≥ 0
            Self::Right => p.w - p.x,  // x ≤ w   ⇒  w - x ≥ 0
            Self::Top => p.w - p.y,    // y ≤ w   ⇒  w - y ≥ 0
            Self::Bottom => p.w + p.y, // y ≥ -w  ⇒  w + y ≥ 0
            Self::Near => p.z,         // z ≥ 0
            Self::Far => p.w - p.z,    // z ≤ w   ⇒  w - z ≥ 0
            Self::WPositive => p.w - W_EPSILON,
        }
    }
}

bitflags! {
    /// One bit per violated plane; empty = fully inside.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Outcode: u8 {
        const LEFT   = 0b000_0001;
        const RIGHT  = 0b000_0010;
        const TOP    = 0b000_0100;
        const BOTTOM = 0b000_1000;
        const NEAR   = 0b001_0000;
        const FAR    = 0b010_0000;
        const W      = 0b100_0000;
    }
}

impl Outcode {
    pub fn of(p: Vec4) -> Self {
        let mut code = Self::empty();
        for (i, plane) in CLIP_PLANES.iter().enumerate() {
            if plane.signed_distance(p) < 0.0 {
                code |= Self::from_bits_retain(1 << i);
            }
        }
        code
    }
}

/*-------------------------- scratch ---------------------------------*/

/// Worst case for one triangle: each plane adds at most one vertex to
/// the clipped region, so a 7-plane pass fans out to at most 8 pieces.
/// The inline capacity covers that with headroom; `SmallVec` spilling
/// to the heap is legal but never expected in practice.
const FAN_INLINE: usize = 16;

/// Fan-out past this many triangles cannot come from clipping a single
/// triangle and means the emit logic is broken.
const FAN_SANITY: usize = 42; // 128-vertex cap / 3

/// Ping/pong buffers for the clipper. Owned by the caller, passed per
/// call, reset once per frame; the clipper itself holds no state
/// between calls.
#[derive(Default)]
pub struct FrameScratch {
    ping: SmallVec<[ClipTriangle; FAN_INLINE]>,
    pong: SmallVec<[ClipTriangle; FAN_INLINE]>,
}

impl FrameScratch {
    pub fn reset(&mut self) {
        self.ping.clear();
        self.pong.clear();
    }
}

/*-------------------------- the clipper -----------------------------*/

/// Clip one triangle against all 7 planes.
///
/// Returns a borrow of `scratch` holding 0..N triangles whose vertices
/// all satisfy the volume inequalities. Purely functional: no
/// persistent state, never panics on numeric input (NaN positions
/// produce NaN distances, which classify as behind and discard).
pub fn clip_triangle<'s>(
    tri: &ClipTriangle,
    scratch: &'s mut FrameScratch,
) -> &'s [ClipTriangle] {
    let codes = [
        Outcode::of(tri[0].pos),
        Outcode::of(tri[1].pos),
        Outcode::of(tri[2].pos),
    ];

    scratch.ping.clear();
    scratch.pong.clear();

    // Trivial accept: every vertex inside every plane.
    if codes.iter().all(|c| c.is_empty()) {
        scratch.ping.push(*tri);
        return &scratch.ping;
    }
    // Trivial reject: all three vertices share a violated plane; the
    // volume is convex, so the whole triangle is outside it.
    if !(codes[0] & codes[1] & codes[2]).is_empty() {
        return &scratch.ping;
    }

    scratch.ping.push(*tri);
    for plane in CLIP_PLANES {
        scratch.pong.clear();
        for tri in &scratch.ping {
            clip_against(plane, tri, &mut scratch.pong);
        }
        std::mem::swap(&mut scratch.ping, &mut scratch.pong);
        if scratch.ping.is_empty() {
            break;
        }
        debug_assert!(scratch.ping.len() <= FAN_SANITY, "clip fan exploded");
    }

    &scratch.ping
}

/// Clip a single triangle against a single plane, appending the result.
fn clip_against(
    plane: ClipPlane,
    tri: &ClipTriangle,
    out: &mut SmallVec<[ClipTriangle; FAN_INLINE]>,
) {
    let d = [
        plane.signed_distance(tri[0].pos),
        plane.signed_distance(tri[1].pos),
        plane.signed_distance(tri[2].pos),
    ];
    // NaN compares false, so a NaN vertex counts as behind and the
    // triangle shrinks or vanishes instead of poisoning the output.
    let in_front = [d[0] >= 0.0, d[1] >= 0.0, d[2] >= 0.0];

    match in_front.iter().filter(|&&f| f).count() {
        3 => out.push(*tri),
        0 => {}

        // One vertex behind: the surviving region is a quad. Replace
        // the behind vertex with the two edge intersections and split
        // along the prev–exit diagonal, so the second triangle reuses
        // two vertices of the first.
        2 => {
            let b = in_front.iter().position(|&f| !f).unwrap();
            let prev = (b + 2) % 3;
            let next = (b + 1) % 3;

            let enter = isect(&tri[prev], d[prev], &tri[b], d[b]);
            let exit = isect(&tri[b], d[b], &tri[next], d[next]);

            out.push([tri[prev], enter, exit]);
            out.push([tri[prev], exit, tri[next]]);
        }

        // Two behind: one smaller triangle between the intersections.
        1 => {
            let a = in_front.iter().position(|&f| f).unwrap();
            let prev = (a + 2) % 3;
            let next = (a + 1) % 3;

            let exit = isect(&tri[a], d[a], &tri[next], d[next]);
            let enter = isect(&tri[prev], d[prev], &tri[a], d[a]);

            out.push([tri[a], exit, enter]);
        }

        _ => unreachable!(),
    }
}

/// Intersection of edge (start → end) with the plane whose signed
/// distances at the endpoints are `d0` / `d1`. Solved in clip
/// coordinates; for LEFT this expands to the familiar
/// `s = -(w0+x0) / ((x1-x0) + (w1-w0))`.
#[inline]
fn isect(start: &ClipVertex, d0: f32, end: &ClipVertex, d1: f32) -> ClipVertex {
    let s = d0 / (d0 - d1);
    start.lerp(end, s)
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
