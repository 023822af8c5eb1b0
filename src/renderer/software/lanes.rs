//! Lane-parallel building blocks for the triangle filler.
//!
//! A "lane" is one scalar slot processed in lockstep with its
//! neighbours. Everything here is written with per-lane scalar
//! semantics over `[T; N]` arrays: masks are explicit all-ones/all-zero
//! words and merges are bitwise selects, so the 4-wide and 8-wide
//! instantiations are bit-for-bit identical by construction and the
//! optimizer is free to lower a group to one vector op. The only
//! width-dependent thing is which instruction set the caller compiles
//! the 8-wide body for (see [`LaneWidth::detect`]).

use std::array::from_fn;

/// Lane mask: one word per lane, `!0` = active, `0` = inactive.
pub type Mask<const N: usize> = [u32; N];

/*---------------------- width selection -----------------------------*/

/// Rasterizer throughput knob, fixed once when the backend is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneWidth {
    X4,
    X8,
}

impl LaneWidth {
    /// Detect the widest profitable lane count for this machine.
    /// Queried once at startup, never per triangle.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        if std::arch::is_x86_feature_detected!("avx2") {
            return LaneWidth::X8;
        }
        LaneWidth::X4
    }

    pub const fn lanes(self) -> usize {
        match self {
            LaneWidth::X4 => 4,
            LaneWidth::X8 => 8,
        }
    }
}

/*---------------------- broadcast / load ----------------------------*/

#[inline(always)]
pub fn splat<const N: usize, T: Copy>(v: T) -> [T; N] {
    [v; N]
}

#[inline(always)]
pub fn load_f32<const N: usize>(src: &[f32], off: usize) -> [f32; N] {
    from_fn(|k| src[off + k])
}

#[inline(always)]
pub fn load_u32<const N: usize>(src: &[u32], off: usize) -> [u32; N] {
    from_fn(|k| src[off + k])
}

/*-------------------------- masks -----------------------------------*/

/// `!0` where the signed value is non-negative (sign-bit smear).
#[inline(always)]
pub fn mask_ge_zero<const N: usize>(e: [i64; N]) -> Mask<N> {
    from_fn(|k| !((e[k] >> 63) as u32))
}

/// `!0` where `a < b`. NaN on either side compares false → lane off.
#[inline(always)]
pub fn mask_lt<const N: usize>(a: [f32; N], b: [f32; N]) -> Mask<N> {
    from_fn(|k| ((a[k] < b[k]) as u32).wrapping_neg())
}

#[inline(always)]
pub fn mask_and<const N: usize>(a: Mask<N>, b: Mask<N>) -> Mask<N> {
    from_fn(|k| a[k] & b[k])
}

/// Group-level test; the only place a mask may turn into a branch.
#[inline(always)]
pub fn mask_any<const N: usize>(m: Mask<N>) -> bool {
    m.iter().any(|&w| w != 0)
}

/*------------------------ bitwise select ----------------------------*/

/// `m ? a : b` per lane, as a pure bitwise merge.
#[inline(always)]
pub fn select_u32<const N: usize>(m: Mask<N>, a: [u32; N], b: [u32; N]) -> [u32; N] {
    from_fn(|k| (a[k] & m[k]) | (b[k] & !m[k]))
}

/// Same merge for floats, through their bit patterns.
#[inline(always)]
pub fn select_f32<const N: usize>(m: Mask<N>, a: [f32; N], b: [f32; N]) -> [f32; N] {
    from_fn(|k| f32::from_bits((a[k].to_bits() & m[k]) | (b[k].to_bits() & !m[k])))
}

/*------------------------- arithmetic -------------------------------*/

#[inline(always)]
pub fn add_i64<const N: usize>(a: [i64; N], b: [i64; N]) -> [i64; N] {
    from_fn(|k| a[k] + b[k])
}

/// `base, base+step, base+2·step, …` — one edge value per lane.
#[inline(always)]
pub fn ramp<const N: usize>(base: i64, step: i64) -> [i64; N] {
    from_fn(|k| base + k as i64 * step)
}

#[inline(always)]
pub fn i64_to_f32<const N: usize>(a: [i64; N]) -> [f32; N] {
    from_fn(|k| a[k] as f32)
}

#[inline(always)]
pub fn mul<const N: usize>(a: [f32; N], b: [f32; N]) -> [f32; N] {
    from_fn(|k| a[k] * b[k])
}

#[inline(always)]
pub fn scale<const N: usize>(a: [f32; N], s: f32) -> [f32; N] {
    from_fn(|k| a[k] * s)
}

#[inline(always)]
pub fn recip<const N: usize>(a: [f32; N]) -> [f32; N] {
    from_fn(|k| 1.0 / a[k])
}

/// Barycentric blend: `a·la + b·lb + c·lc` per lane.
#[inline(always)]
pub fn interp3<const N: usize>(
    la: [f32; N],
    lb: [f32; N],
    lc: [f32; N],
    a: f32,
    b: f32,
    c: f32,
) -> [f32; N] {
    from_fn(|k| a * la[k] + b * lb[k] + c * lc[k])
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
