//! Rendering abstraction layer.
//!
//! *The rest of the engine never touches a pixel buffer directly.*
//! It hands a read-only [`crate::world::Scene`] and a camera to a type
//! that implements [`Renderer`].
//!
//! * You can plug multiple back-ends (`renderer::software`, a future
//!   `renderer::gl`, …) without changing scene code; the variant is
//!   picked once at startup and never re-queried per triangle.
//! * `end_frame` **loans** the finished buffer to a user-supplied
//!   closure, so presentation stays in the windowing collaborator.

use crate::world::{Camera, Scene, TextureBank};

/// Pixel format of the software frame-buffer (0xAARRGGBB).
pub type Rgba = u32;

/// A renderer that owns its color/depth storage for the whole frame.
///
/// One thread owns the renderer for the duration of a frame; the
/// software back-end performs no locking because it is the sole writer.
pub trait Renderer {
    /// (Re)allocate internal buffers for the requested resolution and
    /// clear them.
    fn begin_frame(&mut self, width: usize, height: usize);

    /// Rasterise every mesh reachable from the scene roots.
    fn draw_scene(&mut self, scene: &Scene, camera: &Camera, bank: &TextureBank);

    /// Finish the frame and **loan** the finished buffer to `submit`.
    ///
    /// * `submit(&[Rgba], stride, height)` is run exactly once per frame.
    /// * The buffer is `stride × height` pixels; `stride ≥ width` because
    ///   rows are padded for full-width SIMD stores.
    /// * Software callers typically forward it to their window-manager;
    ///   a GPU back-end would call the closure with an empty slice.
    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize);
}

pub mod software;

pub use software::Software;
