use crate::renderer::Rgba;
use crate::world::Texture;

/// Caller-owned framebuffer storage, loaned to the rasterizer for one
/// triangle at a time. The rasterizer never allocates or resizes it.
///
/// `stride` is the distance between row starts in pixels and must be at
/// least `width`; the padding columns give lane-group stores room so a
/// full group can always be written without crossing into the next row.
pub struct FrameView<'a> {
    pub color: &'a mut [Rgba],
    /// Smaller = nearer. Cleared to `f32::INFINITY` by the owner.
    pub depth: &'a mut [f32],
    pub width: usize,
    pub height: usize,
    pub stride: usize,
}

impl<'a> FrameView<'a> {
    pub fn new(
        color: &'a mut [Rgba],
        depth: &'a mut [f32],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Self {
        assert!(stride >= width, "row stride must cover the width");
        assert!(color.len() >= stride * height);
        assert!(depth.len() >= stride * height);
        Self {
            color,
            depth,
            width,
            height,
            stride,
        }
    }

    #[inline(always)]
    pub fn row_offset(&self, y: usize) -> usize {
        y * self.stride
    }
}

/// Read-only view of one texture's texels, wrap-addressed by the
/// sampler. Lives for at most a frame; the underlying pixels are
/// immutable while any view exists.
#[derive(Clone, Copy)]
pub struct TextureView<'a> {
    pub texels: &'a [Rgba],
    pub width: usize,
    pub height: usize,
}

impl<'a> TextureView<'a> {
    pub fn of(tex: &'a Texture) -> Self {
        assert!(tex.w > 0 && tex.h > 0, "cannot sample an empty texture");
        debug_assert_eq!(tex.pixels.len(), tex.w * tex.h);
        Self {
            texels: &tex.pixels,
            width: tex.w,
            height: tex.h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn stride_below_width_is_rejected() {
        let mut color = vec![0u32; 64];
        let mut depth = vec![f32::INFINITY; 64];
        FrameView::new(&mut color, &mut depth, 10, 6, 8);
    }

    #[test]
    fn view_of_texture_borrows_dimensions() {
        let tex = Texture::default();
        let view = TextureView::of(&tex);
        assert_eq!((view.width, view.height), (8, 8));
        assert_eq!(view.texels.len(), 64);
    }
}
