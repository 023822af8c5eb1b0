//! The software back-end: owns the frame's color/depth storage and
//! drives clip → divide → fill for every triangle the scene yields.

pub mod clip;
pub mod extract;
pub mod frame;
pub mod lanes;
pub mod raster;

use glam::Mat4;
use log::{debug, info};

use crate::renderer::{Renderer, Rgba};
use crate::world::{Camera, Scene, TextureBank};

use clip::FrameScratch;
use extract::ExtractCtx;
use frame::FrameView;

pub use lanes::LaneWidth;
pub use raster::Filter;

/// Rows are padded to this many pixels so the widest lane group can
/// always store a full group without crossing into the next row.
const STRIDE_ALIGN: usize = 8;

pub struct Software {
    color: Vec<Rgba>,
    depth: Vec<f32>,

    width: usize,
    height: usize,
    stride: usize,

    lanes: LaneWidth,
    pub filter: Filter,

    scratch: FrameScratch,
}

impl Software {
    /// Build a backend with the lane width this machine supports.
    /// The choice is made exactly once; per-triangle code never
    /// re-queries CPU features.
    pub fn new() -> Self {
        let lanes = LaneWidth::detect();
        info!("software renderer: {}-wide lanes", lanes.lanes());
        Self::with_lanes(lanes)
    }

    /// Force a lane width (tests, benchmarking, `--lanes` in the demo).
    pub fn with_lanes(lanes: LaneWidth) -> Self {
        Self {
            color: Vec::new(),
            depth: Vec::new(),
            width: 0,
            height: 0,
            stride: 0,
            lanes,
            filter: Filter::default(),
            scratch: FrameScratch::default(),
        }
    }

    pub fn lane_width(&self) -> LaneWidth {
        self.lanes
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Default for Software {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for Software {
    fn begin_frame(&mut self, w: usize, h: usize) {
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
            self.stride = (w + STRIDE_ALIGN - 1) & !(STRIDE_ALIGN - 1);
            self.color.resize(self.stride * h, 0);
            self.depth.resize(self.stride * h, f32::INFINITY);
            debug!("framebuffer {w}×{h}, stride {}", self.stride);
        }

        // dark-grey clear, depth fully open
        self.color.fill(0xFF_20_20_20);
        self.depth.fill(f32::INFINITY);
        self.scratch.reset();
    }

    fn draw_scene(&mut self, scene: &Scene, camera: &Camera, bank: &TextureBank) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let view_proj: Mat4 = camera.view_projection(self.width as f32 / self.height as f32);

        let mut ctx = ExtractCtx {
            frame: FrameView::new(
                &mut self.color,
                &mut self.depth,
                self.width,
                self.height,
                self.stride,
            ),
            scratch: &mut self.scratch,
            bank,
            filter: self.filter,
            lanes: self.lanes,
            view_proj,
        };
        extract::draw_scene(&mut ctx, scene);
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        submit(&self.color, self.stride, self.height);
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
