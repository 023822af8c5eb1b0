use glam::{Mat4, Vec3, vec3};

/// Free-look view-point in world space.
///
/// * Yaw turns around the world Y axis (0 = looking down −Z).
/// * Pitch is clamped just short of ±90° so the view basis never
///   degenerates.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub pos: Vec3,
    yaw: f32,   // radians, counter-clockwise seen from above
    pitch: f32, // radians, positive looks up
    fov_y: f32, // vertical FoV (radians, typical 60–90°)
    near: f32,
    far: f32,
}

impl Camera {
    const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

    /// Create a new camera at `pos`, facing `yaw`, with vertical FoV `fov_y`.
    pub fn new(pos: Vec3, yaw: f32, fov_y: f32, near: f32, far: f32) -> Self {
        Self {
            pos,
            yaw,
            pitch: 0.0,
            fov_y,
            near,
            far,
        }
    }

    /*──────────────────────── derived vectors ───────────────────────*/

    /// Unit vector pointing where the camera looks.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        vec3(-sy * cp, sp, -cy * cp)
    }

    /// Unit vector pointing to the camera's right on the ground plane.
    #[inline]
    pub fn right(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        vec3(cy, 0.0, -sy)
    }

    /*──────────────────────── movement helpers ──────────────────────*/

    /// Move by `forward` units and `side` (strafe).
    pub fn step(&mut self, forward: f32, side: f32) {
        self.pos += self.forward() * forward + self.right() * side;
    }

    /// Rotate the view; positive `d_yaw` turns left, positive `d_pitch`
    /// looks up. Pitch is clamped, yaw wraps.
    pub fn turn(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw = (self.yaw + d_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + d_pitch).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    /*───────────────── projection / view matrices ───────────────────*/

    /// World → view transform.
    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.pos, self.forward(), Vec3::Y)
    }

    /// View → clip transform with depth mapped to [0, 1], matching the
    /// rasterizer's `0 ≤ z ≤ w` clip volume.
    #[inline]
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }

    /// `projection × view` for viewport ratio `width / height`.
    #[inline]
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 0.0, 70_f32.to_radians(), 0.1, 100.0)
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
