//! Per-draw uniform block

use attractor_physics::FrameTransforms;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Maps OpenGL clip depth `[-1, 1]` onto wgpu's `[0, 1]`; x and y untouched.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

/// Uniform for one draw, shared layout of points.wgsl and attractors.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RenderUniform {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    /// Projection with depth already remapped for wgpu
    pub projection: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x, y: viewport size in pixels, z: point size in pixels
    pub viewport_point: [f32; 4],
}

impl RenderUniform {
    pub fn new(
        transforms: &FrameTransforms,
        color: Vec4,
        viewport: (u32, u32),
        point_size: f32,
    ) -> Self {
        Self {
            model: transforms.model.to_cols_array_2d(),
            view: transforms.view.to_cols_array_2d(),
            projection: (OPENGL_TO_WGPU_MATRIX * transforms.projection).to_cols_array_2d(),
            color: color.to_array(),
            viewport_point: [viewport.0.max(1) as f32, viewport.1.max(1) as f32, point_size, 0.0],
        }
    }
}
