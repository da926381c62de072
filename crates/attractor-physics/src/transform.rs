//! Model, view and projection matrices
//!
//! All matrices are column-major (glam convention) and applied as
//! `clip = projection * view * model * position`. The entries reproduce the
//! classic OpenGL fixed-function formulas, including the clip-space depth
//! range of `[-1, 1]`.

use glam::{Mat4, Vec3, Vec4};

/// Object placement: translation, Euler rotation in degrees, per-axis scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    pub translation: Vec3,
    pub rotation_degrees: Vec3,
    pub scale: Vec3,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation_degrees: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Camera basis inputs for a right-handed look-at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub eye: Vec3,
    pub up: Vec3,
    pub look: Vec3,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 30.0),
            up: Vec3::Y,
            look: Vec3::ZERO,
        }
    }
}

/// Symmetric perspective frustum; `width`/`height` are the near-plane extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub near: f32,
    pub far: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Frustum {
    fn default() -> Self {
        Self {
            near: 1.0,
            far: 100.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

pub fn translation_matrix(t: Vec3) -> Mat4 {
    Mat4::from_cols(
        Vec4::X,
        Vec4::Y,
        Vec4::Z,
        Vec4::new(t.x, t.y, t.z, 1.0),
    )
}

pub fn scale_matrix(s: Vec3) -> Mat4 {
    Mat4::from_diagonal(s.extend(1.0))
}

pub fn rotation_x(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    Mat4::from_cols(
        Vec4::X,
        Vec4::new(0.0, c, s, 0.0),
        Vec4::new(0.0, -s, c, 0.0),
        Vec4::W,
    )
}

pub fn rotation_y(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    Mat4::from_cols(
        Vec4::new(c, 0.0, -s, 0.0),
        Vec4::Y,
        Vec4::new(s, 0.0, c, 0.0),
        Vec4::W,
    )
}

/// Rotation about Z. Unlike [`rotation_x`] and [`rotation_y`] the column
/// layout turns clockwise for positive angles (`+X` goes to `-Y`).
pub fn rotation_z(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    Mat4::from_cols(
        Vec4::new(c, -s, 0.0, 0.0),
        Vec4::new(s, c, 0.0, 0.0),
        Vec4::Z,
        Vec4::W,
    )
}

/// `Translation · RotZ · RotY · RotX · Scale`
pub fn model_matrix(params: &ModelParams) -> Mat4 {
    let r = params.rotation_degrees;
    translation_matrix(params.translation)
        * rotation_z(r.z)
        * rotation_y(r.y)
        * rotation_x(r.x)
        * scale_matrix(params.scale)
}

/// Orthonormal camera basis `(u, v, n)`; `n` points from `look` back to `eye`.
pub fn camera_basis(camera: &CameraParams) -> (Vec3, Vec3, Vec3) {
    let n = (camera.eye - camera.look).normalize();
    let u = camera.up.cross(n).normalize();
    let v = n.cross(u);
    (u, v, n)
}

pub fn view_matrix(camera: &CameraParams) -> Mat4 {
    let (u, v, n) = camera_basis(camera);
    let eye = camera.eye;
    Mat4::from_cols(
        Vec4::new(u.x, v.x, n.x, 0.0),
        Vec4::new(u.y, v.y, n.y, 0.0),
        Vec4::new(u.z, v.z, n.z, 0.0),
        Vec4::new(-u.dot(eye), -v.dot(eye), -n.dot(eye), 1.0),
    )
}

/// Inverse of [`view_matrix`] built from the basis directly (rotation
/// transposed, translation = eye).
pub fn inverse_view_matrix(camera: &CameraParams) -> Mat4 {
    let (u, v, n) = camera_basis(camera);
    Mat4::from_cols(u.extend(0.0), v.extend(0.0), n.extend(0.0), camera.eye.extend(1.0))
}

pub fn projection_matrix(frustum: &Frustum) -> Mat4 {
    let Frustum {
        near,
        far,
        width,
        height,
    } = *frustum;
    Mat4::from_cols(
        Vec4::new(2.0 * near / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / height, 0.0, 0.0),
        Vec4::new(0.0, 0.0, -(far + near) / (far - near), -1.0),
        Vec4::new(0.0, 0.0, -2.0 * (far * near) / (far - near), 0.0),
    )
}

/// Everything the Transform Pipeline needs for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneParams {
    pub model: ModelParams,
    pub camera: CameraParams,
    pub frustum: Frustum,
}

impl SceneParams {
    pub fn transforms(&self) -> FrameTransforms {
        FrameTransforms {
            model: model_matrix(&self.model),
            view: view_matrix(&self.camera),
            projection: projection_matrix(&self.frustum),
        }
    }
}

/// The three matrices handed to the renderer each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl FrameTransforms {
    pub fn clip_from_object(&self) -> Mat4 {
        self.projection * self.view * self.model
    }

    pub fn to_clip(&self, position: Vec4) -> Vec4 {
        self.clip_from_object() * position
    }
}
