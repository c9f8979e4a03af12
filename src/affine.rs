//! Rigid transform helpers
//!
//! These operate on 4x4 matrices that contain only rotation and translation.
//! That assumption makes the inverse much cheaper than the general form and
//! it holds for every matrix the skinning and IK paths produce, since scene
//! components carry a quaternion and a translation but no scale.

use nalgebra_glm as glm;

const LENGTH_EPSILON: f32 = 1e-6;
const ANGLE_EPSILON: f32 = 1e-6;

/// Applies a homogeneous transform to a point (w = 1)
#[must_use]
pub fn transform_point(m: &glm::Mat4, p: &glm::Vec3) -> glm::Vec3 {
    glm::vec4_to_vec3(&(m * glm::vec4(p.x, p.y, p.z, 1.0f32)))
}

/// Applies a homogeneous transform to a direction (w = 0)
#[must_use]
pub fn transform_direction(m: &glm::Mat4, v: &glm::Vec3) -> glm::Vec3 {
    glm::vec4_to_vec3(&(m * glm::vec4(v.x, v.y, v.z, 0.0f32)))
}

/// Inverts a rotation + translation matrix
///
/// The rotation block is orthonormal so its inverse is its transpose, and
/// the inverse translation is the negated translation carried through that
/// transposed rotation. Not valid for matrices containing scale or shear.
#[must_use]
pub fn rigid_inverse(m: &glm::Mat4) -> glm::Mat4 {
    let mut inv = glm::Mat4::identity();
    for r in 0..3 {
        for c in 0..3 {
            inv[(r, c)] = m[(c, r)];
        }
    }
    let t = glm::vec3(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    for r in 0..3 {
        inv[(r, 3)] =
            -(inv[(r, 0)] * t.x + inv[(r, 1)] * t.y + inv[(r, 2)] * t.z);
    }
    inv
}

/// Matrix for transforming surface normals under a rigid transform
///
/// The standard normal transform law, inverse then transpose, using the
/// cheap rigid inverse.
#[must_use]
pub fn normal_matrix(m: &glm::Mat4) -> glm::Mat4 {
    rigid_inverse(m).transpose()
}

/// Decomposes a unit quaternion into a rotation axis and an angle in radians
///
/// Near-identity rotations have no well defined axis, so those return the
/// Z axis with a zero angle rather than a NaN axis.
#[must_use]
pub fn axis_angle(q: &glm::Quat) -> (glm::Vec3, f32) {
    let q = glm::quat_normalize(q);
    let w = q.coords.w.clamp(-1.0f32, 1.0f32);
    let s = (1.0f32 - w * w).sqrt();
    if s < LENGTH_EPSILON {
        return (glm::vec3(0.0f32, 0.0f32, 1.0f32), 0.0f32);
    }
    (
        glm::vec3(q.coords.x / s, q.coords.y / s, q.coords.z / s),
        2.0f32 * w.acos(),
    )
}

/// Shortest rotation carrying the direction of `from` onto `to`
///
/// Inputs need not be unit length. Degenerate geometry falls back instead
/// of producing NaN: a zero length input yields the identity, as does a
/// rotation angle too small to matter, and an anti-parallel pair (where the
/// cross product vanishes) rotates about an arbitrary axis perpendicular
/// to `from`.
#[must_use]
pub fn rotation_between(from: &glm::Vec3, to: &glm::Vec3) -> glm::Quat {
    let from_len = glm::length(from);
    let to_len = glm::length(to);
    if from_len < LENGTH_EPSILON || to_len < LENGTH_EPSILON {
        return glm::Quat::identity();
    }
    let f = from / from_len;
    let t = to / to_len;
    let angle = glm::dot(&f, &t).clamp(-1.0f32, 1.0f32).acos();
    if angle < ANGLE_EPSILON {
        return glm::Quat::identity();
    }
    let axis = glm::cross(&f, &t);
    if glm::length(&axis) < LENGTH_EPSILON {
        return glm::quat_angle_axis(angle, &perpendicular(&f));
    }
    glm::quat_angle_axis(angle, &glm::normalize(&axis))
}

/// Unit vector perpendicular to `v`, built from the basis axis `v` is least
/// aligned with
#[must_use]
pub fn perpendicular(v: &glm::Vec3) -> glm::Vec3 {
    let ax = v.x.abs();
    let ay = v.y.abs();
    let az = v.z.abs();
    let basis = if ax <= ay && ax <= az {
        glm::vec3(1.0f32, 0.0f32, 0.0f32)
    } else if ay <= az {
        glm::vec3(0.0f32, 1.0f32, 0.0f32)
    } else {
        glm::vec3(0.0f32, 0.0f32, 1.0f32)
    };
    glm::normalize(&glm::cross(v, &basis))
}
