//! Tests for the affine module
//!
//! These focus on the rigid inverse and the normal transform law, which the
//! skinning path depends on: a normal stays perpendicular to a surface when
//! carried through the inverse transpose of the surface's transform.

use log::info;
use nalgebra_glm as glm;
use ossature::affine;
use std::sync::Once;

const EPSILON: f32 = 0.0001f32; // Small value for float comparisons
static INIT: Once = Once::new();

/// Initializes logging in a "once per test run" manner. Call at the start of
/// each test that needs logging.
fn init_tests() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

fn example_rigid() -> glm::Mat4 {
    glm::translation(&glm::vec3(3.0f32, -1.0f32, 7.5f32))
        * glm::quat_to_mat4(&glm::quat_angle_axis(
            0.9f32,
            &glm::normalize(&glm::vec3(1.0f32, 1.0f32, 0.0f32)),
        ))
}

#[test]
fn rigid_inverse_round_trip() {
    init_tests();

    let m = example_rigid();
    let inv = affine::rigid_inverse(&m);
    info!("rigid_inverse_round_trip inv={:?}", inv);

    let c = glm::equal_columns_eps(&(inv * m), &glm::Mat4::identity(), EPSILON);
    assert!(c.x && c.y && c.z && c.w);
    let c = glm::equal_columns_eps(&(m * inv), &glm::Mat4::identity(), EPSILON);
    assert!(c.x && c.y && c.z && c.w);
}

#[test]
fn normal_matrix_is_transposed_inverse() {
    let m = example_rigid();
    let expected = affine::rigid_inverse(&m).transpose();
    let c = glm::equal_columns_eps(&affine::normal_matrix(&m), &expected, EPSILON);
    assert!(c.x && c.y && c.z && c.w);
}

/// A normal orthogonal to a tangent stays orthogonal after transforming the
/// tangent by the matrix and the normal by its inverse transpose
#[test]
fn normal_transform_preserves_orthogonality() {
    let m = example_rigid();
    let it = affine::normal_matrix(&m);

    let tangent = glm::normalize(&glm::vec3(0.3f32, 0.9f32, -0.1f32));
    let normal = affine::perpendicular(&tangent);
    assert!(glm::dot(&tangent, &normal).abs() < EPSILON);

    let moved_tangent = affine::transform_direction(&m, &tangent);
    let moved_normal = affine::transform_direction(&it, &normal);
    assert!(glm::dot(&moved_tangent, &moved_normal).abs() < EPSILON);
}

#[test]
fn point_and_direction_transforms_differ_by_translation() {
    let m = glm::translation(&glm::vec3(0.0f32, 5.0f32, 0.0f32));
    let v = glm::vec3(1.0f32, 0.0f32, 0.0f32);
    let p = affine::transform_point(&m, &v);
    let d = affine::transform_direction(&m, &v);
    let c = glm::equal_eps(&p, &glm::vec3(1.0f32, 5.0f32, 0.0f32), EPSILON);
    assert!(c.x && c.y && c.z);
    let c = glm::equal_eps(&d, &v, EPSILON);
    assert!(c.x && c.y && c.z);
}
