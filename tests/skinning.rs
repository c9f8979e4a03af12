//! Tests for the skin pipeline against a small three bone rig
//!
//! The rig is a chain of three joint components spaced one unit apart along
//! Y, with a mesh leaf whose three vertices are each bound fully to one
//! bone. Bone space matrices are the inverse binds, so the identity pose
//! produces identity skin matrices.

use ahash::{HashMap, HashMapExt};
use nalgebra_glm as glm;
use ossature::{
    affine, Component, ComponentPtr, Joint, JointPtr, Skeleton, SkeletonPtr,
    Skin, SkinMatrices, SkinMesh,
};
use std::sync::Once;

const EPSILON: f32 = 0.0001f32;
static INIT: Once = Once::new();

fn init_tests() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

fn mat4_eq(a: &glm::Mat4, b: &glm::Mat4) {
    let c = glm::equal_columns_eps(a, b, EPSILON);
    assert!(c.x && c.y && c.z && c.w);
}

fn vec3_eq(a: &glm::Vec3, b: &glm::Vec3) {
    let c = glm::equal_eps(a, b, EPSILON);
    assert!(c.x && c.y && c.z);
}

/// One vertex per bone, fully weighted
fn test_mesh() -> SkinMesh {
    SkinMesh::new(
        vec![
            glm::vec3(0.0f32, 0.0f32, 0.0f32),
            glm::vec3(0.0f32, 1.0f32, 0.0f32),
            glm::vec3(0.0f32, 2.0f32, 0.0f32),
        ],
        vec![
            glm::vec3(1.0f32, 0.0f32, 0.0f32),
            glm::vec3(1.0f32, 0.0f32, 0.0f32),
            glm::vec3(1.0f32, 0.0f32, 0.0f32),
        ],
        vec![[0, 0, 0, 0], [1, 0, 0, 0], [2, 0, 0, 0]],
        vec![
            [1.0f32, 0.0, 0.0, 0.0],
            [1.0f32, 0.0, 0.0, 0.0],
            [1.0f32, 0.0, 0.0, 0.0],
        ],
    )
    .unwrap()
}

/// Inverse bind offsets for joints at rest heights 0, 1, 2
fn inverse_binds() -> HashMap<usize, glm::Mat4> {
    let mut map = HashMap::new();
    for bone in 0..3 {
        #[allow(clippy::cast_precision_loss)]
        let height = bone as f32;
        map.insert(
            bone,
            glm::translation(&glm::vec3(0.0f32, -height, 0.0f32)),
        );
    }
    map
}

struct Rig {
    root: ComponentPtr,
    skeleton: SkeletonPtr,
    joints: Vec<JointPtr>,
}

fn three_bone_rig() -> Rig {
    let root = Component::group("rig");
    let mut components = Vec::new();
    let mut joints = Vec::new();
    for index in 0..3 {
        let c = Component::group(&format!("joint{index}"));
        if index == 0 {
            Component::add_child(&root, &c);
        } else {
            Component::add_child(&components[index - 1], &c);
            c.write()
                .set_translation(&glm::vec3(0.0f32, 1.0f32, 0.0f32));
        }
        joints.push(Joint::new(ComponentPtr::clone(&c)));
        components.push(c);
    }
    let mesh = Component::skin_mesh("body", test_mesh());
    Component::add_child(&root, &mesh);
    let skeleton = Skeleton::new(joints.clone()).into_ptr();
    skeleton.write().update();
    Rig {
        root,
        skeleton,
        joints,
    }
}

#[test]
fn identity_pose_produces_identity_skin_matrices() {
    init_tests();

    let rig = three_bone_rig();
    let mut skin =
        Skin::new(rig.root, Some(&rig.skeleton), inverse_binds());
    skin.update();
    for bone in 0..3 {
        mat4_eq(&skin.skin_matrix(bone), &glm::Mat4::identity());
    }
}

#[test]
fn skin_matrix_is_bone_times_bone_space() {
    let rig = three_bone_rig();
    let binds = inverse_binds();
    let mut skin =
        Skin::new(rig.root, Some(&rig.skeleton), binds.clone());

    // Bend the root joint and refresh the pipeline
    rig.joints[0].write().set_orientation(&glm::quat_angle_axis(
        std::f32::consts::FRAC_PI_2,
        &glm::vec3(0.0f32, 0.0f32, 1.0f32),
    ));
    rig.skeleton.write().update();
    skin.update();

    for bone in 0..3 {
        let expected =
            rig.skeleton.read().bone_matrix(bone).unwrap() * binds[&bone];
        mat4_eq(&skin.skin_matrix(bone), &expected);
        mat4_eq(
            &skin.skin_it_matrix(bone),
            &affine::normal_matrix(&expected),
        );
    }
}

#[test]
fn missing_bone_space_entry_degrades_to_identity() {
    let rig = three_bone_rig();
    let mut binds = inverse_binds();
    binds.remove(&2);
    let mut skin = Skin::new(rig.root, Some(&rig.skeleton), binds);

    rig.joints[0].write().set_orientation(&glm::quat_angle_axis(
        0.4f32,
        &glm::vec3(0.0f32, 0.0f32, 1.0f32),
    ));
    rig.skeleton.write().update();
    skin.update();

    mat4_eq(&skin.skin_matrix(2), &glm::Mat4::identity());
    // Bones with full data are unaffected by the hole
    assert!(skin.uses_bone(2));
    let expected = rig.skeleton.read().bone_matrix(0).unwrap();
    mat4_eq(&skin.skin_matrix(0), &expected);
}

#[test]
fn no_skeleton_means_identity_and_conservative_usage() {
    let rig = three_bone_rig();
    let mut skin = Skin::new(rig.root, None, inverse_binds());
    skin.update();
    mat4_eq(&skin.skin_matrix(0), &glm::Mat4::identity());
    mat4_eq(&skin.skin_matrix(99), &glm::Mat4::identity());
    // No usage cache yet, so every bone conservatively counts as used
    assert!(skin.uses_bone(0));
    assert!(skin.uses_bone(99));
}

#[test]
fn bone_usage_follows_vertex_weights() {
    let rig = three_bone_rig();
    // Replace the mesh with one that only references bones 0 and 2
    let mesh = SkinMesh::new(
        vec![
            glm::vec3(0.0f32, 0.0f32, 0.0f32),
            glm::vec3(0.0f32, 2.0f32, 0.0f32),
        ],
        vec![
            glm::vec3(1.0f32, 0.0f32, 0.0f32),
            glm::vec3(1.0f32, 0.0f32, 0.0f32),
        ],
        vec![[0, 1, 0, 0], [2, 0, 0, 0]],
        // Bone 1 appears in a slot but with a weight below the epsilon
        vec![[1.0f32, 0.00001, 0.0, 0.0], [1.0f32, 0.0, 0.0, 0.0]],
    )
    .unwrap();
    let root = Component::group("rig");
    let leaf = Component::skin_mesh("partial", mesh);
    Component::add_child(&root, &leaf);

    let skin = Skin::new(root, Some(&rig.skeleton), HashMap::new());
    assert!(skin.uses_bone(0));
    assert!(!skin.uses_bone(1));
    assert!(skin.uses_bone(2));
    assert!(!skin.uses_bone(7));
}

#[test]
fn apply_skin_deforms_and_reset_restores() {
    let rig = three_bone_rig();
    let mut skin =
        Skin::new(ComponentPtr::clone(&rig.root), Some(&rig.skeleton), inverse_binds());

    rig.joints[0].write().set_orientation(&glm::quat_angle_axis(
        std::f32::consts::FRAC_PI_2,
        &glm::vec3(0.0f32, 0.0f32, 1.0f32),
    ));
    rig.skeleton.write().update();
    skin.update();
    skin.apply_skin();

    {
        let mesh = skin.submesh(0).unwrap().read();
        let mesh = mesh.mesh().unwrap();
        // The whole chain pivots 90 degrees around the root
        vec3_eq(&mesh.positions()[0], &glm::vec3(0.0f32, 0.0f32, 0.0f32));
        vec3_eq(&mesh.positions()[1], &glm::vec3(-1.0f32, 0.0f32, 0.0f32));
        vec3_eq(&mesh.positions()[2], &glm::vec3(-2.0f32, 0.0f32, 0.0f32));
        // Normals follow the rotation through the inverse transpose
        vec3_eq(&mesh.normals()[0], &glm::vec3(0.0f32, 1.0f32, 0.0f32));
    }

    skin.reset();
    let mesh = skin.submesh(0).unwrap().read();
    let mesh = mesh.mesh().unwrap();
    vec3_eq(&mesh.positions()[1], &glm::vec3(0.0f32, 1.0f32, 0.0f32));
    vec3_eq(&mesh.normals()[0], &glm::vec3(1.0f32, 0.0f32, 0.0f32));
}

#[test]
fn duplicate_shares_skeleton_but_not_meshes() {
    let rig = three_bone_rig();
    let mut skin =
        Skin::new(rig.root, Some(&rig.skeleton), inverse_binds());
    let mut copy = skin.duplicate();
    assert_eq!(copy.num_submeshes(), skin.num_submeshes());

    rig.joints[0].write().set_orientation(&glm::quat_angle_axis(
        std::f32::consts::FRAC_PI_2,
        &glm::vec3(0.0f32, 0.0f32, 1.0f32),
    ));
    rig.skeleton.write().update();
    skin.update();
    copy.update();

    // One skeleton drives both skins
    mat4_eq(&skin.skin_matrix(1), &copy.skin_matrix(1));

    // Mesh data is independent: deform only the copy
    copy.apply_skin();
    let original = skin.submesh(0).unwrap().read();
    let original = original.mesh().unwrap();
    vec3_eq(&original.positions()[1], &glm::vec3(0.0f32, 1.0f32, 0.0f32));
    let cloned = copy.submesh(0).unwrap().read();
    let cloned = cloned.mesh().unwrap();
    vec3_eq(&cloned.positions()[1], &glm::vec3(-1.0f32, 0.0f32, 0.0f32));
}

#[test]
fn matrix_block_conversion() {
    let rig = three_bone_rig();
    let mut skin =
        Skin::new(rig.root, Some(&rig.skeleton), inverse_binds());
    skin.update();

    let block = SkinMatrices::try_from(&skin).unwrap();
    let raw = block.raw_matrices();
    // Identity pose: column 3 of every used slot is the identity column
    assert!((raw[0][3][3] - 1.0f32).abs() < EPSILON);
    assert!((raw[0][0][0] - 1.0f32).abs() < EPSILON);
    // Slots past the skeleton's bone count stay identity
    assert!((raw[31][0][0] - 1.0f32).abs() < EPSILON);
}
