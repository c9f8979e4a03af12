use super::joint::JointPtr;
use nalgebra_glm as glm;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to a skeleton
///
/// Several `Skin`s may drive their matrices from one skeleton instance.
pub type SkeletonPtr = Arc<RwLock<Skeleton>>;

/// Ordered sequence of joints with cached per bone global transforms
///
/// The bone count is fixed at construction. `update` re-reads every joint's
/// component transform into the bone matrix list; it is expected to run once
/// per frame after animation or IK has posed the joints.
pub struct Skeleton {
    joints: Vec<JointPtr>,
    bone_matrices: Vec<glm::Mat4>,
}

impl Skeleton {
    #[must_use]
    pub fn new(joints: Vec<JointPtr>) -> Self {
        let count = joints.len();
        Self {
            joints,
            bone_matrices: vec![glm::Mat4::identity(); count],
        }
    }

    /// Wraps a skeleton in a shareable handle
    #[must_use]
    pub fn into_ptr(self) -> SkeletonPtr {
        Arc::new(RwLock::new(self))
    }

    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn joint(&self, index: usize) -> Option<&JointPtr> {
        self.joints.get(index)
    }

    /// Recomputes the bone matrix list from the live scene transforms
    pub fn update(&mut self) {
        for (matrix, joint) in
            self.bone_matrices.iter_mut().zip(&self.joints)
        {
            *matrix = joint.read().global_transform();
        }
    }

    /// Bone matrices as of the last `update`
    #[must_use]
    pub fn bone_matrices(&self) -> &[glm::Mat4] {
        &self.bone_matrices
    }

    #[must_use]
    pub fn bone_matrix(&self, index: usize) -> Option<glm::Mat4> {
        self.bone_matrices.get(index).copied()
    }
}
