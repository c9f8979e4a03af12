//! Bone to mesh binding and per frame skin matrix production.

use crate::{
    affine,
    kinematics::SkeletonPtr,
    rig_error::RigError,
    scene::{Component, ComponentPtr, INFLUENCES, WEIGHT_EPSILON},
};
use ahash::HashMap;
use log::debug;
use nalgebra_glm as glm;

/// Maximum bones in the fixed GPU hand-off block. You can't change this
/// constant without also changing the matching bound in the consuming
/// shader.
pub const MAX_BONES: usize = 32;

/// Binds the skin mesh leaves under a scene component to a skeleton
///
/// Each frame, `update` composes the skeleton's current bone matrices with
/// the fixed bind pose offsets into skin matrices (plus their inverse
/// transposes for normals), and `apply_skin` pushes those into every bound
/// mesh. Missing data never errors; it degrades to identity so a partially
/// configured skin still renders something sensible.
pub struct Skin {
    root: ComponentPtr,
    skeleton: Option<SkeletonPtr>,
    submeshes: Vec<ComponentPtr>,
    bone_space: HashMap<usize, glm::Mat4>,
    skin_matrices: Vec<glm::Mat4>,
    skin_it_matrices: Vec<glm::Mat4>,
    bone_used: Option<Vec<bool>>,
}

impl Skin {
    /// Creates a skin over the subtree rooted at `root`
    ///
    /// The subtree is scanned once, depth first pre-order, for skin mesh
    /// leaves; the discovery order is the `submesh` index order from then
    /// on. `bone_space` is the sparse bind pose offset table keyed by bone
    /// index; a bone with no entry is treated as unposed rather than as an
    /// error.
    #[must_use]
    pub fn new(
        root: ComponentPtr,
        skeleton: Option<&SkeletonPtr>,
        bone_space: HashMap<usize, glm::Mat4>,
    ) -> Self {
        let submeshes = Component::skin_mesh_leaves(&root);
        if submeshes.is_empty() {
            debug!("no skin mesh leaves under component");
        }
        let mut skin = Self {
            root,
            skeleton: None,
            submeshes,
            bone_space,
            skin_matrices: Vec::new(),
            skin_it_matrices: Vec::new(),
            bone_used: None,
        };
        if let Some(skeleton) = skeleton {
            skin.set_skeleton(skeleton);
        }
        skin
    }

    /// Clones this skin onto a deep copy of its subtree
    ///
    /// Submeshes are re-discovered on the cloned tree and the bind pose
    /// table is copied, but the skeleton handle is shared with the
    /// original. Two skins posed by one skeleton is a supported
    /// configuration; clone the skeleton itself first if independent posing
    /// is wanted.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let root = Component::clone_tree(&self.root);
        let mut skin = Self {
            submeshes: Component::skin_mesh_leaves(&root),
            root,
            skeleton: None,
            bone_space: self.bone_space.clone(),
            skin_matrices: Vec::new(),
            skin_it_matrices: Vec::new(),
            bone_used: None,
        };
        if let Some(skeleton) = &self.skeleton {
            skin.set_skeleton(skeleton);
        }
        skin
    }

    /// Attaches (or replaces) the driving skeleton
    ///
    /// The matrix lists are discarded and rebuilt identity-initialized at
    /// the new skeleton's bone count, and the bone usage cache is
    /// recomputed from the bound meshes.
    pub fn set_skeleton(&mut self, skeleton: &SkeletonPtr) {
        let count = skeleton.read().bone_count();
        self.skeleton = Some(SkeletonPtr::clone(skeleton));
        self.skin_matrices = vec![glm::Mat4::identity(); count];
        self.skin_it_matrices = vec![glm::Mat4::identity(); count];
        self.find_used_bones();
    }

    #[must_use]
    pub const fn skeleton(&self) -> Option<&SkeletonPtr> {
        self.skeleton.as_ref()
    }

    /// Rebuilds the bone usage cache
    ///
    /// A bone counts as used if any vertex of any bound mesh gives it a
    /// weight above `WEIGHT_EPSILON` in one of its influence slots. The
    /// cache only lets `update` skip bones nothing references; output for
    /// used bones is unaffected.
    pub fn find_used_bones(&mut self) {
        let Some(skeleton) = self.skeleton.clone() else {
            self.bone_used = None;
            return;
        };
        let mut used = vec![false; skeleton.read().bone_count()];
        for submesh in &self.submeshes {
            let guard = submesh.read();
            let Some(mesh) = guard.mesh() else { continue };
            for (indices, weights) in
                mesh.bone_indices().iter().zip(mesh.weights())
            {
                for slot in 0..INFLUENCES {
                    if weights[slot] > WEIGHT_EPSILON {
                        if let Some(flag) =
                            used.get_mut(indices[slot] as usize)
                        {
                            *flag = true;
                        }
                    }
                }
            }
        }
        self.bone_used = Some(used);
    }

    /// Recomputes the skin matrices from the skeleton's current bone
    /// matrices
    ///
    /// For each used bone, `skin = bone * bone_space`; if either input is
    /// missing the skin matrix is identity. The inverse transpose comes
    /// from the rigid inverse, which is valid because the composed
    /// transforms carry no scale. Without a skeleton this is a no-op.
    pub fn update(&mut self) {
        let Some(skeleton) = self.skeleton.clone() else {
            return;
        };
        let skeleton = skeleton.read();
        let bones = skeleton.bone_matrices();
        for index in 0..self.skin_matrices.len() {
            if let Some(used) = &self.bone_used {
                if !used.get(index).copied().unwrap_or(false) {
                    continue;
                }
            }
            let matrix = match (bones.get(index), self.bone_space.get(&index))
            {
                (Some(bone), Some(space)) => bone * space,
                _ => glm::Mat4::identity(),
            };
            self.skin_matrices[index] = matrix;
            self.skin_it_matrices[index] = affine::normal_matrix(&matrix);
        }
    }

    /// Pushes the current matrix lists into every bound mesh
    pub fn apply_skin(&self) {
        for submesh in &self.submeshes {
            if let Some(mesh) = submesh.write().mesh_mut() {
                mesh.apply_skin(&self.skin_matrices, &self.skin_it_matrices);
            }
        }
    }

    /// Returns every bound mesh to its neutral pose
    pub fn reset(&self) {
        for submesh in &self.submeshes {
            if let Some(mesh) = submesh.write().mesh_mut() {
                mesh.reset_skin();
            }
        }
    }

    /// Skin matrix for a bone, identity for any index with no entry
    #[must_use]
    pub fn skin_matrix(&self, bone: usize) -> glm::Mat4 {
        self.skin_matrices
            .get(bone)
            .copied()
            .unwrap_or_else(glm::Mat4::identity)
    }

    /// Inverse transpose skin matrix for a bone, identity for any index
    /// with no entry
    #[must_use]
    pub fn skin_it_matrix(&self, bone: usize) -> glm::Mat4 {
        self.skin_it_matrices
            .get(bone)
            .copied()
            .unwrap_or_else(glm::Mat4::identity)
    }

    /// Whether any bound vertex references this bone
    ///
    /// Conservatively true when the usage cache has never been built.
    #[must_use]
    pub fn uses_bone(&self, bone: usize) -> bool {
        self.bone_used
            .as_ref()
            .map_or(true, |used| used.get(bone).copied().unwrap_or(false))
    }

    #[must_use]
    pub fn num_submeshes(&self) -> usize {
        self.submeshes.len()
    }

    /// Bound mesh component by discovery order
    #[must_use]
    pub fn submesh(&self, index: usize) -> Option<&ComponentPtr> {
        self.submeshes.get(index)
    }

    #[must_use]
    pub const fn root_component(&self) -> &ComponentPtr {
        &self.root
    }
}

/// Fixed size matrix block for handing skin output to a renderer
///
/// Same idea as a shader-side uniform block: a bounded array a caller can
/// upload directly. Bones past the skeleton's count stay identity.
pub struct SkinMatrices {
    pub matrices: [glm::Mat4; MAX_BONES],
    pub it_matrices: [glm::Mat4; MAX_BONES],
}

impl Default for SkinMatrices {
    fn default() -> Self {
        Self {
            matrices: [glm::Mat4::identity(); MAX_BONES],
            it_matrices: [glm::Mat4::identity(); MAX_BONES],
        }
    }
}

impl SkinMatrices {
    /// Raw column-major skin matrices for upload
    #[must_use]
    pub fn raw_matrices(&self) -> [[[f32; 4]; 4]; MAX_BONES] {
        bytemuck::cast(self.matrices)
    }

    /// Raw column-major inverse transpose matrices for upload
    #[must_use]
    pub fn raw_it_matrices(&self) -> [[[f32; 4]; 4]; MAX_BONES] {
        bytemuck::cast(self.it_matrices)
    }
}

impl TryFrom<&Skin> for SkinMatrices {
    type Error = RigError;

    fn try_from(skin: &Skin) -> Result<Self, Self::Error> {
        let count = skin.skin_matrices.len();
        if count > MAX_BONES {
            return Err(RigError::TooManyBones(count));
        }
        let mut out = Self::default();
        for index in 0..count {
            out.matrices[index] = skin.skin_matrices[index];
            out.it_matrices[index] = skin.skin_it_matrices[index];
        }
        Ok(out)
    }
}
