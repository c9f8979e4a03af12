use crate::{affine, rig_error::RigError};
use itertools::izip;
use nalgebra_glm as glm;

/// Weights at or below this value do not bind a vertex to a bone
pub const WEIGHT_EPSILON: f32 = 1e-4;

/// Bone influence slots per vertex
pub const INFLUENCES: usize = 4;

/// Skinnable mesh geometry
///
/// Holds the bind pose vertex data together with the per vertex bone
/// bindings, plus the output arrays the skinning pass writes into. The bind
/// arrays never change after construction so `reset_skin` can always get
/// back to the neutral pose.
#[derive(Clone, Debug, Default)]
pub struct SkinMesh {
    bind_positions: Vec<glm::Vec3>,
    bind_normals: Vec<glm::Vec3>,
    bone_indices: Vec<[u16; INFLUENCES]>,
    weights: Vec<[f32; INFLUENCES]>,
    positions: Vec<glm::Vec3>,
    normals: Vec<glm::Vec3>,
}

impl SkinMesh {
    /// Creates a mesh from parallel per vertex arrays
    ///
    /// # Errors
    /// Returns `RigError::VertexCountMismatch` if the arrays disagree on
    /// vertex count.
    pub fn new(
        positions: Vec<glm::Vec3>,
        normals: Vec<glm::Vec3>,
        bone_indices: Vec<[u16; INFLUENCES]>,
        weights: Vec<[f32; INFLUENCES]>,
    ) -> Result<Self, RigError> {
        let count = positions.len();
        if normals.len() != count
            || bone_indices.len() != count
            || weights.len() != count
        {
            return Err(RigError::VertexCountMismatch);
        }
        Ok(Self {
            positions: positions.clone(),
            normals: normals.clone(),
            bind_positions: positions,
            bind_normals: normals,
            bone_indices,
            weights,
        })
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.bind_positions.len()
    }

    #[must_use]
    pub fn bone_indices(&self) -> &[[u16; INFLUENCES]] {
        &self.bone_indices
    }

    #[must_use]
    pub fn weights(&self) -> &[[f32; INFLUENCES]] {
        &self.weights
    }

    /// Current (skinned) vertex positions
    #[must_use]
    pub fn positions(&self) -> &[glm::Vec3] {
        &self.positions
    }

    /// Current (skinned) vertex normals
    #[must_use]
    pub fn normals(&self) -> &[glm::Vec3] {
        &self.normals
    }

    #[must_use]
    pub fn bind_positions(&self) -> &[glm::Vec3] {
        &self.bind_positions
    }

    /// Deforms the bind pose by the per bone matrix lists
    ///
    /// Positions go through the skin matrices, normals through the matching
    /// inverse transpose matrices and are renormalized. A bone index with no
    /// matrix behaves as identity. A vertex with no meaningful weight keeps
    /// its bind data.
    pub fn apply_skin(
        &mut self,
        matrices: &[glm::Mat4],
        it_matrices: &[glm::Mat4],
    ) {
        for (out_p, out_n, bind_p, bind_n, indices, weights) in izip!(
            &mut self.positions,
            &mut self.normals,
            &self.bind_positions,
            &self.bind_normals,
            &self.bone_indices,
            &self.weights
        ) {
            let mut p = glm::vec3(0.0f32, 0.0f32, 0.0f32);
            let mut n = glm::vec3(0.0f32, 0.0f32, 0.0f32);
            let mut total = 0.0f32;
            for (index, weight) in indices.iter().zip(weights) {
                if *weight <= WEIGHT_EPSILON {
                    continue;
                }
                let m = bone_matrix(matrices, *index);
                let it = bone_matrix(it_matrices, *index);
                p += *weight * affine::transform_point(&m, bind_p);
                n += *weight * affine::transform_direction(&it, bind_n);
                total += *weight;
            }
            if total <= WEIGHT_EPSILON {
                *out_p = *bind_p;
                *out_n = *bind_n;
            } else {
                *out_p = p / total;
                *out_n = if glm::length(&n) > f32::EPSILON {
                    glm::normalize(&n)
                } else {
                    *bind_n
                };
            }
        }
    }

    /// Restores the neutral pose, as if every bone transform were identity
    pub fn reset_skin(&mut self) {
        self.positions.clone_from(&self.bind_positions);
        self.normals.clone_from(&self.bind_normals);
    }
}

fn bone_matrix(matrices: &[glm::Mat4], index: u16) -> glm::Mat4 {
    matrices
        .get(index as usize)
        .copied()
        .unwrap_or_else(glm::Mat4::identity)
}
