//! Cyclic coordinate descent over a linear joint chain.

use crate::{affine, kinematics::JointPtr, rig_error::RigError};
use log::{debug, error};
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_MAX_LOOPS: u32 = 20;
const DEFAULT_THRESHOLD: f32 = 0.001;
const DEFAULT_DAMPENING: f32 = 0.005;
const DEFAULT_PRIMING_PASSES: u32 = 1;

// Corrections and direction vectors smaller than these are skipped rather
// than fed through acos/cross where they stop meaning anything
const ANGLE_EPSILON: f32 = 1e-6;
const LENGTH_EPSILON: f32 = 1e-6;

/// Solver tuning parameters, loadable from YAML
///
/// Values are applied through the validating setters, so an out of range
/// entry in a file is rejected (and logged) without disturbing the rest.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct SolverSettings {
    pub max_loops: u32,
    pub threshold: f32,
    pub dampening: f32,
    pub priming_passes: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_loops: DEFAULT_MAX_LOOPS,
            threshold: DEFAULT_THRESHOLD,
            dampening: DEFAULT_DAMPENING,
            priming_passes: DEFAULT_PRIMING_PASSES,
        }
    }
}

impl SolverSettings {
    /// Parses settings from a YAML document
    ///
    /// # Errors
    /// May return `RigError` if the document does not parse
    pub fn from_yaml(yaml: &str) -> Result<Self, RigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads settings from a YAML file
    ///
    /// # Errors
    /// May return `RigError` if the file can not be read or parsed
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, RigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

/// Drives a chain of joints so an end effector point reaches for a target
///
/// The chain is ordered closest-to-root first. Entries may be left unset
/// until assigned; unset entries are skipped by the solver. The end
/// effector sits at `endpoint_offset` relative to the last joint's center
/// of mass.
///
/// The solve is cyclic coordinate descent: repeated sweeps from the
/// effector back toward the root, each joint rotating the current effector
/// direction toward the target, with every correction dampened to keep the
/// chain from oscillating. Convergence is to a local minimum; an
/// unreachable or awkward target leaves the chain in its best effort pose
/// with no error raised.
pub struct InverseKinematics {
    chain: Vec<Option<JointPtr>>,
    endpoint_offset: glm::Vec3,
    max_loops: u32,
    threshold: f32,
    dampening: f32,
    priming_passes: u32,
}

impl Default for InverseKinematics {
    fn default() -> Self {
        Self::new()
    }
}

impl InverseKinematics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: vec![None],
            endpoint_offset: glm::vec3(0.0f32, 0.0f32, 0.0f32),
            max_loops: DEFAULT_MAX_LOOPS,
            threshold: DEFAULT_THRESHOLD,
            dampening: DEFAULT_DAMPENING,
            priming_passes: DEFAULT_PRIMING_PASSES,
        }
    }

    /// Grows or shrinks the chain; new slots are unset
    ///
    /// A chain must hold at least one joint, so a zero size is rejected.
    pub fn set_chain_size(&mut self, size: usize) {
        if size < 1 {
            error!("invalid kinematics chain size {size}, must be >= 1");
            return;
        }
        self.chain.resize(size, None);
    }

    #[must_use]
    pub fn chain_size(&self) -> usize {
        self.chain.len()
    }

    /// Assigns a joint to a chain slot, releasing any previous occupant
    pub fn set_joint(&mut self, index: usize, joint: JointPtr) {
        if index >= self.chain.len() {
            error!(
                "joint index {index} out of range for chain of {}",
                self.chain.len()
            );
            return;
        }
        self.chain[index] = Some(joint);
    }

    #[must_use]
    pub fn joint(&self, index: usize) -> Option<JointPtr> {
        self.chain.get(index).and_then(Clone::clone)
    }

    pub fn set_endpoint_offset(&mut self, offset: &glm::Vec3) {
        self.endpoint_offset = *offset;
    }

    #[must_use]
    pub const fn endpoint_offset(&self) -> glm::Vec3 {
        self.endpoint_offset
    }

    pub fn set_max_loops(&mut self, max_loops: u32) {
        if max_loops < 1 {
            error!("invalid maximum loop count {max_loops}, must be >= 1");
            return;
        }
        self.max_loops = max_loops;
    }

    #[must_use]
    pub const fn max_loops(&self) -> u32 {
        self.max_loops
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        if threshold < 0.0f32 {
            error!("invalid success threshold {threshold}, must be >= 0");
            return;
        }
        self.threshold = threshold;
    }

    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_dampening(&mut self, dampening: f32) {
        if !(0.0f32..=1.0f32).contains(&dampening) {
            error!(
                "invalid dampening constant {dampening}, must be in [0, 1]"
            );
            return;
        }
        self.dampening = dampening;
    }

    #[must_use]
    pub const fn dampening(&self) -> f32 {
        self.dampening
    }

    /// Number of initial sweeps run without constraint enforcement
    ///
    /// Priming pulls the chain out of its all-identity starting pose before
    /// convergence is measured, which keeps the solve from settling into a
    /// poor configuration right at the start. Zero disables priming.
    pub fn set_priming_passes(&mut self, priming_passes: u32) {
        self.priming_passes = priming_passes;
    }

    #[must_use]
    pub const fn priming_passes(&self) -> u32 {
        self.priming_passes
    }

    /// Applies a settings block through the validating setters
    pub fn configure(&mut self, settings: &SolverSettings) {
        self.set_max_loops(settings.max_loops);
        self.set_threshold(settings.threshold);
        self.set_dampening(settings.dampening);
        self.set_priming_passes(settings.priming_passes);
    }

    /// Scales a rotation's angle by `(1 - fraction)` about the same axis
    #[must_use]
    pub fn apply_dampening(
        rotation: &glm::Quat,
        fraction: f32,
    ) -> glm::Quat {
        let (axis, angle) = affine::axis_angle(rotation);
        glm::quat_angle_axis(angle * (1.0f32 - fraction), &axis)
    }

    /// Poses the chain so the end effector reaches for `target`
    ///
    /// Always terminates: the sweep count is bounded by
    /// `max_loops + priming_passes`, and on a target the chain cannot
    /// reach the joints are simply left in the closest pose found.
    pub fn reach_for_point(&mut self, target: &glm::Vec3) {
        let Some(end) = self.chain.iter().rev().find_map(Clone::clone)
        else {
            debug!("reach requested with no joints assigned");
            return;
        };
        let target = *target;

        // Start each solve from the neutral pose
        for joint in self.chain.iter().flatten() {
            joint.write().set_orientation(&glm::Quat::identity());
        }

        let mut effector = self.end_effector(&end);
        let mut distance = glm::length(&(effector - target));
        let total_passes = self.max_loops + self.priming_passes;
        let mut pass = 0u32;
        while distance > self.threshold && pass < total_passes {
            let priming = pass < self.priming_passes;
            for joint in self.chain.iter().rev().flatten() {
                let (origin, pivot) = {
                    let guard = joint.read();
                    (guard.world_origin(), guard.pivot_transform())
                };
                let to_effector = effector - origin;
                let to_target = target - origin;
                if glm::length(&to_effector) < LENGTH_EPSILON
                    || glm::length(&to_target) < LENGTH_EPSILON
                {
                    // The joint sits on the effector or the target; no
                    // rotation is defined for it this sweep
                    continue;
                }
                let world_rot =
                    affine::rotation_between(&to_effector, &to_target);
                if affine::axis_angle(&world_rot).1 < ANGLE_EPSILON {
                    continue;
                }

                // Conjugate the world space correction into the frame the
                // joint's orientation acts in
                let frame = glm::quat_normalize(&glm::to_quat(&pivot));
                let local_rot =
                    glm::quat_inverse(&frame) * world_rot * frame;

                {
                    let mut guard = joint.write();
                    let corrected = local_rot * guard.orientation();
                    let dampened =
                        Self::apply_dampening(&corrected, self.dampening);
                    guard.set_orientation(&dampened);
                    if !priming {
                        guard.apply_constraints();
                    }
                }
                effector = self.end_effector(&end);
            }
            distance = glm::length(&(effector - target));
            if priming {
                // A priming sweep may never satisfy the convergence check
                distance = 2.0f32 * self.threshold;
            }
            pass += 1;
        }
    }

    /// Current end effector position in world space
    #[must_use]
    pub fn end_effector_position(&self) -> Option<glm::Vec3> {
        self.chain
            .iter()
            .rev()
            .find_map(Clone::clone)
            .map(|end| self.end_effector(&end))
    }

    fn end_effector(&self, end: &JointPtr) -> glm::Vec3 {
        let guard = end.read();
        affine::transform_point(
            &guard.global_transform(),
            &(self.endpoint_offset + guard.center_of_mass()),
        )
    }
}
