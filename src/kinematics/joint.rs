use crate::{affine, scene::ComponentPtr};
use nalgebra_glm as glm;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;

/// Shared handle to a joint
pub type JointPtr = Arc<RwLock<Joint>>;

/// Externally defined limit on a joint orientation
///
/// Applied in place after the solver updates a joint. The toolkit never
/// inspects what a constraint did, it only invokes it.
pub trait JointConstraint: Send + Sync {
    fn apply(&self, orientation: &mut glm::Quat);
}

/// A single rotational joint bound to a scene component
///
/// The orientation is written through to the owning component's local
/// rotation on every change, so global transform queries against the scene
/// stay consistent with the joint state without a separate sync step.
pub struct Joint {
    orientation: glm::Quat,
    center_of_mass: glm::Vec3,
    component: ComponentPtr,
    constraints: SmallVec<[Box<dyn JointConstraint>; 2]>,
}

impl Joint {
    #[must_use]
    pub fn new(component: ComponentPtr) -> JointPtr {
        Arc::new(RwLock::new(Self {
            orientation: glm::Quat::identity(),
            center_of_mass: glm::vec3(0.0f32, 0.0f32, 0.0f32),
            component,
            constraints: SmallVec::new(),
        }))
    }

    #[must_use]
    pub const fn orientation(&self) -> glm::Quat {
        self.orientation
    }

    /// Sets the local orientation, normalized, and writes it through to the
    /// owning component
    pub fn set_orientation(&mut self, orientation: &glm::Quat) {
        let q = glm::quat_normalize(orientation);
        self.orientation = q;
        self.component.write().set_rotation(&q);
    }

    #[must_use]
    pub const fn center_of_mass(&self) -> glm::Vec3 {
        self.center_of_mass
    }

    pub fn set_center_of_mass(&mut self, offset: &glm::Vec3) {
        self.center_of_mass = *offset;
    }

    #[must_use]
    pub const fn component(&self) -> &ComponentPtr {
        &self.component
    }

    pub fn add_constraint(&mut self, constraint: Box<dyn JointConstraint>) {
        self.constraints.push(constraint);
    }

    /// Runs every attached constraint over the current orientation
    pub fn apply_constraints(&mut self) {
        if self.constraints.is_empty() {
            return;
        }
        let mut q = self.orientation;
        for constraint in &self.constraints {
            constraint.apply(&mut q);
        }
        self.set_orientation(&q);
    }

    /// Accumulated global transform of the owning component
    #[must_use]
    pub fn global_transform(&self) -> glm::Mat4 {
        self.component.read().global_transform()
    }

    /// Accumulated transform above the joint's own rotation
    ///
    /// This is the frame the orientation quaternion acts in, which is what
    /// the IK solver conjugates world space corrections into.
    #[must_use]
    pub fn pivot_transform(&self) -> glm::Mat4 {
        let c = self.component.read();
        c.parent_global_transform() * glm::translation(&c.translation())
    }

    /// World position the joint rotates about: the center of mass carried
    /// into world space by everything above the joint's own rotation
    #[must_use]
    pub fn world_origin(&self) -> glm::Vec3 {
        affine::transform_point(&self.pivot_transform(), &self.center_of_mass)
    }
}
