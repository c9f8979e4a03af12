//! Skeletal skinning and inverse kinematics toolkit
//!
//! Two cooperating pieces over a small scene graph: [`Skin`] binds skin
//! mesh leaves to a [`Skeleton`] and turns its per frame bone matrices
//! into skin matrices (and inverse transposes for normals), while
//! [`InverseKinematics`] poses a chain of [`Joint`]s toward a world space
//! target with dampened cyclic coordinate descent.
//!
//! Rendering, device input and file import are out of scope. The crate
//! produces matrices and deformed vertex data; pushing those at a GPU is
//! the caller's problem (see [`SkinMatrices`] for an upload friendly block).
//!
//! Per frame paths never fail: missing skeletons, bones or bind pose
//! offsets degrade to identity transforms, and invalid configuration is
//! rejected with a log message rather than an error. The exceptions are
//! construction time data validation and settings file parsing, which
//! return [`RigError`].

pub mod affine;
pub mod inverse_kinematics;
pub mod kinematics;
pub mod rig_error;
pub mod scene;
pub mod skin;

// Re-exports
pub use {
    inverse_kinematics::{InverseKinematics, SolverSettings},
    kinematics::{Joint, JointConstraint, JointPtr, Skeleton, SkeletonPtr},
    rig_error::RigError,
    scene::{Component, ComponentKind, ComponentPtr, SkinMesh},
    skin::{Skin, SkinMatrices, MAX_BONES},
};
