pub mod joint;
pub mod skeleton;

// Re-exports
pub use {
    joint::{Joint, JointConstraint, JointPtr},
    skeleton::{Skeleton, SkeletonPtr},
};
