pub mod component;
pub mod skin_mesh;

// Re-exports
pub use {
    component::{Component, ComponentKind, ComponentPtr},
    skin_mesh::{SkinMesh, INFLUENCES, WEIGHT_EPSILON},
};
