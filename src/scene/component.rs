use super::skin_mesh::SkinMesh;
use nalgebra_glm as glm;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Shared handle to a scene component
pub type ComponentPtr = Arc<RwLock<Component>>;

/// What a component holds besides its transform and children
#[derive(Clone, Debug)]
pub enum ComponentKind {
    /// Interior grouping node
    Group,
    /// Skinnable mesh geometry leaf
    SkinMesh(SkinMesh),
}

/// Scene graph node
///
/// The local transform is a rotation quaternion and a translation; points
/// are rotated first, then offset within the parent frame. Children hold
/// strong references, the parent link is weak, so dropping every external
/// handle to a subtree releases it even though the nodes point upward.
#[derive(Debug)]
pub struct Component {
    name: String,
    rotation: glm::Quat,
    translation: glm::Vec3,
    kind: ComponentKind,
    parent: Weak<RwLock<Component>>,
    children: Vec<ComponentPtr>,
}

impl Component {
    /// Creates a detached interior node
    #[must_use]
    pub fn group(name: &str) -> ComponentPtr {
        Self::with_kind(name, ComponentKind::Group)
    }

    /// Creates a detached skin mesh leaf
    #[must_use]
    pub fn skin_mesh(name: &str, mesh: SkinMesh) -> ComponentPtr {
        Self::with_kind(name, ComponentKind::SkinMesh(mesh))
    }

    fn with_kind(name: &str, kind: ComponentKind) -> ComponentPtr {
        Arc::new(RwLock::new(Self {
            name: name.to_owned(),
            rotation: glm::Quat::identity(),
            translation: glm::vec3(0.0f32, 0.0f32, 0.0f32),
            kind,
            parent: Weak::new(),
            children: Vec::new(),
        }))
    }

    /// Attaches `child` under `parent`, replacing any previous parent link
    pub fn add_child(parent: &ComponentPtr, child: &ComponentPtr) {
        child.write().parent = Arc::downgrade(parent);
        parent.write().children.push(Arc::clone(child));
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn rotation(&self) -> glm::Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: &glm::Quat) {
        self.rotation = *rotation;
    }

    #[must_use]
    pub const fn translation(&self) -> glm::Vec3 {
        self.translation
    }

    pub fn set_translation(&mut self, translation: &glm::Vec3) {
        self.translation = *translation;
    }

    #[must_use]
    pub fn parent(&self) -> Option<ComponentPtr> {
        self.parent.upgrade()
    }

    #[must_use]
    pub fn children(&self) -> &[ComponentPtr] {
        &self.children
    }

    #[must_use]
    pub const fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    #[must_use]
    pub const fn mesh(&self) -> Option<&SkinMesh> {
        match &self.kind {
            ComponentKind::SkinMesh(mesh) => Some(mesh),
            ComponentKind::Group => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut SkinMesh> {
        match &mut self.kind {
            ComponentKind::SkinMesh(mesh) => Some(mesh),
            ComponentKind::Group => None,
        }
    }

    #[must_use]
    pub fn local_transform(&self) -> glm::Mat4 {
        glm::translation(&self.translation) * glm::quat_to_mat4(&self.rotation)
    }

    /// Accumulated transform from the root down to and including this node
    #[must_use]
    pub fn global_transform(&self) -> glm::Mat4 {
        let mut m = self.local_transform();
        let mut current = self.parent.upgrade();
        while let Some(node) = current {
            let guard = node.read();
            m = guard.local_transform() * m;
            current = guard.parent.upgrade();
        }
        m
    }

    /// Global transform of the parent, identity for a detached root
    #[must_use]
    pub fn parent_global_transform(&self) -> glm::Mat4 {
        self.parent
            .upgrade()
            .map_or_else(glm::Mat4::identity, |p| p.read().global_transform())
    }

    /// Collects every skin mesh leaf in the subtree, depth first pre-order
    #[must_use]
    pub fn skin_mesh_leaves(root: &ComponentPtr) -> Vec<ComponentPtr> {
        let mut out = Vec::new();
        collect_meshes(root, &mut out);
        out
    }

    /// Deep clone of a subtree
    ///
    /// The clone is detached (no parent link) and shares nothing with the
    /// source, including mesh data.
    #[must_use]
    pub fn clone_tree(root: &ComponentPtr) -> ComponentPtr {
        let src = root.read();
        let cloned = Arc::new(RwLock::new(Self {
            name: src.name.clone(),
            rotation: src.rotation,
            translation: src.translation,
            kind: src.kind.clone(),
            parent: Weak::new(),
            children: Vec::new(),
        }));
        for child in &src.children {
            let child_clone = Self::clone_tree(child);
            Self::add_child(&cloned, &child_clone);
        }
        cloned
    }
}

fn collect_meshes(node: &ComponentPtr, out: &mut Vec<ComponentPtr>) {
    let guard = node.read();
    if matches!(guard.kind, ComponentKind::SkinMesh(_)) {
        out.push(Arc::clone(node));
    }
    for child in &guard.children {
        collect_meshes(child, out);
    }
}
