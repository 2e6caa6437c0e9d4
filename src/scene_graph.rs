//! Scene graph hosting the graph's points.
//!
//! Entities are either transform-only groups or mesh instances. Meshes can be
//! parented to groups, and world transforms are resolved through the parent
//! chain at render time.

use std::collections::{HashMap, HashSet};

use glam::{EulerRot, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::graph::PointHost;

/// Unique identifier for scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// Types of meshes available for instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshType {
    #[default]
    Cube,
    Sphere,
}

impl std::str::FromStr for MeshType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cube" => Ok(MeshType::Cube),
            "sphere" => Ok(MeshType::Sphere),
            other => Err(format!("Unknown mesh type '{}', expected cube or sphere", other)),
        }
    }
}

/// Transform component for scene entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3, // Euler angles in radians
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Local matrix: translation * rotation (XYZ) * scale.
    pub fn matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(self.position);
        let rotation = Mat4::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        let scale = Mat4::from_scale(self.scale);
        translation * rotation * scale
    }
}

/// A mesh instance - references shared geometry with its own transform.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub mesh_type: MeshType,
    pub transform: Transform,
    pub visible: bool,
}

impl MeshInstance {
    pub fn new(mesh_type: MeshType) -> Self {
        Self {
            mesh_type,
            transform: Transform::default(),
            visible: true,
        }
    }
}

/// A transform-only node used as a shared coordinate frame.
#[derive(Debug, Clone)]
pub struct Group {
    pub transform: Transform,
    pub visible: bool,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            visible: true,
        }
    }
}

/// A scene entity - either a group or a mesh instance.
#[derive(Debug, Clone)]
pub enum SceneEntity {
    Group(Group),
    Mesh(MeshInstance),
}

impl SceneEntity {
    pub fn transform(&self) -> &Transform {
        match self {
            SceneEntity::Group(g) => &g.transform,
            SceneEntity::Mesh(m) => &m.transform,
        }
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        match self {
            SceneEntity::Group(g) => &mut g.transform,
            SceneEntity::Mesh(m) => &mut m.transform,
        }
    }

    pub fn visible(&self) -> bool {
        match self {
            SceneEntity::Group(g) => g.visible,
            SceneEntity::Mesh(m) => m.visible,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        match self {
            SceneEntity::Group(g) => g.visible = visible,
            SceneEntity::Mesh(m) => m.visible = visible,
        }
    }
}

/// The scene graph - owns every entity and the render order.
#[derive(Debug)]
pub struct SceneGraph {
    entities: HashMap<EntityId, SceneEntity>,
    /// Entities that have been added to the scene (will be rendered), in order.
    scene_entities: Vec<EntityId>,
    in_scene: HashSet<EntityId>,
    parents: HashMap<EntityId, EntityId>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            scene_entities: Vec::new(),
            in_scene: HashSet::new(),
            parents: HashMap::new(),
            next_id: 1,
        }
    }

    fn new_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create a new group and return its ID.
    pub fn create_group(&mut self) -> EntityId {
        let id = self.new_id();
        self.entities.insert(id, SceneEntity::Group(Group::default()));
        id
    }

    /// Create a new mesh instance and return its ID.
    /// The mesh is NOT added to the scene automatically.
    pub fn create_mesh(&mut self, mesh_type: MeshType) -> EntityId {
        let id = self.new_id();
        self.entities.insert(id, SceneEntity::Mesh(MeshInstance::new(mesh_type)));
        id
    }

    /// Add an entity to the scene (make it renderable).
    /// Returns false if already in scene or doesn't exist.
    pub fn add_to_scene(&mut self, id: EntityId) -> bool {
        if !self.entities.contains_key(&id) || !self.in_scene.insert(id) {
            return false;
        }
        self.scene_entities.push(id);
        true
    }

    /// Remove an entity from the scene. The entity still exists.
    pub fn remove_from_scene(&mut self, id: EntityId) -> bool {
        if !self.in_scene.remove(&id) {
            return false;
        }
        // Points are usually the most recent additions, so search from the back.
        if let Some(pos) = self.scene_entities.iter().rposition(|&e| e == id) {
            self.scene_entities.remove(pos);
            true
        } else {
            false
        }
    }

    /// Destroy an entity completely (removes from scene and deletes).
    /// Children of a destroyed group become roots.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        self.remove_from_scene(id);
        self.parents.remove(&id);
        if matches!(self.entities.get(&id), Some(SceneEntity::Group(_))) {
            self.parents.retain(|_, parent| *parent != id);
        }
        self.entities.remove(&id).is_some()
    }

    /// Attach `child` to the group `parent`. Returns false if either is
    /// missing, `parent` is not a group, or the link would create a cycle.
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) -> bool {
        if !self.exists(child) || !matches!(self.get(parent), Some(SceneEntity::Group(_))) {
            return false;
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return false;
            }
            cursor = self.get_parent(id);
        }
        self.parents.insert(child, parent);
        true
    }

    pub fn get_parent(&self, id: EntityId) -> Option<EntityId> {
        self.parents.get(&id).copied()
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut SceneEntity> {
        self.entities.get_mut(&id)
    }

    /// Get all entities currently in the scene (for rendering).
    pub fn scene_entities(&self) -> impl Iterator<Item = (EntityId, &SceneEntity)> {
        self.scene_entities
            .iter()
            .filter_map(|&id| self.entities.get(&id).map(|e| (id, e)))
    }

    /// Get all mesh instances in the scene.
    pub fn meshes(&self) -> impl Iterator<Item = (EntityId, &MeshInstance)> {
        self.scene_entities().filter_map(|(id, entity)| {
            if let SceneEntity::Mesh(mesh) = entity {
                Some((id, mesh))
            } else {
                None
            }
        })
    }

    /// World matrix of an entity, walking up the parent chain.
    pub fn world_matrix(&self, id: EntityId) -> Mat4 {
        let Some(entity) = self.get(id) else {
            return Mat4::IDENTITY;
        };
        let local = entity.transform().matrix();
        match self.get_parent(id) {
            Some(parent) => self.world_matrix(parent) * local,
            None => local,
        }
    }

    /// An entity is visible only if it and all its ancestors are.
    pub fn is_visible(&self, id: EntityId) -> bool {
        match self.get(id) {
            Some(entity) if entity.visible() => match self.get_parent(id) {
                Some(parent) => self.is_visible(parent),
                None => true,
            },
            _ => false,
        }
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn is_in_scene(&self, id: EntityId) -> bool {
        self.in_scene.contains(&id)
    }

    /// Number of entities, in the scene or not.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns graph points as meshes parented to a shared group.
pub struct ScenePoints<'a> {
    scene: &'a mut SceneGraph,
    parent: EntityId,
    mesh_type: MeshType,
}

impl<'a> ScenePoints<'a> {
    pub fn new(scene: &'a mut SceneGraph, parent: EntityId, mesh_type: MeshType) -> Self {
        Self {
            scene,
            parent,
            mesh_type,
        }
    }
}

impl PointHost for ScenePoints<'_> {
    type Handle = EntityId;

    fn spawn_point(&mut self, scale: Vec3) -> EntityId {
        let id = self.scene.create_mesh(self.mesh_type);
        if let Some(entity) = self.scene.get_mut(id) {
            entity.transform_mut().scale = scale;
        }
        self.scene.set_parent(id, self.parent);
        self.scene.add_to_scene(id);
        id
    }

    fn destroy_point(&mut self, handle: EntityId) {
        self.scene.destroy(handle);
    }

    fn set_local_position(&mut self, handle: EntityId, position: Vec3) {
        if let Some(entity) = self.scene.get_mut(handle) {
            entity.transform_mut().position = position;
        }
    }

    fn set_local_scale(&mut self, handle: EntityId, scale: Vec3) {
        if let Some(entity) = self.scene.get_mut(handle) {
            entity.transform_mut().scale = scale;
        }
    }
}
