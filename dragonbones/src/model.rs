use crate::{
    AnimationData, Error, FrameCache, Point, Rectangle, Transform, is_compatible_version,
};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserData {
    pub ints: Vec<i32>,
    pub floats: Vec<f32>,
    pub strings: Vec<String>,
}

impl UserData {
    pub fn int(&self, index: usize) -> Option<i32> {
        self.ints.get(index).copied()
    }

    pub fn float(&self, index: usize) -> Option<f32> {
        self.floats.get(index).copied()
    }

    pub fn string(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Alpha,
    Darken,
    Difference,
    Erase,
    HardLight,
    Invert,
    Layer,
    Lighten,
    Multiply,
    Overlay,
    Screen,
    Subtract,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    /// Rest pose, relative to the parent.
    pub transform: Transform,
    pub inherit_translation: bool,
    pub inherit_rotation: bool,
    pub inherit_scale: bool,
    pub inherit_reflection: bool,
    pub user_data: Option<UserData>,
}

impl BoneData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            length: 0.0,
            transform: Transform::IDENTITY,
            inherit_translation: true,
            inherit_rotation: true,
            inherit_scale: true,
            inherit_reflection: true,
            user_data: None,
        }
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_length(mut self, length: f32) -> Self {
        self.length = length;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotData {
    pub name: String,
    /// Owning bone.
    pub parent: usize,
    /// `-1` shows nothing.
    pub display_index: i32,
    pub blend_mode: BlendMode,
    pub color: crate::ColorTransform,
    pub user_data: Option<UserData>,
}

impl SlotData {
    pub fn new(name: impl Into<String>, parent: usize) -> Self {
        Self {
            name: name.into(),
            parent,
            display_index: 0,
            blend_mode: BlendMode::Normal,
            color: crate::ColorTransform::IDENTITY,
            user_data: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IkConstraintData {
    pub name: String,
    pub target: usize,
    /// The end bone of the chain.
    pub bone: usize,
    /// The parent joint of a two-bone chain; `None` for a one-bone chain.
    pub root: Option<usize>,
    pub bend_positive: bool,
    pub scale_enabled: bool,
    pub weight: f32,
}

impl IkConstraintData {
    pub fn new(name: impl Into<String>, target: usize, bone: usize) -> Self {
        Self {
            name: name.into(),
            target,
            bone,
            root: None,
            bend_positive: true,
            scale_enabled: false,
            weight: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintData {
    Ik(IkConstraintData),
}

impl ConstraintData {
    pub fn name(&self) -> &str {
        match self {
            ConstraintData::Ik(ik) => &ik.name,
        }
    }

    pub fn target(&self) -> usize {
        match self {
            ConstraintData::Ik(ik) => ik.target,
        }
    }

    pub fn bone(&self) -> usize {
        match self {
            ConstraintData::Ik(ik) => ik.bone,
        }
    }

    pub fn root(&self) -> Option<usize> {
        match self {
            ConstraintData::Ik(ik) => ik.root,
        }
    }

    /// Bones whose pose the constraint rewrites.
    pub fn chain(&self) -> impl Iterator<Item = usize> {
        self.root().into_iter().chain(std::iter::once(self.bone()))
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeshVertices {
    /// Slot-local positions.
    Unweighted(Vec<[f32; 2]>),
    /// Per vertex, bone-local positions with weights.
    Weighted(Vec<Vec<VertexWeight>>),
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshData {
    pub vertices: MeshVertices,
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u16>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        match &self.vertices {
            MeshVertices::Unweighted(v) => v.len(),
            MeshVertices::Weighted(v) => v.len(),
        }
    }

    /// Length of the deform buffer: two floats per vertex, or per weight for skinned meshes.
    pub fn deform_len(&self) -> usize {
        match &self.vertices {
            MeshVertices::Unweighted(v) => v.len() * 2,
            MeshVertices::Weighted(v) => v.iter().map(|w| w.len() * 2).sum(),
        }
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self.vertices, MeshVertices::Weighted(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmatureDisplayData {
    pub armature: String,
    /// Animation the nested armature plays when shown.
    pub animation: Option<String>,
    /// Advance the nested armature with the parent's clock.
    pub inherit_animation: bool,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundingBoxData {
    Rectangle { width: f32, height: f32 },
    Ellipse { width: f32, height: f32 },
    Polygon { vertices: Vec<f32> },
}

impl BoundingBoxData {
    /// Hit test in the display's local space; rectangles and ellipses are centered.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        match self {
            BoundingBoxData::Rectangle { width, height } => {
                Rectangle::new(-width * 0.5, -height * 0.5, *width, *height).contains(x, y)
            }
            BoundingBoxData::Ellipse { width, height } => {
                let rx = width * 0.5;
                let ry = height * 0.5;
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let nx = x / rx;
                let ny = y / ry;
                nx * nx + ny * ny <= 1.0
            }
            BoundingBoxData::Polygon { vertices } => crate::polygon_contains(vertices, x, y),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisplayKind {
    Image { pivot: Point },
    Mesh(MeshData),
    Armature(ArmatureDisplayData),
    BoundingBox(BoundingBoxData),
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayData {
    pub name: String,
    /// Texture or armature path; defaults to the name.
    pub path: String,
    /// Placement relative to the slot's bone.
    pub transform: Transform,
    pub kind: DisplayKind,
}

impl DisplayData {
    pub fn new(name: impl Into<String>, kind: DisplayKind) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            transform: Transform::IDENTITY,
            kind,
        }
    }

    pub fn image(name: impl Into<String>) -> Self {
        Self::new(
            name,
            DisplayKind::Image {
                pivot: Point::new(0.5, 0.5),
            },
        )
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self::new(name, DisplayKind::Mesh(mesh))
    }

    pub fn armature(name: impl Into<String>, armature: impl Into<String>) -> Self {
        Self::new(
            name,
            DisplayKind::Armature(ArmatureDisplayData {
                armature: armature.into(),
                animation: None,
                inherit_animation: true,
            }),
        )
    }

    pub fn bounding_box(name: impl Into<String>, bounding_box: BoundingBoxData) -> Self {
        Self::new(name, DisplayKind::BoundingBox(bounding_box))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn mesh_data(&self) -> Option<&MeshData> {
        match &self.kind {
            DisplayKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn bounding_box_data(&self) -> Option<&BoundingBoxData> {
        match &self.kind {
            DisplayKind::BoundingBox(bb) => Some(bb),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkinData {
    pub name: String,
    /// Display candidates keyed by slot name; `None` entries are empty placeholders.
    pub displays: HashMap<String, Vec<Option<DisplayData>>>,
}

impl SkinData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            displays: HashMap::new(),
        }
    }

    pub fn add_display(&mut self, slot: impl Into<String>, display: Option<DisplayData>) {
        self.displays.entry(slot.into()).or_default().push(display);
    }

    pub fn displays(&self, slot: &str) -> Option<&[Option<DisplayData>]> {
        self.displays.get(slot).map(Vec::as_slice)
    }

    pub fn display(&self, slot: &str, name: &str) -> Option<&DisplayData> {
        self.displays
            .get(slot)?
            .iter()
            .flatten()
            .find(|d| d.name == name)
    }
}

/// Static description of one skeleton. Shared read-only by every armature built from it.
#[derive(Debug, Default)]
pub struct ArmatureData {
    pub name: String,
    /// `0` inherits the owning bundle's frame rate.
    pub frame_rate: u32,
    pub scale: f32,
    pub aabb: Rectangle,
    pub user_data: Option<UserData>,

    bones: Vec<BoneData>,
    bone_names: HashMap<String, usize>,
    bone_children: Vec<Vec<usize>>,
    sorted_bones: Vec<usize>,

    slots: Vec<SlotData>,
    slot_names: HashMap<String, usize>,

    constraints: Vec<ConstraintData>,
    constraint_names: HashMap<String, usize>,

    skins: Vec<SkinData>,
    skin_names: HashMap<String, usize>,
    default_skin: Option<usize>,

    animations: Vec<AnimationData>,
    animation_names: HashMap<String, usize>,
    default_animation: Option<usize>,

    frame_cache: OnceLock<Arc<FrameCache>>,
}

fn insert_named<T>(
    kind: &str,
    owner: &str,
    items: &mut Vec<T>,
    names: &mut HashMap<String, usize>,
    name: &str,
    item: T,
) -> usize {
    let existing = names.get(name).copied();
    debug_assert!(
        existing.is_none(),
        "duplicate {kind} '{name}' in armature '{owner}'"
    );
    if let Some(index) = existing {
        log::warn!("duplicate {kind} '{name}' in armature '{owner}'; overwriting");
        items[index] = item;
        return index;
    }
    let index = items.len();
    items.push(item);
    names.insert(name.to_string(), index);
    index
}

impl ArmatureData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale: 1.0,
            ..Default::default()
        }
    }

    pub fn add_bone(&mut self, bone: BoneData) -> usize {
        let name = bone.name.clone();
        let index = insert_named(
            "bone",
            &self.name,
            &mut self.bones,
            &mut self.bone_names,
            &name,
            bone,
        );
        self.sorted_bones.clear();
        index
    }

    pub fn add_slot(&mut self, slot: SlotData) -> usize {
        let name = slot.name.clone();
        insert_named(
            "slot",
            &self.name,
            &mut self.slots,
            &mut self.slot_names,
            &name,
            slot,
        )
    }

    pub fn add_constraint(&mut self, constraint: ConstraintData) -> usize {
        let name = constraint.name().to_string();
        let index = insert_named(
            "constraint",
            &self.name,
            &mut self.constraints,
            &mut self.constraint_names,
            &name,
            constraint,
        );
        self.sorted_bones.clear();
        index
    }

    /// The first skin added, or the one named `default`, becomes the default skin.
    pub fn add_skin(&mut self, skin: SkinData) -> usize {
        let name = skin.name.clone();
        let index = insert_named(
            "skin",
            &self.name,
            &mut self.skins,
            &mut self.skin_names,
            &name,
            skin,
        );
        if self.default_skin.is_none() || name == "default" {
            self.default_skin = Some(index);
        }
        index
    }

    /// The first animation added becomes the default animation.
    pub fn add_animation(&mut self, mut animation: AnimationData) -> usize {
        if self.frame_rate > 0 {
            animation.frame_count = (animation.duration * self.frame_rate as f32).round() as u32;
        }
        let name = animation.name.clone();
        let index = insert_named(
            "animation",
            &self.name,
            &mut self.animations,
            &mut self.animation_names,
            &name,
            animation,
        );
        if self.default_animation.is_none() {
            self.default_animation = Some(index);
        }
        index
    }

    pub fn bones(&self) -> &[BoneData] {
        &self.bones
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.get(name).copied()
    }

    pub fn bone(&self, name: &str) -> Option<&BoneData> {
        self.bone_index(name).map(|i| &self.bones[i])
    }

    pub fn bone_children(&self, bone: usize) -> &[usize] {
        self.bone_children.get(bone).map_or(&[], Vec::as_slice)
    }

    /// `bone` and all of its descendants, parents first.
    pub fn bone_subtree(&self, bone: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if bone >= self.bones.len() {
            return out;
        }
        let mut stack = vec![bone];
        while let Some(index) = stack.pop() {
            out.push(index);
            stack.extend(self.bone_children(index).iter().rev().copied());
        }
        out
    }

    pub fn slots(&self) -> &[SlotData] {
        &self.slots
    }

    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slot_names.get(name).copied()
    }

    pub fn slot(&self, name: &str) -> Option<&SlotData> {
        self.slot_index(name).map(|i| &self.slots[i])
    }

    pub fn constraints(&self) -> &[ConstraintData] {
        &self.constraints
    }

    pub fn constraint_index(&self, name: &str) -> Option<usize> {
        self.constraint_names.get(name).copied()
    }

    pub fn constraint(&self, name: &str) -> Option<&ConstraintData> {
        self.constraint_index(name).map(|i| &self.constraints[i])
    }

    pub fn skins(&self) -> &[SkinData] {
        &self.skins
    }

    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skin_names.get(name).map(|&i| &self.skins[i])
    }

    pub fn default_skin(&self) -> Option<&SkinData> {
        self.default_skin.map(|i| &self.skins[i])
    }

    pub fn animations(&self) -> &[AnimationData] {
        &self.animations
    }

    pub fn animation(&self, name: &str) -> Option<(usize, &AnimationData)> {
        let index = self.animation_names.get(name).copied()?;
        Some((index, &self.animations[index]))
    }

    pub fn animation_at(&self, index: usize) -> Option<&AnimationData> {
        self.animations.get(index)
    }

    pub fn default_animation(&self) -> Option<&AnimationData> {
        self.default_animation.map(|i| &self.animations[i])
    }

    /// Bones with parents and constraint targets ahead of their dependents.
    pub fn sorted_bones(&self) -> &[usize] {
        &self.sorted_bones
    }

    /// Slots in setup draw order.
    pub fn sorted_slots(&self) -> impl Iterator<Item = usize> {
        0..self.slots.len()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted_bones.len() == self.bones.len()
    }

    /// Orders bones so that parents and constraint targets precede their dependents.
    ///
    /// Every pass places each bone whose dependencies are already placed; a pass that places
    /// nothing means the remaining bones depend on each other.
    pub fn sort_bones(&mut self) -> Result<(), Error> {
        let total = self.bones.len();
        for bone in &self.bones {
            if let Some(parent) = bone.parent.filter(|&parent| parent >= total) {
                return Err(Error::InvalidBoneParent {
                    bone: bone.name.clone(),
                    parent,
                });
            }
        }
        if let Some(slot) = self.slots.iter().find(|slot| slot.parent >= total) {
            return Err(Error::InvalidSlotParent {
                slot: slot.name.clone(),
                parent: slot.parent,
            });
        }
        for constraint in &self.constraints {
            let out_of_range = constraint.target() >= total
                || constraint.chain().any(|index| index >= total);
            if out_of_range {
                return Err(Error::InvalidConstraint {
                    constraint: constraint.name().to_string(),
                    message: "bone index out of range".to_string(),
                });
            }
            let detached_root = constraint
                .root()
                .is_some_and(|root| self.bones[constraint.bone()].parent != Some(root));
            if detached_root {
                return Err(Error::InvalidConstraint {
                    constraint: constraint.name().to_string(),
                    message: "root must be the parent of the constrained bone".to_string(),
                });
            }
        }

        let mut children = vec![Vec::new(); total];
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                children[parent].push(index);
            }
        }

        let mut placed = vec![false; total];
        let mut sorted = Vec::with_capacity(total);
        while sorted.len() < total {
            let before = sorted.len();
            for index in 0..total {
                if placed[index] {
                    continue;
                }
                if self.bones[index].parent.is_some_and(|parent| !placed[parent]) {
                    continue;
                }
                let waits_for_target = self
                    .constraints
                    .iter()
                    .any(|c| c.chain().any(|b| b == index) && !placed[c.target()]);
                if waits_for_target {
                    continue;
                }
                placed[index] = true;
                sorted.push(index);
            }

            if sorted.len() == before {
                let bones = (0..total)
                    .filter(|&i| !placed[i])
                    .map(|i| self.bones[i].name.clone())
                    .collect::<Vec<_>>();
                return Err(Error::CyclicBoneDependency {
                    armature: self.name.clone(),
                    bones,
                });
            }
        }

        self.bone_children = children;
        self.sorted_bones = sorted;
        Ok(())
    }

    /// Enables the shared pose cache at `frame_rate` samples per second. Only the first call
    /// takes effect.
    pub fn cache_frames(&self, frame_rate: u32) -> Option<&Arc<FrameCache>> {
        if frame_rate == 0 {
            return self.frame_cache.get();
        }
        let cache = self
            .frame_cache
            .get_or_init(|| Arc::new(FrameCache::new(self, frame_rate)));
        if cache.frame_rate() != frame_rate {
            log::warn!(
                "armature '{}' already caches frames at {} fps; ignoring {} fps",
                self.name,
                cache.frame_rate(),
                frame_rate
            );
        }
        Some(cache)
    }

    pub fn frame_cache(&self) -> Option<&Arc<FrameCache>> {
        self.frame_cache.get()
    }
}

/// A named bundle of armatures loaded from one asset.
#[derive(Debug, Default)]
pub struct DragonBonesData {
    pub name: String,
    pub version: String,
    pub frame_rate: u32,
    pub user_data: Option<UserData>,
    armatures: Vec<Arc<ArmatureData>>,
    armature_names: HashMap<String, usize>,
}

impl DragonBonesData {
    pub fn new(name: impl Into<String>, frame_rate: u32) -> Self {
        Self {
            name: name.into(),
            version: crate::DATA_VERSION.to_string(),
            frame_rate,
            ..Default::default()
        }
    }

    /// Finalizes `armature` (frame rate, bone order) and adds it to the bundle.
    pub fn add_armature(
        &mut self,
        mut armature: ArmatureData,
    ) -> Result<Arc<ArmatureData>, Error> {
        if !is_compatible_version(&self.version) {
            log::warn!(
                "data '{}' has version '{}', expected {}",
                self.name,
                self.version,
                crate::DATA_VERSION
            );
        }
        if armature.frame_rate == 0 {
            armature.frame_rate = self.frame_rate.max(1);
        }
        let rate = armature.frame_rate as f32;
        for animation in &mut armature.animations {
            animation.frame_count = (animation.duration * rate).round() as u32;
        }
        armature.sort_bones()?;

        let armature = Arc::new(armature);
        let name = armature.name.clone();
        let existing = self.armature_names.get(&name).copied();
        debug_assert!(
            existing.is_none(),
            "duplicate armature '{name}' in '{}'",
            self.name
        );
        if let Some(index) = existing {
            log::warn!("duplicate armature '{name}' in '{}'; overwriting", self.name);
            self.armatures[index] = armature.clone();
        } else {
            self.armature_names.insert(name, self.armatures.len());
            self.armatures.push(armature.clone());
        }
        Ok(armature)
    }

    pub fn armature(&self, name: &str) -> Option<&Arc<ArmatureData>> {
        self.armature_names
            .get(name)
            .map(|&index| &self.armatures[index])
    }

    pub fn armatures(&self) -> &[Arc<ArmatureData>] {
        &self.armatures
    }

    pub fn armature_names(&self) -> impl Iterator<Item = &str> {
        self.armatures.iter().map(|a| a.name.as_str())
    }

    pub fn default_armature(&self) -> Option<&Arc<ArmatureData>> {
        self.armatures.first()
    }
}
