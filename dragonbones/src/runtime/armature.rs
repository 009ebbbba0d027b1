use crate::{
    Animation, ArmatureData, Bone, ConstraintData, DisplayData, Error, EventDispatcher, EventKind,
    EventListener, EventQueue, FrameCache, IkConstraint, ListenerId, MeshVertices, ObjectPool,
    PendingAction, PoseTargets, Slot, SlotRenderer,
};
use std::fmt;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum UpdateCacheItem {
    Bone(usize),
    Constraint(usize),
}

/// Live instance of an [`ArmatureData`]: the bone hierarchy, its slots and constraints, and
/// the animation controller that drives them.
pub struct Armature {
    data: Arc<ArmatureData>,
    bones: Vec<Bone>,
    slots: Vec<Slot>,
    constraints: Vec<IkConstraint>,
    animation: Animation,

    update_cache: Vec<UpdateCacheItem>,
    update_cache_dirty: bool,
    /// Slot indices, back to front.
    draw_order: Vec<usize>,

    skin: Option<String>,
    texture_atlas_name: Option<String>,

    frame_cache: Option<Arc<FrameCache>>,
    /// Bone poses were last loaded from `frame_cache` rather than composed.
    pose_from_cache: bool,

    events: EventQueue,
    dispatcher: EventDispatcher,
    renderer: Option<Box<dyn SlotRenderer>>,

    /// Nested armatures only: advance together with the owning armature.
    pub inherit_animation: bool,
}

impl fmt::Debug for Armature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Armature")
            .field("name", &self.data.name)
            .field("bones", &self.bones.len())
            .field("slots", &self.slots.len())
            .field("constraints", &self.constraints.len())
            .field("animation", &self.animation)
            .field("skin", &self.skin)
            .field("has_renderer", &self.renderer.is_some())
            .finish_non_exhaustive()
    }
}

impl Armature {
    /// Builds an armature with the default skin. Nested armature displays stay empty; use
    /// [`crate::Factory::build_armature`] to get them populated.
    pub fn new(data: Arc<ArmatureData>) -> Self {
        let mut pool = ObjectPool::default();
        let skin = data.default_skin().map(|s| s.name.clone());
        Self::with_pool(data, skin.as_deref(), None, &mut pool)
    }

    pub(crate) fn with_pool(
        data: Arc<ArmatureData>,
        skin: Option<&str>,
        texture_atlas_name: Option<&str>,
        pool: &mut ObjectPool,
    ) -> Self {
        if !data.is_sorted() {
            log::warn!(
                "armature '{}' was not finalized through DragonBonesData::add_armature; \
                 updating bones in declaration order",
                data.name
            );
        }

        let mut bones: Vec<Bone> = data
            .bones()
            .iter()
            .enumerate()
            .map(|(index, bone_data)| {
                let mut bone: Bone = pool.acquire();
                bone.init(index, bone_data);
                bone
            })
            .collect();

        let constraints: Vec<IkConstraint> = data
            .constraints()
            .iter()
            .enumerate()
            .map(|(index, constraint_data)| {
                let mut constraint: IkConstraint = pool.acquire();
                match constraint_data {
                    ConstraintData::Ik(ik) => constraint.init(index, ik),
                }
                constraint
            })
            .collect();
        for (index, constraint) in constraints.iter().enumerate() {
            for bone in constraint.chain() {
                if let Some(bone) = bones.get_mut(bone) {
                    bone.constraints.push(index);
                }
            }
        }

        let skin_data = skin.and_then(|name| data.skin(name));
        let slots = data
            .slots()
            .iter()
            .enumerate()
            .map(|(index, slot_data)| {
                let mut slot: Slot = pool.acquire();
                let displays = skin_data
                    .and_then(|s| s.displays(&slot_data.name))
                    .unwrap_or(&[]);
                slot.init(index, slot_data, displays);
                slot
            })
            .collect();
        let skin = skin_data.map(|s| s.name.clone());

        let mut armature = Self {
            animation: Animation::new(Arc::clone(&data)),
            data,
            bones,
            slots,
            constraints,
            update_cache: Vec::new(),
            update_cache_dirty: true,
            draw_order: Vec::new(),
            skin,
            texture_atlas_name: texture_atlas_name.map(str::to_string),
            frame_cache: None,
            pose_from_cache: false,
            events: EventQueue::default(),
            dispatcher: EventDispatcher::default(),
            renderer: None,
            inherit_animation: true,
        };
        armature.rebuild_update_cache();
        armature.sort_draw_order();
        log::debug!(
            "built armature '{}' ({} bones, {} slots, {} constraints)",
            armature.data.name,
            armature.bones.len(),
            armature.slots.len(),
            armature.constraints.len()
        );
        armature
    }

    /// Returns every pooled object this armature owns, nested armatures included.
    pub fn dispose(mut self, pool: &mut ObjectPool) {
        log::debug!("disposing armature '{}'", self.data.name);
        self.animation.reset();
        self.events.clear();
        self.dispatcher.clear();
        for mut slot in self.slots.drain(..) {
            let children: Vec<_> = slot.take_children().collect();
            for child in children {
                child.dispose(pool);
            }
            pool.release(slot);
        }
        for bone in self.bones.drain(..) {
            pool.release(bone);
        }
        for constraint in self.constraints.drain(..) {
            pool.release(constraint);
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn data(&self) -> &Arc<ArmatureData> {
        &self.data
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut Animation {
        &mut self.animation
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(self.data.bone_index(name)?)
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.bones.get_mut(self.data.bone_index(name)?)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(self.data.slot_index(name)?)
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slots.get_mut(self.data.slot_index(name)?)
    }

    pub fn constraints(&self) -> &[IkConstraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&IkConstraint> {
        self.constraints.get(self.data.constraint_index(name)?)
    }

    pub fn constraint_mut(&mut self, name: &str) -> Option<&mut IkConstraint> {
        self.constraints.get_mut(self.data.constraint_index(name)?)
    }

    /// Slot indices sorted back to front.
    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    /// Nested armatures currently shown, with the index of the slot showing them.
    pub fn child_armatures(&self) -> impl Iterator<Item = (usize, &Armature)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((index, slot.child_armature()?)))
    }

    pub fn skin_name(&self) -> Option<&str> {
        self.skin.as_deref()
    }

    pub fn texture_atlas_name(&self) -> Option<&str> {
        self.texture_atlas_name.as_deref()
    }

    pub fn set_texture_atlas_name(&mut self, name: Option<&str>) {
        self.texture_atlas_name = name.map(str::to_string);
        for slot in &mut self.slots {
            slot.invalidate_update();
        }
    }

    /// Swaps every slot's candidate displays for the ones `name` (or the default skin)
    /// provides. Nested armatures of the old displays are dropped.
    pub fn set_skin(&mut self, name: Option<&str>) -> Result<(), Error> {
        self.swap_skin(name).map(drop)
    }

    /// Like [`Armature::set_skin`], handing back the nested armatures of the old displays.
    pub(crate) fn swap_skin(&mut self, name: Option<&str>) -> Result<Vec<Box<Armature>>, Error> {
        let data = Arc::clone(&self.data);
        let skin = match name {
            Some(name) => Some(data.skin(name).ok_or_else(|| {
                log::warn!("armature '{}' has no skin '{name}'", data.name);
                Error::UnknownSkin {
                    name: name.to_string(),
                }
            })?),
            None => data.default_skin(),
        };

        let mut previous = Vec::new();
        for slot in &mut self.slots {
            let displays = skin.and_then(|s| s.displays(slot.name())).unwrap_or(&[]);
            let display_index = slot.display_index();
            for index in 0..slot.displays().len().max(displays.len()) {
                let display = displays.get(index).cloned().flatten();
                previous.extend(slot.replace_display_data(index, display));
            }
            slot.truncate_displays(displays.len());
            slot.set_display_index(display_index);
            slot.invalidate_update();
        }
        self.skin = skin.map(|s| s.name.clone());
        Ok(previous)
    }

    pub(crate) fn slot_at_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    pub fn add_event_listener(
        &mut self,
        kind: EventKind,
        listener: impl EventListener + 'static,
    ) -> ListenerId {
        self.dispatcher.add(Some(kind), Box::new(listener))
    }

    /// Listens to every event kind.
    pub fn add_listener(&mut self, listener: impl EventListener + 'static) -> ListenerId {
        self.dispatcher.add(None, Box::new(listener))
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.dispatcher.remove(id)
    }

    pub fn has_event_listener(&self, kind: EventKind) -> bool {
        self.dispatcher.has_listener(kind)
    }

    /// Installs the engine-side presentation. Every slot is re-sent in full on the next update.
    pub fn set_slot_renderer(&mut self, renderer: impl SlotRenderer + 'static) {
        self.renderer = Some(Box::new(renderer));
        for slot in &mut self.slots {
            slot.invalidate_update();
        }
    }

    pub fn take_slot_renderer(&mut self) -> Option<Box<dyn SlotRenderer>> {
        self.renderer.take()
    }

    /// Forces `bone` (or every bone) to recompose on the next update, optionally re-sending
    /// its slots to the renderer.
    pub fn invalidate_update(&mut self, bone: Option<&str>, update_slots: bool) {
        let target = match bone {
            Some(name) => match self.data.bone_index(name) {
                Some(index) => Some(index),
                None => {
                    log::warn!("armature '{}' has no bone '{name}'", self.data.name);
                    return;
                }
            },
            None => None,
        };
        for (index, bone) in self.bones.iter_mut().enumerate() {
            if target.is_none_or(|t| t == index) {
                bone.invalidate_update();
            }
        }
        for constraint in &mut self.constraints {
            if target.is_none_or(|t| constraint.chain().any(|b| b == t)) {
                constraint.invalidate_update();
            }
        }
        if update_slots {
            for slot in &mut self.slots {
                if target.is_none_or(|t| t == slot.parent()) {
                    slot.invalidate_update();
                }
            }
        }
    }

    /// Samples bone poses at `frame_rate` into the cache shared by every armature of the same
    /// data. `0` stops using it.
    pub fn set_cache_frame_rate(&mut self, frame_rate: u32) {
        self.frame_cache = if frame_rate == 0 {
            None
        } else {
            self.data.cache_frames(frame_rate).cloned()
        };
    }

    pub fn cache_frame_rate(&self) -> u32 {
        self.frame_cache.as_ref().map_or(0, |c| c.frame_rate())
    }

    /// Topmost visible slot whose bounding-box display contains the world point.
    pub fn contains_point(&self, x: f32, y: f32) -> Option<&Slot> {
        self.draw_order.iter().rev().map(|&i| &self.slots[i]).find(|slot| {
            let Some(bounding_box) = slot.display().and_then(DisplayData::bounding_box_data)
            else {
                return false;
            };
            if !slot.visible() {
                return false;
            }
            let local = slot.global_transform_matrix().inverted().transform_point(x, y);
            bounding_box.contains_point(local.x, local.y)
        })
    }

    /// World positions of the current mesh display of `slot`, deform applied, as `x, y` pairs.
    pub fn slot_world_vertices(&self, slot: usize) -> Option<Vec<f32>> {
        let slot = self.slots.get(slot)?;
        let mesh = slot.display()?.mesh_data()?;
        let deform = slot.deform_vertices();
        let offset = |i: usize| deform.get(i).copied().unwrap_or(0.0);

        let mut out = Vec::with_capacity(mesh.vertex_count() * 2);
        match &mesh.vertices {
            MeshVertices::Unweighted(vertices) => {
                let matrix = slot.global_transform_matrix();
                for (i, [x, y]) in vertices.iter().enumerate() {
                    let p = matrix.transform_point(x + offset(i * 2), y + offset(i * 2 + 1));
                    out.extend_from_slice(&[p.x, p.y]);
                }
            }
            MeshVertices::Weighted(vertices) => {
                let mut k = 0;
                for weights in vertices {
                    let (mut wx, mut wy) = (0.0, 0.0);
                    for w in weights {
                        let matrix = self.bones.get(w.bone)?.global_transform_matrix();
                        let p = matrix.transform_point(w.x + offset(k), w.y + offset(k + 1));
                        wx += p.x * w.weight;
                        wy += p.y * w.weight;
                        k += 2;
                    }
                    out.extend_from_slice(&[wx, wy]);
                }
            }
        }
        Some(out)
    }

    /// Advances animations by `dt` seconds, recomposes the pose and dispatches the events the
    /// update produced.
    pub fn advance_time(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt } else { 0.0 };
        if self.update_cache_dirty {
            self.rebuild_update_cache();
        }

        let cached = {
            let mut targets = PoseTargets {
                bones: &mut self.bones,
                slots: &mut self.slots,
                constraints: &mut self.constraints,
            };
            self.animation.advance_time(
                dt,
                &mut targets,
                self.frame_cache.as_deref(),
                &mut self.events,
            )
        };

        let loaded = match (cached, &self.frame_cache) {
            (Some(pose), Some(cache)) if pose.hit => {
                for bone in &mut self.bones {
                    bone.updated = false;
                }
                let bones = &mut self.bones;
                cache.load(pose.animation, pose.frame, |index, matrix, global| {
                    if let Some(bone) = bones.get_mut(index) {
                        bone.set_global(matrix, global);
                    }
                })
            }
            _ => false,
        };
        if loaded {
            self.pose_from_cache = true;
        } else {
            self.update_bones();
            if let (Some(pose), Some(cache)) = (cached, &self.frame_cache) {
                cache.store(
                    pose.animation,
                    pose.frame,
                    self.bones
                        .iter()
                        .enumerate()
                        .map(|(i, b)| (i, &b.global_transform_matrix, &b.global)),
                );
            }
        }

        self.update_slots(dt);
        self.dispatch_events();
    }

    fn update_bones(&mut self) {
        if std::mem::take(&mut self.pose_from_cache) {
            for bone in &mut self.bones {
                bone.invalidate_update();
            }
        }
        for constraint in &mut self.constraints {
            if constraint.take_dirty() {
                for index in constraint.chain() {
                    self.bones[index].invalidate_update();
                }
            }
        }
        for bone in &mut self.bones {
            bone.updated = false;
        }

        for item in &self.update_cache {
            match *item {
                UpdateCacheItem::Bone(index) => {
                    let parent = self.bones[index]
                        .parent_index()
                        .map(|p| self.bones[p].parent_pose());
                    self.bones[index].update(parent);
                }
                UpdateCacheItem::Constraint(index) => {
                    let constraint = &self.constraints[index];
                    if !constraint.needs_solve(&self.bones) {
                        continue;
                    }
                    // Solve from the unconstrained pose, not last update's result.
                    for bone in constraint.chain() {
                        let parent = self.bones[bone]
                            .parent_index()
                            .map(|p| self.bones[p].parent_pose());
                        self.bones[bone].invalidate_update();
                        self.bones[bone].update(parent);
                    }
                    constraint.solve(&mut self.bones);
                }
            }
        }
    }

    fn update_slots(&mut self, dt: f32) {
        for slot in &mut self.slots {
            if let Some(bone) = self.bones.get(slot.parent()) {
                slot.update_transform(bone);
            }
        }
        if self.slots.iter().any(Slot::is_z_order_dirty) {
            self.sort_draw_order();
        }

        for slot in &mut self.slots {
            if let Some(child) = slot.child_armature_mut() {
                if child.inherit_animation {
                    child.advance_time(dt);
                }
            }
        }

        let texture_atlas = self.texture_atlas_name.as_deref();
        for &index in &self.draw_order {
            self.slots[index].flush(self.renderer.as_deref_mut(), texture_atlas);
        }
    }

    fn dispatch_events(&mut self) {
        self.dispatcher.dispatch(&mut self.events.events);

        for PendingAction { action } in std::mem::take(&mut self.events.actions) {
            let result = match action.slot {
                Some(slot) => match self.slots.get_mut(slot).and_then(Slot::child_armature_mut) {
                    Some(child) => child.animation.play(Some(&action.name), None).map(drop),
                    None => {
                        log::warn!(
                            "play action '{}' targets slot {slot} without a nested armature",
                            action.name
                        );
                        continue;
                    }
                },
                None => self.animation.play(Some(&action.name), None).map(drop),
            };
            if let Err(err) = result {
                log::debug!("play action in armature '{}' failed: {err}", self.data.name);
            }
        }
    }

    fn sort_draw_order(&mut self) {
        let slots = &self.slots;
        self.draw_order.clear();
        self.draw_order.extend(0..slots.len());
        self.draw_order.sort_by_key(|&i| (slots[i].z_order(), i));
    }

    /// Bones in sorted order, each constraint right after the last bone it rewrites, and the
    /// constrained subtree revisited after the constraint.
    fn rebuild_update_cache(&mut self) {
        let sorted: Vec<usize> = if self.data.is_sorted() {
            self.data.sorted_bones().to_vec()
        } else {
            (0..self.bones.len()).collect()
        };
        let mut cache: Vec<UpdateCacheItem> =
            sorted.into_iter().map(UpdateCacheItem::Bone).collect();

        for (index, constraint) in self.constraints.iter().enumerate() {
            let Some(position) = cache
                .iter()
                .rposition(|item| *item == UpdateCacheItem::Bone(constraint.bone()))
            else {
                continue;
            };
            let top = constraint.root().unwrap_or(constraint.bone());
            let subtree = self.data.bone_subtree(top);
            let revisit: Vec<UpdateCacheItem> = cache[..position]
                .iter()
                .filter(|item| match item {
                    UpdateCacheItem::Bone(b) => {
                        subtree.contains(b) && !constraint.chain().any(|c| c == *b)
                    }
                    UpdateCacheItem::Constraint(_) => false,
                })
                .copied()
                .collect();
            cache.insert(position + 1, UpdateCacheItem::Constraint(index));
            cache.splice(position + 2..position + 2, revisit);
        }

        self.update_cache = cache;
        self.update_cache_dirty = false;
    }
}
