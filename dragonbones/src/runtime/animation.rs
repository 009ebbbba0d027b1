use crate::{
    AnimationConfig, AnimationState, AnimationStateHandle, Arena, ArmatureData, Bone,
    ColorTransform, ConstraintData, Error, EventQueue, FadeOutMode, FadeState, FrameCache,
    IkConstraint, Slot, Transform,
};
use std::sync::Arc;

/// Mutable pose targets of one armature, written by [`Animation::advance_time`].
pub(crate) struct PoseTargets<'a> {
    pub(crate) bones: &'a mut [Bone],
    pub(crate) slots: &'a mut [Slot],
    pub(crate) constraints: &'a mut [IkConstraint],
}

/// Frame-cache entry chosen for the current update.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct CachedPose {
    pub(crate) animation: usize,
    pub(crate) frame: usize,
    /// Sampling time snapped to the cache grid.
    pub(crate) time: f32,
    /// Whether the bone poses for `frame` are already stored.
    pub(crate) hit: bool,
}

/// Per-target weight bookkeeping across layers, rebuilt every update.
///
/// States of one layer share the weight left over by higher layers; once a layer has used
/// it all up, lower layers no longer contribute.
#[derive(Copy, Clone, Debug, Default)]
struct BlendState {
    dirty: bool,
    layer: i32,
    left_weight: f32,
    layer_weight: f32,
}

impl BlendState {
    fn update(&mut self, weight: f32, layer: i32) -> Option<f32> {
        if !self.dirty {
            self.dirty = true;
            self.layer = layer;
            self.layer_weight = weight;
            self.left_weight = 1.0;
            return Some(weight);
        }
        if self.left_weight <= 0.0 {
            return None;
        }
        if self.layer != layer {
            if self.layer_weight >= self.left_weight {
                self.left_weight = 0.0;
                return None;
            }
            self.layer = layer;
            self.left_weight -= self.layer_weight;
            self.layer_weight = 0.0;
        }
        let weight = weight * self.left_weight;
        self.layer_weight += weight;
        Some(weight)
    }

    /// Additive states bypass the layer budget, leaving all of it to the states after them.
    fn contribute(&mut self, weight: f32, layer: i32, additive: bool) -> Option<f32> {
        let weight = if additive {
            if !self.dirty {
                self.dirty = true;
                self.layer = layer;
                self.layer_weight = 0.0;
                self.left_weight = 1.0;
            }
            Some(weight)
        } else {
            self.update(weight, layer)
        }?;
        (weight > 0.0).then_some(weight)
    }
}

type ColorAccumulator = [f32; 8];

fn color_to_array(c: &ColorTransform) -> ColorAccumulator {
    [
        c.alpha_multiplier,
        c.red_multiplier,
        c.green_multiplier,
        c.blue_multiplier,
        c.alpha_offset as f32,
        c.red_offset as f32,
        c.green_offset as f32,
        c.blue_offset as f32,
    ]
}

fn color_from_array(v: &ColorAccumulator) -> ColorTransform {
    ColorTransform {
        alpha_multiplier: v[0],
        red_multiplier: v[1],
        green_multiplier: v[2],
        blue_multiplier: v[3],
        alpha_offset: v[4].round() as i32,
        red_offset: v[5].round() as i32,
        green_offset: v[6].round() as i32,
        blue_offset: v[7].round() as i32,
    }
}

#[derive(Debug, Default)]
struct PoseScratch {
    bone_blend: Vec<BlendState>,
    bone_poses: Vec<Transform>,
    color_blend: Vec<BlendState>,
    colors: Vec<ColorAccumulator>,
    deform_blend: Vec<BlendState>,
    deforms: Vec<Vec<f32>>,
    ik_blend: Vec<BlendState>,
    ik_weights: Vec<f32>,
    ik_bends: Vec<Option<bool>>,
    displays: Vec<Option<i32>>,
    /// `Some(None)` restores the setup order.
    z_orders: Option<Option<Vec<i32>>>,
}

impl PoseScratch {
    fn reset(&mut self, data: &ArmatureData, targets: &PoseTargets<'_>) {
        let bones = targets.bones.len();
        let slots = targets.slots.len();
        let constraints = targets.constraints.len();

        self.bone_blend.clear();
        self.bone_blend.resize(bones, BlendState::default());
        self.bone_poses.clear();
        self.bone_poses.resize(bones, Transform::IDENTITY);

        self.color_blend.clear();
        self.color_blend.resize(slots, BlendState::default());
        self.colors.clear();
        self.colors
            .extend(targets.slots.iter().map(|s| color_to_array(s.setup_color())));

        self.deform_blend.clear();
        self.deform_blend.resize(slots, BlendState::default());
        self.deforms.resize_with(slots, Vec::new);
        for (deform, slot) in self.deforms.iter_mut().zip(targets.slots.iter()) {
            deform.clear();
            deform.resize(slot.deform_vertices().len(), 0.0);
        }

        self.ik_blend.clear();
        self.ik_blend.resize(constraints, BlendState::default());
        self.ik_weights.clear();
        self.ik_weights.extend((0..constraints).map(|c| match data.constraints().get(c) {
            Some(ConstraintData::Ik(ik)) => ik.weight,
            None => targets.constraints[c].weight,
        }));
        self.ik_bends.clear();
        self.ik_bends.resize(constraints, None);

        self.displays.clear();
        self.displays.resize(slots, None);
        self.z_orders = None;
    }
}

/// Per-armature animation controller: the active states, in blend order.
#[derive(Debug)]
pub struct Animation {
    data: Arc<ArmatureData>,
    states: Arena<AnimationState>,
    /// Highest layer first; creation order within a layer.
    order: Vec<AnimationStateHandle>,
    pub time_scale: f32,
    last_state: Option<AnimationStateHandle>,
    scratch: PoseScratch,
}

impl Animation {
    pub fn new(data: Arc<ArmatureData>) -> Self {
        Self {
            data,
            states: Arena::new(),
            order: Vec::new(),
            time_scale: 1.0,
            last_state: None,
            scratch: PoseScratch::default(),
        }
    }

    pub fn data(&self) -> &Arc<ArmatureData> {
        &self.data
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.data.animations().iter().map(|a| a.name.as_str())
    }

    pub fn has_animation(&self, name: &str) -> bool {
        self.data.animation(name).is_some()
    }

    /// Plays `animation` from its start with no fade, fading out the states of the same
    /// layer and group.
    ///
    /// `None` resumes the last state when it was stopped, replays it when it finished, and
    /// otherwise plays the default animation.
    pub fn play(
        &mut self,
        animation: Option<&str>,
        play_times: Option<u32>,
    ) -> Result<AnimationStateHandle, Error> {
        if let Some(name) = animation {
            return self.play_config(&AnimationConfig {
                animation: name.to_string(),
                play_times,
                fade_in_time: Some(0.0),
                ..Default::default()
            });
        }

        if let Some(handle) = self.last_state.filter(|&h| self.states.contains(h)) {
            if let Some(state) = self.states.get_mut(handle) {
                if !state.is_playing() && !state.is_completed() {
                    state.play();
                    return Ok(handle);
                }
                let name = state.animation_name().to_string();
                return self.play(Some(&name), play_times);
            }
        }

        match self.data.default_animation() {
            Some(default) => {
                let name = default.name.clone();
                self.play(Some(&name), play_times)
            }
            None => {
                log::warn!("armature '{}' has no animations", self.data.name);
                Err(Error::UnknownAnimation {
                    name: String::new(),
                })
            }
        }
    }

    /// Fades `animation` in over `fade_in_time` seconds, fading out other states according to
    /// `fade_out_mode`.
    pub fn fade_in(
        &mut self,
        animation: &str,
        fade_in_time: f32,
        play_times: Option<u32>,
        layer: i32,
        group: Option<&str>,
        fade_out_mode: FadeOutMode,
    ) -> Result<AnimationStateHandle, Error> {
        self.play_config(&AnimationConfig {
            animation: animation.to_string(),
            fade_in_time: Some(fade_in_time),
            play_times,
            layer,
            group: group.unwrap_or_default().to_string(),
            fade_out_mode,
            ..Default::default()
        })
    }

    pub fn play_config(&mut self, config: &AnimationConfig) -> Result<AnimationStateHandle, Error> {
        let data = Arc::clone(&self.data);
        let Some((index, animation)) = data.animation(&config.animation) else {
            log::warn!(
                "armature '{}' has no animation '{}'",
                data.name,
                config.animation
            );
            return Err(Error::UnknownAnimation {
                name: config.animation.clone(),
            });
        };

        if config.fade_out_mode == FadeOutMode::Single {
            let existing = self.order.iter().copied().find(|&h| {
                self.states
                    .get(h)
                    .is_some_and(|s| s.animation_index() == index && !s.is_fade_out())
            });
            if let Some(handle) = existing {
                self.last_state = Some(handle);
                return Ok(handle);
            }
        }

        let name = config.state_name();
        let reused = self.order.iter().copied().find(|&h| {
            self.states.get(h).is_some_and(|s| {
                s.name() == name
                    && s.animation_index() == index
                    && s.layer() == config.layer
                    && s.group() == config.group
            })
        });

        let fade_in_time = config.fade_in_time.unwrap_or(animation.fade_in_time);
        let fade_out_time = config.fade_out_time.unwrap_or(fade_in_time);
        self.fade_out_others(config, fade_out_time, reused);

        let handle = match reused.and_then(|h| Some((h, self.states.get_mut(h)?))) {
            Some((handle, state)) => {
                state.restart(config, animation, &data);
                log::debug!("replaying state '{name}' of armature '{}'", data.name);
                handle
            }
            None => {
                let (handle, state) = self.states.alloc();
                state.init(config, index, animation, &data);
                let position = self
                    .order
                    .iter()
                    .position(|&h| self.states.get(h).is_some_and(|s| s.layer() < config.layer))
                    .unwrap_or(self.order.len());
                self.order.insert(position, handle);
                log::debug!(
                    "created state '{name}' (layer {}) of armature '{}'",
                    config.layer,
                    data.name
                );
                handle
            }
        };
        self.last_state = Some(handle);
        Ok(handle)
    }

    fn fade_out_others(
        &mut self,
        config: &AnimationConfig,
        fade_out_time: f32,
        except: Option<AnimationStateHandle>,
    ) {
        for &handle in &self.order {
            if Some(handle) == except {
                continue;
            }
            let Some(state) = self.states.get_mut(handle) else {
                continue;
            };
            let matches = match config.fade_out_mode {
                FadeOutMode::None | FadeOutMode::Single => false,
                FadeOutMode::SameLayer => state.layer() == config.layer,
                FadeOutMode::SameGroup => state.group() == config.group,
                FadeOutMode::SameLayerAndGroup => {
                    state.layer() == config.layer && state.group() == config.group
                }
                FadeOutMode::All => true,
            };
            if matches {
                state.fade_out(fade_out_time, config.pause_fade_out);
            }
        }
    }

    pub fn goto_and_play_by_time(
        &mut self,
        animation: &str,
        time: f32,
        play_times: Option<u32>,
    ) -> Result<AnimationStateHandle, Error> {
        self.play_config(&AnimationConfig {
            animation: animation.to_string(),
            play_times,
            position: time,
            fade_in_time: Some(0.0),
            ..Default::default()
        })
    }

    pub fn goto_and_play_by_frame(
        &mut self,
        animation: &str,
        frame: u32,
        play_times: Option<u32>,
    ) -> Result<AnimationStateHandle, Error> {
        let time = self.frame_to_time(animation, frame);
        self.goto_and_play_by_time(animation, time, play_times)
    }

    pub fn goto_and_play_by_progress(
        &mut self,
        animation: &str,
        progress: f32,
        play_times: Option<u32>,
    ) -> Result<AnimationStateHandle, Error> {
        let time = self.progress_to_time(animation, progress);
        self.goto_and_play_by_time(animation, time, play_times)
    }

    /// Shows `animation` at `time` with a stopped playhead.
    pub fn goto_and_stop_by_time(
        &mut self,
        animation: &str,
        time: f32,
    ) -> Result<AnimationStateHandle, Error> {
        let handle = self.goto_and_play_by_time(animation, time, Some(1))?;
        if let Some(state) = self.states.get_mut(handle) {
            state.stop();
        }
        Ok(handle)
    }

    pub fn goto_and_stop_by_frame(
        &mut self,
        animation: &str,
        frame: u32,
    ) -> Result<AnimationStateHandle, Error> {
        let time = self.frame_to_time(animation, frame);
        self.goto_and_stop_by_time(animation, time)
    }

    pub fn goto_and_stop_by_progress(
        &mut self,
        animation: &str,
        progress: f32,
    ) -> Result<AnimationStateHandle, Error> {
        let time = self.progress_to_time(animation, progress);
        self.goto_and_stop_by_time(animation, time)
    }

    fn frame_to_time(&self, animation: &str, frame: u32) -> f32 {
        self.data.animation(animation).map_or(0.0, |(_, a)| {
            if a.frame_count > 0 {
                a.duration * frame.min(a.frame_count) as f32 / a.frame_count as f32
            } else {
                0.0
            }
        })
    }

    fn progress_to_time(&self, animation: &str, progress: f32) -> f32 {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.data
            .animation(animation)
            .map_or(0.0, |(_, a)| a.duration * progress)
    }

    /// Stops the playhead of the named state, or of every state.
    pub fn stop(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                if let Some(handle) = self.state_handle(name) {
                    if let Some(state) = self.states.get_mut(handle) {
                        state.stop();
                    }
                }
            }
            None => {
                for &handle in &self.order {
                    if let Some(state) = self.states.get_mut(handle) {
                        state.stop();
                    }
                }
            }
        }
    }

    /// Drops every state at once, without fading.
    pub fn reset(&mut self) {
        for handle in self.order.drain(..) {
            self.states.remove(handle);
        }
        self.last_state = None;
    }

    /// The most recently created state with this name.
    pub fn state(&self, name: &str) -> Option<&AnimationState> {
        self.state_by_handle(self.state_handle(name)?)
    }

    pub fn state_handle(&self, name: &str) -> Option<AnimationStateHandle> {
        self.order
            .iter()
            .rev()
            .copied()
            .find(|&h| self.states.get(h).is_some_and(|s| s.name() == name))
    }

    pub fn state_by_handle(&self, handle: AnimationStateHandle) -> Option<&AnimationState> {
        self.states.get(handle)
    }

    pub fn state_by_handle_mut(
        &mut self,
        handle: AnimationStateHandle,
    ) -> Option<&mut AnimationState> {
        self.states.get_mut(handle)
    }

    /// Active states in blend order.
    pub fn states(&self) -> impl Iterator<Item = (AnimationStateHandle, &AnimationState)> {
        self.order
            .iter()
            .filter_map(|&h| self.states.get(h).map(|s| (h, s)))
    }

    pub fn state_count(&self) -> usize {
        self.order.len()
    }

    pub fn last_state(&self) -> Option<&AnimationState> {
        self.states.get(self.last_state?)
    }

    pub fn last_animation_name(&self) -> Option<&str> {
        self.last_state().map(AnimationState::animation_name)
    }

    pub fn is_playing(&self) -> bool {
        self.states().any(|(_, s)| s.is_playing())
    }

    /// Whether every active state finished its plays.
    pub fn is_completed(&self) -> bool {
        !self.order.is_empty() && self.states().all(|(_, s)| s.is_completed())
    }

    pub fn add_bone_mask(
        &mut self,
        handle: AnimationStateHandle,
        bone: &str,
        recursive: bool,
    ) -> Result<(), Error> {
        let index = self.bone_index(bone)?;
        if let Some(state) = self.states.get_mut(handle) {
            state.add_bone_mask(&self.data, index, recursive);
        }
        Ok(())
    }

    pub fn remove_bone_mask(
        &mut self,
        handle: AnimationStateHandle,
        bone: &str,
        recursive: bool,
    ) -> Result<(), Error> {
        let index = self.bone_index(bone)?;
        if let Some(state) = self.states.get_mut(handle) {
            state.remove_bone_mask(&self.data, index, recursive);
        }
        Ok(())
    }

    pub fn remove_all_bone_mask(&mut self, handle: AnimationStateHandle) {
        if let Some(state) = self.states.get_mut(handle) {
            state.remove_all_bone_mask();
        }
    }

    fn bone_index(&self, bone: &str) -> Result<usize, Error> {
        self.data.bone_index(bone).ok_or_else(|| {
            log::warn!("armature '{}' has no bone '{bone}'", self.data.name);
            Error::UnknownBone {
                name: bone.to_string(),
            }
        })
    }

    /// Advances every state, drops the ones that finished fading out and blends the rest into
    /// `targets`. Returns the frame-cache entry used for the bone poses, if any.
    pub(crate) fn advance_time(
        &mut self,
        dt: f32,
        targets: &mut PoseTargets<'_>,
        frame_cache: Option<&FrameCache>,
        out: &mut EventQueue,
    ) -> Option<CachedPose> {
        let dt = dt * self.time_scale;
        let data = Arc::clone(&self.data);

        for &handle in &self.order {
            let Some(state) = self.states.get_mut(handle) else {
                continue;
            };
            let Some(animation) = data.animation_at(state.animation_index()) else {
                continue;
            };
            state.advance_time(dt, handle, animation, &data, out);
        }

        let states = &mut self.states;
        self.order.retain(|&handle| {
            let done = states.get(handle).is_none_or(|s| s.is_fade_out_complete());
            if done {
                if let Some(state) = states.get(handle) {
                    log::debug!(
                        "removed state '{}' of armature '{}'",
                        state.name(),
                        data.name
                    );
                }
                states.remove(handle);
            }
            !done
        });
        if self.last_state.is_some_and(|h| !self.states.contains(h)) {
            self.last_state = None;
        }

        // With no state left, the last pose stays applied.
        if self.order.is_empty() {
            return None;
        }
        let cached = self.cached_pose(frame_cache);
        self.blend(&data, targets, cached);

        for &handle in &self.order {
            let Some(state) = self.states.get_mut(handle) else {
                continue;
            };
            if state.is_completed() && !state.is_fade_out() {
                if let Some(fade_out_time) = state.auto_fade_out_time {
                    state.fade_out(fade_out_time, true);
                }
            }
        }
        cached
    }

    /// The shared cache only stands in for a single, fully weighted, unmasked state.
    fn cached_pose(&self, frame_cache: Option<&FrameCache>) -> Option<CachedPose> {
        let cache = frame_cache?;
        let [handle] = self.order.as_slice() else {
            return None;
        };
        let state = self.states.get(*handle)?;
        if state.fade_state() != FadeState::Steady
            || state.blend_weight() != 1.0
            || state.has_bone_mask()
            || state.additive_blending
        {
            return None;
        }
        let animation = state.animation_index();
        let (frame, time) = cache.quantize(animation, state.current_time())?;
        Some(CachedPose {
            animation,
            frame,
            time,
            hit: cache.is_cached(animation, frame),
        })
    }

    fn blend(
        &mut self,
        data: &ArmatureData,
        targets: &mut PoseTargets<'_>,
        cached: Option<CachedPose>,
    ) {
        let scratch = &mut self.scratch;
        scratch.reset(data, targets);
        let skip_bones = cached.is_some_and(|c| c.hit);

        for &handle in &self.order {
            let Some(state) = self.states.get(handle) else {
                continue;
            };
            let Some(animation) = data.animation_at(state.animation_index()) else {
                continue;
            };
            let weight = state.blend_weight();
            let layer = state.layer();
            let additive = state.additive_blending;
            let time = cached.map_or(state.current_time(), |c| c.time);

            if !skip_bones {
                for timeline in &animation.bone_timelines {
                    let bone = timeline.bone;
                    if bone >= scratch.bone_poses.len() || !state.affects_bone(bone) {
                        continue;
                    }
                    let Some(w) = scratch.bone_blend[bone].contribute(weight, layer, additive)
                    else {
                        continue;
                    };
                    let Some(frame) = timeline.timeline.sample(time) else {
                        continue;
                    };
                    let value = &frame.transform;
                    let pose = &mut scratch.bone_poses[bone];
                    pose.x += value.x * w;
                    pose.y += value.y * w;
                    pose.rotation += value.rotation * w;
                    pose.skew += value.skew * w;
                    pose.scale_x += (value.scale_x - 1.0) * w;
                    pose.scale_y += (value.scale_y - 1.0) * w;
                }
            }

            for timeline in &animation.slot_color_timelines {
                let slot = timeline.slot;
                let Some(target) = targets.slots.get(slot) else {
                    continue;
                };
                if !state.affects_bone(target.parent()) {
                    continue;
                }
                let Some(w) = scratch.color_blend[slot].contribute(weight, layer, additive) else {
                    continue;
                };
                let Some(value) = timeline.timeline.sample(time) else {
                    continue;
                };
                let value = color_to_array(&value);
                let setup = color_to_array(target.setup_color());
                for (acc, (v, s)) in scratch.colors[slot]
                    .iter_mut()
                    .zip(value.iter().zip(setup.iter()))
                {
                    *acc += (v - s) * w;
                }
            }

            for timeline in &animation.deform_timelines {
                let slot = timeline.slot;
                let Some(target) = targets.slots.get(slot) else {
                    continue;
                };
                let shows_display = target
                    .display()
                    .is_some_and(|d| d.name == timeline.display);
                if !shows_display || !state.affects_bone(target.parent()) {
                    continue;
                }
                let Some(w) = scratch.deform_blend[slot].contribute(weight, layer, additive)
                else {
                    continue;
                };
                let Some(values) = timeline.timeline.sample(time) else {
                    continue;
                };
                for (acc, v) in scratch.deforms[slot].iter_mut().zip(values.iter()) {
                    *acc += v * w;
                }
            }

            for timeline in &animation.ik_timelines {
                let constraint = timeline.constraint;
                if constraint >= scratch.ik_weights.len() {
                    continue;
                }
                let Some(w) = scratch.ik_blend[constraint].contribute(weight, layer, additive)
                else {
                    continue;
                };
                let Some(frame) = timeline.timeline.sample(time) else {
                    continue;
                };
                let setup = match data.constraints().get(constraint) {
                    Some(ConstraintData::Ik(ik)) => ik.weight,
                    None => 0.0,
                };
                scratch.ik_weights[constraint] += (frame.weight - setup) * w;
                scratch.ik_bends[constraint].get_or_insert(frame.bend_positive);
            }

            if state.display_control && !state.is_fade_out() {
                for timeline in &animation.slot_display_timelines {
                    let slot = timeline.slot;
                    let Some(target) = targets.slots.get(slot) else {
                        continue;
                    };
                    if scratch.displays[slot].is_some() || !state.affects_bone(target.parent()) {
                        continue;
                    }
                    scratch.displays[slot] = timeline.timeline.sample(time);
                }
                if scratch.z_orders.is_none() {
                    if let Some(timeline) = &animation.z_order_timeline {
                        scratch.z_orders = timeline.sample(time).map(|f| f.z_orders);
                    }
                }
            }
        }

        if !skip_bones {
            for (bone, pose) in targets.bones.iter_mut().zip(scratch.bone_poses.iter()) {
                bone.set_offset(*pose);
            }
        }

        // Colors, deforms and IK poses keep their last value when nothing keys them.
        for (index, slot) in targets.slots.iter_mut().enumerate() {
            if scratch.color_blend[index].dirty {
                slot.set_color(color_from_array(&scratch.colors[index]));
            }
            if let Some(display_index) = scratch.displays[index] {
                slot.set_display_index(display_index);
            }
            let deformed = scratch.deform_blend[index].dirty
                && slot.deform_vertices().len() == scratch.deforms[index].len();
            if deformed {
                slot.set_deform_vertices(&scratch.deforms[index]);
            }
            if let Some(z_orders) = &scratch.z_orders {
                let z = z_orders
                    .as_ref()
                    .and_then(|z| z.get(index).copied())
                    .unwrap_or(slot.setup_z_order());
                slot.set_z_order(z);
            }
        }

        for (index, constraint) in targets.constraints.iter_mut().enumerate() {
            if !scratch.ik_blend[index].dirty {
                continue;
            }
            let bend_positive = scratch.ik_bends[index].unwrap_or(constraint.bend_positive);
            constraint.set_pose(scratch.ik_weights[index], bend_positive);
        }
    }
}
