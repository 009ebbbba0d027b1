use crate::{
    ActionFrame, ActionKind, AnimationConfig, AnimationData, ArmatureData, ArmatureEvent,
    EventKind, EventQueue, FrameEvent, Handle, PendingAction, Poolable, StateEvent, Tween,
};

pub type AnimationStateHandle = Handle<AnimationState>;

/// Progress of below-one fade values before a state counts as faded out.
const MIN_FADE_PROGRESS: f32 = 0.000_001;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum FadeState {
    FadeIn,
    #[default]
    Steady,
    FadeOut,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
enum SubFadeState {
    #[default]
    Start,
    Fading,
    Complete,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PlayState {
    #[default]
    NotStarted,
    Playing,
    Complete,
}

/// One playing instance of an animation: its playhead, loop count, fade and bone mask.
#[derive(Clone, Debug, Default)]
pub struct AnimationState {
    name: String,
    animation_name: String,
    animation_index: usize,
    layer: i32,
    group: String,

    pub time_scale: f32,
    pub weight: f32,
    pub auto_fade_out_time: Option<f32>,
    pub additive_blending: bool,
    pub display_control: bool,
    pub action_enabled: bool,

    pause_fade_in: bool,
    pause_fade_out: bool,
    fade_in_easing: Tween,
    fade_out_easing: Tween,

    play_times: u32,
    position: f32,
    duration: f32,
    data_time_scale: f32,

    time: f32,
    current_time: f32,
    current_play_times: u32,
    play_state: PlayState,
    playing: bool,
    last_action_time: Option<f32>,

    fade_state: FadeState,
    sub_fade_state: SubFadeState,
    fade_time: f32,
    fade_total_time: f32,
    fade_progress: f32,

    bone_mask: Vec<String>,
    mask: Vec<bool>,
}

impl Poolable for AnimationState {
    fn reset(&mut self) {
        let mut bone_mask = std::mem::take(&mut self.bone_mask);
        let mut mask = std::mem::take(&mut self.mask);
        bone_mask.clear();
        mask.clear();
        *self = Self {
            bone_mask,
            mask,
            ..Self::default()
        };
    }
}

impl AnimationState {
    pub(crate) fn init(
        &mut self,
        config: &AnimationConfig,
        animation_index: usize,
        animation: &AnimationData,
        data: &ArmatureData,
    ) {
        self.name = config.state_name().to_string();
        self.animation_name.clone_from(&animation.name);
        self.animation_index = animation_index;
        self.layer = config.layer;
        self.group.clone_from(&config.group);
        self.configure(config, animation, data);

        self.fade_time = 0.0;
        self.fade_progress = if self.fade_total_time > 0.0 { 0.0 } else { 1.0 };
    }

    /// Restarts a state that is being played again with a new configuration: playhead back to
    /// the configured position, fade-in resumed from the current fade progress.
    pub(crate) fn restart(
        &mut self,
        config: &AnimationConfig,
        animation: &AnimationData,
        data: &ArmatureData,
    ) {
        self.configure(config, animation, data);
        if self.fade_total_time > 0.0 {
            self.fade_time = self.fade_total_time * self.fade_progress;
        } else {
            self.fade_time = 0.0;
            self.fade_progress = 1.0;
        }
    }

    /// Applies every playback setting of `config` and rewinds the playhead. Fade progress is
    /// left to the caller.
    fn configure(
        &mut self,
        config: &AnimationConfig,
        animation: &AnimationData,
        data: &ArmatureData,
    ) {
        self.time_scale = finite_or(config.time_scale, 1.0);
        self.weight = finite_or(config.weight, 1.0).max(0.0);
        self.auto_fade_out_time = config.auto_fade_out_time;
        self.additive_blending = config.additive_blending;
        self.display_control = config.display_control;
        self.action_enabled = config.action_enabled;
        self.pause_fade_in = config.pause_fade_in;
        self.pause_fade_out = config.pause_fade_out;
        self.fade_in_easing = config.fade_in_easing.clone();
        self.fade_out_easing = config.fade_out_easing.clone();

        self.play_times = config.play_times.unwrap_or(animation.play_times);
        self.position = finite_or(config.position, 0.0).clamp(0.0, animation.duration);
        let remaining = animation.duration - self.position;
        self.duration = config
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map_or(remaining, |d| d.min(remaining));
        self.data_time_scale = if animation.scale.is_finite() && animation.scale > 0.0 {
            animation.scale
        } else {
            1.0
        };

        self.time = 0.0;
        self.current_time = self.position;
        self.current_play_times = 0;
        self.play_state = PlayState::NotStarted;
        self.playing = true;
        self.last_action_time = None;

        let fade_in_time = config.fade_in_time.unwrap_or(animation.fade_in_time);
        self.fade_total_time = finite_or(fade_in_time, 0.0).max(0.0);
        self.fade_state = FadeState::FadeIn;
        self.sub_fade_state = SubFadeState::Start;

        self.bone_mask.clone_from(&config.bone_mask);
        self.rebuild_mask(data);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn animation_name(&self) -> &str {
        &self.animation_name
    }

    pub fn animation_index(&self) -> usize {
        self.animation_index
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// `0` loops forever.
    pub fn play_times(&self) -> u32 {
        self.play_times
    }

    pub fn current_play_times(&self) -> u32 {
        self.current_play_times
    }

    /// Playhead position inside the animation, in seconds.
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Moves the playhead within the current loop.
    pub fn set_current_time(&mut self, time: f32) {
        let time = finite_or(time, 0.0).clamp(0.0, self.duration);
        let loops = self.current_play_times.min(self.play_times.saturating_sub(1));
        let loops = if self.play_times == 0 {
            self.current_play_times
        } else {
            loops
        };
        self.time = loops as f32 * self.duration + time;
        if self.play_state == PlayState::Complete {
            self.play_state = PlayState::Playing;
        }
    }

    /// Length of one play, in seconds.
    pub fn total_time(&self) -> f32 {
        self.duration
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn fade_state(&self) -> FadeState {
        self.fade_state
    }

    pub fn fade_progress(&self) -> f32 {
        self.fade_progress
    }

    pub fn fade_total_time(&self) -> f32 {
        self.fade_total_time
    }

    pub fn is_fade_in(&self) -> bool {
        self.fade_state == FadeState::FadeIn
    }

    pub fn is_fade_out(&self) -> bool {
        self.fade_state == FadeState::FadeOut
    }

    pub fn is_fade_complete(&self) -> bool {
        self.fade_state == FadeState::Steady
    }

    pub(crate) fn is_fade_out_complete(&self) -> bool {
        self.fade_state == FadeState::FadeOut && self.sub_fade_state == SubFadeState::Complete
    }

    pub fn is_playing(&self) -> bool {
        self.playing && self.play_state != PlayState::Complete
    }

    pub fn is_completed(&self) -> bool {
        self.play_state == PlayState::Complete
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Freezes the playhead; the pose stays applied.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Starts fading this state out over `fade_out_time` seconds. A state that is already
    /// fading out only ever finishes sooner.
    pub fn fade_out(&mut self, fade_out_time: f32, pause_playhead: bool) {
        let fade_out_time = finite_or(fade_out_time, 0.0).max(0.0);
        if pause_playhead {
            self.pause_fade_out = true;
        }

        if self.fade_state == FadeState::FadeOut {
            if fade_out_time > self.fade_total_time - self.fade_time {
                return;
            }
        } else {
            self.fade_state = FadeState::FadeOut;
            self.sub_fade_state = SubFadeState::Start;
            if fade_out_time <= 0.0 || self.fade_progress <= 0.0 {
                self.fade_progress = MIN_FADE_PROGRESS;
            }
        }

        self.display_control = false;
        self.fade_total_time = if self.fade_progress > MIN_FADE_PROGRESS {
            fade_out_time / self.fade_progress
        } else {
            0.0
        };
        self.fade_time = self.fade_total_time * (1.0 - self.fade_progress);
    }

    /// Weight this state contributes with, fade included.
    pub fn blend_weight(&self) -> f32 {
        let progress = self.fade_progress.clamp(0.0, 1.0);
        let eased = match self.fade_state {
            _ if progress >= 1.0 => 1.0,
            _ if progress <= 0.0 => 0.0,
            FadeState::FadeIn => self.fade_in_easing.progress(progress),
            FadeState::FadeOut => self.fade_out_easing.progress(progress),
            FadeState::Steady => progress,
        };
        self.weight * eased
    }

    pub fn bone_mask(&self) -> &[String] {
        &self.bone_mask
    }

    pub fn contains_bone_mask(&self, name: &str) -> bool {
        self.bone_mask.is_empty() || self.bone_mask.iter().any(|b| b == name)
    }

    pub fn has_bone_mask(&self) -> bool {
        !self.bone_mask.is_empty()
    }

    /// Whether this state may pose `bone`.
    pub fn affects_bone(&self, bone: usize) -> bool {
        self.mask.is_empty() || self.mask.get(bone).copied().unwrap_or(false)
    }

    pub(crate) fn add_bone_mask(&mut self, data: &ArmatureData, bone: usize, recursive: bool) {
        let bones = if recursive {
            data.bone_subtree(bone)
        } else {
            vec![bone]
        };
        for index in bones {
            let name = &data.bones()[index].name;
            if !self.bone_mask.contains(name) {
                self.bone_mask.push(name.clone());
            }
        }
        self.rebuild_mask(data);
    }

    /// Removing from an empty mask first expands it to every bone.
    pub(crate) fn remove_bone_mask(&mut self, data: &ArmatureData, bone: usize, recursive: bool) {
        if self.bone_mask.is_empty() {
            self.bone_mask = data.bones().iter().map(|b| b.name.clone()).collect();
        }
        let bones = if recursive {
            data.bone_subtree(bone)
        } else {
            vec![bone]
        };
        for index in bones {
            let name = &data.bones()[index].name;
            self.bone_mask.retain(|b| b != name);
        }
        self.rebuild_mask(data);
    }

    pub(crate) fn remove_all_bone_mask(&mut self) {
        self.bone_mask.clear();
        self.mask.clear();
    }

    fn rebuild_mask(&mut self, data: &ArmatureData) {
        self.mask.clear();
        if self.bone_mask.is_empty() {
            return;
        }
        self.mask.resize(data.bones().len(), false);
        for name in &self.bone_mask {
            match data.bone_index(name) {
                Some(index) => self.mask[index] = true,
                None => log::warn!(
                    "bone mask of '{}' names unknown bone '{name}' in armature '{}'",
                    self.name,
                    data.name
                ),
            }
        }
    }

    /// Advances fade and playhead by `dt` seconds, queueing the resulting events.
    pub(crate) fn advance_time(
        &mut self,
        dt: f32,
        handle: AnimationStateHandle,
        animation: &AnimationData,
        data: &ArmatureData,
        out: &mut EventQueue,
    ) {
        let dt = dt * self.time_scale;
        if self.fade_state != FadeState::Steady && self.sub_fade_state != SubFadeState::Complete {
            self.advance_fade_time(dt.abs(), handle, &data.name, out);
        }

        let paused_by_fade = (self.fade_state == FadeState::FadeIn && self.pause_fade_in)
            || (self.fade_state == FadeState::FadeOut && self.pause_fade_out);
        let running = self.playing && !paused_by_fade;
        if running {
            self.time += dt * self.data_time_scale;
        }
        self.update_playhead(running, handle, animation, data, out);
    }

    fn advance_fade_time(
        &mut self,
        dt: f32,
        handle: AnimationStateHandle,
        armature: &str,
        out: &mut EventQueue,
    ) {
        let fading_out = self.fade_state == FadeState::FadeOut;
        if self.sub_fade_state == SubFadeState::Start {
            self.sub_fade_state = SubFadeState::Fading;
            let kind = if fading_out {
                EventKind::FadeOut
            } else {
                EventKind::FadeIn
            };
            out.push(self.state_event(kind, handle, armature));
        }

        self.fade_time += dt;
        if self.fade_time >= self.fade_total_time {
            self.sub_fade_state = SubFadeState::Complete;
            if fading_out {
                self.fade_progress = 0.0;
                out.push(self.state_event(EventKind::FadeOutComplete, handle, armature));
            } else {
                self.fade_progress = 1.0;
                self.fade_state = FadeState::Steady;
                out.push(self.state_event(EventKind::FadeInComplete, handle, armature));
            }
            return;
        }

        let progress = if self.fade_total_time > 0.0 {
            self.fade_time / self.fade_total_time
        } else {
            1.0
        };
        self.fade_progress = if fading_out {
            1.0 - progress
        } else {
            progress
        };
    }

    fn update_playhead(
        &mut self,
        running: bool,
        handle: AnimationStateHandle,
        animation: &AnimationData,
        data: &ArmatureData,
        out: &mut EventQueue,
    ) {
        let prev_state = self.play_state;
        let prev_play_times = self.current_play_times;

        let duration = self.duration;
        let total = self.play_times as f32 * duration;
        if duration <= 0.0 {
            if running {
                self.play_state = if self.play_times > 0 {
                    PlayState::Complete
                } else {
                    PlayState::Playing
                };
            }
            self.current_play_times = if self.play_state == PlayState::Complete {
                self.play_times
            } else {
                0
            };
            self.current_time = 0.0;
        } else if self.play_times > 0 && (self.time >= total || self.time <= -total) {
            if running || self.play_state == PlayState::Complete {
                self.play_state = PlayState::Complete;
            }
            self.current_play_times = self.play_times;
            self.current_time = if self.time < 0.0 { 0.0 } else { duration };
        } else {
            if running && self.play_state != PlayState::Playing {
                self.play_state = PlayState::Playing;
            }
            if self.time < 0.0 {
                let time = -self.time;
                self.current_play_times = (time / duration).floor() as u32;
                self.current_time = duration - time % duration;
            } else {
                self.current_play_times = (self.time / duration).floor() as u32;
                self.current_time = self.time % duration;
            }
        }
        self.current_time += self.position;

        let started =
            prev_state == PlayState::NotStarted && self.play_state != PlayState::NotStarted;
        if started {
            out.push(self.state_event(EventKind::Start, handle, &data.name));
        }
        if self.play_state == PlayState::NotStarted {
            return;
        }

        let actions_allowed = self.action_enabled && self.fade_state != FadeState::FadeOut;
        if actions_allowed && !animation.action_frames.is_empty() {
            self.collect_actions(prev_play_times, handle, animation, data, out);
        }
        self.last_action_time = Some(self.current_time);

        if self.current_play_times != prev_play_times {
            out.push(self.state_event(EventKind::LoopComplete, handle, &data.name));
            if self.play_state == PlayState::Complete {
                out.push(self.state_event(EventKind::Complete, handle, &data.name));
            }
        }
    }

    /// Queues the action frames the playhead crossed since the previous update.
    fn collect_actions(
        &self,
        prev_play_times: u32,
        handle: AnimationStateHandle,
        animation: &AnimationData,
        data: &ArmatureData,
        out: &mut EventQueue,
    ) {
        let start = self.position;
        let end = self.position + self.duration;
        let current = self.current_time;
        let frames = &animation.action_frames;
        let reverse = self.time_scale * self.data_time_scale < 0.0;
        let wrapped = self.current_play_times != prev_play_times;
        let complete = self.play_state == PlayState::Complete;

        let mut crossed: Vec<&ActionFrame> = Vec::new();
        match (self.last_action_time, reverse) {
            (None, false) => crossed.extend(frames_in(frames, start, true, current)),
            (None, true) => crossed.extend(frames_before(frames, current, end)),
            (Some(last), false) if !wrapped => {
                if current > last {
                    crossed.extend(frames_in(frames, last, false, current));
                }
            }
            (Some(last), false) => {
                crossed.extend(frames_in(frames, last, false, end));
                if !complete {
                    crossed.extend(frames_in(frames, start, true, current));
                }
            }
            (Some(last), true) if !wrapped => {
                if current < last {
                    crossed.extend(frames_before(frames, current, last));
                }
            }
            (Some(last), true) => {
                crossed.extend(frames_before(frames, start, last));
                if !complete {
                    crossed.extend(frames_before(frames, current, end));
                }
            }
        }

        for frame in crossed {
            self.queue_actions(frame, handle, animation, data, out);
        }
    }

    fn queue_actions(
        &self,
        frame: &ActionFrame,
        handle: AnimationStateHandle,
        animation: &AnimationData,
        data: &ArmatureData,
        out: &mut EventQueue,
    ) {
        for action in &frame.actions {
            let kind = match action.kind {
                ActionKind::Play => {
                    out.actions.push(PendingAction {
                        action: action.clone(),
                    });
                    continue;
                }
                ActionKind::Frame => EventKind::Frame,
                ActionKind::Sound => EventKind::Sound,
            };
            out.push(ArmatureEvent::Frame(FrameEvent {
                kind,
                armature: data.name.clone(),
                state: handle,
                animation: animation.name.clone(),
                name: action.name.clone(),
                bone: action
                    .bone
                    .and_then(|b| data.bones().get(b))
                    .map(|b| b.name.clone()),
                slot: action
                    .slot
                    .and_then(|s| data.slots().get(s))
                    .map(|s| s.name.clone()),
                data: action.data.clone(),
            }));
        }
    }

    fn state_event(
        &self,
        kind: EventKind,
        handle: AnimationStateHandle,
        armature: &str,
    ) -> ArmatureEvent {
        ArmatureEvent::State(StateEvent {
            kind,
            armature: armature.to_string(),
            state: handle,
            state_name: self.name.clone(),
            animation: self.animation_name.clone(),
        })
    }
}

/// Frames in `(from, to]`, or `[from, to]` when `inclusive`.
fn frames_in(
    frames: &[ActionFrame],
    from: f32,
    inclusive: bool,
    to: f32,
) -> impl Iterator<Item = &ActionFrame> {
    frames.iter().filter(move |f| {
        (f.position > from || (inclusive && f.position >= from)) && f.position <= to
    })
}

/// Frames in `[from, to)`, last first, as crossed by a reversed playhead.
fn frames_before(
    frames: &[ActionFrame],
    from: f32,
    to: f32,
) -> impl Iterator<Item = &ActionFrame> {
    frames
        .iter()
        .rev()
        .filter(move |f| f.position >= from && f.position < to)
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}
