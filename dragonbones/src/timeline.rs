use crate::{ColorTransform, Transform, Tween, UserData, normalize_radian};
use std::f32::consts::TAU;

/// A value that can be keyed on a [`Timeline`].
pub trait Keyframe: Clone {
    /// Value at `progress` (already eased) of the way from `self` to `next`.
    fn interpolate(&self, next: &Self, progress: f32) -> Self;
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame<V> {
    /// Seconds from the start of the animation.
    pub position: f32,
    /// Seconds until the next keyframe.
    pub duration: f32,
    pub tween: Tween,
    pub value: V,
}

/// Keyframes sorted by position, covering `[0, duration)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timeline<V> {
    duration: f32,
    frames: Vec<Frame<V>>,
}

impl<V> Timeline<V> {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            frames: Vec::new(),
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn frames(&self) -> &[Frame<V>] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Inserts a keyframe, keeping frames sorted and durations contiguous.
    pub fn push(&mut self, position: f32, value: impl Into<V>, tween: Tween) {
        let position = if position.is_finite() {
            position.clamp(0.0, self.duration)
        } else {
            0.0
        };
        let index = self.frames.partition_point(|f| f.position <= position);
        self.frames.insert(
            index,
            Frame {
                position,
                duration: 0.0,
                tween,
                value: value.into(),
            },
        );
        self.update_durations();
    }

    pub fn with_frame(mut self, position: f32, value: impl Into<V>, tween: Tween) -> Self {
        self.push(position, value, tween);
        self
    }

    fn update_durations(&mut self) {
        let count = self.frames.len();
        for i in 0..count {
            let end = if i + 1 < count {
                self.frames[i + 1].position
            } else {
                self.duration
            };
            self.frames[i].duration = (end - self.frames[i].position).max(0.0);
        }
    }

    /// Index of the active keyframe and the eased progress towards the next one.
    pub fn locate(&self, position: f32) -> Option<(usize, f32)> {
        if self.frames.is_empty() {
            return None;
        }
        if self.frames.len() == 1 {
            return Some((0, 0.0));
        }

        let position = if position.is_finite() {
            position.clamp(0.0, self.duration)
        } else {
            0.0
        };
        let index = self
            .frames
            .partition_point(|f| f.position <= position)
            .saturating_sub(1);
        let frame = &self.frames[index];
        if frame.tween.is_stepped() || frame.duration <= 0.0 {
            return Some((index, 0.0));
        }

        let raw = ((position - frame.position) / frame.duration).clamp(0.0, 1.0);
        Some((index, frame.tween.progress(raw)))
    }
}

impl<V: Keyframe> Timeline<V> {
    /// Interpolated value at `position` seconds. Out-of-range positions clamp to the ends.
    pub fn sample(&self, position: f32) -> Option<V> {
        let (index, progress) = self.locate(position)?;
        let frame = &self.frames[index];
        if progress == 0.0 {
            return Some(frame.value.clone());
        }
        // The last keyframe tweens back towards the first.
        let next = self.frames.get(index + 1).unwrap_or(&self.frames[0]);
        Some(frame.value.interpolate(&next.value, progress))
    }
}

impl Keyframe for f32 {
    fn interpolate(&self, next: &Self, progress: f32) -> Self {
        self + (next - self) * progress
    }
}

/// Discrete values hold until the next keyframe.
impl Keyframe for i32 {
    fn interpolate(&self, _next: &Self, _progress: f32) -> Self {
        *self
    }
}

impl Keyframe for ColorTransform {
    fn interpolate(&self, next: &Self, progress: f32) -> Self {
        self.lerp(next, progress)
    }
}

/// Deform offsets. Missing trailing values count as zero.
impl Keyframe for Vec<f32> {
    fn interpolate(&self, next: &Self, progress: f32) -> Self {
        let len = self.len().max(next.len());
        (0..len)
            .map(|i| {
                let a = self.get(i).copied().unwrap_or(0.0);
                let b = next.get(i).copied().unwrap_or(0.0);
                a + (b - a) * progress
            })
            .collect()
    }
}

/// Bone pose delta relative to the rest pose.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneFrame {
    pub transform: Transform,
    /// Extra full turns added while tweening to the next keyframe.
    pub tween_rotate: i32,
}

impl From<Transform> for BoneFrame {
    fn from(transform: Transform) -> Self {
        Self {
            transform,
            tween_rotate: 0,
        }
    }
}

impl Keyframe for BoneFrame {
    fn interpolate(&self, next: &Self, progress: f32) -> Self {
        let a = &self.transform;
        let b = &next.transform;
        let rotation =
            normalize_radian(b.rotation - a.rotation) + self.tween_rotate as f32 * TAU;
        let skew = normalize_radian(b.skew - a.skew);
        BoneFrame {
            transform: Transform {
                x: a.x + (b.x - a.x) * progress,
                y: a.y + (b.y - a.y) * progress,
                skew: a.skew + skew * progress,
                rotation: a.rotation + rotation * progress,
                scale_x: a.scale_x + (b.scale_x - a.scale_x) * progress,
                scale_y: a.scale_y + (b.scale_y - a.scale_y) * progress,
            },
            tween_rotate: self.tween_rotate,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IkFrame {
    pub weight: f32,
    pub bend_positive: bool,
}

impl Keyframe for IkFrame {
    fn interpolate(&self, next: &Self, progress: f32) -> Self {
        IkFrame {
            weight: self.weight + (next.weight - self.weight) * progress,
            bend_positive: self.bend_positive,
        }
    }
}

/// Per-slot z-order values in slot order; `None` restores the setup order.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZOrderFrame {
    pub z_orders: Option<Vec<i32>>,
}

impl Keyframe for ZOrderFrame {
    fn interpolate(&self, _next: &Self, _progress: f32) -> Self {
        self.clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneTimeline {
    pub bone: usize,
    pub timeline: Timeline<BoneFrame>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotDisplayTimeline {
    pub slot: usize,
    pub timeline: Timeline<i32>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotColorTimeline {
    pub slot: usize,
    pub timeline: Timeline<ColorTransform>,
}

/// Mesh vertex offsets for one display of one slot.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeformTimeline {
    pub slot: usize,
    pub display: String,
    pub timeline: Timeline<Vec<f32>>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IkTimeline {
    pub constraint: usize,
    pub timeline: Timeline<IkFrame>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionKind {
    /// Fade in the named animation.
    Play,
    #[default]
    Frame,
    Sound,
}

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionData {
    pub kind: ActionKind,
    pub name: String,
    pub bone: Option<usize>,
    pub slot: Option<usize>,
    pub data: Option<UserData>,
}

impl ActionData {
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionFrame {
    pub position: f32,
    pub actions: Vec<ActionData>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationData {
    pub name: String,
    /// Length in frames at the owning armature's frame rate.
    pub frame_count: u32,
    /// Length in seconds.
    pub duration: f32,
    /// `0` loops forever.
    pub play_times: u32,
    pub fade_in_time: f32,
    /// Playback speed multiplier baked into the data.
    pub scale: f32,
    pub bone_timelines: Vec<BoneTimeline>,
    pub slot_display_timelines: Vec<SlotDisplayTimeline>,
    pub slot_color_timelines: Vec<SlotColorTimeline>,
    pub deform_timelines: Vec<DeformTimeline>,
    pub ik_timelines: Vec<IkTimeline>,
    pub z_order_timeline: Option<Timeline<ZOrderFrame>>,
    /// Sorted by position.
    pub action_frames: Vec<ActionFrame>,
}

impl AnimationData {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            frame_count: 0,
            duration: duration.max(0.0),
            play_times: 1,
            fade_in_time: 0.0,
            scale: 1.0,
            bone_timelines: Vec::new(),
            slot_display_timelines: Vec::new(),
            slot_color_timelines: Vec::new(),
            deform_timelines: Vec::new(),
            ik_timelines: Vec::new(),
            z_order_timeline: None,
            action_frames: Vec::new(),
        }
    }

    /// An empty timeline spanning this animation.
    pub fn timeline<V>(&self) -> Timeline<V> {
        Timeline::new(self.duration)
    }

    pub fn add_bone_timeline(&mut self, bone: usize, timeline: Timeline<BoneFrame>) {
        self.bone_timelines.push(BoneTimeline { bone, timeline });
    }

    pub fn add_slot_display_timeline(&mut self, slot: usize, timeline: Timeline<i32>) {
        self.slot_display_timelines
            .push(SlotDisplayTimeline { slot, timeline });
    }

    pub fn add_slot_color_timeline(&mut self, slot: usize, timeline: Timeline<ColorTransform>) {
        self.slot_color_timelines
            .push(SlotColorTimeline { slot, timeline });
    }

    pub fn add_deform_timeline(
        &mut self,
        slot: usize,
        display: impl Into<String>,
        timeline: Timeline<Vec<f32>>,
    ) {
        self.deform_timelines.push(DeformTimeline {
            slot,
            display: display.into(),
            timeline,
        });
    }

    pub fn add_ik_timeline(&mut self, constraint: usize, timeline: Timeline<IkFrame>) {
        self.ik_timelines.push(IkTimeline {
            constraint,
            timeline,
        });
    }

    pub fn add_action(&mut self, position: f32, action: ActionData) {
        let position = position.clamp(0.0, self.duration);
        if let Some(frame) = self
            .action_frames
            .iter_mut()
            .find(|f| (f.position - position).abs() <= f32::EPSILON)
        {
            frame.actions.push(action);
            return;
        }
        let index = self
            .action_frames
            .partition_point(|f| f.position <= position);
        self.action_frames.insert(
            index,
            ActionFrame {
                position,
                actions: vec![action],
            },
        );
    }

    pub fn bone_timeline(&self, bone: usize) -> Option<&Timeline<BoneFrame>> {
        self.bone_timelines
            .iter()
            .find(|t| t.bone == bone)
            .map(|t| &t.timeline)
    }
}
