use crate::{DEFAULT_POOL_MAX_COUNT, Tween};

/// Which already active states a new state fades out when it starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FadeOutMode {
    /// Leave every other state alone.
    None,
    SameLayer,
    SameGroup,
    #[default]
    SameLayerAndGroup,
    All,
    /// Leave every other state alone, and return an already active state of the same
    /// animation instead of starting a new one.
    Single,
}

/// How to start one animation state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnimationConfig {
    /// State name; empty uses the animation name.
    pub name: String,
    pub animation: String,
    /// Higher layers blend first and take weight from lower ones.
    pub layer: i32,
    pub group: String,
    /// `Some(0)` loops forever; `None` uses the animation's own play count.
    pub play_times: Option<u32>,
    /// Start offset into the animation, in seconds.
    pub position: f32,
    /// Length of one play, in seconds; `None` plays to the end of the animation.
    pub duration: Option<f32>,
    pub time_scale: f32,
    pub weight: f32,
    /// `None` uses the animation's own fade-in time.
    pub fade_in_time: Option<f32>,
    /// Fade time applied to the states this one replaces; `None` reuses the fade-in time.
    pub fade_out_time: Option<f32>,
    pub fade_out_mode: FadeOutMode,
    pub fade_in_easing: Tween,
    pub fade_out_easing: Tween,
    /// Fade-out started once the state completes; `None` holds the final pose.
    pub auto_fade_out_time: Option<f32>,
    pub pause_fade_in: bool,
    pub pause_fade_out: bool,
    /// Whether this state may switch slot displays and z-order.
    pub display_control: bool,
    /// Whether this state emits frame events and runs play actions.
    pub action_enabled: bool,
    /// Add the pose on top of the other states instead of sharing layer weight.
    pub additive_blending: bool,
    /// Bone names the state is limited to; empty affects every bone.
    pub bone_mask: Vec<String>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            animation: String::new(),
            layer: 0,
            group: String::new(),
            play_times: None,
            position: 0.0,
            duration: None,
            time_scale: 1.0,
            weight: 1.0,
            fade_in_time: None,
            fade_out_time: None,
            fade_out_mode: FadeOutMode::default(),
            fade_in_easing: Tween::Linear,
            fade_out_easing: Tween::Linear,
            auto_fade_out_time: Some(0.0),
            pause_fade_in: false,
            pause_fade_out: true,
            display_control: true,
            action_enabled: true,
            additive_blending: false,
            bone_mask: Vec::new(),
        }
    }
}

impl AnimationConfig {
    pub fn new(animation: impl Into<String>) -> Self {
        Self {
            animation: animation.into(),
            ..Default::default()
        }
    }

    pub fn state_name(&self) -> &str {
        if self.name.is_empty() {
            &self.animation
        } else {
            &self.name
        }
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_play_times(mut self, play_times: u32) -> Self {
        self.play_times = Some(play_times);
        self
    }

    pub fn with_fade_in_time(mut self, fade_in_time: f32) -> Self {
        self.fade_in_time = Some(fade_in_time);
        self
    }

    pub fn with_fade_out_mode(mut self, fade_out_mode: FadeOutMode) -> Self {
        self.fade_out_mode = fade_out_mode;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_bone_mask<I, S>(mut self, bones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bone_mask = bones.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FactoryConfig {
    /// Look through every loaded bundle when the named one does not hold the armature.
    pub auto_search: bool,
    pub default_pool_max_count: usize,
    pub bone_pool_max_count: Option<usize>,
    pub slot_pool_max_count: Option<usize>,
    pub constraint_pool_max_count: Option<usize>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            auto_search: false,
            default_pool_max_count: DEFAULT_POOL_MAX_COUNT,
            bone_pool_max_count: None,
            slot_pool_max_count: None,
            constraint_pool_max_count: None,
        }
    }
}
