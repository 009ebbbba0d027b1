use crate::{ArmatureData, Matrix, Transform};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Floats stored per cached bone pose: matrix `a b c d tx ty`, then rotation, skew, scale x/y.
pub const CACHE_FRAME_STRIDE: usize = 10;

/// Unpopulated entry.
const UNCACHED: i32 = -1;

/// Bone poses sampled at a fixed rate, shared by every armature built from one
/// [`ArmatureData`].
///
/// Tables are sized up front with every entry unpopulated; poses are appended the first time
/// an armature evaluates a given animation frame and read back by later evaluations.
#[derive(Debug)]
pub struct FrameCache {
    frame_rate: u32,
    bone_count: usize,
    state: Mutex<FrameCacheState>,
}

#[derive(Debug, Default)]
struct FrameCacheState {
    values: Vec<f32>,
    animations: Vec<AnimationFrames>,
}

#[derive(Debug)]
struct AnimationFrames {
    cache_rate: f32,
    /// Per frame, whether every bone pose for it has been stored.
    cached: Vec<bool>,
    /// `[bone][frame]` offsets into `values`.
    bone_offsets: Vec<Vec<i32>>,
}

impl FrameCache {
    pub(crate) fn new(data: &ArmatureData, frame_rate: u32) -> Self {
        let bone_count = data.bones().len();
        let animations = data
            .animations()
            .iter()
            .map(|animation| {
                let cache_rate = (frame_rate as f32 * animation.scale).ceil().max(1.0);
                let frame_count = (cache_rate * animation.duration).ceil() as usize + 1;
                AnimationFrames {
                    cache_rate,
                    cached: vec![false; frame_count],
                    bone_offsets: vec![vec![UNCACHED; frame_count]; bone_count],
                }
            })
            .collect();
        Self {
            frame_rate,
            bone_count,
            state: Mutex::new(FrameCacheState {
                values: Vec::new(),
                animations,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrameCacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn frame_count(&self, animation: usize) -> usize {
        self.lock()
            .animations
            .get(animation)
            .map_or(0, |a| a.cached.len())
    }

    /// Number of floats currently stored.
    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snaps `time` down to the cache grid of `animation`, returning the frame index and the
    /// snapped time.
    pub fn quantize(&self, animation: usize, time: f32) -> Option<(usize, f32)> {
        let state = self.lock();
        let frames = state.animations.get(animation)?;
        let last = frames.cached.len().checked_sub(1)?;
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        let index = ((time * frames.cache_rate).floor() as usize).min(last);
        Some((index, index as f32 / frames.cache_rate))
    }

    pub fn is_cached(&self, animation: usize, frame: usize) -> bool {
        self.lock()
            .animations
            .get(animation)
            .and_then(|a| a.cached.get(frame))
            .copied()
            .unwrap_or(false)
    }

    /// Offset of a stored bone pose, or `-1` when the entry is unpopulated.
    pub fn bone_offset(&self, animation: usize, frame: usize, bone: usize) -> i32 {
        self.lock()
            .animations
            .get(animation)
            .and_then(|a| a.bone_offsets.get(bone))
            .and_then(|frames| frames.get(frame))
            .copied()
            .unwrap_or(UNCACHED)
    }

    /// Stores one full armature pose for `frame`. Poses already stored are kept.
    pub(crate) fn store<'a>(
        &self,
        animation: usize,
        frame: usize,
        poses: impl Iterator<Item = (usize, &'a Matrix, &'a Transform)>,
    ) {
        let mut state = self.lock();
        let FrameCacheState { values, animations } = &mut *state;
        let Some(frames) = animations.get_mut(animation) else {
            return;
        };
        if frames.cached.get(frame).copied().unwrap_or(true) {
            return;
        }

        for (bone, matrix, transform) in poses {
            let Some(slot) = frames
                .bone_offsets
                .get_mut(bone)
                .and_then(|f| f.get_mut(frame))
            else {
                continue;
            };
            if *slot != UNCACHED {
                continue;
            }
            *slot = values.len() as i32;
            values.extend_from_slice(&[
                matrix.a,
                matrix.b,
                matrix.c,
                matrix.d,
                matrix.tx,
                matrix.ty,
                transform.rotation,
                transform.skew,
                transform.scale_x,
                transform.scale_y,
            ]);
        }
        frames.cached[frame] = true;
        log::trace!(
            "cached frame {frame} of animation {animation} ({} floats)",
            values.len()
        );
    }

    /// Reads the full pose of `frame` into `out`, indexed by bone. Returns `false` when the
    /// frame has not been stored yet.
    pub(crate) fn load(
        &self,
        animation: usize,
        frame: usize,
        mut out: impl FnMut(usize, Matrix, Transform),
    ) -> bool {
        let state = self.lock();
        let Some(frames) = state.animations.get(animation) else {
            return false;
        };
        if !frames.cached.get(frame).copied().unwrap_or(false) {
            return false;
        }

        for bone in 0..self.bone_count {
            let offset = frames.bone_offsets[bone][frame];
            if offset < 0 {
                continue;
            }
            let offset = offset as usize;
            let Some(v) = state.values.get(offset..offset + CACHE_FRAME_STRIDE) else {
                continue;
            };
            let matrix = Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]);
            let transform = Transform {
                x: v[4],
                y: v[5],
                rotation: v[6],
                skew: v[7],
                scale_x: v[8],
                scale_y: v[9],
            };
            out(bone, matrix, transform);
        }
        true
    }
}
