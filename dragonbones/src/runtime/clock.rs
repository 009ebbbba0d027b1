use crate::Armature;
use std::any::Any;
use std::fmt;

/// Anything a [`WorldClock`] can drive.
pub trait Animatable {
    fn advance_time(&mut self, dt: f32);
}

impl Animatable for Armature {
    fn advance_time(&mut self, dt: f32) {
        Armature::advance_time(self, dt);
    }
}

trait ClockEntry {
    fn animatable(&mut self) -> &mut dyn Animatable;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Animatable + 'static> ClockEntry for T {
    fn animatable(&mut self) -> &mut dyn Animatable {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClockHandle(u64);

/// Shared time source. Entries advance in insertion order; removed entries leave a hole until
/// the next tick compacts the list.
pub struct WorldClock {
    /// Seconds elapsed since creation, after scaling.
    pub time: f32,
    pub time_scale: f32,
    entries: Vec<Option<(ClockHandle, Box<dyn ClockEntry>)>>,
    next_id: u64,
}

impl fmt::Debug for WorldClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldClock")
            .field("time", &self.time)
            .field("time_scale", &self.time_scale)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldClock {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            time_scale: 1.0,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, entry: impl Animatable + 'static) -> ClockHandle {
        self.next_id += 1;
        let handle = ClockHandle(self.next_id);
        self.entries.push(Some((handle, Box::new(entry))));
        handle
    }

    /// Detaches the entry. Its slot is reclaimed on the next tick.
    pub fn remove(&mut self, handle: ClockHandle) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.as_ref().is_some_and(|(h, _)| *h == handle))
        else {
            return false;
        };
        *entry = None;
        true
    }

    pub fn contains(&self, handle: ClockHandle) -> bool {
        self.entries
            .iter()
            .flatten()
            .any(|(h, _)| *h == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entry behind `handle`, if it is a `T`.
    pub fn get_mut<T: Animatable + 'static>(&mut self, handle: ClockHandle) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .flatten()
            .find(|(h, _)| *h == handle)
            .and_then(|(_, entry)| entry.as_any_mut().downcast_mut::<T>())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Negative or NaN deltas count as zero.
    pub fn advance_time(&mut self, dt: f32) {
        let dt = if dt.is_nan() || dt < 0.0 { 0.0 } else { dt };
        let dt = dt * self.time_scale;
        self.time += dt;

        for entry in self.entries.iter_mut().flatten() {
            entry.1.animatable().advance_time(dt);
        }
        self.entries.retain(Option::is_some);
    }
}

impl Animatable for WorldClock {
    fn advance_time(&mut self, dt: f32) {
        WorldClock::advance_time(self, dt);
    }
}
