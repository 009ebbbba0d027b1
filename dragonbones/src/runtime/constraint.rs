use crate::{Bone, IkConstraintData, Poolable, normalize_radian};
use std::f32::consts::PI;

#[derive(Clone, Debug, PartialEq)]
pub struct IkConstraint {
    data_index: usize,
    name: String,
    pub(crate) target: usize,
    pub(crate) bone: usize,
    pub(crate) root: Option<usize>,
    pub bend_positive: bool,
    pub scale_enabled: bool,
    /// `0` leaves the chain untouched, `1` reaches the target.
    pub weight: f32,
    dirty: bool,
}

impl Default for IkConstraint {
    fn default() -> Self {
        Self {
            data_index: 0,
            name: String::new(),
            target: 0,
            bone: 0,
            root: None,
            bend_positive: true,
            scale_enabled: false,
            weight: 1.0,
            dirty: true,
        }
    }
}

impl Poolable for IkConstraint {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl IkConstraint {
    pub(crate) fn init(&mut self, data_index: usize, data: &IkConstraintData) {
        self.data_index = data_index;
        self.name.clone_from(&data.name);
        self.target = data.target;
        self.bone = data.bone;
        self.root = data.root;
        self.bend_positive = data.bend_positive;
        self.scale_enabled = data.scale_enabled;
        self.weight = data.weight;
        self.dirty = true;
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn bone(&self) -> usize {
        self.bone
    }

    pub fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn chain(&self) -> impl Iterator<Item = usize> {
        self.root.into_iter().chain(std::iter::once(self.bone))
    }

    pub(crate) fn set_pose(&mut self, weight: f32, bend_positive: bool) {
        if self.weight != weight || self.bend_positive != bend_positive {
            self.weight = weight;
            self.bend_positive = bend_positive;
            self.dirty = true;
        }
    }

    pub fn invalidate_update(&mut self) {
        self.dirty = true;
    }

    /// Consumes the pending-change flag.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Whether the chain or the target moved during the current update.
    pub(crate) fn needs_solve(&self, bones: &[Bone]) -> bool {
        bones[self.target].updated || self.chain().any(|b| bones[b].updated)
    }

    /// Rotates the chain towards the target, rewriting the bones' world poses.
    pub(crate) fn solve(&self, bones: &mut [Bone]) {
        if self.weight <= 0.0 {
            return;
        }
        match self.root {
            None => self.solve_one(bones),
            Some(root) => self.solve_two(bones, root),
        }
        for bone in self.chain() {
            bones[bone].updated = true;
        }
    }

    fn solve_one(&self, bones: &mut [Bone]) {
        let target = bones[self.target].global;
        let bone = &mut bones[self.bone];
        let global = &mut bone.global;
        let mut radian = (target.y - global.y).atan2(target.x - global.x);
        if global.scale_x < 0.0 {
            radian += PI;
        }
        global.rotation += normalize_radian(radian - global.rotation) * self.weight;
        global.write_matrix(&mut bone.global_transform_matrix);
    }

    fn solve_two(&self, bones: &mut [Bone], root: usize) {
        let target = bones[self.target].global;
        // A reflected grandparent flips which elbow solution is "positive".
        let reflected = bones[root]
            .parent_index()
            .is_some_and(|p| bones[p].global_transform_matrix.determinant() < 0.0);

        let bone_length = bones[self.bone].length();
        let matrix = bones[self.bone].global_transform_matrix;
        let mut global = bones[self.bone].global;
        let mut parent_global = bones[root].global;

        let x = matrix.a * bone_length;
        let y = matrix.b * bone_length;
        let l_ll = x * x + y * y;
        let l_l = l_ll.sqrt();

        let mut dx = global.x - parent_global.x;
        let mut dy = global.y - parent_global.y;
        let l_pp = dx * dx + dy * dy;
        let l_p = l_pp.sqrt();
        let raw_radian = global.rotation;
        let raw_parent_radian = parent_global.rotation;
        let raw_radian_a = dy.atan2(dx);

        dx = target.x - parent_global.x;
        dy = target.y - parent_global.y;
        let l_tt = dx * dx + dy * dy;
        let l_t = l_tt.sqrt();

        let mut radian_a;
        if l_l + l_p <= l_t || l_t + l_l <= l_p || l_t + l_p <= l_l {
            // Out of reach, or degenerate: point straight at the target.
            radian_a = dy.atan2(dx);
            if l_l + l_p > l_t && l_p < l_l {
                radian_a += PI;
            }
        } else {
            let h = (l_pp - l_ll + l_tt) / (2.0 * l_tt);
            let r = (l_pp - h * h * l_tt).max(0.0).sqrt() / l_t;
            let hx = parent_global.x + dx * h;
            let hy = parent_global.y + dy * h;
            let rx = -dy * r;
            let ry = dx * r;
            if reflected != self.bend_positive {
                global.x = hx - rx;
                global.y = hy - ry;
            } else {
                global.x = hx + rx;
                global.y = hy + ry;
            }
            radian_a = (global.y - parent_global.y).atan2(global.x - parent_global.x);
        }

        let dr = normalize_radian(radian_a - raw_radian_a);
        parent_global.rotation = raw_parent_radian + dr * self.weight;
        {
            let parent = &mut bones[root];
            parent.global = parent_global;
            parent_global.write_matrix(&mut parent.global_transform_matrix);
        }

        let current_radian_a = raw_radian_a + dr * self.weight;
        global.x = parent_global.x + current_radian_a.cos() * l_p;
        global.y = parent_global.y + current_radian_a.sin() * l_p;

        let mut radian_b = (target.y - global.y).atan2(target.x - global.x);
        if global.scale_x < 0.0 {
            radian_b += PI;
        }
        global.rotation = parent_global.rotation + raw_radian - raw_parent_radian
            + normalize_radian(radian_b - dr - raw_radian) * self.weight;

        let bone = &mut bones[self.bone];
        bone.global = global;
        global.write_matrix(&mut bone.global_transform_matrix);
    }
}
