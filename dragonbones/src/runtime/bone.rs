use crate::{BoneData, Matrix, Poolable, Transform};
use std::f32::consts::PI;

/// Runtime node of the skeleton hierarchy.
///
/// The animation layer writes `offset` on top of the rest pose (`origin`); the armature
/// recomposes `global` and `global_transform_matrix` in sorted order whenever the bone or one
/// of its ancestors changed.
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,
    name: String,
    length: f32,

    inherit_translation: bool,
    inherit_rotation: bool,
    inherit_scale: bool,
    inherit_reflection: bool,

    origin: Transform,
    offset: Transform,

    pub(crate) global: Transform,
    pub(crate) global_transform_matrix: Matrix,

    /// Constraints that rewrite this bone.
    pub(crate) constraints: Vec<usize>,

    transform_dirty: bool,
    /// Recomposed during the current update.
    pub(crate) updated: bool,
}

/// World pose of a parent as seen by its children during one update.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ParentPose {
    updated: bool,
    matrix: Matrix,
    global: Transform,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            data_index: 0,
            parent: None,
            name: String::new(),
            length: 0.0,
            inherit_translation: true,
            inherit_rotation: true,
            inherit_scale: true,
            inherit_reflection: true,
            origin: Transform::IDENTITY,
            offset: Transform::IDENTITY,
            global: Transform::IDENTITY,
            global_transform_matrix: Matrix::IDENTITY,
            constraints: Vec::new(),
            transform_dirty: true,
            updated: false,
        }
    }
}

impl Poolable for Bone {
    fn reset(&mut self) {
        let mut constraints = std::mem::take(&mut self.constraints);
        constraints.clear();
        *self = Self {
            constraints,
            ..Self::default()
        };
    }
}

impl Bone {
    pub(crate) fn init(&mut self, data_index: usize, data: &BoneData) {
        self.data_index = data_index;
        self.parent = data.parent;
        self.name.clone_from(&data.name);
        self.length = data.length;
        self.inherit_translation = data.inherit_translation;
        self.inherit_rotation = data.inherit_rotation;
        self.inherit_scale = data.inherit_scale;
        self.inherit_reflection = data.inherit_reflection;
        self.origin = data.transform;
        self.offset = Transform::IDENTITY;
        self.global = data.transform;
        self.global_transform_matrix = data.transform.to_matrix();
        self.transform_dirty = true;
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    /// Rest pose relative to the parent.
    pub fn origin(&self) -> &Transform {
        &self.origin
    }

    /// Animated delta on top of the rest pose.
    pub fn offset(&self) -> &Transform {
        &self.offset
    }

    /// Replaces the animated delta and schedules this bone and its descendants for
    /// recomposition.
    pub fn set_offset(&mut self, offset: Transform) {
        if self.offset != offset {
            self.offset = offset;
            self.transform_dirty = true;
        }
    }

    pub fn global(&self) -> &Transform {
        &self.global
    }

    pub fn global_transform_matrix(&self) -> &Matrix {
        &self.global_transform_matrix
    }

    pub fn constraints(&self) -> &[usize] {
        &self.constraints
    }

    pub fn is_dirty(&self) -> bool {
        self.transform_dirty
    }

    pub fn invalidate_update(&mut self) {
        self.transform_dirty = true;
    }

    pub(crate) fn parent_pose(&self) -> ParentPose {
        ParentPose {
            updated: self.updated,
            matrix: self.global_transform_matrix,
            global: self.global,
        }
    }

    /// Recomposes the world pose when this bone or its parent changed. Returns whether it
    /// did.
    ///
    /// A bone can be visited twice in one update (again after a constraint moved one of its
    /// ancestors), so `updated` is only ever raised here; the armature lowers it beforehand.
    pub(crate) fn update(&mut self, parent: Option<ParentPose>) -> bool {
        let parent_updated = parent.is_some_and(|p| p.updated);
        if !self.transform_dirty && !parent_updated {
            return false;
        }
        self.update_global_transform(parent.as_ref().map(|p| (&p.matrix, &p.global)));
        self.transform_dirty = false;
        self.updated = true;
        true
    }

    /// Loads a world pose computed elsewhere, e.g. from the frame cache.
    pub(crate) fn set_global(&mut self, matrix: Matrix, global: Transform) {
        self.global_transform_matrix = matrix;
        self.global = global;
        self.transform_dirty = false;
        self.updated = true;
    }

    fn update_global_transform(&mut self, parent: Option<(&Matrix, &Transform)>) {
        let mut global = self.origin;
        global.add(&self.offset);
        self.global = global;

        let Some((parent_matrix, parent_global)) = parent else {
            self.global.write_matrix(&mut self.global_transform_matrix);
            return;
        };

        if self.inherit_scale {
            if !self.inherit_rotation {
                self.global.rotation -= parent_global.rotation;
            }
            self.global.write_matrix(&mut self.global_transform_matrix);
            self.global_transform_matrix.concat(parent_matrix);

            if self.inherit_translation {
                self.global.x = self.global_transform_matrix.tx;
                self.global.y = self.global_transform_matrix.ty;
            } else {
                self.global_transform_matrix.tx = self.global.x;
                self.global_transform_matrix.ty = self.global.y;
            }

            // The local scale signs pick the decomposition of a reflected matrix.
            let matrix = self.global_transform_matrix;
            self.global.from_matrix(&matrix);
            return;
        }

        if self.inherit_translation {
            let p = parent_matrix.transform_point(self.global.x, self.global.y);
            self.global.x = p.x;
            self.global.y = p.y;
        }

        if self.inherit_rotation {
            let mut rotation = self.global.rotation + parent_global.rotation;
            if parent_global.scale_x < 0.0 {
                rotation += PI;
            }
            if parent_matrix.determinant() < 0.0 {
                rotation -= self.global.rotation * 2.0;
                if self.inherit_reflection {
                    self.global.skew += PI;
                }
            }
            self.global.rotation = rotation;
        }

        self.global.write_matrix(&mut self.global_transform_matrix);
    }
}
