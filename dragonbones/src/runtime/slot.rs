use crate::{
    Armature, BlendMode, Bone, ColorTransform, DisplayData, DisplayKind, Matrix, Poolable,
    SlotData,
};

/// Engine-side presentation of slots. The armature calls each hook only when the matching
/// state changed since the previous update.
pub trait SlotRenderer {
    /// The slot switched to another display, or its display data was replaced.
    fn update_display(&mut self, _slot: &Slot, _texture_atlas: Option<&str>) {}
    fn update_visible(&mut self, _slot: &Slot) {}
    fn update_z_order(&mut self, _slot: &Slot) {}
    fn update_blend_mode(&mut self, _slot: &Slot) {}
    fn update_color(&mut self, _slot: &Slot) {}
    /// Deform offsets of a mesh display changed.
    fn update_mesh(&mut self, _slot: &Slot) {}
    fn update_transform(&mut self, _slot: &Slot) {}
}

/// One candidate display of a slot, plus the nested armature built for armature displays.
#[derive(Debug, Default)]
pub struct SlotDisplay {
    pub data: Option<DisplayData>,
    pub(crate) armature: Option<Box<Armature>>,
}

impl SlotDisplay {
    pub fn armature(&self) -> Option<&Armature> {
        self.armature.as_deref()
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct SlotDirty {
    display: bool,
    visible: bool,
    z_order: bool,
    blend_mode: bool,
    color: bool,
    mesh: bool,
    transform: bool,
}

impl SlotDirty {
    const ALL: Self = Self {
        display: true,
        visible: true,
        z_order: true,
        blend_mode: true,
        color: true,
        mesh: true,
        transform: true,
    };

    fn any(&self) -> bool {
        *self != Self::default()
    }
}

#[derive(Debug)]
pub struct Slot {
    data_index: usize,
    parent: usize,
    name: String,

    display_index: i32,
    displays: Vec<SlotDisplay>,

    setup_color: ColorTransform,
    color: ColorTransform,
    blend_mode: BlendMode,
    /// Setup draw position.
    setup_z_order: i32,
    z_order: i32,
    visible: bool,

    /// Deform offsets of the current mesh display.
    deform_vertices: Vec<f32>,

    global_transform_matrix: Matrix,
    dirty: SlotDirty,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            data_index: 0,
            parent: 0,
            name: String::new(),
            display_index: -1,
            displays: Vec::new(),
            setup_color: ColorTransform::IDENTITY,
            color: ColorTransform::IDENTITY,
            blend_mode: BlendMode::Normal,
            setup_z_order: 0,
            z_order: 0,
            visible: true,
            deform_vertices: Vec::new(),
            global_transform_matrix: Matrix::IDENTITY,
            dirty: SlotDirty::ALL,
        }
    }
}

impl Poolable for Slot {
    fn reset(&mut self) {
        let mut deform_vertices = std::mem::take(&mut self.deform_vertices);
        deform_vertices.clear();
        *self = Self {
            deform_vertices,
            ..Self::default()
        };
    }
}

impl Slot {
    pub(crate) fn init(
        &mut self,
        data_index: usize,
        data: &SlotData,
        displays: &[Option<DisplayData>],
    ) {
        self.data_index = data_index;
        self.parent = data.parent;
        self.name.clone_from(&data.name);
        self.setup_color = data.color;
        self.color = data.color;
        self.blend_mode = data.blend_mode;
        self.setup_z_order = data_index as i32;
        self.z_order = data_index as i32;
        self.displays = displays
            .iter()
            .map(|data| SlotDisplay {
                data: data.clone(),
                armature: None,
            })
            .collect();
        self.display_index = -1;
        self.dirty = SlotDirty::ALL;
        self.set_display_index(data.display_index);
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    /// Index of the owning bone.
    pub fn parent(&self) -> usize {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `-1` when nothing is shown.
    pub fn display_index(&self) -> i32 {
        self.display_index
    }

    /// Shows the candidate at `index`; out-of-range indices show nothing.
    pub fn set_display_index(&mut self, index: i32) {
        let index = if index >= 0 && (index as usize) < self.displays.len() {
            index
        } else {
            -1
        };
        if self.display_index == index {
            return;
        }
        self.display_index = index;
        self.dirty.display = true;
        self.dirty.transform = true;
        self.reset_deform();
    }

    /// Switches to the candidate named `name`. Returns whether one was found.
    pub fn set_display_by_name(&mut self, name: &str) -> bool {
        let Some(index) = self
            .displays
            .iter()
            .position(|d| d.data.as_ref().is_some_and(|d| d.name == name))
        else {
            return false;
        };
        self.set_display_index(index as i32);
        true
    }

    pub fn displays(&self) -> &[SlotDisplay] {
        &self.displays
    }

    pub fn display(&self) -> Option<&DisplayData> {
        self.current()?.data.as_ref()
    }

    fn current(&self) -> Option<&SlotDisplay> {
        usize::try_from(self.display_index)
            .ok()
            .and_then(|i| self.displays.get(i))
    }

    /// Swaps the display data at `index`, growing the list with empty entries when needed.
    /// Any nested armature built for the previous data is returned.
    pub fn replace_display_data(
        &mut self,
        index: usize,
        data: Option<DisplayData>,
    ) -> Option<Box<Armature>> {
        if self.displays.len() <= index {
            self.displays.resize_with(index + 1, SlotDisplay::default);
        }
        let display = &mut self.displays[index];
        display.data = data;
        let previous = display.armature.take();
        if self.display_index == index as i32 {
            self.dirty.display = true;
            self.dirty.transform = true;
            self.reset_deform();
        }
        previous
    }

    pub(crate) fn truncate_displays(&mut self, len: usize) {
        if self.displays.len() > len {
            self.displays.truncate(len);
            if self.display_index >= len as i32 {
                self.set_display_index(-1);
            }
        }
    }

    pub(crate) fn set_display_armature(&mut self, index: usize, armature: Option<Box<Armature>>) {
        if let Some(display) = self.displays.get_mut(index) {
            display.armature = armature;
        }
    }

    /// The nested armature of the current display.
    pub fn child_armature(&self) -> Option<&Armature> {
        self.current()?.armature.as_deref()
    }

    pub fn child_armature_mut(&mut self) -> Option<&mut Armature> {
        let index = usize::try_from(self.display_index).ok()?;
        self.displays.get_mut(index)?.armature.as_deref_mut()
    }

    pub(crate) fn take_children(&mut self) -> impl Iterator<Item = Box<Armature>> + '_ {
        self.displays.iter_mut().filter_map(|d| d.armature.take())
    }

    pub fn color(&self) -> &ColorTransform {
        &self.color
    }

    pub fn setup_color(&self) -> &ColorTransform {
        &self.setup_color
    }

    pub fn set_color(&mut self, color: ColorTransform) {
        if self.color != color {
            self.color = color;
            self.dirty.color = true;
        }
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        if self.blend_mode != blend_mode {
            self.blend_mode = blend_mode;
            self.dirty.blend_mode = true;
        }
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub(crate) fn setup_z_order(&self) -> i32 {
        self.setup_z_order
    }

    pub(crate) fn set_z_order(&mut self, z_order: i32) -> bool {
        if self.z_order == z_order {
            return false;
        }
        self.z_order = z_order;
        self.dirty.z_order = true;
        true
    }

    pub(crate) fn is_z_order_dirty(&self) -> bool {
        self.dirty.z_order
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.dirty.visible = true;
        }
    }

    pub fn deform_vertices(&self) -> &[f32] {
        &self.deform_vertices
    }

    pub(crate) fn set_deform_vertices(&mut self, values: &[f32]) {
        if self.deform_vertices != values {
            self.deform_vertices.clear();
            self.deform_vertices.extend_from_slice(values);
            self.dirty.mesh = true;
        }
    }

    fn reset_deform(&mut self) {
        let len = self
            .display()
            .and_then(DisplayData::mesh_data)
            .map_or(0, |mesh| mesh.deform_len());
        self.deform_vertices.clear();
        self.deform_vertices.resize(len, 0.0);
        self.dirty.mesh = true;
    }

    pub fn global_transform_matrix(&self) -> &Matrix {
        &self.global_transform_matrix
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.any()
    }

    pub fn invalidate_update(&mut self) {
        self.dirty = SlotDirty::ALL;
    }

    /// Places the current display relative to the owning bone.
    pub(crate) fn update_transform(&mut self, bone: &Bone) {
        if !bone.updated && !self.dirty.transform {
            return;
        }
        let mut matrix = match self.display() {
            Some(display) if !matches!(display.kind, DisplayKind::Mesh(_)) => {
                display.transform.to_matrix()
            }
            _ => Matrix::IDENTITY,
        };
        matrix.concat(bone.global_transform_matrix());
        self.global_transform_matrix = matrix;
        self.dirty.transform = true;
    }

    /// Hands every pending change to `renderer` and clears the dirty flags.
    pub(crate) fn flush(
        &mut self,
        renderer: Option<&mut (dyn SlotRenderer + 'static)>,
        texture_atlas: Option<&str>,
    ) {
        let dirty = std::mem::take(&mut self.dirty);
        let Some(renderer) = renderer else {
            return;
        };
        if dirty.display {
            renderer.update_display(self, texture_atlas);
        }
        if dirty.visible {
            renderer.update_visible(self);
        }
        if dirty.z_order {
            renderer.update_z_order(self);
        }
        if dirty.blend_mode {
            renderer.update_blend_mode(self);
        }
        if dirty.color {
            renderer.update_color(self);
        }
        if dirty.mesh && self.display().is_some_and(|d| d.mesh_data().is_some()) {
            renderer.update_mesh(self);
        }
        if dirty.transform {
            renderer.update_transform(self);
        }
    }
}
