use std::f32::consts::{PI, TAU};

const MATRIX_EPSILON: f32 = 1.0e-12;

/// Wraps an angle into `(-PI, PI]`.
pub fn normalize_radian(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    let mut value = (value + PI) % TAU;
    value += if value > 0.0 { -PI } else { PI };
    value
}

#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// 2D affine matrix. Points map as `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn identity(&mut self) {
        *self = Self::IDENTITY;
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Applies `self` first, then `other`.
    pub fn concat(&mut self, other: &Matrix) {
        let Matrix { a, b, c, d, tx, ty } = *self;
        self.a = a * other.a + b * other.c;
        self.b = a * other.b + b * other.d;
        self.c = c * other.a + d * other.c;
        self.d = c * other.b + d * other.d;
        self.tx = tx * other.a + ty * other.c + other.tx;
        self.ty = tx * other.b + ty * other.d + other.ty;
    }

    /// Inverts in place. A singular matrix becomes the identity.
    pub fn invert(&mut self) {
        let Matrix { a, b, c, d, tx, ty } = *self;

        if b == 0.0 && c == 0.0 {
            if a.abs() <= MATRIX_EPSILON || d.abs() <= MATRIX_EPSILON {
                self.identity();
                return;
            }
            let a = 1.0 / a;
            let d = 1.0 / d;
            *self = Self::new(a, 0.0, 0.0, d, -a * tx, -d * ty);
            return;
        }

        let determinant = a * d - b * c;
        if determinant.abs() <= MATRIX_EPSILON || !determinant.is_finite() {
            self.identity();
            return;
        }

        let inv = 1.0 / determinant;
        let na = d * inv;
        let nb = -b * inv;
        let nc = -c * inv;
        let nd = a * inv;
        *self = Self::new(na, nb, nc, nd, -(na * tx + nc * ty), -(nb * tx + nd * ty));
    }

    pub fn inverted(&self) -> Self {
        let mut out = *self;
        out.invert();
        out
    }

    pub fn transform_point(&self, x: f32, y: f32) -> Point {
        Point::new(
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    pub fn transform_vector(&self, x: f32, y: f32) -> Point {
        Point::new(self.a * x + self.c * y, self.b * x + self.d * y)
    }

    /// Axis-aligned bounds of the transformed rectangle.
    pub fn transform_rectangle(&self, rect: &Rectangle) -> Rectangle {
        let corners = [
            self.transform_point(rect.x, rect.y),
            self.transform_point(rect.x + rect.width, rect.y),
            self.transform_point(rect.x + rect.width, rect.y + rect.height),
            self.transform_point(rect.x, rect.y + rect.height),
        ];
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for p in corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rectangle::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Decomposed 2D transform. Angles are radians; `skew` is the extra rotation of the y axis.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub skew: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        skew: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    pub fn identity(&mut self) {
        *self = Self::IDENTITY;
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Translation, rotation and skew add; scale multiplies.
    pub fn add(&mut self, other: &Transform) {
        self.x += other.x;
        self.y += other.y;
        self.skew += other.skew;
        self.rotation += other.rotation;
        self.scale_x *= other.scale_x;
        self.scale_y *= other.scale_y;
    }

    pub fn minus(&mut self, other: &Transform) {
        self.x -= other.x;
        self.y -= other.y;
        self.skew -= other.skew;
        self.rotation -= other.rotation;
        if other.scale_x != 0.0 {
            self.scale_x /= other.scale_x;
        }
        if other.scale_y != 0.0 {
            self.scale_y /= other.scale_y;
        }
    }

    pub fn to_matrix(&self) -> Matrix {
        let mut m = Matrix::IDENTITY;
        self.write_matrix(&mut m);
        m
    }

    pub fn write_matrix(&self, m: &mut Matrix) {
        if self.rotation == 0.0 {
            m.a = 1.0;
            m.b = 0.0;
        } else {
            m.a = self.rotation.cos();
            m.b = self.rotation.sin();
        }

        if self.skew == 0.0 {
            m.c = -m.b;
            m.d = m.a;
        } else {
            let angle = self.skew + self.rotation;
            m.c = -angle.sin();
            m.d = angle.cos();
        }

        if self.scale_x != 1.0 {
            m.a *= self.scale_x;
            m.b *= self.scale_x;
        }
        if self.scale_y != 1.0 {
            m.c *= self.scale_y;
            m.d *= self.scale_y;
        }

        m.tx = self.x;
        m.ty = self.y;
    }

    /// Decomposes `m` into `self`. The signs of the current scales pick between the two
    /// equivalent decompositions of a reflected matrix.
    pub fn from_matrix(&mut self, m: &Matrix) {
        let keep_negative_x = self.scale_x < 0.0;
        let keep_negative_y = self.scale_y < 0.0;

        self.x = m.tx;
        self.y = m.ty;

        let mut rotation = m.b.atan2(m.a);
        let mut skew_x = (-m.c).atan2(m.d);
        let mut scale_x = m.a.hypot(m.b);
        let mut scale_y = m.c.hypot(m.d);

        if keep_negative_x {
            scale_x = -scale_x;
            rotation = normalize_radian(rotation + PI);
        }
        if keep_negative_y {
            scale_y = -scale_y;
            skew_x = normalize_radian(skew_x + PI);
        }

        if !scale_x.is_finite() || !scale_y.is_finite() {
            self.identity();
            return;
        }

        self.rotation = rotation;
        self.skew = normalize_radian(skew_x - rotation);
        self.scale_x = scale_x;
        self.scale_y = scale_y;
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ColorTransform {
    pub alpha_multiplier: f32,
    pub red_multiplier: f32,
    pub green_multiplier: f32,
    pub blue_multiplier: f32,
    pub alpha_offset: i32,
    pub red_offset: i32,
    pub green_offset: i32,
    pub blue_offset: i32,
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ColorTransform {
    pub const IDENTITY: Self = Self {
        alpha_multiplier: 1.0,
        red_multiplier: 1.0,
        green_multiplier: 1.0,
        blue_multiplier: 1.0,
        alpha_offset: 0,
        red_offset: 0,
        green_offset: 0,
        blue_offset: 0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn lerp(&self, to: &ColorTransform, t: f32) -> ColorTransform {
        fn mix(a: f32, b: f32, t: f32) -> f32 {
            a + (b - a) * t
        }
        fn mix_offset(a: i32, b: i32, t: f32) -> i32 {
            (a as f32 + (b - a) as f32 * t).round() as i32
        }
        ColorTransform {
            alpha_multiplier: mix(self.alpha_multiplier, to.alpha_multiplier, t),
            red_multiplier: mix(self.red_multiplier, to.red_multiplier, t),
            green_multiplier: mix(self.green_multiplier, to.green_multiplier, t),
            blue_multiplier: mix(self.blue_multiplier, to.blue_multiplier, t),
            alpha_offset: mix_offset(self.alpha_offset, to.alpha_offset, t),
            red_offset: mix_offset(self.red_offset, to.red_offset, t),
            green_offset: mix_offset(self.green_offset, to.green_offset, t),
            blue_offset: mix_offset(self.blue_offset, to.blue_offset, t),
        }
    }
}

/// Even-odd containment test for a flat `[x0, y0, x1, y1, ...]` polygon.
pub fn polygon_contains(vertices: &[f32], x: f32, y: f32) -> bool {
    let count = vertices.len() / 2;
    if count < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = count - 1;
    for i in 0..count {
        let (xi, yi) = (vertices[i * 2], vertices[i * 2 + 1]);
        let (xj, yj) = (vertices[j * 2], vertices[j * 2 + 1]);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(feature = "glam")]
mod glam_interop {
    use super::{Matrix, Point};

    impl From<Point> for glam::Vec2 {
        fn from(p: Point) -> Self {
            glam::Vec2::new(p.x, p.y)
        }
    }

    impl From<glam::Vec2> for Point {
        fn from(v: glam::Vec2) -> Self {
            Point::new(v.x, v.y)
        }
    }

    impl From<Matrix> for glam::Affine2 {
        fn from(m: Matrix) -> Self {
            glam::Affine2::from_cols_array(&[m.a, m.b, m.c, m.d, m.tx, m.ty])
        }
    }

    impl From<glam::Affine2> for Matrix {
        fn from(m: glam::Affine2) -> Self {
            let [a, b, c, d, tx, ty] = m.to_cols_array();
            Matrix::new(a, b, c, d, tx, ty)
        }
    }
}
