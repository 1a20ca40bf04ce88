use crate::{Mat4, Vec3};

/// Position / rotation / scale of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in degrees, one per axis.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    #[inline]
    pub fn new(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Build matrix = T * Rx * Ry * Rz * S (column-major Mat4 per glam).
    #[inline]
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_scale(self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;

    fn approx_eq(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn default_scale_is_one() {
        assert_eq!(Transform::default().scale, Vec3::ONE);
    }

    #[test]
    fn rotation_is_in_degrees() {
        let t = Transform::new(Vec3::ZERO, vec3(0.0, 0.0, 90.0), Vec3::ONE);
        let p = t.model_matrix().transform_point3(Vec3::X);
        assert!(approx_eq(p, Vec3::Y), "got {p:?}");
    }

    #[test]
    fn scale_applies_before_rotation_and_translation() {
        let t = Transform::new(vec3(10.0, 0.0, 0.0), vec3(0.0, 90.0, 0.0), vec3(2.0, 1.0, 1.0));
        // scale: (2,0,0); rotate 90 deg about Y: (0,0,-2); translate: (10,0,-2)
        let p = t.model_matrix().transform_point3(Vec3::X);
        assert!(approx_eq(p, vec3(10.0, 0.0, -2.0)), "got {p:?}");
    }

    #[test]
    fn x_rotation_is_outermost() {
        // Rz first, then Ry, then Rx: X -> (Rz 90) Y -> (Ry 90) Y -> (Rx 90) Z
        let t = Transform::new(Vec3::ZERO, vec3(90.0, 90.0, 90.0), Vec3::ONE);
        let p = t.model_matrix().transform_point3(Vec3::X);
        assert!(approx_eq(p, Vec3::Z), "got {p:?}");
    }
}
