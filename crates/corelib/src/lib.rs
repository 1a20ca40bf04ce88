//! Core types: math re-exports, Transform, Camera, entity registry, GPU handle keys.

pub use glam::{Mat4, Vec2, Vec3, vec3};

pub mod camera;
pub mod config;
pub mod ecs;
pub mod handles;
pub mod transform;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let t = transform::Transform::identity();
        assert_eq!(t.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn translate_then_scale_matrix() {
        let t = transform::Transform::new(
            vec3(1.0, 2.0, 3.0),
            vec3(0.0, 0.0, 0.0),
            vec3(2.0, 2.0, 2.0),
        );
        // Last column is the translation, the diagonal is the scale when
        // there is no rotation.
        let m = t.model_matrix().to_cols_array();
        assert!((m[12] - 1.0).abs() < 1e-6);
        assert!((m[13] - 2.0).abs() < 1e-6);
        assert!((m[14] - 3.0).abs() < 1e-6);
        assert!((m[0] - 2.0).abs() < 1e-6);
        assert!((m[5] - 2.0).abs() < 1e-6);
        assert!((m[10] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn camera_projection_view_is_finite() {
        let cam = camera::Camera::new(vec3(0.0, 0.0, 3.0));
        let config = config::EngineConfig::default();
        let pv = cam.projection_matrix(config.aspect_ratio(), config.z_near, config.z_far)
            * cam.view_matrix();
        assert!(pv.to_cols_array().iter().all(|f| f.is_finite()));
    }
}
