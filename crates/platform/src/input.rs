//! Keyboard and mouse state, fed from window events and read once per frame.

use std::collections::HashSet;

use corelib::camera::{Camera, CameraMovement};
use winit::keyboard::KeyCode;

/// Keys held down now, plus keys released since the last [`InputState::update`].
#[derive(Debug, Default)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
    just_released: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.pressed.insert(key);
        } else {
            self.pressed.remove(&key);
            self.just_released.insert(key);
        }
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// True when every key in `keys` is held.
    pub fn are_keys_pressed(&self, keys: &[KeyCode]) -> bool {
        keys.iter().all(|k| self.pressed.contains(k))
    }

    pub fn is_one_of_keys_pressed(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|k| self.pressed.contains(k))
    }

    /// Released during the current frame.
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.just_released.contains(&key)
    }

    /// End of frame: forget releases.
    pub fn update(&mut self) {
        self.just_released.clear();
    }
}

/// Turns absolute cursor positions into per-event offsets. The first event
/// only records the position.
#[derive(Debug, Default)]
pub struct MouseTracker {
    last: Option<(f64, f64)>,
}

impl MouseTracker {
    /// Offsets since the previous position; y grows upwards.
    pub fn moved_to(&mut self, x: f64, y: f64) -> Option<(f32, f32)> {
        let offset = self
            .last
            .map(|(last_x, last_y)| ((x - last_x) as f32, (last_y - y) as f32));
        self.last = Some((x, y));
        offset
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// WASD fly controls.
pub fn apply_camera_keys(input: &InputState, camera: &mut Camera, dt: f32) {
    const BINDINGS: [(KeyCode, CameraMovement); 4] = [
        (KeyCode::KeyW, CameraMovement::Forward),
        (KeyCode::KeyS, CameraMovement::Backward),
        (KeyCode::KeyA, CameraMovement::Left),
        (KeyCode::KeyD, CameraMovement::Right),
    ];
    for (key, movement) in BINDINGS {
        if input.is_key_pressed(key) {
            camera.process_keyboard(movement, dt);
        }
    }
}
