//! First-person camera, perspective projection and input controller.
//!
//! All matrices follow the left-handed convention: +X right, +Y up, +Z into
//! the screen, clip-space depth in `[0, 1]`. `cgmath` multiplies column
//! vectors, so a point goes through `projection * view * world`.

use cgmath::{InnerSpace, Matrix3, Matrix4, Point3, Rad, Vector3};
use instant::Duration;
use winit::{
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

const DEFAULT_FORWARD: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);
const DEFAULT_RIGHT: Vector3<f32> = Vector3::new(1.0, 0.0, 0.0);
const SAFE_FRAC_PI_2: f32 = std::f32::consts::FRAC_PI_2 - 0.0174533;

/// Left-handed look-at view matrix.
pub fn look_at_lh(eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    let z = (target - eye).normalize();
    let x = up.cross(z).normalize();
    let y = z.cross(x);
    let e = Vector3::new(eye.x, eye.y, eye.z);
    #[rustfmt::skip]
    let view = Matrix4::new(
        x.x, y.x, z.x, 0.0,
        x.y, y.y, z.y, 0.0,
        x.z, y.z, z.z, 0.0,
        -x.dot(e), -y.dot(e), -z.dot(e), 1.0,
    );
    view
}

/// Left-handed perspective projection mapping `[near, far]` to depth `[0, 1]`.
pub fn perspective_lh(fovy: Rad<f32>, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let h = 1.0 / (fovy.0 * 0.5).tan();
    let w = h / aspect;
    let q = far / (far - near);
    #[rustfmt::skip]
    let proj = Matrix4::new(
        w,   0.0, 0.0,       0.0,
        0.0, h,   0.0,       0.0,
        0.0, 0.0, q,         1.0,
        0.0, 0.0, -q * near, 0.0,
    );
    proj
}

/// Eye position plus yaw/pitch orientation.
///
/// Movement is accumulated with [`Camera::move_by`] and applied, together with
/// the current orientation, by [`Camera::update_camera`], which also rebuilds
/// the view matrix. The pending movement is cleared on every update.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Point3<f32>,
    look_at: Point3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    forward: Vector3<f32>,
    yaw: Rad<f32>,
    pitch: Rad<f32>,
    move_left_right: f32,
    move_back_forward: f32,
    view: Matrix4<f32>,
}

impl Camera {
    pub fn new(position: Point3<f32>) -> Self {
        let mut camera = Self {
            position,
            look_at: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::unit_y(),
            right: DEFAULT_RIGHT,
            forward: DEFAULT_FORWARD,
            yaw: Rad(0.0),
            pitch: Rad(0.0),
            move_left_right: 0.0,
            move_back_forward: 0.0,
            view: Matrix4::from_scale(1.0),
        };
        camera.view = look_at_lh(camera.position, camera.position + DEFAULT_FORWARD, camera.up);
        camera
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Point3::new(x, y, z);
    }

    /// Points the camera at `(x, y, z)` by deriving yaw and pitch from the
    /// direction to the target.
    pub fn set_target_position(&mut self, x: f32, y: f32, z: f32) {
        self.look_at = Point3::new(x, y, z);
        let dir = self.look_at - self.position;
        if dir.magnitude2() <= f32::EPSILON {
            return;
        }
        let dir = dir.normalize();
        self.yaw = Rad(dir.x.atan2(dir.z));
        self.pitch = Rad((-dir.y).clamp(-1.0, 1.0).asin());
    }

    pub fn set_up_vector(&mut self, x: f32, y: f32, z: f32) {
        self.up = Vector3::new(x, y, z);
    }

    /// Overrides the view matrix directly. The next [`Camera::update_camera`]
    /// rebuilds it from yaw and pitch again.
    pub fn set_view_matrix(&mut self, eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) {
        self.position = eye;
        self.look_at = target;
        self.up = up;
        self.view = look_at_lh(eye, target, up);
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn look_at(&self) -> Point3<f32> {
        self.look_at
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn yaw(&self) -> Rad<f32> {
        self.yaw
    }

    pub fn pitch(&self) -> Rad<f32> {
        self.pitch
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn set_orientation(&mut self, yaw: Rad<f32>, pitch: Rad<f32>) {
        self.yaw = yaw;
        self.pitch = pitch;
    }

    pub fn rotate(&mut self, d_yaw: Rad<f32>, d_pitch: Rad<f32>) {
        self.yaw += d_yaw;
        self.pitch += d_pitch;
    }

    /// Queues movement along the camera's right and walking-forward axes.
    pub fn move_by(&mut self, left_right: f32, back_forward: f32) {
        self.move_left_right += left_right;
        self.move_back_forward += back_forward;
    }

    /// Direction the camera looks in for the current yaw and pitch.
    pub fn look_direction(&self) -> Vector3<f32> {
        (Matrix3::from_angle_y(self.yaw) * Matrix3::from_angle_x(self.pitch) * DEFAULT_FORWARD)
            .normalize()
    }

    pub fn update_camera(&mut self) {
        self.update_camera_grounded(|_, _| None);
    }

    /// Like [`Camera::update_camera`], but when `ground(x, z)` yields a height
    /// the eye is placed at that height before the view is built.
    pub fn update_camera_grounded<F>(&mut self, ground: F)
    where
        F: Fn(f32, f32) -> Option<f32>,
    {
        let look = self.look_direction();
        let turn = Matrix3::from_angle_y(self.yaw);
        self.right = turn * DEFAULT_RIGHT;
        self.forward = turn * DEFAULT_FORWARD;

        self.position += self.right * self.move_left_right;
        self.position += self.forward * self.move_back_forward;
        self.move_left_right = 0.0;
        self.move_back_forward = 0.0;

        if let Some(height) = ground(self.position.x, self.position.z) {
            self.position.y = height;
        }

        self.look_at = self.position + look;
        self.view = look_at_lh(self.position, self.look_at, self.up);
    }
}

/// Perspective parameters, resized together with the surface.
#[derive(Debug, Clone)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        perspective_lh(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Turns keyboard and mouse input into camera movement.
///
/// WASD or the arrow keys walk, Space and Shift are ignored (the camera has no
/// vertical movement), and dragging with the right mouse button held turns.
#[derive(Debug)]
pub struct CameraController {
    amount_left: f32,
    amount_right: f32,
    amount_forward: f32,
    amount_backward: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    turning: bool,
    speed: f32,
    sensitivity: f32,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            amount_left: 0.0,
            amount_right: 0.0,
            amount_forward: 0.0,
            amount_backward: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            turning: false,
            speed,
            sensitivity,
        }
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        ..
                    },
                ..
            } => self.process_keyboard(*key, *state),
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state,
                ..
            } => {
                self.turning = state.is_pressed();
                true
            }
            _ => false,
        }
    }

    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) -> bool {
        let amount = if state.is_pressed() { 1.0 } else { 0.0 };
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => {
                self.amount_forward = amount;
                true
            }
            KeyCode::KeyS | KeyCode::ArrowDown => {
                self.amount_backward = amount;
                true
            }
            KeyCode::KeyA | KeyCode::ArrowLeft => {
                self.amount_left = amount;
                true
            }
            KeyCode::KeyD | KeyCode::ArrowRight => {
                self.amount_right = amount;
                true
            }
            _ => false,
        }
    }

    /// Raw mouse motion, only applied while the right button is held.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        if self.turning {
            self.rotate_horizontal += dx as f32;
            self.rotate_vertical += dy as f32;
        }
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();
        camera.move_by(
            (self.amount_right - self.amount_left) * self.speed * dt,
            (self.amount_forward - self.amount_backward) * self.speed * dt,
        );
        camera.rotate(
            Rad(self.rotate_horizontal * self.sensitivity * dt),
            Rad(self.rotate_vertical * self.sensitivity * dt),
        );
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        let pitch = camera.pitch().0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2);
        camera.set_orientation(camera.yaw(), Rad(pitch));
    }
}
