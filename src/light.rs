//! The scene's single point light.

use cgmath::Vector3;

/// A point light with distance attenuation.
///
/// `attenuation` holds the constant, linear and quadratic factors, evaluated
/// as `1 / (c + l·d + q·d²)`. Fragments further than `range` from the light
/// only receive the ambient term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub position: Vector3<f32>,
    pub range: f32,
    pub attenuation: Vector3<f32>,
}

impl Light {
    pub fn new(position: Vector3<f32>, range: f32) -> Self {
        Self {
            position,
            range,
            ..Default::default()
        }
    }

    pub fn set_ambient_colour(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.ambient = [r, g, b, a];
    }

    pub fn set_diffuse_colour(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.diffuse = [r, g, b, a];
    }

    pub fn set_specular_colour(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.specular = [r, g, b, a];
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vector3::new(x, y, z);
    }

    pub fn set_attenuation(&mut self, constant: f32, linear: f32, quadratic: f32) {
        self.attenuation = Vector3::new(constant, linear, quadratic);
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = range;
    }

    /// Attenuation factor at distance `d`, or `0.0` beyond the range.
    pub fn falloff(&self, d: f32) -> f32 {
        if d > self.range {
            return 0.0;
        }
        let a = self.attenuation;
        let denom = a.x + a.y * d + a.z * d * d;
        if denom <= f32::EPSILON { 1.0 } else { 1.0 / denom }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self {
            ambient: [1.0, 1.0, 1.0, 1.0],
            diffuse: [1.0, 1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            position: Vector3::new(-5.0, 30.0, 30.0),
            range: 2000.0,
            attenuation: Vector3::new(1.0, 0.02, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falloff_follows_attenuation_and_range() {
        let light = Light::default();
        assert_eq!(light.falloff(0.0), 1.0);
        assert!((light.falloff(50.0) - 0.5).abs() < 1e-6);
        assert_eq!(light.falloff(2000.5), 0.0);
    }
}
