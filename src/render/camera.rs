use glam::DVec3;

/// 2D camera of the slice viewport: pan in physical units, zoom as a factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceCamera {
    pub pan: [f64; 2],
    pub zoom: f64,
}

impl Default for SliceCamera {
    fn default() -> Self {
        Self {
            pan: [0.0, 0.0],
            zoom: 1.0,
        }
    }
}

impl SliceCamera {
    /// Pans by a pointer delta in display pixels; `units_per_pixel` is the
    /// current physical size of one pixel.
    pub fn pan_by(&mut self, [dx, dy]: [f64; 2], units_per_pixel: f64) {
        self.pan[0] -= dx * units_per_pixel;
        self.pan[1] -= dy * units_per_pixel;
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.zoom = (self.zoom * factor).clamp(0.1, 20.0);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Orthographic camera orbiting the volume center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    /// Degrees around the world z axis.
    pub azimuth: f64,
    /// Degrees above the xy plane, kept away from the poles.
    pub elevation: f64,
    pub zoom: f64,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            azimuth: 30.0,
            elevation: 20.0,
            zoom: 1.0,
        }
    }
}

impl OrbitCamera {
    const DEGREES_PER_PIXEL: f64 = 0.5;

    pub fn orbit(&mut self, [dx, dy]: [f64; 2]) {
        self.azimuth = (self.azimuth - dx * Self::DEGREES_PER_PIXEL).rem_euclid(360.0);
        self.elevation = (self.elevation - dy * Self::DEGREES_PER_PIXEL).clamp(-89.0, 89.0);
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.zoom = (self.zoom * factor).clamp(0.1, 20.0);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Orthonormal `(right, up, forward)` vectors; `forward` points from the
    /// eye into the scene.
    pub fn basis(&self) -> (DVec3, DVec3, DVec3) {
        let (sa, ca) = self.azimuth.to_radians().sin_cos();
        let (se, ce) = self.elevation.to_radians().sin_cos();
        let forward = DVec3::new(-ce * ca, -ce * sa, -se).normalize();
        let right = DVec3::new(-sa, ca, 0.0).normalize();
        let up = right.cross(forward);
        (right, up, forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_basis_is_orthonormal() {
        let mut camera = OrbitCamera::default();
        camera.orbit([37.0, -12.0]);
        let (r, u, f) = camera.basis();
        for v in [r, u, f] {
            assert!(v.is_normalized());
        }
        assert!(r.dot(u).abs() < 1e-9);
        assert!(r.dot(f).abs() < 1e-9);
        assert!(u.dot(f).abs() < 1e-9);
        assert!(u.z > 0.0);
    }

    #[test]
    fn elevation_stays_off_the_poles() {
        let mut camera = OrbitCamera::default();
        camera.orbit([0.0, -10_000.0]);
        assert_eq!(camera.elevation, 89.0);
    }

    #[test]
    fn zoom_is_bounded_and_reset_restores_defaults() {
        let mut camera = SliceCamera::default();
        camera.zoom_by(1000.0);
        assert_eq!(camera.zoom, 20.0);
        camera.pan_by([10.0, 0.0], 0.5);
        assert_eq!(camera.pan, [-5.0, 0.0]);
        camera.reset();
        assert_eq!(camera, SliceCamera::default());
    }
}
