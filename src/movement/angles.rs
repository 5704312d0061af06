//! Yaw helpers. All angles are in degrees.

/// Wrap `yaw` into `[0, 360)`. Non-finite input maps to 0.
pub fn normalize_yaw(yaw: f32) -> f32 {
    if !yaw.is_finite() {
        return 0.0;
    }
    let wrapped = yaw.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
pub fn shortest_delta(from: f32, to: f32) -> f32 {
    let mut delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Interpolate between two yaws along the shortest arc, `t` in `[0, 1]`.
pub fn lerp_yaw(from: f32, to: f32, t: f32) -> f32 {
    normalize_yaw(from + shortest_delta(from, to) * t.clamp(0.0, 1.0))
}

/// Unit forward (+Z at yaw 0) and right (+X at yaw 0) axes on the ground plane.
pub fn planar_axes(yaw: f32) -> (super::Vec3, super::Vec3) {
    let rad = yaw.to_radians();
    let (sin, cos) = rad.sin_cos();
    let forward = super::Vec3::new(sin, 0.0, cos);
    let right = super::Vec3::new(cos, 0.0, -sin);
    (forward, right)
}
