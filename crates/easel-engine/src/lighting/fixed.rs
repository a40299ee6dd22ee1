//! Host-side evaluation of the fixed-function lighting equation.
//!
//! Backends without a native lighting stage accumulate [`LightCommand`]s into
//! a [`LightingState`] and shade each vertex in eye space:
//!
//! ```text
//! color = emissive
//!       + sum_i atten_i * spot_i * ( ambient_i * material.ambient
//!                                  + max(N.L, 0) * diffuse_i * vertex_color
//!                                  + max(N.H, 0)^shininess * specular_i * material.specular )
//! ```
//!
//! with `H = normalize(L + (0, 0, 1))` and the specular term only where
//! `N.L > 0`. Alpha is the vertex alpha.

use crate::coords::{Mat4, Vec3};
use crate::device::LightCommand;

use super::{MAX_LIGHTS, Material};

/// Device-side state of one light, positions already in eye space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FixedLight {
    pub enabled: bool,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub position: [f32; 4],
    pub spot_direction: Vec3,
    pub attenuation: [f32; 3],
    pub spot_cutoff: f32,
    pub spot_exponent: f32,
}

impl Default for FixedLight {
    fn default() -> Self {
        Self {
            enabled: false,
            ambient: [0.0, 0.0, 0.0, 1.0],
            diffuse: [0.0, 0.0, 0.0, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            position: [0.0, 0.0, 1.0, 0.0],
            spot_direction: Vec3::new(0.0, 0.0, -1.0),
            attenuation: [1.0, 0.0, 0.0],
            spot_cutoff: 180.0,
            spot_exponent: 0.0,
        }
    }
}

impl FixedLight {
    /// Applies one update. Positions and spot axes go through `modelview`.
    pub fn apply(&mut self, cmd: LightCommand, modelview: &Mat4) {
        match cmd {
            LightCommand::Enable => self.enabled = true,
            LightCommand::Disable => self.enabled = false,
            LightCommand::Ambient(c) => self.ambient = c,
            LightCommand::Diffuse(c) => self.diffuse = c,
            LightCommand::Specular(c) => self.specular = c,
            LightCommand::Position(p) => self.position = modelview.transform4(p),
            LightCommand::SpotDirection(d) => {
                self.spot_direction = modelview.transform_vector(Vec3::from(d));
            }
            LightCommand::Attenuation { constant, linear, quadratic } => {
                self.attenuation = [constant, linear, quadratic];
            }
            LightCommand::SpotCutoff(deg) => self.spot_cutoff = deg,
            LightCommand::SpotExponent(e) => self.spot_exponent = e,
        }
    }

    fn contribution(&self, pos: Vec3, normal: Vec3, color: [f32; 4], mat: &Material) -> [f32; 3] {
        let [px, py, pz, pw] = self.position;
        let (l, atten) = if pw == 0.0 {
            (Vec3::new(px, py, pz).normalized(), 1.0)
        } else {
            let to_light = Vec3::new(px / pw, py / pw, pz / pw) - pos;
            let d = to_light.length();
            let [c, lin, q] = self.attenuation;
            let denom = c + lin * d + q * d * d;
            let atten = if denom > 0.0 { 1.0 / denom } else { 1.0 };
            (to_light.normalized(), atten)
        };

        let spot = if self.spot_cutoff >= 180.0 {
            1.0
        } else {
            let cos = (-l).dot(self.spot_direction.normalized());
            if cos < self.spot_cutoff.to_radians().cos() {
                0.0
            } else {
                cos.max(0.0).powf(self.spot_exponent)
            }
        };

        let factor = atten * spot;
        if factor == 0.0 {
            return [0.0; 3];
        }

        let n_dot_l = normal.dot(l);
        let diffuse = n_dot_l.max(0.0);
        let specular = if n_dot_l > 0.0 {
            let h = (l + Vec3::new(0.0, 0.0, 1.0)).normalized();
            normal.dot(h).max(0.0).powf(mat.shininess)
        } else {
            0.0
        };

        let amb = mat.ambient.to_array();
        let spec = mat.specular.to_array();
        let mut out = [0.0; 3];
        for (k, o) in out.iter_mut().enumerate() {
            *o = factor
                * (self.ambient[k] * amb[k]
                    + diffuse * self.diffuse[k] * color[k]
                    + specular * self.specular[k] * spec[k]);
        }
        out
    }
}

/// Everything the lighting stage needs to shade a vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingState {
    pub enabled: bool,
    pub lights: [FixedLight; MAX_LIGHTS],
    pub material: Material,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            enabled: false,
            lights: [FixedLight::default(); MAX_LIGHTS],
            material: Material::default(),
        }
    }
}

impl LightingState {
    pub fn apply(&mut self, index: usize, cmd: LightCommand, modelview: &Mat4) {
        match self.lights.get_mut(index) {
            Some(light) => light.apply(cmd, modelview),
            None => log::warn!("light index {index} out of range; ignored"),
        }
    }

    /// Shades one vertex. `pos` and `normal` are in eye space; `normal` need
    /// not be unit length. Returns the color unchanged when lighting is off.
    pub fn shade(&self, pos: Vec3, normal: Vec3, color: [f32; 4]) -> [f32; 4] {
        if !self.enabled {
            return color;
        }
        let n = normal.normalized();
        let mut rgb = {
            let e = self.material.emissive;
            [e.r, e.g, e.b]
        };
        for light in self.lights.iter().filter(|l| l.enabled) {
            let c = light.contribution(pos, n, color, &self.material);
            for k in 0..3 {
                rgb[k] += c[k];
            }
        }
        [
            rgb[0].clamp(0.0, 1.0),
            rgb[1].clamp(0.0, 1.0),
            rgb[2].clamp(0.0, 1.0),
            color[3],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;

    fn lit() -> LightingState {
        LightingState {
            enabled: true,
            material: Material { ambient: Color::black(), ..Material::default() },
            ..LightingState::default()
        }
    }

    fn approx(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn disabled_lighting_passes_color_through() {
        let state = LightingState::default();
        let c = [0.2, 0.4, 0.6, 0.5];
        assert_eq!(state.shade(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), c), c);
    }

    #[test]
    fn directional_light_facing_the_normal_gives_full_diffuse() {
        let mut state = lit();
        let mv = Mat4::IDENTITY;
        state.apply(0, LightCommand::Enable, &mv);
        state.apply(0, LightCommand::Diffuse([1.0, 1.0, 1.0, 1.0]), &mv);
        state.apply(0, LightCommand::Position([0.0, 0.0, 1.0, 0.0]), &mv);

        let out = state.shade(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), [0.5, 0.25, 1.0, 0.8]);
        assert!(approx(out, [0.5, 0.25, 1.0, 0.8]), "{out:?}");
    }

    #[test]
    fn back_facing_normal_gets_no_diffuse() {
        let mut state = lit();
        let mv = Mat4::IDENTITY;
        state.apply(0, LightCommand::Enable, &mv);
        state.apply(0, LightCommand::Diffuse([1.0; 4]), &mv);
        state.apply(0, LightCommand::Position([0.0, 0.0, 1.0, 0.0]), &mv);

        let out = state.shade(Vec3::zero(), Vec3::new(0.0, 0.0, -1.0), [1.0; 4]);
        assert!(approx(out, [0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn ambient_term_uses_material_ambient() {
        let mut state = lit();
        state.material.ambient = Color::gray(0.5);
        let mv = Mat4::IDENTITY;
        state.apply(0, LightCommand::Enable, &mv);
        state.apply(0, LightCommand::Ambient([0.5, 0.5, 0.5, 1.0]), &mv);

        let out = state.shade(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), [1.0; 4]);
        assert!(approx(out, [0.25, 0.25, 0.25, 1.0]));
    }

    #[test]
    fn point_light_attenuates_with_distance() {
        let mut state = lit();
        let mv = Mat4::IDENTITY;
        state.apply(0, LightCommand::Enable, &mv);
        state.apply(0, LightCommand::Diffuse([1.0; 4]), &mv);
        state.apply(0, LightCommand::Position([0.0, 0.0, 2.0, 1.0]), &mv);
        state.apply(
            0,
            LightCommand::Attenuation { constant: 0.0, linear: 1.0, quadratic: 0.0 },
            &mv,
        );

        let out = state.shade(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), [1.0; 4]);
        assert!(approx(out, [0.5, 0.5, 0.5, 1.0]), "{out:?}");
    }

    #[test]
    fn light_position_follows_modelview_at_call_time() {
        let mut state = lit();
        state.apply(0, LightCommand::Position([1.0, 0.0, 0.0, 1.0]), &Mat4::translation(0.0, 5.0, 0.0));
        assert_eq!(state.lights[0].position, [1.0, 5.0, 0.0, 1.0]);
    }

    #[test]
    fn spot_cone_excludes_points_outside() {
        let mut state = lit();
        let mv = Mat4::IDENTITY;
        state.apply(0, LightCommand::Enable, &mv);
        state.apply(0, LightCommand::Diffuse([1.0; 4]), &mv);
        state.apply(0, LightCommand::Position([0.0, 0.0, 1.0, 1.0]), &mv);
        state.apply(0, LightCommand::SpotDirection([0.0, 0.0, -1.0]), &mv);
        state.apply(0, LightCommand::SpotCutoff(10.0), &mv);

        let inside = state.shade(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), [1.0; 4]);
        let outside = state.shade(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0), [1.0; 4]);
        assert!(inside[0] > 0.9);
        assert_eq!(outside[0], 0.0);
    }
}
