use crate::coords::Vec3;
use crate::device::{EngineResult, GraphicsApi};
use crate::lighting::Material;
use crate::paint::Color;

use super::Renderer;

/// Light positions and directions are taken in the modelview current at the
/// call, so every light call loads pending matrices first.
impl<A: GraphicsApi> Renderer<A> {
    pub fn lights(&mut self) -> EngineResult<()> {
        let api = self.ctx.api_mut();
        self.transforms.sync(api);
        self.lights.lights(api)
    }

    pub fn no_lights(&mut self) {
        self.lights.no_lights(self.ctx.api_mut());
    }

    pub fn ambient_light(&mut self, color: Color, position: Vec3) -> EngineResult<()> {
        let api = self.ctx.api_mut();
        self.transforms.sync(api);
        self.lights.ambient_light(api, color, position)
    }

    pub fn directional_light(&mut self, color: Color, direction: Vec3) -> EngineResult<()> {
        let api = self.ctx.api_mut();
        self.transforms.sync(api);
        self.lights.directional_light(api, color, direction)
    }

    pub fn point_light(&mut self, color: Color, position: Vec3) -> EngineResult<()> {
        let api = self.ctx.api_mut();
        self.transforms.sync(api);
        self.lights.point_light(api, color, position)
    }

    /// `angle` is the cone half-angle in radians.
    pub fn spot_light(
        &mut self,
        color: Color,
        position: Vec3,
        direction: Vec3,
        angle: f32,
        concentration: f32,
    ) -> EngineResult<()> {
        let api = self.ctx.api_mut();
        self.transforms.sync(api);
        self.lights.spot_light(api, color, position, direction, angle, concentration)
    }

    pub fn light_falloff(&mut self, constant: f32, linear: f32, quadratic: f32) {
        self.lights.light_falloff(constant, linear, quadratic);
    }

    pub fn light_specular(&mut self, color: Color) {
        self.lights.light_specular(color);
    }

    // ── material ──────────────────────────────────────────────────────────

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn ambient(&mut self, color: Color) {
        self.material.ambient = color;
    }

    pub fn specular(&mut self, color: Color) {
        self.material.specular = color;
    }

    pub fn emissive(&mut self, color: Color) {
        self.material.emissive = color;
    }

    pub fn shininess(&mut self, shininess: f32) {
        self.material.shininess = shininess;
    }
}

#[cfg(test)]
mod tests {
    use crate::coords::Vec3;
    use crate::device::{Call, EngineError, HeadlessApi, MatrixMode};
    use crate::lighting::MAX_LIGHTS;
    use crate::paint::Color;
    use crate::renderer::{Renderer, RendererInit};
    use crate::shape::{EndMode, ShapeKind};

    fn renderer() -> Renderer<HeadlessApi> {
        let mut r = Renderer::new(HeadlessApi::new(32, 32), RendererInit::new(32, 32)).unwrap();
        r.begin_draw().unwrap();
        r
    }

    #[test]
    fn default_lights_add_ambient_and_directional() {
        let mut r = renderer();
        r.lights().unwrap();
        assert!(r.api().lighting_enabled());
        assert_eq!(r.light_set().count(), 2);
        r.no_lights();
        assert!(!r.api().lighting_enabled());
        assert_eq!(r.light_set().count(), 0);
    }

    #[test]
    fn light_sees_latest_modelview() {
        let mut r = renderer();
        r.translate(5.0, 0.0, 0.0);
        r.point_light(Color::white(), Vec3::zero()).unwrap();
        let calls = r.api().calls();
        let light = calls.iter().position(|c| matches!(c, Call::Light(..))).unwrap();
        let load = calls.iter().rposition(|c| matches!(c, Call::LoadMatrix(MatrixMode::ModelView, _))).unwrap();
        assert!(load < light);
        assert_eq!(r.api().matrix(MatrixMode::ModelView), *r.modelview());
    }

    #[test]
    fn ninth_light_is_rejected() {
        let mut r = renderer();
        for _ in 0..MAX_LIGHTS {
            r.ambient_light(Color::gray(0.1), Vec3::zero()).unwrap();
        }
        let err = r.directional_light(Color::white(), Vec3::new(0.0, 0.0, -1.0));
        assert!(matches!(err, Err(EngineError::TooManyLights)));
        assert_eq!(r.light_set().count(), MAX_LIGHTS);
    }

    #[test]
    fn material_goes_out_with_draws() {
        let mut r = renderer();
        r.shininess(8.0);
        r.specular(Color::rgb(1.0, 0.0, 0.0));
        r.begin_shape(ShapeKind::Triangles);
        r.vertex(0.0, 0.0);
        r.vertex(1.0, 0.0);
        r.vertex(0.0, 1.0);
        r.end_shape(EndMode::Open);
        let sent = r.api().calls().iter().rev().find_map(|c| match c {
            Call::Material(m) => Some(*m),
            _ => None,
        });
        let sent = sent.unwrap();
        assert_eq!(sent.shininess, 8.0);
        assert_eq!(sent.specular, Color::rgb(1.0, 0.0, 0.0));
    }
}
