use crate::coords::Vec3;
use crate::device::{EngineError, EngineResult, GraphicsApi, LightCommand};
use crate::paint::Color;

use super::MAX_LIGHTS;

const ZERO_LIGHT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Spot,
}

/// Distance attenuation `1 / (constant + linear * d + quadratic * d^2)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Falloff {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Falloff {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.0, quadratic: 0.0 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    /// Homogeneous position, `w = 1`. Unused by directional lights.
    pub position: [f32; 4],
    /// Unit direction for directional and spot lights.
    pub direction: Vec3,
    pub diffuse: Color,
    pub specular: Color,
    pub falloff: Falloff,
    /// Cone half-angle in degrees.
    pub spot_angle: f32,
    /// Cosine of the cone half-angle, never negative.
    pub spot_cos: f32,
    pub concentration: f32,
}

impl Light {
    fn new(kind: LightKind, diffuse: Color, falloff: Falloff, specular: Color) -> Self {
        Self {
            kind,
            position: [0.0, 0.0, 0.0, 1.0],
            direction: Vec3::zero(),
            diffuse: diffuse.with_alpha(1.0),
            specular: specular.with_alpha(1.0),
            falloff,
            spot_angle: 180.0,
            spot_cos: 0.0,
            concentration: 0.0,
        }
    }

    /// Device updates for this light, in emission order:
    /// enable, ambient, position/direction, falloff, diffuse and specular,
    /// spot cone.
    pub fn commands(&self) -> Vec<LightCommand> {
        let mut out = Vec::with_capacity(9);
        out.push(LightCommand::Enable);

        out.push(match self.kind {
            LightKind::Ambient => LightCommand::Ambient(self.diffuse.to_array()),
            _ => LightCommand::Ambient(ZERO_LIGHT),
        });

        let dir = self.direction;
        match self.kind {
            LightKind::Ambient | LightKind::Point => {
                out.push(LightCommand::Position(self.position));
            }
            LightKind::Directional => {
                out.push(LightCommand::Position([dir.x, dir.y, dir.z, 0.0]));
            }
            LightKind::Spot => {
                out.push(LightCommand::Position(self.position));
                out.push(LightCommand::SpotDirection(dir.to_array()));
            }
        }

        let f = self.falloff;
        out.push(LightCommand::Attenuation {
            constant: f.constant,
            linear: f.linear,
            quadratic: f.quadratic,
        });

        if self.kind == LightKind::Ambient {
            out.push(LightCommand::Diffuse(ZERO_LIGHT));
            out.push(LightCommand::Specular(ZERO_LIGHT));
        } else {
            out.push(LightCommand::Diffuse(self.diffuse.to_array()));
            out.push(LightCommand::Specular(self.specular.to_array()));
        }

        if self.kind == LightKind::Spot {
            out.push(LightCommand::SpotCutoff(self.spot_angle));
            out.push(LightCommand::SpotExponent(self.concentration));
        } else {
            out.push(LightCommand::SpotCutoff(180.0));
            out.push(LightCommand::SpotExponent(0.0));
        }
        out
    }
}

/// Active lights plus the sticky falloff and specular used for the next one.
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    enabled: bool,
    lights: Vec<Light>,
    falloff: Falloff,
    specular: Color,
}

impl LightSet {
    pub fn new() -> Self {
        Self {
            enabled: false,
            lights: Vec::with_capacity(MAX_LIGHTS),
            falloff: Falloff::default(),
            specular: Color::black(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn count(&self) -> usize {
        self.lights.len()
    }

    pub fn get(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    /// Default scene lighting: half-grey ambient plus a half-grey light
    /// shining down the view axis.
    pub fn lights<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) -> EngineResult<()> {
        self.enable(api);
        self.light_falloff(1.0, 0.0, 0.0);
        self.light_specular(Color::black());
        self.ambient_light(api, Color::gray(0.5), Vec3::zero())?;
        self.directional_light(api, Color::gray(0.5), Vec3::new(0.0, 0.0, -1.0))
    }

    pub fn no_lights<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) {
        self.enabled = false;
        api.set_lighting(false);
        self.lights.clear();
    }

    pub fn light_falloff(&mut self, constant: f32, linear: f32, quadratic: f32) {
        self.falloff = Falloff { constant, linear, quadratic };
    }

    pub fn light_specular(&mut self, color: Color) {
        self.specular = color;
    }

    pub fn ambient_light<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        color: Color,
        position: Vec3,
    ) -> EngineResult<()> {
        let mut light = Light::new(LightKind::Ambient, color, self.falloff, Color::black());
        light.position = [position.x, position.y, position.z, 1.0];
        self.add(api, light)
    }

    /// `direction` is normalized; a zero vector stays zero.
    pub fn directional_light<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        color: Color,
        direction: Vec3,
    ) -> EngineResult<()> {
        let mut light = Light::new(LightKind::Directional, color, self.falloff, self.specular);
        light.direction = direction.normalized();
        self.add(api, light)
    }

    pub fn point_light<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        color: Color,
        position: Vec3,
    ) -> EngineResult<()> {
        let mut light = Light::new(LightKind::Point, color, self.falloff, self.specular);
        light.position = [position.x, position.y, position.z, 1.0];
        self.add(api, light)
    }

    /// `angle` is the cone half-angle in radians.
    pub fn spot_light<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        color: Color,
        position: Vec3,
        direction: Vec3,
        angle: f32,
        concentration: f32,
    ) -> EngineResult<()> {
        let mut light = Light::new(LightKind::Spot, color, self.falloff, self.specular);
        light.position = [position.x, position.y, position.z, 1.0];
        light.direction = direction.normalized();
        light.spot_angle = angle.to_degrees();
        light.spot_cos = angle.cos().max(0.0);
        light.concentration = concentration;
        self.add(api, light)
    }

    fn enable<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) {
        self.enabled = true;
        api.set_lighting(true);
    }

    fn add<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, light: Light) -> EngineResult<()> {
        if !self.enabled {
            self.enable(api);
        }
        if self.lights.len() == MAX_LIGHTS {
            return Err(EngineError::TooManyLights);
        }
        let index = self.lights.len();
        for cmd in light.commands() {
            api.light(index, cmd);
        }
        self.lights.push(light);
        Ok(())
    }
}
