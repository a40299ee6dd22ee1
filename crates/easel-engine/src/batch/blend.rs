use crate::device::{
    BlendEquation, BlendFactor, BlendState, Combine, CombineFunc, CombineSource, DeviceCapabilities,
    GraphicsApi, TexEnv,
};
use crate::texture::MAX_TEXTURES;

/// Blend mode, used both for the screen blend and for combining two
/// textures on one face.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendMode {
    Replace,
    #[default]
    Blend,
    Add,
    Subtract,
    Lightest,
    Darkest,
    Difference,
    Exclusion,
    Multiply,
    Screen,
}

impl BlendMode {
    /// Device blend for the mode when used as the screen blend.
    pub fn screen_state(self) -> BlendState {
        use BlendEquation as E;
        use BlendFactor as F;
        let (equation, src, dst) = match self {
            BlendMode::Replace => (E::Add, F::One, F::Zero),
            BlendMode::Blend => (E::Add, F::SrcAlpha, F::OneMinusSrcAlpha),
            BlendMode::Add => (E::Add, F::SrcAlpha, F::One),
            BlendMode::Subtract => (E::Add, F::OneMinusDstColor, F::Zero),
            BlendMode::Lightest => (E::Max, F::SrcAlpha, F::DstAlpha),
            BlendMode::Darkest => (E::Min, F::SrcAlpha, F::DstAlpha),
            BlendMode::Difference => (E::ReverseSubtract, F::One, F::One),
            BlendMode::Exclusion => (E::Add, F::OneMinusDstColor, F::OneMinusSrcColor),
            BlendMode::Multiply => (E::Add, F::DstColor, F::SrcColor),
            BlendMode::Screen => (E::Add, F::OneMinusDstColor, F::One),
        };
        BlendState { equation, src, dst }
    }

    /// Whether the screen blend needs an equation other than add.
    pub fn needs_blend_equation(self) -> bool {
        matches!(self, BlendMode::Lightest | BlendMode::Darkest | BlendMode::Difference)
    }
}

/// Texture environments for units 0 and 1 combining two textures with
/// `mode`, or `None` when the mode has no combiner form.
///
/// Without a crossbar, unit 0 samples texture 0 and unit 1 mixes its own
/// texture into that; tint and lighting are lost. With a crossbar, unit 0
/// mixes both textures and unit 1 modulates the result with the vertex color.
pub fn combiner_plan(mode: BlendMode, crossbar: bool) -> Option<[TexEnv; 2]> {
    use CombineFunc as F;
    use CombineSource as S;

    let combine = |rgb: Combine, alpha: Combine| TexEnv::Combine { rgb, alpha };

    if !crossbar {
        let unit1 = match mode {
            BlendMode::Replace => TexEnv::Replace,
            BlendMode::Blend => {
                let c = Combine::interpolate(S::Previous, S::Texture, S::Texture);
                combine(c, c)
            }
            BlendMode::Multiply => {
                let c = Combine::new(F::Modulate, S::Previous, S::Texture);
                combine(c, c)
            }
            BlendMode::Add => {
                let c = Combine::new(F::Add, S::Previous, S::Texture);
                combine(c, c)
            }
            BlendMode::Subtract => combine(
                Combine::new(F::Subtract, S::Previous, S::Texture),
                Combine::new(F::Add, S::Previous, S::Texture),
            ),
            _ => return None,
        };
        return Some([TexEnv::Replace, unit1]);
    }

    let (t0, t1) = (S::TextureUnit(0), S::TextureUnit(1));
    let unit0 = match mode {
        BlendMode::Replace => Combine::new(F::Replace, t1, t1),
        BlendMode::Blend => Combine::interpolate(t0, t1, t1),
        BlendMode::Multiply => Combine::new(F::Modulate, t0, t1),
        BlendMode::Add => Combine::new(F::Add, t0, t1),
        BlendMode::Subtract => Combine::new(F::Subtract, t0, t1),
        _ => return None,
    };
    let unit1 = combine(
        Combine::new(F::Modulate, S::Previous, S::Primary),
        Combine::new(F::Replace, S::Previous, S::Previous),
    );
    Some([combine(unit0, unit0), unit1])
}

/// Screen and texture blend modes plus the one-time warnings about them.
#[derive(Debug, Default)]
pub struct Blending {
    screen: BlendMode,
    texture: BlendMode,
    warned_crossbar: bool,
    warned_texture_mode: bool,
}

impl Blending {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen_mode(&self) -> BlendMode {
        self.screen
    }

    pub fn texture_mode(&self) -> BlendMode {
        self.texture
    }

    /// Makes `mode` the screen blend and applies it.
    pub fn set_screen_blend<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        caps: &DeviceCapabilities,
        mode: BlendMode,
    ) {
        self.screen = mode;
        apply(api, caps, mode);
    }

    /// Mode used to mix two textures on one face.
    pub fn set_texture_blend(&mut self, mode: BlendMode) {
        self.texture = mode;
    }

    /// Configures the combiner for a face with `count` textures. Returns
    /// `true` when a combiner was set up and [`Blending::cleanup_combiner`]
    /// must follow the draw.
    pub fn setup_combiner<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        caps: &DeviceCapabilities,
        count: usize,
    ) -> bool {
        if count > MAX_TEXTURES {
            log::warn!("multitexture blending supports at most {MAX_TEXTURES} textures, got {count}");
            return false;
        }
        if count < 2 {
            return false;
        }

        if !caps.texenv_crossbar && !self.warned_crossbar {
            log::warn!("no texture environment crossbar: combined textures ignore tint and lights");
            self.warned_crossbar = true;
        }

        let envs = combiner_plan(self.texture, caps.texenv_crossbar).unwrap_or_else(|| {
            if !self.warned_texture_mode {
                log::warn!("blend mode {:?} is unsupported for multitexturing", self.texture);
                self.warned_texture_mode = true;
            }
            [TexEnv::Replace, TexEnv::Replace]
        });
        for (unit, env) in envs.into_iter().enumerate() {
            api.tex_env(unit, env);
        }

        apply(api, caps, BlendMode::Replace);
        true
    }

    /// Restores modulation on every unit and the screen blend.
    pub fn cleanup_combiner<A: GraphicsApi + ?Sized>(
        &self,
        api: &mut A,
        caps: &DeviceCapabilities,
        count: usize,
    ) {
        for unit in 0..count.min(MAX_TEXTURES) {
            api.tex_env(unit, TexEnv::Modulate);
        }
        apply(api, caps, self.screen);
    }
}

fn apply<A: GraphicsApi + ?Sized>(api: &mut A, caps: &DeviceCapabilities, mode: BlendMode) {
    if mode.needs_blend_equation() && !caps.blend_equation {
        log::warn!("blend mode {mode:?} needs blend equations, which this device lacks");
        return;
    }
    api.set_blend(mode.screen_state());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Call, HeadlessApi};

    fn blends(api: &HeadlessApi) -> Vec<BlendState> {
        api.calls()
            .iter()
            .filter_map(|c| match c {
                Call::Blend(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    // ── screen blend ──────────────────────────────────────────────────────

    #[test]
    fn blend_mode_is_straight_alpha_over() {
        assert_eq!(BlendMode::Blend.screen_state(), BlendState::ALPHA);
        assert_eq!(BlendMode::Replace.screen_state(), BlendState::REPLACE);
    }

    #[test]
    fn equation_modes_are_skipped_without_capability() {
        let mut api = HeadlessApi::new(4, 4);
        let caps = DeviceCapabilities::minimal();
        let mut b = Blending::new();
        b.set_screen_blend(&mut api, &caps, BlendMode::Lightest);
        assert!(blends(&api).is_empty());
        assert_eq!(b.screen_mode(), BlendMode::Lightest);

        b.set_screen_blend(&mut api, &caps, BlendMode::Screen);
        let applied = blends(&api);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].src, BlendFactor::OneMinusDstColor);
        assert_eq!(applied[0].dst, BlendFactor::One);
    }

    #[test]
    fn difference_uses_reverse_subtract() {
        let mut api = HeadlessApi::new(4, 4);
        let mut b = Blending::new();
        b.set_screen_blend(&mut api, &DeviceCapabilities::full(), BlendMode::Difference);
        assert_eq!(api.blend().equation, BlendEquation::ReverseSubtract);
    }

    // ── combiner ──────────────────────────────────────────────────────────

    #[test]
    fn crossbar_plan_modulates_with_primary_on_unit_one() {
        let [u0, u1] = combiner_plan(BlendMode::Multiply, true).unwrap();
        let TexEnv::Combine { rgb, .. } = u0 else { panic!("unit 0 should combine") };
        assert_eq!(rgb.func, CombineFunc::Modulate);
        assert_eq!(rgb.args[..2], [CombineSource::TextureUnit(0), CombineSource::TextureUnit(1)]);
        let TexEnv::Combine { rgb, alpha } = u1 else { panic!("unit 1 should combine") };
        assert_eq!(rgb.args[1], CombineSource::Primary);
        assert_eq!(alpha.func, CombineFunc::Replace);
    }

    #[test]
    fn plain_subtract_keeps_alpha_additive() {
        let [u0, u1] = combiner_plan(BlendMode::Subtract, false).unwrap();
        assert_eq!(u0, TexEnv::Replace);
        let TexEnv::Combine { rgb, alpha } = u1 else { panic!("unit 1 should combine") };
        assert_eq!(rgb.func, CombineFunc::Subtract);
        assert_eq!(alpha.func, CombineFunc::Add);
    }

    #[test]
    fn screen_only_modes_have_no_combiner() {
        assert!(combiner_plan(BlendMode::Screen, true).is_none());
        assert!(combiner_plan(BlendMode::Darkest, false).is_none());
    }

    #[test]
    fn setup_switches_to_replace_and_cleanup_restores() {
        let mut api = HeadlessApi::new(4, 4);
        let caps = DeviceCapabilities::full();
        let mut b = Blending::new();
        b.set_screen_blend(&mut api, &caps, BlendMode::Add);
        b.set_texture_blend(BlendMode::Blend);

        assert!(b.setup_combiner(&mut api, &caps, 2));
        assert_eq!(api.blend(), BlendState::REPLACE);
        assert!(matches!(api.current_tex_env(0), Some(TexEnv::Combine { .. })));

        b.cleanup_combiner(&mut api, &caps, 2);
        assert_eq!(api.blend(), BlendMode::Add.screen_state());
        assert_eq!(api.current_tex_env(0), Some(TexEnv::Modulate));
        assert_eq!(api.current_tex_env(1), Some(TexEnv::Modulate));
    }

    #[test]
    fn single_texture_or_too_many_needs_no_combiner() {
        let mut api = HeadlessApi::new(4, 4);
        let caps = DeviceCapabilities::full();
        let mut b = Blending::new();
        assert!(!b.setup_combiner(&mut api, &caps, 1));
        assert!(!b.setup_combiner(&mut api, &caps, 3));
        assert!(api.calls().is_empty());
    }
}
