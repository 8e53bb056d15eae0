//! Scene energy and dialogue density gain for music and background beds.

use mixdown_spec::{seconds_to_frames, ClipRules, DensityLabel};

use crate::buffer::db_to_gain;

/// Gain at energy 0 (dB).
const ENERGY_FLOOR_DB: f64 = -8.0;

/// Gain in dB for a scene energy value.
pub fn energy_gain_db(energy: f64) -> f64 {
    ENERGY_FLOOR_DB * (1.0 - energy.clamp(0.0, 1.0))
}

/// Gain in dB for a dialogue density label.
pub fn density_gain_db(label: DensityLabel) -> f64 {
    match label {
        DensityLabel::High => -6.0,
        DensityLabel::Medium => -3.0,
        DensityLabel::Low => 0.0,
    }
}

/// Energy gain over the start of a clip's source buffer.
///
/// The gain moves linearly in dB from `from_db` to `to_db` over `frames`
/// source frames and stays at `to_db` afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRamp {
    pub from_db: f64,
    pub to_db: f64,
    pub frames: usize,
}

impl EnergyRamp {
    /// Resolves the ramp of a scene clip. Clips outside scenes have none.
    pub fn from_rules(rules: &ClipRules, sample_rate: u32) -> Option<Self> {
        let to_db = energy_gain_db(rules.scene_energy?);
        match rules.prev_scene_energy {
            Some(prev) => Some(Self {
                from_db: energy_gain_db(prev),
                to_db,
                frames: seconds_to_frames(rules.energy_ramp_duration, sample_rate),
            }),
            None => Some(Self::flat(to_db)),
        }
    }

    /// A constant gain.
    pub fn flat(db: f64) -> Self {
        Self {
            from_db: db,
            to_db: db,
            frames: 0,
        }
    }

    /// Gain in dB at a source frame.
    pub fn gain_db_at(&self, source_frame: usize) -> f64 {
        if source_frame >= self.frames {
            return self.to_db;
        }
        let p = source_frame as f64 / self.frames as f64;
        self.from_db + (self.to_db - self.from_db) * p
    }

    /// Linear gain at a source frame.
    #[inline]
    pub fn gain_at(&self, source_frame: usize) -> f64 {
        db_to_gain(self.gain_db_at(source_frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdown_spec::rules::ENERGY_RAMP_DURATION;

    #[test]
    fn test_energy_mapping() {
        assert_eq!(energy_gain_db(1.0), 0.0);
        assert_eq!(energy_gain_db(0.0), -8.0);
        assert_eq!(energy_gain_db(0.5), -4.0);
        assert_eq!(energy_gain_db(3.0), 0.0);
    }

    #[test]
    fn test_density_levels() {
        assert_eq!(density_gain_db(DensityLabel::High), -6.0);
        assert_eq!(density_gain_db(DensityLabel::Medium), -3.0);
        assert_eq!(density_gain_db(DensityLabel::Low), 0.0);
    }

    #[test]
    fn test_ramp_between_scenes() {
        let rules = ClipRules {
            scene_energy: Some(1.0),
            prev_scene_energy: Some(0.0),
            energy_ramp_duration: ENERGY_RAMP_DURATION,
            ..Default::default()
        };
        let ramp = EnergyRamp::from_rules(&rules, 1000).unwrap();
        assert_eq!(ramp.frames, 3000);
        assert_eq!(ramp.gain_db_at(0), -8.0);
        assert_eq!(ramp.gain_db_at(1500), -4.0);
        assert_eq!(ramp.gain_db_at(3000), 0.0);
        assert_eq!(ramp.gain_db_at(10_000), 0.0);
    }

    #[test]
    fn test_first_scene_is_flat() {
        let rules = ClipRules {
            scene_energy: Some(0.25),
            ..Default::default()
        };
        let ramp = EnergyRamp::from_rules(&rules, 44100).unwrap();
        assert_eq!(ramp, EnergyRamp::flat(-6.0));
        assert_eq!(EnergyRamp::from_rules(&ClipRules::default(), 44100), None);
    }
}
