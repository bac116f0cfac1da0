//! Simulation tuning, loaded from RON.
//!
//! Every value has a default so a config file only needs to list what it
//! changes. [`SimConfig::validate`] rejects authoring mistakes up front;
//! [`SimConfig::from_ron_str`] calls it for you.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     tick_ms: 50,
//!     avoidance_radius: 0.6,
//!     wave: WaveConfig(
//!         stretch: 2.0,
//!         cycles_per_wave: 5,
//!     ),
//!     enemies: EnemyRoster(
//!         grunt: EnemyProfile(max_health: 30, speed: 1.5, max_speed: 2.0,
//!                             damage: 4, range: 1.2, attack_interval_ms: 800,
//!                             preference: Headquarters),
//!     ),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::components::{EnemyKind, TargetPreference};
use crate::error::{GameError, Result};
use crate::math::{fixed_decimal_serde, Fixed};

/// Top-level simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated milliseconds per tick.
    pub tick_ms: u64,
    /// Tile size in world units.
    #[serde(with = "fixed_decimal_serde")]
    pub cell_size: Fixed,
    /// Radius inside which moving units push each other apart.
    #[serde(with = "fixed_decimal_serde")]
    pub avoidance_radius: Fixed,
    /// Scale applied to the avoidance push.
    #[serde(with = "fixed_decimal_serde")]
    pub avoidance_strength: Fixed,
    /// Distance to a waypoint's center at which it counts as reached.
    #[serde(with = "fixed_decimal_serde")]
    pub waypoint_stop_distance: Fixed,
    /// Speeds and displacements shorter than this count as "not moving".
    #[serde(with = "fixed_decimal_serde")]
    pub motion_epsilon: Fixed,
    /// How long a dead unit lingers before it is removed.
    pub death_grace_ms: u64,
    /// Seed for spawn-tile selection.
    pub seed: u64,
    /// Wave escalation.
    pub wave: WaveConfig,
    /// Stats of every enemy archetype.
    pub enemies: EnemyRoster,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            cell_size: Fixed::ONE,
            avoidance_radius: Fixed::from_num(0.6),
            avoidance_strength: Fixed::from_num(2),
            waypoint_stop_distance: Fixed::from_num(0.1),
            motion_epsilon: Fixed::from_num(0.01),
            death_grace_ms: 1_500,
            seed: 0x7D_5EED,
            wave: WaveConfig::default(),
            enemies: EnemyRoster::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a RON config.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ConfigParse`] for malformed RON and
    /// [`GameError::InvalidConfig`] / [`GameError::InvalidMaxHealth`] /
    /// [`GameError::NonPositiveRange`] for out-of-domain values.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(source).map_err(|e| GameError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value for authoring mistakes.
    ///
    /// # Errors
    ///
    /// Returns the first defect found.
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(GameError::InvalidConfig("tick_ms must be positive".into()));
        }
        positive("cell_size", self.cell_size)?;
        positive("avoidance_radius", self.avoidance_radius)?;
        non_negative("avoidance_strength", self.avoidance_strength)?;
        positive("waypoint_stop_distance", self.waypoint_stop_distance)?;
        positive("motion_epsilon", self.motion_epsilon)?;
        self.wave.validate()?;
        for kind in EnemyKind::ALL {
            self.enemies.profile(kind).validate(kind)?;
        }
        Ok(())
    }
}

fn positive(name: &str, value: Fixed) -> Result<()> {
    if value <= Fixed::ZERO {
        return Err(GameError::InvalidConfig(format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

fn non_negative(name: &str, value: Fixed) -> Result<()> {
    if value < Fixed::ZERO {
        return Err(GameError::InvalidConfig(format!("{name} must not be negative, got {value}")));
    }
    Ok(())
}

/// Constants of the wave-size formula
/// `stretch · base^(round · flat_out) + amplitude · sin(round + phase_offset) + starting_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Multiplier on the exponential term.
    pub stretch: f64,
    /// Base of the exponential term.
    pub base: f64,
    /// Dampens how fast the exponential grows per round.
    pub flat_out: f64,
    /// Height of the sine wobble.
    pub amplitude: f64,
    /// Shift of the sine wobble, in radians.
    pub phase_offset: f64,
    /// Constant floor of every wave.
    pub starting_amount: f64,
    /// Completed build/collect cycles between enemy turns.
    pub cycles_per_wave: u32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            stretch: 2.0,
            base: 1.5,
            flat_out: 0.35,
            amplitude: 1.0,
            phase_offset: 0.0,
            starting_amount: 3.0,
            cycles_per_wave: 5,
        }
    }
}

impl WaveConfig {
    /// Reject constants that could produce an empty or negative wave.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] naming the offending constant.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.stretch,
            self.base,
            self.flat_out,
            self.amplitude,
            self.phase_offset,
            self.starting_amount,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(GameError::InvalidConfig("wave constants must be finite".into()));
        }
        if self.stretch < 0.0 || self.base <= 0.0 || self.amplitude < 0.0 {
            return Err(GameError::InvalidConfig(
                "wave stretch and amplitude must be non-negative and base positive".into(),
            ));
        }
        // The sine term bottoms out at -amplitude; anything at or below 1 could
        // floor to an empty wave.
        if self.starting_amount - self.amplitude < 1.0 {
            return Err(GameError::InvalidConfig(format!(
                "starting_amount ({}) must exceed amplitude ({}) by at least 1",
                self.starting_amount, self.amplitude
            )));
        }
        if self.cycles_per_wave == 0 {
            return Err(GameError::InvalidConfig("cycles_per_wave must be positive".into()));
        }
        Ok(())
    }
}

/// Stats of a single enemy archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyProfile {
    /// Starting and maximum health.
    pub max_health: u32,
    /// Cruise speed in units per second.
    #[serde(with = "fixed_decimal_serde")]
    pub speed: Fixed,
    /// Speed cap after steering.
    #[serde(with = "fixed_decimal_serde")]
    pub max_speed: Fixed,
    /// Damage per hit.
    pub damage: u32,
    /// Attack reach in world units.
    #[serde(with = "fixed_decimal_serde")]
    pub range: Fixed,
    /// Milliseconds between hits.
    pub attack_interval_ms: u64,
    /// What the unit marches on.
    #[serde(default)]
    pub preference: TargetPreference,
}

impl EnemyProfile {
    fn validate(&self, kind: EnemyKind) -> Result<()> {
        if self.max_health == 0 {
            return Err(GameError::InvalidMaxHealth(format!("{kind:?}")));
        }
        if self.range <= Fixed::ZERO {
            return Err(GameError::NonPositiveRange(self.range));
        }
        positive(&format!("{kind:?}.speed"), self.speed)?;
        if self.max_speed < self.speed {
            return Err(GameError::InvalidConfig(format!(
                "{kind:?}.max_speed must be at least its speed"
            )));
        }
        Ok(())
    }
}

/// One profile per [`EnemyKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyRoster {
    /// Weakest archetype.
    pub grunt: EnemyProfile,
    /// Fast archetype.
    pub raider: EnemyProfile,
    /// Heavy archetype.
    pub brute: EnemyProfile,
}

impl EnemyRoster {
    /// Profile of a given archetype.
    #[must_use]
    pub fn profile(&self, kind: EnemyKind) -> &EnemyProfile {
        match kind {
            EnemyKind::Grunt => &self.grunt,
            EnemyKind::Raider => &self.raider,
            EnemyKind::Brute => &self.brute,
        }
    }
}

impl Default for EnemyRoster {
    fn default() -> Self {
        Self {
            grunt: EnemyProfile {
                max_health: 30,
                speed: Fixed::from_num(1.5),
                max_speed: Fixed::from_num(2),
                damage: 4,
                range: Fixed::from_num(1.2),
                attack_interval_ms: 800,
                preference: TargetPreference::Headquarters,
            },
            raider: EnemyProfile {
                max_health: 20,
                speed: Fixed::from_num(2.5),
                max_speed: Fixed::from_num(3),
                damage: 3,
                range: Fixed::from_num(1.2),
                attack_interval_ms: 500,
                preference: TargetPreference::AnyStructure,
            },
            brute: EnemyProfile {
                max_health: 120,
                speed: Fixed::from_num(0.8),
                max_speed: Fixed::ONE,
                damage: 15,
                range: Fixed::from_num(1.5),
                attack_interval_ms: 1_500,
                preference: TargetPreference::Headquarters,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_ron_overrides_defaults() {
        let config = SimConfig::from_ron_str(
            "SimConfig(tick_ms: 100, avoidance_radius: 1.25, wave: WaveConfig(cycles_per_wave: 3))",
        )
        .unwrap();
        assert_eq!(config.tick_ms, 100);
        assert_eq!(config.avoidance_radius, Fixed::from_num(1.25));
        assert_eq!(config.wave.cycles_per_wave, 3);
        assert_eq!(config.wave.base, WaveConfig::default().base);
        assert_eq!(config.enemies, EnemyRoster::default());
    }

    #[test]
    fn test_malformed_ron_is_a_parse_error() {
        let err = SimConfig::from_ron_str("SimConfig(tick_ms: \"soon\")").unwrap_err();
        assert!(matches!(err, GameError::ConfigParse(_)));
    }

    #[test]
    fn test_zero_health_profile_is_rejected() {
        let mut config = SimConfig::default();
        config.enemies.brute.max_health = 0;
        assert_eq!(
            config.validate(),
            Err(GameError::InvalidMaxHealth("Brute".into()))
        );
    }

    #[test]
    fn test_non_positive_range_profile_is_rejected() {
        let mut config = SimConfig::default();
        config.enemies.grunt.range = Fixed::ZERO;
        assert_eq!(config.validate(), Err(GameError::NonPositiveRange(Fixed::ZERO)));
    }

    #[test]
    fn test_wave_constants_that_allow_empty_waves_are_rejected() {
        let mut config = SimConfig::default();
        config.wave.amplitude = 3.0;
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }
}
