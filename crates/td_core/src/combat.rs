//! Combat resolution for mobile attackers and towers.
//!
//! Both attacker kinds share the same rules (inclusive range, a cooldown
//! between hits, saturating damage). They differ only in how a target is
//! chosen:
//!
//! - Mobile units re-evaluate every tick. A blocker wins, then the unit's
//!   path target, then the nearest hostile in range (lowest id on ties).
//!   They only attack while standing still.
//! - Towers are sticky. They keep their target while it lives and stays in
//!   range, otherwise they take the first hostile in range by creation
//!   order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clock::SimTime;
use crate::components::{AnimationCue, Combatant, Cooldown, CueCategory, EntityId, Targeting, Team};
use crate::error::{GameError, Result};
use crate::grid::NavGrid;
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::EntityStorage;

/// A hit landed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackEvent {
    /// Who attacked.
    pub attacker: EntityId,
    /// Who was hit.
    pub target: EntityId,
    /// Health actually removed.
    pub damage: u32,
    /// Whether the hit brought the target to zero health.
    pub killed: bool,
}

/// Where a potential target is, as seen by range checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetShape {
    /// Reference position.
    pub position: Vec2Fixed,
    /// Centers of every covered tile. Empty for point-sized units.
    pub tile_centers: Vec<Vec2Fixed>,
}

impl TargetShape {
    /// A unit occupying a single point.
    #[must_use]
    pub fn point(position: Vec2Fixed) -> Self {
        Self {
            position,
            tile_centers: Vec::new(),
        }
    }

    /// Squared distance from `from` to the closest part of this shape.
    #[must_use]
    pub fn distance_squared_from(&self, from: Vec2Fixed) -> Fixed {
        self.tile_centers
            .iter()
            .map(|&center| from.distance_squared(center))
            .min()
            .unwrap_or_else(|| from.distance_squared(self.position))
    }
}

/// Inclusive range check on squared distances.
///
/// # Errors
///
/// Returns [`GameError::NonPositiveRange`] if `range <= 0`.
pub fn within_range(distance_squared: Fixed, range: Fixed) -> Result<bool> {
    if range <= Fixed::ZERO {
        return Err(GameError::NonPositiveRange(range));
    }
    Ok(distance_squared <= range * range)
}

/// Check whether `shape` is in reach of an attacker at `from`.
///
/// # Errors
///
/// Returns [`GameError::NonPositiveRange`] if `range <= 0`.
pub fn is_in_range(from: Vec2Fixed, shape: &TargetShape, range: Fixed) -> Result<bool> {
    within_range(shape.distance_squared_from(from), range)
}

#[derive(Debug, Clone)]
struct TargetView {
    id: EntityId,
    team: Team,
    shape: TargetShape,
}

/// Attacker data copied out before any health is touched.
#[derive(Debug, Clone, Copy)]
struct AttackerView {
    position: Vec2Fixed,
    team: Team,
    combatant: Combatant,
    stationary: bool,
    blocker: Option<EntityId>,
    path_target: Option<EntityId>,
}

/// Resolve attacks for every combatant.
///
/// Elapsed cooldowns are removed here. Attackers that are dying, cooling
/// down, moving (mobile only) or without a valid target are skipped.
///
/// # Errors
///
/// Returns [`GameError::NonPositiveRange`] if a combatant carries a
/// non-positive range.
pub fn combat_system(
    entities: &mut EntityStorage,
    grid: &NavGrid,
    now: SimTime,
    epsilon: Fixed,
    entity_ids: &[EntityId],
) -> Result<Vec<AttackEvent>> {
    let targets = collect_targets(entities, grid, entity_ids);
    let index: HashMap<EntityId, usize> = targets.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

    let mut events = Vec::new();
    for &attacker_id in entity_ids {
        let Some(attacker) = ready_attacker(entities, attacker_id, now, epsilon) else {
            continue;
        };

        let chosen = match attacker.combatant.targeting {
            Targeting::Mobile => {
                if !attacker.stationary {
                    continue;
                }
                select_mobile_target(entities, &targets, &index, &attacker)?
            }
            Targeting::Sticky { current } => {
                select_sticky_target(entities, &targets, &index, &attacker, current)?
            }
        };
        let Some(target_id) = chosen else {
            if let Some(entity) = entities.get_mut(attacker_id) {
                if let Some(Combatant {
                    targeting: Targeting::Sticky { current },
                    ..
                }) = entity.combatant.as_mut()
                {
                    *current = None;
                }
            }
            continue;
        };

        let stats = attacker.combatant.stats;
        let Some(health) = entities.get_mut(target_id).and_then(|t| t.health.as_mut()) else {
            continue;
        };
        let damage = health.apply_damage(stats.damage);
        let killed = health.is_depleted();

        if let Some(entity) = entities.get_mut(attacker_id) {
            entity.cooldown = Some(Cooldown {
                started_at: now,
                duration_ms: stats.interval_ms,
            });
            entity.cues.push(AnimationCue {
                category: CueCategory::Attack,
                duration_ms: stats.interval_ms,
                looping: false,
            });
            if let Some(Combatant {
                targeting: Targeting::Sticky { current },
                ..
            }) = entity.combatant.as_mut()
            {
                *current = if killed { None } else { Some(target_id) };
            }
            if killed {
                if let Some(path) = entity.path.as_mut() {
                    path.invalidate();
                    path.clear_blockage();
                }
            }
        }

        if killed {
            tracing::debug!(attacker = attacker_id, target = target_id, "target killed");
        }
        events.push(AttackEvent {
            attacker: attacker_id,
            target: target_id,
            damage,
            killed,
        });
    }

    Ok(events)
}

fn collect_targets(entities: &EntityStorage, grid: &NavGrid, entity_ids: &[EntityId]) -> Vec<TargetView> {
    entity_ids
        .iter()
        .filter_map(|&id| {
            let entity = entities.get(id).filter(|e| e.health.is_some())?;
            let position = entity.position?.value;
            let tile_centers = entity
                .footprint
                .as_ref()
                .map(|f| f.tiles.iter().map(|&t| grid.tile_center(t)).collect())
                .unwrap_or_default();
            Some(TargetView {
                id,
                team: entity.team,
                shape: TargetShape {
                    position,
                    tile_centers,
                },
            })
        })
        .collect()
}

/// Copy out an attacker that may act this tick, dropping an elapsed cooldown.
fn ready_attacker(
    entities: &mut EntityStorage,
    id: EntityId,
    now: SimTime,
    epsilon: Fixed,
) -> Option<AttackerView> {
    let entity = entities.get_mut(id)?;
    if !entity.is_alive() {
        return None;
    }
    let combatant = entity.combatant?;
    let position = entity.position?.value;

    if let Some(cooldown) = entity.cooldown {
        if !cooldown.has_elapsed(now) {
            return None;
        }
        entity.cooldown = None;
    }

    let path = entity.path.as_ref();
    Some(AttackerView {
        position,
        team: entity.team,
        combatant,
        stationary: entity.velocity.map_or(true, |v| v.is_stationary(epsilon)),
        blocker: path.and_then(|p| p.blocker),
        path_target: path.and_then(|p| p.target),
    })
}

/// A hostile, live target within the attacker's range, with its squared
/// distance.
fn reachable(
    entities: &EntityStorage,
    target: &TargetView,
    attacker: &AttackerView,
) -> Result<Option<Fixed>> {
    if !target.team.is_hostile_to(attacker.team) || !entities.get(target.id).is_some_and(|e| e.is_alive()) {
        return Ok(None);
    }
    let distance_sq = target.shape.distance_squared_from(attacker.position);
    Ok(within_range(distance_sq, attacker.combatant.stats.range)?.then_some(distance_sq))
}

fn select_mobile_target(
    entities: &EntityStorage,
    targets: &[TargetView],
    index: &HashMap<EntityId, usize>,
    attacker: &AttackerView,
) -> Result<Option<EntityId>> {
    for preferred in [attacker.blocker, attacker.path_target].into_iter().flatten() {
        if let Some(&i) = index.get(&preferred) {
            if reachable(entities, &targets[i], attacker)?.is_some() {
                return Ok(Some(preferred));
            }
        }
    }

    let mut best: Option<(Fixed, EntityId)> = None;
    for target in targets {
        let Some(distance_sq) = reachable(entities, target, attacker)? else {
            continue;
        };
        // Targets are in ascending id order, so strict less-than keeps the
        // lowest id among equally distant candidates.
        if best.map_or(true, |(d, _)| distance_sq < d) {
            best = Some((distance_sq, target.id));
        }
    }
    Ok(best.map(|(_, id)| id))
}

fn select_sticky_target(
    entities: &EntityStorage,
    targets: &[TargetView],
    index: &HashMap<EntityId, usize>,
    attacker: &AttackerView,
    current: Option<EntityId>,
) -> Result<Option<EntityId>> {
    if let Some(&i) = current.and_then(|id| index.get(&id)) {
        if reachable(entities, &targets[i], attacker)?.is_some() {
            return Ok(current);
        }
    }
    for target in targets {
        if reachable(entities, target, attacker)?.is_some() {
            return Ok(Some(target.id));
        }
    }
    Ok(None)
}
