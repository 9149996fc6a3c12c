use common::*;
use serde::Deserialize;

use crate::ecs::*;

/// Armor class, used only to pick a damage formula; combat depth beyond this is out of scope
/// (§3 "Health").
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
pub enum ArmorKind {
    None,
    Light,
    Heavy,
}

impl ArmorKind {
    fn mitigation(self) -> f32 {
        match self {
            ArmorKind::None => 0.0,
            ArmorKind::Light => 0.25,
            ArmorKind::Heavy => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("health")]
pub struct HealthComponent {
    pub hp: f32,
    pub max_hp: f32,
    pub armor: ArmorKind,
}

impl HealthComponent {
    pub fn new(max_hp: f32, armor: ArmorKind) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            armor,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }

    /// Applies `raw_damage` after armor mitigation, clamping to `[0, max_hp]`.
    pub fn apply_damage(&mut self, raw_damage: f32) {
        let mitigated = raw_damage * (1.0 - self.armor.mitigation());
        self.hp = (self.hp - mitigated).clamp(0.0, self.max_hp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_armor_mitigates_half_damage() {
        let mut h = HealthComponent::new(100.0, ArmorKind::Heavy);
        h.apply_damage(40.0);
        assert_eq!(h.hp, 80.0);
    }

    #[test]
    fn damage_cannot_drop_hp_below_zero() {
        let mut h = HealthComponent::new(10.0, ArmorKind::None);
        h.apply_damage(1000.0);
        assert_eq!(h.hp, 0.0);
        assert!(h.is_dead());
    }
}
