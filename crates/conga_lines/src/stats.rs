use bevy::prelude::*;
use strum::{Display, EnumIter};

/// The consumable manipulation budgets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum StatKind {
    #[strum(serialize = "MOVE")]
    MoveGotchi,
    #[strum(serialize = "SHAKE")]
    MoveShake,
    #[strum(serialize = "ROTATE")]
    Rotate,
    #[strum(serialize = "PORTAL")]
    Portal,
}

/// Per-player action budgets. Counters never go below zero: `spend` at zero
/// fails instead of wrapping, so exhaustion is visible to callers rather
/// than silently unlimited.
#[derive(Resource, Clone, Debug)]
pub struct PlayerStats {
    move_gotchi: u32,
    move_shake: u32,
    rotate: u32,
    portal: u32,
}

impl PlayerStats {
    pub const fn new(move_gotchi: u32, move_shake: u32, rotate: u32, portal: u32) -> Self {
        Self {
            move_gotchi,
            move_shake,
            rotate,
            portal,
        }
    }

    const fn counter(&self, kind: StatKind) -> u32 {
        match kind {
            StatKind::MoveGotchi => self.move_gotchi,
            StatKind::MoveShake => self.move_shake,
            StatKind::Rotate => self.rotate,
            StatKind::Portal => self.portal,
        }
    }

    const fn counter_mut(&mut self, kind: StatKind) -> &mut u32 {
        match kind {
            StatKind::MoveGotchi => &mut self.move_gotchi,
            StatKind::MoveShake => &mut self.move_shake,
            StatKind::Rotate => &mut self.rotate,
            StatKind::Portal => &mut self.portal,
        }
    }

    pub const fn get(&self, kind: StatKind) -> u32 {
        self.counter(kind)
    }

    pub const fn has(&self, kind: StatKind) -> bool {
        self.counter(kind) > 0
    }

    /// Consumes exactly one point, or reports `false` with the counter left
    /// at zero.
    pub const fn spend(&mut self, kind: StatKind) -> bool {
        let counter = self.counter_mut(kind);
        if *counter == 0 {
            return false;
        }
        *counter -= 1;
        true
    }

    pub const fn grant(&mut self, kind: StatKind, amount: u32) {
        *self.counter_mut(kind) += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_decrements_by_exactly_one() {
        let mut stats = PlayerStats::new(2, 1, 0, 1);
        assert!(stats.spend(StatKind::MoveGotchi));
        assert_eq!(stats.get(StatKind::MoveGotchi), 1);
        assert_eq!(stats.get(StatKind::Portal), 1, "other counters untouched");
        assert_eq!(stats.get(StatKind::MoveShake), 1, "shake budget is its own");
    }

    #[test]
    fn spend_at_zero_fails_and_stays_at_zero() {
        let mut stats = PlayerStats::new(0, 0, 0, 0);
        assert!(!stats.spend(StatKind::Rotate));
        assert_eq!(stats.get(StatKind::Rotate), 0);
        assert!(!stats.has(StatKind::Rotate));
    }

    #[test]
    fn grant_refills() {
        let mut stats = PlayerStats::new(0, 0, 0, 0);
        stats.grant(StatKind::Portal, 3);
        assert!(stats.has(StatKind::Portal));
        assert_eq!(stats.get(StatKind::Portal), 3);
    }
}
