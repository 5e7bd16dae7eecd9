//! Strategy routing

use super::types::{ChangeSignificance, Strategy};

/// Maps change significance to an assessment strategy. Stateless and total.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyRouter;

impl StrategyRouter {
    pub fn route(&self, significance: ChangeSignificance) -> Strategy {
        match significance {
            ChangeSignificance::NoChange => Strategy::Reuse,
            ChangeSignificance::Minor | ChangeSignificance::Moderate => Strategy::Delta,
            ChangeSignificance::Major => Strategy::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table() {
        let router = StrategyRouter;
        assert_eq!(router.route(ChangeSignificance::NoChange), Strategy::Reuse);
        assert_eq!(router.route(ChangeSignificance::Minor), Strategy::Delta);
        assert_eq!(router.route(ChangeSignificance::Moderate), Strategy::Delta);
        assert_eq!(router.route(ChangeSignificance::Major), Strategy::Full);
    }

    #[test]
    fn test_route_is_deterministic() {
        let router = StrategyRouter;
        for _ in 0..3 {
            assert_eq!(router.route(ChangeSignificance::Minor), Strategy::Delta);
        }
    }
}
