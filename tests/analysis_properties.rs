//! Analysis stage properties
//!
//! Frontier symmetry, economic hysteresis, similarity penalty and score
//! normalization, checked through the public API.

use proptest::prelude::*;

use muster::core::config::{MapAnalysisConfig, SaveGoldConfig};
use muster::core::{SideId, UnitTypeId};
use muster::map::{HexCoord, Terrain};
use muster::recruit::blend::apply_similarity_penalty;
use muster::recruit::{
    compute_important_hexes, EconomicState, EconomySnapshot, EconomyTracker, PlanningContext,
    ScoreMap,
};
use muster::sandbox::{SandboxGame, SandboxMap};
use muster::units::{TypeCatalog, UnitType};

fn line_game(width: i32, own: &[i32], enemy: &[i32]) -> SandboxGame {
    let catalog: TypeCatalog = [UnitType::new("Spearman", 14, 36)].into_iter().collect();
    let mut game = SandboxGame::new(SandboxMap::filled(width, 1, Terrain::Flat), catalog);
    game.add_side(SideId(1), 1, 0, &["Spearman"]);
    game.add_side(SideId(2), 2, 0, &["Spearman"]);
    for q in own {
        game.add_unit(SideId(1), "Spearman", HexCoord::new(*q, 0));
    }
    for q in enemy {
        game.add_unit(SideId(2), "Spearman", HexCoord::new(*q, 0));
    }
    game
}

fn assert_symmetric_frontier(width: i32, own: &[i32], enemy: &[i32]) {
    let game = line_game(width, own, enemy);
    let ctx = PlanningContext::new(SideId(1), &game);
    let important = compute_important_hexes(&ctx, &MapAnalysisConfig::default());

    let midpoint = (width - 1) / 2;
    assert!(important.contains(HexCoord::new(midpoint, 0)));
    for hex in &important.hexes {
        let mirrored = HexCoord::new(width - 1 - hex.q, 0);
        assert!(important.contains(mirrored), "{hex:?} has no mirror");
    }
}

#[test]
fn test_frontier_symmetric_single_units() {
    assert_symmetric_frontier(11, &[2], &[8]);
}

#[test]
fn test_frontier_symmetric_unit_groups() {
    assert_symmetric_frontier(13, &[1, 3], &[9, 11]);
}

fn snapshot(ratio: f64) -> EconomySnapshot {
    EconomySnapshot {
        gold: 100,
        team_value: ratio * 100.0,
        own_value: ratio * 100.0,
        enemy_value: 100.0,
        allies: 1,
        base_income: 2,
        side_count: 2,
        ..EconomySnapshot::default()
    }
}

#[test]
fn test_hysteresis_band() {
    let config = SaveGoldConfig {
        begin: 1.0,
        end: 0.7,
        ..SaveGoldConfig::default()
    };
    let mut tracker = EconomyTracker::new();

    for ratio in [0.8, 0.9, 0.8, 0.9, 0.8, 0.9] {
        assert_eq!(tracker.update(&snapshot(ratio), &config), EconomicState::Normal);
    }

    assert_eq!(tracker.update(&snapshot(1.05), &config), EconomicState::SaveGold);
    for ratio in [0.9, 0.8, 0.9, 0.75] {
        assert_eq!(tracker.update(&snapshot(ratio), &config), EconomicState::SaveGold);
    }
    assert_eq!(tracker.update(&snapshot(0.65), &config), EconomicState::Normal);
}

#[test]
fn test_similarity_penalty_divides_once_per_call() {
    let mut bowman = UnitType::new("Bowman", 14, 33);
    bowman.advances_to.push("Longbowman".into());
    let catalog: TypeCatalog = [
        bowman,
        UnitType::new("Longbowman", 26, 51),
        UnitType::new("Spearman", 14, 36),
    ]
    .into_iter()
    .collect();

    let mut scores: ScoreMap = [
        (UnitTypeId::from("Bowman"), 12.0),
        (UnitTypeId::from("Longbowman"), 12.0),
        (UnitTypeId::from("Spearman"), 12.0),
    ]
    .into_iter()
    .collect();

    apply_similarity_penalty(&mut scores, &catalog);
    assert_eq!(scores.get(&"Bowman".into()), 6.0);
    assert_eq!(scores.get(&"Spearman".into()), 12.0);

    apply_similarity_penalty(&mut scores, &catalog);
    assert_eq!(scores.get(&"Bowman".into()), 3.0);
    assert_eq!(scores.get(&"Longbowman".into()), 3.0);
    assert_eq!(scores.get(&"Spearman".into()), 12.0);
}

#[test]
fn test_all_zero_scores_stay_verbatim() {
    let scores: ScoreMap = [
        (UnitTypeId::from("A"), 0.0),
        (UnitTypeId::from("B"), 0.0),
    ]
    .into_iter()
    .collect();
    assert_eq!(scores.normalized(), scores);
}

proptest! {
    #[test]
    fn prop_normalized_scores_sum_to_one(raw in proptest::collection::vec(0.0f64..1000.0, 1..8)) {
        let scores: ScoreMap = raw
            .iter()
            .enumerate()
            .map(|(i, s)| (UnitTypeId::new(format!("T{i}")), *s))
            .collect();
        let normalized = scores.normalized();
        if scores.sum() > 0.0 {
            prop_assert!((normalized.sum() - 1.0).abs() < 1e-9);
            for (id, score) in scores.iter() {
                prop_assert!((normalized.get(id) - score / scores.sum()).abs() < 1e-12);
            }
        } else {
            prop_assert_eq!(normalized, scores);
        }
    }

    #[test]
    fn prop_hysteresis_never_leaves_normal_inside_band(
        ratios in proptest::collection::vec(0.7f64..=1.0, 1..20),
    ) {
        let config = SaveGoldConfig {
            begin: 1.0,
            end: 0.7,
            ..SaveGoldConfig::default()
        };
        let mut tracker = EconomyTracker::new();
        for ratio in ratios {
            prop_assert_eq!(tracker.update(&snapshot(ratio), &config), EconomicState::Normal);
        }
    }
}
