//! Combat comparison and allocation bounds
//!
//! The signed comparison must mirror itself when the arguments swap, and a
//! recruitment cycle must end within the number of units its gold can buy.

use proptest::prelude::*;

use muster::core::{RecruitConfig, SideId};
use muster::game::{GameLedger, StaticInstructions};
use muster::map::HexCoord;
use muster::recruit::combat::compare_unit_types;
use muster::recruit::{CandidateAction, RecruitmentEngine};
use muster::sandbox::{SandboxGame, SandboxMap};
use muster::units::{Attack, AttackRange, DamageType, TypeCatalog, UnitType};

fn fighter(name: &str, cost: i32, hitpoints: u32, damage: u32, strikes: u32) -> UnitType {
    let mut unit_type = UnitType::new(name, cost, hitpoints);
    if damage > 0 {
        unit_type.attacks.push(Attack::new(
            "sword",
            AttackRange::Melee,
            DamageType::Blade,
            damage,
            strikes,
        ));
    }
    unit_type
}

#[test]
fn test_stronger_type_compares_positive() {
    let strong = fighter("Strong", 14, 40, 9, 3);
    let weak = fighter("Weak", 14, 30, 4, 2);
    let forward = compare_unit_types(&strong, &weak, 40.0, 40.0);
    let backward = compare_unit_types(&weak, &strong, 40.0, 40.0);
    assert!(forward > 1.0);
    assert!(backward < -1.0);
    assert!((forward + backward).abs() < 1e-9);
}

#[test]
fn test_harmless_pair_special_cases() {
    let armed = fighter("Armed", 14, 40, 9, 3);
    let unarmed = fighter("Unarmed", 14, 30, 0, 0);
    let other_unarmed = fighter("Other", 10, 20, 0, 0);

    assert_eq!(compare_unit_types(&unarmed, &other_unarmed, 40.0, 40.0), 1.0);
    assert_eq!(compare_unit_types(&armed, &unarmed, 40.0, 40.0), 2.0);
    assert_eq!(compare_unit_types(&unarmed, &armed, 40.0, 40.0), 0.5);
}

fn arb_unit(name: &'static str) -> impl Strategy<Value = UnitType> {
    (5i32..50, 10u32..80, 0u32..15, 1u32..5)
        .prop_map(move |(cost, hp, damage, strikes)| fighter(name, cost, hp, damage, strikes))
}

proptest! {
    #[test]
    fn prop_compare_is_reciprocal(
        a in arb_unit("A"),
        b in arb_unit("B"),
        defense_a in 20.0f64..80.0,
        defense_b in 20.0f64..80.0,
    ) {
        let forward = compare_unit_types(&a, &b, defense_a, defense_b);
        let backward = compare_unit_types(&b, &a, defense_b, defense_a);

        let special = [(1.0, 1.0), (2.0, 0.5), (0.5, 2.0)];
        if special.contains(&(forward, backward)) {
            return Ok(());
        }
        if forward == 0.0 {
            prop_assert_eq!(backward, 0.0);
        } else {
            // One side wins by a factor, the other loses by the same factor
            prop_assert!(forward.abs() >= 1.0);
            prop_assert!((forward + backward).abs() < 1e-9 * forward.abs());
            prop_assert!((forward < 0.0) != (backward < 0.0));
        }
    }
}

/// Keep with a castle big enough for any budget the properties use
fn big_castle_game(costs: &[i32], gold: i32) -> SandboxGame {
    let catalog: TypeCatalog = costs
        .iter()
        .enumerate()
        .map(|(i, cost)| UnitType::new(format!("T{i}"), *cost, 30))
        .chain([UnitType::new("Lord", 40, 50)])
        .collect();
    let mut rows = vec!["kccccccccccccccccccc"];
    rows.extend(std::iter::repeat("cccccccccccccccccccc").take(5));
    let mut game = SandboxGame::new(SandboxMap::from_rows(&rows), catalog);

    let recruits: Vec<String> = (0..costs.len()).map(|i| format!("T{i}")).collect();
    let recruits: Vec<&str> = recruits.iter().map(String::as_str).collect();
    game.add_side(SideId(1), 1, gold, &recruits);
    game.add_leader(SideId(1), "lord", "Lord", HexCoord::new(0, 0));
    game
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_allocation_terminates_within_budget(
        costs in proptest::collection::vec(5i32..40, 1..4),
        gold in 0i32..400,
        seed in any::<u64>(),
    ) {
        let mut game = big_castle_game(&costs, gold);
        let mut engine = RecruitmentEngine::with_seed(
            SideId(1),
            RecruitConfig::default(),
            Box::new(game.signals()),
            Box::new(StaticInstructions::new()),
            seed,
        );

        let cheapest = *costs.iter().min().unwrap_or(&1);
        let report = engine.execute(&mut game);
        let bound = (gold / cheapest) as usize + 1;
        prop_assert!(report.issued.len() + report.failures.len() <= bound);
        prop_assert!(game.gold(SideId(1)) >= 0);
    }
}
