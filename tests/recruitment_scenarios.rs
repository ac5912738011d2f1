//! Recruitment scenario tests
//!
//! Drive the full engine (analysis, blending, economy, allocation) through
//! the sandbox game and check what ends up on the board.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use muster::core::{RecruitConfig, SideId};
use muster::game::{CommandFailure, GameLedger, Job, StaticInstructions};
use muster::map::HexCoord;
use muster::recruit::{
    AllocationPlanner, CandidateAction, EconomicState, EconomyTracker, RecruitmentEngine,
    StopReason,
};
use muster::sandbox::{SandboxGame, SandboxMap};
use muster::units::{TypeCatalog, UnitType};

fn engine(game: &SandboxGame, config: RecruitConfig) -> RecruitmentEngine {
    RecruitmentEngine::new(
        SideId(1),
        config,
        Box::new(game.signals()),
        Box::new(StaticInstructions::new()),
    )
}

/// One leader on a small keep, no enemies anywhere
fn archers_and_knights() -> SandboxGame {
    let catalog: TypeCatalog = [
        UnitType::new("Archer", 20, 30),
        UnitType::new("Knight", 30, 40),
    ]
    .into_iter()
    .collect();
    let map = SandboxMap::from_rows(&["kccc....", "ccc.....", "........"]);
    let mut game = SandboxGame::new(map, catalog);
    game.add_side(SideId(1), 1, 50, &["Archer", "Knight"]);
    game.add_leader(SideId(1), "lord", "Archer", HexCoord::new(0, 0));
    game
}

#[test]
fn test_end_to_end_spends_down_to_below_cheapest() {
    let mut game = archers_and_knights();
    let mut engine = engine(&game, RecruitConfig::default());

    let plan = engine.plan(&game);
    assert!(plan.important.is_empty());
    let scores = &plan.leaders[0].scores;
    // Only the diversity offset and noise remain
    for (_, score) in scores.iter() {
        assert!((50.0..=70.0).contains(&score), "unexpected score {score}");
    }

    assert!(!engine.evaluate(&game).is_bad());
    let report = engine.execute(&mut game);

    assert!(!report.issued.is_empty());
    assert!(report.issued.len() <= 2);
    let spent: i32 = report
        .issued
        .iter()
        .map(|c| if c.type_id.as_str() == "Archer" { 20 } else { 30 })
        .sum();
    assert_eq!(game.gold(SideId(1)), 50 - spent);
    assert!(game.gold(SideId(1)) < 20);
    assert_eq!(report.stop, StopReason::Blocked);
    assert_eq!(report.state, EconomicState::Normal);

    // Nothing affordable is left
    assert!(engine.evaluate(&game).is_bad());
}

#[test]
fn test_leaders_share_recruits_by_ratio_score() {
    let catalog: TypeCatalog = [UnitType::new("Militia", 10, 20), UnitType::new("Captain", 30, 50)]
        .into_iter()
        .collect();
    let map = SandboxMap::from_rows(&[
        "kccccccccccccccc",
        "cccccccccccccccc",
        "................",
        "................",
        "kccccccccccccccc",
        "cccccccccccccccc",
        "cccccccccccccccc",
    ]);
    let mut game = SandboxGame::new(map, catalog);
    game.add_side(SideId(1), 1, 300, &["Militia"]);
    game.add_leader(SideId(1), "north", "Captain", HexCoord::new(0, 0));
    game.add_leader(SideId(1), "south", "Captain", HexCoord::new(0, 4));

    let mut config = RecruitConfig::default();
    config.allocation.leader_ratio_scores.insert("north".into(), 1.0);
    config.allocation.leader_ratio_scores.insert("south".into(), 2.0);
    let mut engine = engine(&game, config);

    let report = engine.execute(&mut game);
    assert_eq!(report.issued.len(), 30);
    assert_eq!(game.gold(SideId(1)), 0);

    let north = report.recruit_counts.get("north").copied().unwrap_or(0);
    let south = report.recruit_counts.get("south").copied().unwrap_or(0);
    assert_eq!(north + south, 30);
    assert!(north.abs_diff(10) <= 1, "north recruited {north}");
    assert!(south.abs_diff(20) <= 1, "south recruited {south}");
}

#[test]
fn test_blocking_fighter_job_without_gold() {
    let mut fighter = UnitType::new("Spearman", 14, 36);
    fighter.usage = "fighter".into();
    let mut archer = UnitType::new("Bowman", 14, 33);
    archer.usage = "archer".into();
    let catalog: TypeCatalog = [fighter, archer].into_iter().collect();

    let mut game = SandboxGame::new(SandboxMap::from_rows(&["kccc", "cccc"]), catalog);
    game.add_side(SideId(1), 1, 0, &["Spearman", "Bowman"]);
    game.add_leader(SideId(1), "lord", "Spearman", HexCoord::new(0, 0));

    let job = Job::new(&["fighter"]).with_number(3).total(false).blocker(true);
    let config = RecruitConfig::default();

    // The engine abstains before planning
    let mut engine = RecruitmentEngine::new(
        SideId(1),
        config.clone(),
        Box::new(game.signals()),
        Box::new(StaticInstructions::new().with_job(job.clone())),
    );
    assert!(engine.evaluate(&game).is_bad());
    let report = engine.execute(&mut game);
    assert!(report.issued.is_empty());
    assert_eq!(report.stop, StopReason::NotEnoughGold);

    // Driven directly, the planner halts on the first failed recruit
    let mut plan = engine.plan(&game);
    let mut economy = EconomyTracker::new();
    let mut observer = game.signals();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let report = AllocationPlanner::new(&config, &mut economy, &mut observer, &mut rng).run(
        &mut game,
        SideId(1),
        &mut plan.leaders,
        vec![job],
        &[],
        0,
    );

    assert!(report.issued.is_empty());
    assert_eq!(report.stop, StopReason::Blocked);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].failure, CommandFailure::NoGold);
    assert!(game.unit_counts(SideId(1)).is_empty());
}

#[test]
fn test_spend_all_gold_falls_back_to_saving() {
    let mut game = archers_and_knights();
    game.add_side(SideId(2), 2, 0, &["Archer"]);
    game.add_unit(SideId(2), "Archer", HexCoord::new(7, 2));

    let mut config = RecruitConfig::default();
    config.save_gold.spend_all_gold = Some(40);
    let mut engine = engine(&game, config);

    // 50 gold is past the spend-all mark; buying stops on the first NoGold
    let report = engine.execute(&mut game);
    assert!(!report.issued.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].failure, CommandFailure::NoGold);
    assert_eq!(report.stop, StopReason::Blocked);
    assert_eq!(report.state, EconomicState::SaveGold);
    assert_eq!(engine.state(), EconomicState::SaveGold);

    // Ahead of the enemy and below the mark: the next cycle keeps the gold
    game.set_gold(SideId(1), 35);
    assert!(!engine.evaluate(&game).is_bad());
    let report = engine.execute(&mut game);
    assert!(report.issued.is_empty());
    assert_eq!(report.stop, StopReason::SaveGold);
    assert_eq!(report.state, EconomicState::SaveGold);
    assert_eq!(game.gold(SideId(1)), 35);
}

#[test]
fn test_recruits_again_after_income() {
    let mut game = archers_and_knights();
    game.set_gold(SideId(1), 20);
    let mut engine = engine(&game, RecruitConfig::default());

    let report = engine.execute(&mut game);
    assert_eq!(report.issued.len(), 1);
    assert_eq!(report.issued[0].type_id.as_str(), "Archer");
    assert!(engine.evaluate(&game).is_bad());

    game.set_gold(SideId(1), 30);
    assert!(!engine.evaluate(&game).is_bad());
    let report = engine.execute(&mut game);
    assert_eq!(report.issued.len(), 1);
    assert_eq!(game.unit_counts(SideId(1)).values().sum::<usize>(), 2);
}
