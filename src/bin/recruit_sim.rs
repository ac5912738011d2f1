//! Headless Recruitment Runner
//!
//! Plays a number of turns of two sandbox sides recruiting against each other
//! and prints a JSON summary of what each side bought and why it stopped.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ordered_float::OrderedFloat;
use serde::Serialize;

use muster::attack::{analyze_targets, AttackAnalysis};
use muster::core::{load_config, Gold, MusterError, RecruitConfig, SideId};
use muster::game::{GameLedger, StaticInstructions};
use muster::map::{HexCoord, SpatialOracle, Terrain};
use muster::recruit::{
    CandidateAction, EconomicState, PlanningContext, RecruitmentEngine, StopReason,
};
use muster::sandbox::{SandboxGame, SandboxMap};
use muster::units::load_catalog;

/// Headless recruitment runner - two sandbox AIs recruiting against each other
#[derive(Parser, Debug)]
#[command(name = "recruit_sim")]
#[command(about = "Run sandbox recruitment turns and print a JSON summary")]
struct Args {
    /// Unit catalog (TOML)
    #[arg(long, default_value = "data/units/default.toml")]
    units: PathBuf,

    /// Planner configuration (TOML); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of turns to play
    #[arg(long, default_value_t = 10)]
    turns: u32,

    /// Starting gold of both sides
    #[arg(long, default_value_t = 100)]
    gold: Gold,

    /// Random seed for deterministic runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct TurnSummary {
    turn: u32,
    income: Gold,
    issued: usize,
    /// `None` when the planner abstained without running
    stop: Option<StopReason>,
    state: EconomicState,
}

#[derive(Serialize)]
struct SideSummary {
    side: SideId,
    gold: Gold,
    recruits: BTreeMap<String, usize>,
    turns: Vec<TurnSummary>,
}

#[derive(Serialize)]
struct Summary {
    seed: u64,
    turns: u32,
    sides: Vec<SideSummary>,
    attack_analyses: usize,
    best_attack: Option<AttackAnalysis>,
}

const MAP_WIDTH: i32 = 20;
const MAP_HEIGHT: i32 = 9;

/// Two keeps at opposite ends, villages and rough ground in between
fn build_map() -> SandboxMap {
    let mut map = SandboxMap::filled(MAP_WIDTH, MAP_HEIGHT, Terrain::Flat);
    for keep in [HexCoord::new(2, 4), HexCoord::new(17, 4)] {
        map.set_terrain(keep, Terrain::Keep);
        for castle in keep.neighbors() {
            map.set_terrain(castle, Terrain::Castle);
        }
    }
    for village in [(5, 1), (5, 7), (9, 4), (10, 4), (14, 1), (14, 7)] {
        map.set_terrain(HexCoord::new(village.0, village.1), Terrain::Village);
    }
    for q in 7..13 {
        map.set_terrain(HexCoord::new(q, 2), Terrain::Forest);
        map.set_terrain(HexCoord::new(q, 6), Terrain::Hills);
    }
    map.set_terrain(HexCoord::new(10, 0), Terrain::Mountains);
    map.set_terrain(HexCoord::new(9, 8), Terrain::ShallowWater);
    map
}

/// Move fresh recruits off the castle so the next turn has room
fn deploy(game: &mut SandboxGame, side: SideId, towards: HexCoord) {
    let recruits: Vec<_> = game
        .units()
        .into_iter()
        .filter(|u| u.side == side && !u.can_recruit && game.map().is_castle(u.position))
        .collect();

    for unit in recruits {
        let free = game
            .map()
            .tiles()
            .into_iter()
            .filter(|hex| !game.map().is_castle(*hex) && game.unit_at(*hex).is_none())
            .filter(|hex| game.map().terrain_at(*hex).is_some_and(|t| t != Terrain::DeepWater))
            .min_by_key(|hex| (hex.distance(&unit.position), hex.distance(&towards)));
        if let (Some(hex), Some(moved)) = (free, game.unit_mut(unit.id)) {
            moved.position = hex;
        }
    }
}

fn build_game(args: &Args) -> muster::core::Result<SandboxGame> {
    let catalog = load_catalog(&args.units)?;
    let mut game = SandboxGame::new(build_map(), catalog);

    game.add_side(
        SideId(1),
        1,
        args.gold,
        &["Spearman", "Bowman", "Cavalryman", "Heavy Infantryman", "Mage"],
    );
    game.add_side(
        SideId(2),
        2,
        args.gold,
        &["Skeleton", "Skeleton Archer", "Dark Adept", "Ghoul", "Ghost"],
    );

    for (side, name, type_id, keep) in [
        (SideId(1), "loyalist", "Pikeman", HexCoord::new(2, 4)),
        (SideId(2), "undead", "Dark Sorcerer", HexCoord::new(17, 4)),
    ] {
        if game.add_leader(side, name, type_id, keep).is_none() {
            return Err(MusterError::UnknownUnitType(type_id.into()));
        }
    }
    Ok(game)
}

fn run(args: &Args) -> muster::core::Result<Summary> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RecruitConfig::default(),
    };
    let mut game = build_game(args)?;

    let fronts = [
        (SideId(1), HexCoord::new(17, 4)),
        (SideId(2), HexCoord::new(2, 4)),
    ];
    let mut engines: Vec<RecruitmentEngine> = fronts
        .iter()
        .enumerate()
        .map(|(i, (side, _))| {
            RecruitmentEngine::with_seed(
                *side,
                config.clone(),
                Box::new(game.signals()),
                Box::new(StaticInstructions::new()),
                args.seed.wrapping_add(i as u64),
            )
        })
        .collect();
    let mut turns: Vec<Vec<TurnSummary>> = engines.iter().map(|_| Vec::new()).collect();

    for turn in 1..=args.turns {
        for (i, engine) in engines.iter_mut().enumerate() {
            let (side, towards) = fronts[i];
            let income = if turn > 1 { game.collect_income(side) } else { 0 };

            let (issued, stop) = if engine.evaluate(&game).is_bad() {
                (0, None)
            } else {
                let report = engine.execute(&mut game);
                (report.issued.len(), Some(report.stop))
            };
            tracing::info!(turn, %side, issued, gold = game.gold(side), "turn played");

            turns[i].push(TurnSummary {
                turn,
                income,
                issued,
                stop,
                state: engine.state(),
            });
            deploy(&mut game, side, towards);
        }
    }

    let ctx = PlanningContext::new(SideId(1), &game);
    let mut analyses = analyze_targets(&ctx, &config.attack);
    analyses.sort_by_key(|a| (Reverse(a.rating), OrderedFloat(a.exposure())));
    let attack_analyses = analyses.len();

    let sides = fronts
        .iter()
        .zip(turns)
        .map(|((side, _), turns)| SideSummary {
            side: *side,
            gold: game.gold(*side),
            recruits: game
                .unit_counts(*side)
                .into_iter()
                .map(|(id, count)| (id.to_string(), count))
                .collect(),
            turns,
        })
        .collect();

    Ok(Summary {
        seed: args.seed,
        turns: args.turns,
        sides,
        attack_analyses,
        best_attack: analyses.into_iter().next(),
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let summary = match run(&args) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("recruit_sim failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("failed to serialize summary: {e}");
            ExitCode::FAILURE
        }
    }
}
