use clap::Parser;
use sort_resort_solver::heuristics::ALL_STRATEGIES;
use sort_resort_solver::level::{LevelDefinition, RandomLevelParams};
use sort_resort_solver::solver::{Solver, SolverConfig};
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Number of random levels to evaluate
    #[clap(short, long, default_value_t = 20)]
    boards: usize,

    /// Seed of the first random level
    #[clap(short, long, default_value_t = 0)]
    seed: u64,

    /// Containers per random level
    #[clap(long, default_value_t = 6)]
    containers: usize,

    /// Item types per random level
    #[clap(long, default_value_t = 10)]
    item_types: usize,

    /// Locked containers per random level
    #[clap(long, default_value_t = 0)]
    locked: usize,

    /// Print the outcome of every strategy on every level
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Default)]
struct Tally {
    solved: usize,
    moves: Vec<u32>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let params = RandomLevelParams {
        containers: args.containers,
        item_types: args.item_types,
        locked_containers: args.locked,
        ..RandomLevelParams::default()
    };

    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    println!("Starting strategy evaluation for {} levels...", args.boards);

    for board_idx in 0..args.boards {
        let seed = args.seed + board_idx as u64;
        let level = LevelDefinition::new_random_with_seed(seed, &params);
        if args.verbose {
            println!("\nLevel {} (seed {}, {} items)", board_idx, seed, level.item_count());
        }

        for strategy in ALL_STRATEGIES {
            let name = strategy.name;
            let result = Solver::new(SolverConfig::with_strategy(strategy)).solve(&level);
            let tally = tallies.entry(name).or_default();
            if result.success {
                tally.solved += 1;
                tally.moves.push(result.total_moves);
            }
            if args.verbose {
                match result.failure_reason() {
                    None => println!("  {:<14} solved in {} moves", name, result.total_moves),
                    Some(reason) => println!("  {:<14} {}", name, reason),
                }
            }
        }
    }

    println!("\n--- Evaluation Complete ---");
    println!("Levels evaluated: {}", args.boards);

    let mut ranking: Vec<(&str, usize, f64)> = tallies
        .iter()
        .map(|(name, tally)| {
            let avg = if tally.moves.is_empty() {
                0.0
            } else {
                tally.moves.iter().sum::<u32>() as f64 / tally.moves.len() as f64
            };
            (*name, tally.solved, avg)
        })
        .collect();
    // Most levels solved first, then fewest average moves.
    ranking.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.total_cmp(&b.2)));

    for (name, solved, avg) in ranking {
        println!(
            "Strategy {:<14}: solved {:>3}/{:<3} average moves {:.2}",
            name, solved, args.boards, avg
        );
    }
}
