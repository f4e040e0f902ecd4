use clap::Parser;
use sort_resort_solver::engine::Board;
use sort_resort_solver::heuristics::SolverStrategy;
use sort_resort_solver::level::LevelDefinition;
use sort_resort_solver::solver::{
    solve_level_best, SolveResult, Solver, SolverConfig, DEFAULT_NOISE_MAGNITUDE, MAX_MOVES,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Move cap for the solver (0 means the default)
    #[clap(short, long, default_value_t = MAX_MOVES)]
    max_moves: u32,

    /// Strategy profile: balanced, pair-focused, reveal-focused, cautious or aggressive
    #[clap(short, long, default_value = "balanced")]
    strategy: String,

    /// Run every strategy with noise restarts and keep the shortest solution.
    /// The ensemble picks its own strategies and move cap, so --strategy and
    /// --max-moves cannot be combined with it
    #[clap(short, long, conflicts_with_all = ["strategy", "max_moves"])]
    best: bool,

    /// Noise restarts per strategy when using --best
    #[clap(long, default_value_t = 3)]
    noise_runs: u32,

    /// Show the score and reasoning behind every move
    #[clap(short, long)]
    verbose: bool,

    /// Print the solve result as JSON instead of text
    #[clap(long)]
    json: bool,

    /// Path to the level JSON file
    level_file: PathBuf,
}

fn solve(args: &Args, level: &LevelDefinition) -> Result<SolveResult, String> {
    if args.best {
        return Ok(solve_level_best(level, args.noise_runs, DEFAULT_NOISE_MAGNITUDE));
    }
    let strategy = SolverStrategy::by_name(&args.strategy)
        .ok_or_else(|| format!("Unknown strategy: {}", args.strategy))?;
    let config = SolverConfig {
        max_moves: args.max_moves,
        strategy,
        noise_seed: 0,
    };
    Ok(Solver::new(config).solve(level))
}

fn print_report(level: &LevelDefinition, result: &SolveResult, verbose: bool) {
    if let Ok(board) = Board::from_level(level) {
        println!("Initial board:\n{}\n", board);
    }

    if result.success {
        println!("Solved with {} ({} moves, {} matches):", result.strategy, result.total_moves, result.total_matches);
    } else {
        println!("Not solved with {}:", result.strategy);
    }
    if result.move_sequence.is_empty() {
        println!("  No moves made.");
    }
    for (i, mv) in result.move_sequence.iter().enumerate() {
        match result.notes.get(i).filter(|_| verbose) {
            Some(note) => println!("  {:>3}. {}  [{}] {}", i + 1, mv, note.score, note.reason),
            None => println!("  {:>3}. {}", i + 1, mv),
        }
    }
    if let Some(reason) = result.failure_reason() {
        println!("Failure: {}", reason);
    }
    if let Some(stars) = level.star_move_thresholds.first().filter(|_| result.success) {
        println!("Three-star threshold: {} moves", stars);
    }
    println!("Solve time: {:.1}ms", result.solve_time_ms);
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let level = match LevelDefinition::from_path(&args.level_file) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match solve(&args, &level) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode result: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("Level {} ({})\n", level.label(), args.level_file.display());
        print_report(&level, &result, args.verbose);
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
