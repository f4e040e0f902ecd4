use clap::Parser;
use sort_resort_solver::complexity::{analyze_level, analyze_level_with, ComplexityResult, DifficultyTier};
use sort_resort_solver::level::LevelDefinition;
use sort_resort_solver::solver::{solve_level_best, DEFAULT_NOISE_MAGNITUDE};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Rate from the best of all strategies instead of a single clean solve
    #[clap(short, long)]
    best: bool,

    /// Noise restarts per strategy when using --best
    #[clap(long, default_value_t = 3)]
    noise_runs: u32,

    /// Print the reports as JSON instead of tables
    #[clap(long)]
    json: bool,

    /// Level JSON files, or directories containing them
    #[clap(required = true)]
    paths: Vec<PathBuf>,
}

/// Expands directories into their `.json` files, sorted by name.
fn collect_level_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let entries = fs::read_dir(path)
            .map_err(|e| format!("Failed to read directory {}: {}", path.display(), e))?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn rate(path: &Path, args: &Args) -> Result<ComplexityResult, String> {
    let level = LevelDefinition::from_path(path).map_err(|e| e.to_string())?;
    Ok(if args.best {
        analyze_level_with(&level, &solve_level_best(&level, args.noise_runs, DEFAULT_NOISE_MAGNITUDE))
    } else {
        analyze_level(&level)
    })
}

fn print_world(world: &str, reports: &[ComplexityResult]) {
    println!("\n=== World: {} ({} levels) ===", if world.is_empty() { "-" } else { world }, reports.len());
    println!(
        "{:<16} {:>6} {:>7} {:>5} {:>7} {:>7} {:>7}  {:<8} {}",
        "Level", "Moves", "Matches", "Temp", "Struct", "Solver", "Total", "Tier", "Stars"
    );
    for r in reports {
        let stars = r
            .star_move_thresholds
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("/");
        let moves = if r.solver.solved {
            r.solver.moves.to_string()
        } else {
            format!("{}!", r.solver.moves)
        };
        println!(
            "{:<16} {:>6} {:>7} {:>5} {:>7.1} {:>7.1} {:>7.1}  {:<8} {}",
            r.name,
            moves,
            r.solver.matches,
            r.solver.temporary_moves,
            r.structure_score,
            r.solver_score,
            r.total_score,
            r.tier,
            stars
        );
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let files = match collect_level_files(&args.paths) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut worlds: BTreeMap<String, Vec<ComplexityResult>> = BTreeMap::new();
    let mut errors = 0;
    for file in &files {
        match rate(file, &args) {
            Ok(report) => worlds.entry(report.world_id.clone()).or_default().push(report),
            Err(e) => {
                eprintln!("Skipping {}: {}", file.display(), e);
                errors += 1;
            }
        }
    }

    if args.json {
        let all: Vec<&ComplexityResult> = worlds.values().flatten().collect();
        match serde_json::to_string_pretty(&all) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode reports: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        for (world, reports) in &mut worlds {
            reports.sort_by_key(|r| r.level_id);
            print_world(world, reports);
        }

        let mut tiers: BTreeMap<DifficultyTier, usize> = BTreeMap::new();
        for report in worlds.values().flatten() {
            *tiers.entry(report.tier).or_default() += 1;
        }
        let unsolved = worlds.values().flatten().filter(|r| !r.solver.solved).count();
        println!("\n--- Summary ---");
        println!("Levels rated: {}, unsolved: {}, unreadable: {}", files.len() - errors, unsolved, errors);
        for (tier, count) in &tiers {
            println!("  {:<8}: {}", tier, count);
        }
    }

    if errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
