use clap::Parser;
use colored::Colorize;
use quintro::{BoardLimits, BoardState, Color, DetectorConfig, Position, PotentialQuintroSet, QuintroDetector};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::{Duration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Incremental potential quintro maintenance vs full rescans", long_about = None)]
struct Args {
    /// Number of random games to play
    #[arg(long, default_value_t = 200)]
    games: u64,

    /// Board width
    #[arg(long, default_value_t = 15)]
    width: usize,

    /// Board height
    #[arg(long, default_value_t = 15)]
    height: usize,

    /// Marble colors taking turns, in move order (e.g. blue,red,green)
    #[arg(long, value_delimiter = ',', default_values_t = [Color::Blue, Color::Red, Color::Green])]
    colors: Vec<Color>,

    /// Cells played first in every game, as col,row (repeatable)
    #[arg(long = "opening", value_name = "COL,ROW")]
    opening: Vec<Position>,

    /// Seed for the first game; game i uses seed + i
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Do not count windows without any marble as potential quintros.
    #[arg(long, default_value_t = false, action = clap::ArgAction::SetTrue)]
    no_empty_runs: bool,
}

/// Move order for one game: the opening cells that fit the board, then
/// every other cell shuffled.
fn move_order(width: usize, height: usize, opening: &[Position], seed: u64) -> Vec<Position> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut order: Vec<Position> = Vec::new();
    for &position in opening {
        if position.col() < width && position.row() < height && !order.contains(&position) {
            order.push(position);
        }
    }
    let mut rest: Vec<Position> = (0..height)
        .flat_map(|row| (0..width).map(move |col| Position::new(col, row)))
        .filter(|p| !order.contains(p))
        .collect();
    rest.shuffle(&mut rng);
    order.extend(rest);
    order
}

#[derive(Debug, Default, Clone, Copy)]
struct GameRun {
    moves: usize,
    elapsed: Duration,
    mismatches: usize,
}

/// Plays one game until a quintro appears or the board fills, keeping the
/// potential set current either incrementally or by rescanning after every
/// move. With `verify`, each incremental step is checked against a rescan.
fn play(args: &Args, config: DetectorConfig, seed: u64, incremental: bool, verify: bool) -> GameRun {
    let limits = BoardLimits {
        min_size: 5,
        max_size: args.width.max(args.height).max(5),
    };
    let Ok(mut board) = BoardState::new(args.width, args.height, &limits) else {
        return GameRun::default();
    };
    let palette = if args.colors.is_empty() {
        &Color::PALETTE[..1]
    } else {
        &args.colors[..]
    };
    let mut potentials = PotentialQuintroSet::from_board(&board, config);
    let mut run = GameRun::default();
    let start = Instant::now();

    for (i, position) in move_order(args.width, args.height, &args.opening, seed).into_iter().enumerate() {
        let color = palette[i % palette.len()];
        if incremental {
            let Ok(delta) = QuintroDetector::new(&board, config).potential_quintro_delta(position, color) else {
                break;
            };
            if board.fill_cell(position, color).is_err() {
                break;
            }
            potentials.apply(&delta);
            if verify && potentials != PotentialQuintroSet::from_board(&board, config) {
                run.mismatches += 1;
            }
        } else {
            if board.fill_cell(position, color).is_err() {
                break;
            }
            potentials = PotentialQuintroSet::from_board(&board, config);
        }
        run.moves += 1;
        let won = QuintroDetector::new(&board, config)
            .quintros(position)
            .map(|q| !q.is_empty())
            .unwrap_or(false);
        if won {
            break;
        }
    }
    run.elapsed = start.elapsed();
    run
}

fn total(runs: &[GameRun]) -> GameRun {
    runs.iter().fold(GameRun::default(), |acc, r| GameRun {
        moves: acc.moves + r.moves,
        elapsed: acc.elapsed + r.elapsed,
        mismatches: acc.mismatches + r.mismatches,
    })
}

fn print_stats(name: &str, run: &GameRun) {
    let secs = run.elapsed.as_secs_f64();
    let per_move = if run.moves > 0 {
        run.elapsed.as_secs_f64() * 1e6 / run.moves as f64
    } else {
        0.0
    };
    println!("{} Results:", name.bold());
    println!("  Moves: {}", run.moves);
    println!("  Time: {:.3}s", secs);
    println!("  Per move: {:.2} µs", per_move);
}

fn main() {
    let args = Args::parse();
    let config = DetectorConfig {
        include_empty_runs: !args.no_empty_runs,
    };

    println!("Quintro Arena - Detector Benchmark");
    println!("==================================");
    println!("Board: {}x{}", args.width, args.height);
    println!("Games: {}", args.games);
    let colors: Vec<String> = args.colors.iter().map(|c| c.to_string()).collect();
    println!("Colors: {}", colors.join(","));
    if !args.opening.is_empty() {
        let opening: Vec<String> = args.opening.iter().map(|p| p.to_string()).collect();
        println!("Opening: {}", opening.join(" "));
    }
    println!("Empty runs: {}", config.include_empty_runs);
    println!("----------------------------------");

    #[cfg(debug_assertions)]
    println!(
        "{}",
        "WARNING: Running in debug mode. Performance will be significantly lower.\nUse --release for accurate benchmarks.\n"
            .yellow()
    );

    let seeds: Vec<u64> = (0..args.games).map(|i| args.seed.wrapping_add(i)).collect();

    println!("\nRunning full rescan...");
    let rescan: Vec<GameRun> = seeds.iter().map(|&s| play(&args, config, s, false, false)).collect();
    let rescan = total(&rescan);
    print_stats("Rescan", &rescan);

    println!("\nRunning incremental delta...");
    let delta: Vec<GameRun> = seeds.iter().map(|&s| play(&args, config, s, true, false)).collect();
    let delta = total(&delta);
    print_stats("Delta", &delta);

    if delta.elapsed > Duration::ZERO {
        let speedup = rescan.elapsed.as_secs_f64() / delta.elapsed.as_secs_f64();
        println!("\nSpeedup: {}", format!("{:.1}x", speedup).green().bold());
    }

    println!("\nVerifying delta against rescans...");
    #[cfg(feature = "parallel")]
    let checked: Vec<GameRun> = seeds.par_iter().map(|&s| play(&args, config, s, true, true)).collect();
    #[cfg(not(feature = "parallel"))]
    let checked: Vec<GameRun> = seeds.iter().map(|&s| play(&args, config, s, true, true)).collect();
    let checked = total(&checked);

    if checked.mismatches == 0 {
        println!("{} {} moves verified", "OK".green().bold(), checked.moves);
    } else {
        println!(
            "{} {} of {} moves diverged from a full rescan",
            "MISMATCH".red().bold(),
            checked.mismatches,
            checked.moves
        );
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_colors_and_opening() {
        let args = Args::try_parse_from([
            "benchmark",
            "--colors",
            "Red,purple",
            "--opening",
            "7,7",
            "--opening",
            "8, 8",
        ])
        .unwrap();
        assert_eq!(args.colors, vec![Color::Red, Color::Purple]);
        assert_eq!(args.opening, vec![Position::new(7, 7), Position::new(8, 8)]);

        assert!(Args::try_parse_from(["benchmark", "--colors", "magenta"]).is_err());
        assert!(Args::try_parse_from(["benchmark", "--opening", "7"]).is_err());
    }

    #[test]
    fn test_opening_is_played_first() {
        let opening = [Position::new(2, 2), Position::new(9, 9), Position::new(2, 2)];
        let order = move_order(5, 5, &opening, 7);
        assert_eq!(order.len(), 25);
        assert_eq!(order[0], Position::new(2, 2));
        assert_eq!(order.iter().filter(|&&p| p == Position::new(2, 2)).count(), 1);
    }
}
