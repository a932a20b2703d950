//! Peg Siege headless runner
//!
//! Plays one match to completion without rendering and logs the outcome.
//!
//! Usage: `peg-siege [players] [tuning.json]`

#[cfg(not(target_arch = "wasm32"))]
use peg_siege::{
    SimError, Tuning,
    consts::*,
    sim::{GameState, TickInput, run_frame},
};

/// Give up on matches that never resolve (about an hour at 60 fps x10)
#[cfg(not(target_arch = "wasm32"))]
const MAX_TICKS: u64 = 2_000_000;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Browser builds drive `GameState` from the host page
}

/// Parse the player-count argument, naming the bad input on failure
#[cfg(not(target_arch = "wasm32"))]
fn parse_player_count(arg: &str) -> Result<usize, String> {
    arg.trim().parse::<usize>().map_err(|e| {
        format!(
            "Player count must be a number in {}..={}, got {:?} ({})",
            MIN_PLAYERS, MAX_PLAYERS, arg, e
        )
    })
}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> Result<(), SimError> {
    let mut args = std::env::args().skip(1);
    let players = match args.next() {
        Some(arg) => match parse_player_count(&arg) {
            Ok(count) => count,
            Err(msg) => {
                log::error!("{}", msg);
                std::process::exit(2);
            }
        },
        None => 4,
    };
    let tuning = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| SimError::InvalidTuning(format!("{}: {}", path, e)))?;
            Tuning::from_json(&json)?
        }
        None => Tuning::default(),
    };

    let mut state = GameState::new(tuning)?;
    state.setup(players)?;
    log::info!("Peg Siege starting: {} players", players);

    let input = TickInput::default();
    while state.winner.is_none() && state.time_ticks < MAX_TICKS {
        run_frame(&mut state, &input, MAX_SPEED_MULTIPLIER);
        if state.time_ticks % 6000 == 0 {
            log::info!(
                "tick {}: phase {:?}, {} alive, {} units",
                state.time_ticks,
                state.phase,
                state.alive_count(),
                state.units.len()
            );
        }
    }

    match state.winner {
        Some(id) => log::info!("Player {} won after {} ticks", id, state.time_ticks),
        None => log::warn!("No winner after {} ticks", state.time_ticks),
    }
    for p in &state.players {
        log::info!(
            "Player {} ({}): territory {}, score {}, best streak {}, {}",
            p.id,
            p.color,
            state.territory_counts.get(p.id as usize).copied().unwrap_or(0),
            state.scores.get(p.id as usize).copied().unwrap_or(0),
            p.best_streak,
            if p.alive { "alive" } else { "eliminated" }
        );
    }
    Ok(())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_player_count() {
        assert_eq!(parse_player_count("4"), Ok(4));
        assert_eq!(parse_player_count(" 3 "), Ok(3));
    }

    #[test]
    fn test_parse_player_count_names_bad_input() {
        let err = parse_player_count("four").unwrap_err();
        assert!(err.contains("\"four\""), "{}", err);
        assert!(err.contains("2..=8"), "{}", err);
    }
}
