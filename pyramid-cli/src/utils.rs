use anyhow::Result;
use pyramid_common::{
    action::Action,
    board::{Board, PYRAMID_SIZE},
};
use pyramid_solver::{SolveOptions, SolveResult, solve};

use std::{
    io::{IsTerminal, Write, stderr},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

pub fn do_solve(board: Board, options: SolveOptions) -> Result<Vec<Action>> {
    let board_str = board.pretty_print();
    println!("{board_str}\n");
    let label = search_label(&options);
    let result = with_spinner(&label, move || solve(board, options))?;
    println!("{}\n", summarize(&result));
    Ok(result.actions)
}

/// Replays the solution on `board`, describing every move.
pub fn print_steps(mut board: Board, actions: &[Action]) -> Result<()> {
    let actions_count = actions.len();
    for (index, action) in actions.iter().enumerate() {
        board.apply(action)?;
        println!("{:03}/{actions_count:03} {action}", index + 1);
    }
    Ok(())
}

fn summarize(result: &SolveResult) -> String {
    let SolveResult {
        removed,
        actions,
        states,
        elapsed,
        complete,
    } = result;
    let draw_count = actions.iter().filter(|a| a.is_draw()).count();
    let recycle_count = actions.iter().filter(|a| a.is_recycle()).count();
    let mut steps_str = format!(
        "{} Moves, {draw_count} Draws",
        actions.len() - draw_count - recycle_count
    );
    if recycle_count > 0 {
        steps_str.push_str(&format!(", {recycle_count} Recycle"));
        if recycle_count > 1 {
            steps_str.push('s');
        }
    }
    let mark = if result.is_cleared() { '✓' } else { '✗' };
    let elapsed_str = format_elapsed(*elapsed);
    format!(
        "{mark} Removed {removed} of {PYRAMID_SIZE} pyramid cards in {steps_str}. Exhaustive: {complete}, Time: {elapsed_str}, States: {states}"
    )
}

/// Spinner label naming the search about to run.
fn search_label(options: &SolveOptions) -> String {
    let pruning = if options.memoize {
        "pruning repeats"
    } else {
        "no pruning"
    };
    format!(
        "Searching, {pruning}, up to {} states",
        options.max_states
    )
}

/// Runs `f` while a spinner with the running time ticks on stderr.
fn with_spinner<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    if !stderr().is_terminal() {
        return f();
    }
    let done = AtomicBool::new(false);
    let started = Instant::now();
    thread::scope(|scope| {
        scope.spawn(|| {
            // Lock per frame so log records from the search still get through.
            let _ = write!(stderr(), "\x1b[?25l");
            for frame in ['|', '/', '-', '\\'].iter().cycle() {
                if done.load(Ordering::Relaxed) {
                    break;
                }
                let mut err = stderr().lock();
                let _ = write!(
                    err,
                    "\r{frame} {label} ({})\x1b[K",
                    format_elapsed(started.elapsed())
                );
                let _ = err.flush();
                drop(err);
                thread::sleep(Duration::from_millis(100));
            }
            let _ = write!(stderr(), "\r\x1b[2K\x1b[?25h");
        });
        let value = f();
        done.store(true, Ordering::Relaxed);
        value
    })
}

fn format_elapsed(elapsed: Duration) -> String {
    match elapsed.as_secs() {
        0 => format!("{}ms", elapsed.as_millis()),
        secs @ 1..60 => format!("{secs}.{:02}s", elapsed.subsec_millis() / 10),
        secs @ 60..3600 => format!("{}m {:02}s", secs / 60, secs % 60),
        secs => format!("{}h {:02}m", secs / 3600, secs % 3600 / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pyramid_common::board::Card;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(480)), "480ms");
        assert_eq!(format_elapsed(Duration::from_millis(1_257)), "1.25s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_elapsed(Duration::from_secs(7_260)), "2h 01m");
    }

    #[test]
    fn test_search_label() {
        let options = SolveOptions {
            max_states: 5_000,
            memoize: false,
        };
        assert_eq!(
            search_label(&options),
            "Searching, no pruning, up to 5000 states"
        );
        assert!(search_label(&SolveOptions::default()).contains("pruning repeats"));
    }

    #[test]
    fn test_summarize() {
        let card = |id| Card::new_with_id(id);
        let result = SolveResult {
            removed: 26,
            actions: vec![Action::Draw(card(1)), Action::Recycle, Action::Draw(card(1))],
            states: 12,
            elapsed: Duration::from_millis(5),
            complete: true,
        };
        assert_eq!(
            summarize(&result),
            "✗ Removed 26 of 28 pyramid cards in 0 Moves, 2 Draws, 1 Recycle. Exhaustive: true, Time: 5ms, States: 12"
        );
    }

    #[test]
    fn test_print_steps_rejects_illegal_move() {
        let board = Board::new_from_seed(7);
        assert!(print_steps(board.clone(), &[Action::Recycle]).is_err());
        let front = board.stock[0];
        let draw = if front.is_king() {
            Action::DrawKing(front)
        } else {
            Action::Draw(front)
        };
        assert!(print_steps(board, &[draw]).is_ok());
    }
}
