use super::*;

use pyramid_common::action::Action;
use pyramid_common::board::{Board, PAIR_SUM, PYRAMID_SIZE};

use anyhow::{Context, Result, anyhow, bail};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    collections::hash_map::Entry,
    thread,
    time::{Duration, Instant},
};

/// The search recurses once per move, and long runs of draws between
/// removals make for deep paths.
const SEARCH_STACK_SIZE: usize = 256 * 1024 * 1024;

pub fn solve(board: Board, options: SolveOptions) -> Result<SolveResult> {
    let mut solver = Solver::new(options);
    solver.set_board(board);
    solver.solve()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveOptions {
    /// Max states to expand before giving up on exhausting the search.
    pub max_states: u64,
    /// Skip states already reached with at least as many cards removed. When
    /// off, only states repeated along the current line are cut.
    pub memoize: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_states: 100_000_000,
            memoize: true,
        }
    }
}

/// Best line found below a node: the last move of the line and the number of
/// pyramid cards it removes.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    moves: MoveRef,
    removed: usize,
}

/// Depth-first solver keeping the line that removes the most pyramid cards.
#[derive(Debug, Clone)]
pub struct Solver {
    options: SolveOptions,
    initial_board: Board,
    tree: MoveTree,
    visited: FxHashMap<StateKey, u8>,
    path: FxHashSet<StateKey>,
    states: u64,
    halted: bool,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolveOptions::default())
    }
}

impl Solver {
    pub fn new(options: SolveOptions) -> Self {
        Self {
            options,
            initial_board: Board::default(),
            tree: MoveTree::new(),
            visited: FxHashMap::default(),
            path: FxHashSet::default(),
            states: 0,
            halted: false,
        }
    }

    pub fn set_board(&mut self, board: Board) {
        self.initial_board = board;
        self.reset();
    }

    pub fn solve(&mut self) -> Result<SolveResult> {
        if !self.initial_board.is_valid() {
            bail!("Invalid initial board state.");
        }
        self.reset();

        let root = GameState::new(self.initial_board.clone());
        log::debug!(
            "searching from {} pyramid cards, {} in deck, {} in waste",
            PYRAMID_SIZE - root.removed_count(),
            root.board.stock.len(),
            root.board.waste.len()
        );

        let timer = Instant::now();
        let outcome = thread::scope(|scope| -> Result<Outcome> {
            thread::Builder::new()
                .name("pyramid-search".into())
                .stack_size(SEARCH_STACK_SIZE)
                .spawn_scoped(scope, || self.search(&root))
                .context("Failed to spawn the search thread")?
                .join()
                .map_err(|_| anyhow!("The search thread panicked"))
        })?;
        let elapsed = timer.elapsed();

        if self.halted {
            log::warn!(
                "stopped after {} states; the best line may not be optimal",
                self.states
            );
        }
        log::info!(
            "removed {}/{PYRAMID_SIZE} pyramid cards, {} states, {} visited, {elapsed:?}",
            outcome.removed,
            self.states,
            self.visited.len()
        );

        Ok(SolveResult {
            removed: outcome.removed,
            actions: self.tree.copy(outcome.moves),
            states: self.states,
            elapsed,
            complete: !self.halted,
        })
    }

    fn search(&mut self, state: &GameState) -> Outcome {
        let removed = state.removed_count();
        let best = Outcome {
            moves: state.moves,
            removed,
        };
        if state.is_complete() {
            return best;
        }

        let key = state.signature();
        if self.options.memoize {
            match self.visited.entry(key) {
                Entry::Occupied(mut entry) => {
                    if *entry.get() as usize >= removed {
                        return best;
                    }
                    entry.insert(removed as u8);
                }
                Entry::Vacant(entry) => {
                    entry.insert(removed as u8);
                }
            }
        } else if !self.path.insert(key) {
            // Draws and recycles led back to a state on this line.
            return best;
        }

        let best = self.expand(state, best);
        if !self.options.memoize {
            self.path.remove(&key);
        }
        best
    }

    fn expand(&mut self, state: &GameState, mut best: Outcome) -> Outcome {
        if self.states >= self.options.max_states {
            self.halted = true;
            return best;
        }
        self.states += 1;

        let exposed = state.exposed();

        // Kings leave on their own.
        for &slot in exposed.iter().filter(|slot| slot.card.is_king()) {
            if self.descend(state, Action::RemoveKing(slot), &mut best) {
                return best;
            }
        }

        for (i, &a) in exposed.iter().enumerate() {
            for &b in &exposed[i + 1..] {
                if a.value() + b.value() == PAIR_SUM
                    && self.descend(state, Action::RemovePair(a, b), &mut best)
                {
                    return best;
                }
            }
        }

        if let Some(&top) = state.board.waste.last() {
            for &slot in &exposed {
                if top.value() + slot.value() == PAIR_SUM
                    && self.descend(state, Action::RemoveWithWaste(top, slot), &mut best)
                {
                    return best;
                }
            }
        }

        if let Some(&card) = state.board.stock.first() {
            let action = if card.is_king() {
                Action::DrawKing(card)
            } else {
                Action::Draw(card)
            };
            if self.descend(state, action, &mut best) {
                return best;
            }
        } else if !state.board.waste.is_empty() && self.descend(state, Action::Recycle, &mut best)
        {
            return best;
        }

        best
    }

    /// Explores the child reached by `action` and keeps its line when it beats
    /// `best`. Returns true when the search should unwind: the pyramid has been
    /// cleared or the state limit was hit.
    fn descend(&mut self, state: &GameState, action: Action, best: &mut Outcome) -> bool {
        let mark = self.tree.len();
        let moves = self.tree.push(state.moves, action);
        let child = state.next(&action, moves);
        let outcome = self.search(&child);
        if outcome.removed > best.removed {
            *best = outcome;
        } else {
            // Nothing below is referenced by the best line.
            self.tree.truncate(mark);
        }
        best.removed == PYRAMID_SIZE || self.halted
    }

    fn reset(&mut self) {
        self.tree.clear();
        self.visited.clear();
        self.path.clear();
        self.states = 0;
        self.halted = false;
    }
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Pyramid cards removed by `actions`; drawn Kings are not counted.
    pub removed: usize,
    pub actions: Vec<Action>,
    pub states: u64,
    pub elapsed: Duration,
    /// False when the search stopped at `max_states` before exhausting the tree.
    pub complete: bool,
}

impl SolveResult {
    pub fn is_cleared(&self) -> bool {
        self.removed == PYRAMID_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pyramid_common::board::{Card, Pyramid, Slot, slot_index};

    const SAMPLE_DEAL: &str = "jd 6h 4c 6c ac 3h 7c 2h jh 10s 8c ah qh 3d qd 2d 8s qc jc 4h 5s js 2s 3c 4d 7h 9c 5h 8h as 6d kd 5c kc 10d 8d 3s 9h ad kh 9d qs 7d 4s 9s 10h 10c ks 6s 5d 7s 2c";

    fn card(token: &str) -> Card {
        Card::parse(token).unwrap()
    }

    fn position(pyramid: &[(usize, usize, &str)], stock: &[&str]) -> Board {
        let mut slots = [None; PYRAMID_SIZE];
        for &(row, col, token) in pyramid {
            slots[slot_index(row, col)] = Some(card(token));
        }
        Board {
            pyramid: Pyramid::from_slots(slots),
            stock: stock.iter().map(|token| card(token)).collect(),
            ..Default::default()
        }
    }

    fn options(max_states: u64, memoize: bool) -> SolveOptions {
        SolveOptions {
            max_states,
            memoize,
        }
    }

    /// Replays `actions` with full legality checks and returns the final board.
    fn replay(board: &Board, actions: &[Action]) -> Board {
        let mut board = board.clone();
        for (i, action) in actions.iter().enumerate() {
            if let Err(err) = board.apply(action) {
                panic!("move {i} is illegal: {err:#}");
            }
        }
        board
    }

    #[test]
    fn test_solve() {
        let board = Board::parse(SAMPLE_DEAL).unwrap();
        let result = solve(board.clone(), options(200_000, true)).unwrap();
        assert!(result.removed <= PYRAMID_SIZE);
        assert!(result.states <= 200_000);

        let end = replay(&board, &result.actions);
        assert_eq!(end.pyramid.removed_count(), result.removed);
        assert_eq!(
            result.actions.iter().map(Action::pyramid_cards).sum::<usize>(),
            result.removed
        );
        if result.is_cleared() {
            assert!(end.pyramid.is_complete());
        }
    }

    #[test]
    fn test_solve_seeded_deals() {
        for seed in [1, 42, 283409412] {
            let board = Board::new_from_seed(seed);
            let result = solve(board.clone(), options(50_000, true)).unwrap();
            let end = replay(&board, &result.actions);
            assert_eq!(end.pyramid.removed_count(), result.removed);
            assert_eq!(end.pyramid.is_complete(), result.is_cleared());
        }
    }

    #[test]
    fn test_apex_king() {
        let board = position(&[(0, 0, "kh")], &[]);
        let result = solve(board, SolveOptions::default()).unwrap();
        assert!(result.is_cleared());
        assert!(result.complete);
        assert_eq!(result.states, 1);
        assert_eq!(
            result.actions,
            [Action::RemoveKing(Slot::new(0, 0, card("kh")))]
        );
    }

    #[test]
    fn test_no_moves() {
        let board = position(&[(6, 0, "2c"), (6, 1, "3d"), (5, 0, "9h")], &[]);
        let result = solve(board, SolveOptions::default()).unwrap();
        assert_eq!(result.removed, PYRAMID_SIZE - 3);
        assert!(result.actions.is_empty());
        assert_eq!(result.states, 1);
        assert!(result.complete);
    }

    #[test]
    fn test_drawn_king_is_not_counted() {
        let board = position(&[(6, 0, "5c")], &["ks"]);
        let result = solve(board, SolveOptions::default()).unwrap();
        assert_eq!(result.removed, PYRAMID_SIZE - 1);
        assert!(result.actions.is_empty());
        assert!(!result.is_cleared());
    }

    #[test]
    fn test_waste_pairing() {
        let board = position(&[(6, 0, "5c")], &["ks", "8d"]);
        let result = solve(board.clone(), SolveOptions::default()).unwrap();
        assert!(result.is_cleared());
        assert_eq!(
            result.actions,
            [
                Action::DrawKing(card("ks")),
                Action::Draw(card("8d")),
                Action::RemoveWithWaste(card("8d"), Slot::new(6, 0, card("5c"))),
            ]
        );
        assert!(replay(&board, &result.actions).pyramid.is_complete());
    }

    #[test]
    fn test_recycle() {
        // The Jack is buried under the Three on the first pass.
        let board = position(&[(6, 0, "5c"), (5, 0, "2h")], &["jd", "3c", "8d"]);
        let result = solve(board.clone(), SolveOptions::default()).unwrap();
        assert!(result.is_cleared());
        assert!(result.actions.iter().any(Action::is_recycle));
        assert!(replay(&board, &result.actions).pyramid.is_complete());
    }

    #[test]
    fn test_pairs_bottom_row_first() {
        let board = position(&[(6, 0, "6c"), (6, 1, "7d"), (5, 0, "kd")], &[]);
        let result = solve(board.clone(), SolveOptions::default()).unwrap();
        assert!(result.is_cleared());
        assert_eq!(
            result.actions,
            [
                Action::RemovePair(Slot::new(6, 0, card("6c")), Slot::new(6, 1, card("7d"))),
                Action::RemoveKing(Slot::new(5, 0, card("kd"))),
            ]
        );
    }

    #[test]
    fn test_memoize_is_safe() {
        for seed in 1..=6 {
            let mut board = Board::new_from_seed(seed);
            board.stock.clear();

            let pruned = solve(board.clone(), options(u64::MAX, true)).unwrap();
            let full = solve(board.clone(), options(2_000_000, false)).unwrap();
            assert!(pruned.complete);
            assert!(pruned.removed >= full.removed, "seed {seed}");
            if full.complete {
                assert_eq!(pruned.removed, full.removed, "seed {seed}");
                assert!(pruned.states <= full.states, "seed {seed}");
            }
            replay(&board, &pruned.actions);
        }
    }

    #[test]
    fn test_memoize_is_safe_with_deck() {
        // Only the Jack of Diamonds ever pairs, and it passes the waste top
        // on every trip through the deck.
        let full_deck = position(
            &[(6, 0, "2c"), (6, 1, "3d"), (5, 0, "9h")],
            &[
                "ac", "ad", "ah", "as", "5c", "5d", "5h", "5s", "6c", "6d", "6h", "6s", "jd",
                "7c", "7d", "7h", "7s", "8c", "8d", "8h", "8s", "2h", "3s", "ks",
            ],
        );
        assert_eq!(full_deck.stock.len(), 24);
        let recycled = position(&[(6, 0, "5c"), (5, 0, "2h")], &["jd", "3c", "8d"]);
        let crowded = position(
            &[(6, 0, "4c"), (6, 1, "qd"), (6, 2, "ah"), (5, 0, "9s"), (5, 1, "kc")],
            &["9d", "4h", "as", "qs", "2d", "jc"],
        );

        for board in [full_deck, recycled, crowded] {
            let pruned = solve(board.clone(), options(u64::MAX, true)).unwrap();
            let full = solve(board.clone(), options(1_000_000, false)).unwrap();
            assert!(pruned.complete);
            assert!(full.complete);
            assert_eq!(pruned.removed, full.removed);
            assert!(pruned.states <= full.states);
            assert!(pruned.actions.iter().any(Action::is_draw));
            let end = replay(&board, &pruned.actions);
            assert_eq!(end.pyramid.removed_count(), pruned.removed);
            replay(&board, &full.actions);
        }
    }

    #[test]
    fn test_no_memo_full_deal_terminates() {
        let board = Board::new_from_seed(1);
        assert_eq!(board.stock.len(), 24);
        let result = solve(board.clone(), options(200_000, false)).unwrap();
        assert!(result.states <= 200_000);
        let end = replay(&board, &result.actions);
        assert_eq!(end.pyramid.removed_count(), result.removed);
    }

    #[test]
    fn test_apex_king_full_deal() {
        let mut tokens: Vec<&str> = SAMPLE_DEAL.split_whitespace().collect();
        let king = tokens.iter().position(|&token| token == "kh").unwrap();
        tokens.swap(0, king);
        let board = Board::parse(&tokens.join(" ")).unwrap();
        assert_eq!(board.pyramid.get(0, 0), Some(card("kh")));

        let result = solve(board.clone(), options(200_000, true)).unwrap();
        replay(&board, &result.actions);
        // The apex is the only King left in the pyramid.
        let kings: Vec<Action> = result
            .actions
            .iter()
            .copied()
            .filter(|action| matches!(action, Action::RemoveKing(_)))
            .collect();
        if let Some(&first) = kings.first() {
            assert_eq!(first, Action::RemoveKing(Slot::new(0, 0, card("kh"))));
        }
        assert_eq!(kings.len(), usize::from(result.is_cleared()));
    }

    #[test]
    fn test_max_states() {
        let board = Board::parse(SAMPLE_DEAL).unwrap();
        let result = solve(board.clone(), options(10, true)).unwrap();
        assert!(!result.complete);
        assert_eq!(result.states, 10);
        let end = replay(&board, &result.actions);
        assert_eq!(end.pyramid.removed_count(), result.removed);
    }

    #[test]
    fn test_invalid_board() {
        let mut board = Board::parse(SAMPLE_DEAL).unwrap();
        board.waste.push(card("jd"));
        assert!(solve(board, SolveOptions::default()).is_err());
    }

    #[test]
    fn test_solver_reuse() {
        let mut solver = Solver::default();
        solver.set_board(position(&[(6, 0, "5c")], &["8d"]));
        let first = solver.solve().unwrap();
        let second = solver.solve().unwrap();
        assert_eq!(first.actions, second.actions);
        assert_eq!(first.states, second.states);
    }
}
