use super::*;

use pyramid_common::action::Action;
use pyramid_common::board::{Board, Exposed, PYRAMID_SIZE, STOCK_SIZE};

use std::cmp::Reverse;

const EMPTY_SLOT: u8 = u8::MAX;
const UNUSED: u8 = u8::MAX - 1;
const KEY_SIZE: usize = PYRAMID_SIZE + 2 + STOCK_SIZE;

/// Canonical encoding of a state: one byte per pyramid slot in row-major
/// order (card id, or `0xff` once removed), the deck and waste lengths, then
/// the deck and waste cards in order. Slot positions are fixed, so every row
/// occupies the same bytes in every key.
pub type StateKey = [u8; KEY_SIZE];

/// A node of the search. Transitions build a new state and leave this one
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub(crate) moves: MoveRef,
}

impl GameState {
    pub fn new(board: Board) -> Self {
        Self { board, moves: ROOT }
    }

    #[inline]
    pub fn removed_count(&self) -> usize {
        self.board.pyramid.removed_count()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.board.pyramid.is_complete()
    }

    /// Exposed pyramid cards, bottom row first.
    pub fn exposed(&self) -> Exposed {
        let mut exposed = self.board.pyramid.exposed();
        exposed.sort_by_key(|slot| Reverse(slot.row));
        exposed
    }

    /// The state reached by playing `action`, recorded under `moves`.
    pub fn next(&self, action: &Action, moves: MoveRef) -> Self {
        let mut board = self.board.clone();
        board.play(action);
        Self { board, moves }
    }

    pub fn signature(&self) -> StateKey {
        let mut key = [UNUSED; KEY_SIZE];
        for (byte, slot) in key.iter_mut().zip(self.board.pyramid.slots()) {
            *byte = slot.map_or(EMPTY_SLOT, |card| card.id());
        }
        key[PYRAMID_SIZE] = self.board.stock.len() as u8;
        key[PYRAMID_SIZE + 1] = self.board.waste.len() as u8;
        let talon = self.board.stock.iter().chain(self.board.waste.iter());
        for (byte, card) in key[PYRAMID_SIZE + 2..].iter_mut().zip(talon) {
            *byte = card.id();
        }
        key
    }
}
