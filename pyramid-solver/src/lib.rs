//! This crate provides an exhaustive depth-first solver for Pyramid Solitaire.
//!
//! The search explores every legal move from a deal, prunes states it has
//! already reached, and returns the line of play that clears the most pyramid
//! cards.
mod move_;
mod solver;
mod state;

use crate::move_::*;

pub use crate::solver::{SolveOptions, SolveResult, Solver, solve};
pub use crate::state::{GameState, StateKey};
