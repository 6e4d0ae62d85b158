use crate::board::{Card, Slot};

use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    RemoveKing(Slot),
    RemovePair(Slot, Slot),
    RemoveWithWaste(Card, Slot), // (waste top, pyramid card)
    Draw(Card),
    DrawKing(Card),
    Recycle,
}

impl Action {
    pub fn is_draw(&self) -> bool {
        matches!(self, Action::Draw(_) | Action::DrawKing(_))
    }

    pub fn is_recycle(&self) -> bool {
        matches!(self, Action::Recycle)
    }

    /// Number of pyramid cards this action takes off the board.
    pub fn pyramid_cards(&self) -> usize {
        match self {
            Action::RemoveKing(_) | Action::RemoveWithWaste(..) => 1,
            Action::RemovePair(..) => 2,
            Action::Draw(_) | Action::DrawKing(_) | Action::Recycle => 0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RemoveKing(slot) => write!(
                f,
                "Remove {} from pyramid at ({},{})",
                slot.card.name(),
                slot.row,
                slot.col
            ),
            Action::RemovePair(a, b) => write!(
                f,
                "Remove pair from pyramid: {} at ({},{}) and {} at ({},{})",
                a.card.name(),
                a.row,
                a.col,
                b.card.name(),
                b.row,
                b.col
            ),
            Action::RemoveWithWaste(card, slot) => write!(
                f,
                "Remove waste card {} and pyramid card {} at ({},{})",
                card.name(),
                slot.card.name(),
                slot.row,
                slot.col
            ),
            Action::Draw(card) => write!(f, "Draw card from deck: {}", card.name()),
            Action::DrawKing(card) => write!(f, "Draw and remove King from deck: {}", card.name()),
            Action::Recycle => write!(f, "Recycle waste into deck"),
        }
    }
}

/// Compact notation: `K6.3` King at row 6 col 3, `6.2+6.4` pair, `W+5.1`
/// waste pairing, `D`/`3D` draws, `DK` a drawn King, `R` recycle.
pub fn format_actions(actions: &[Action]) -> String {
    let mut list = vec![];
    let mut i = 0;
    while i < actions.len() {
        match actions[i] {
            Action::Draw(_) => {
                let mut count = 1;
                while i + count < actions.len() && matches!(actions[i + count], Action::Draw(_)) {
                    count += 1;
                }
                let str = if count == 1 {
                    "D".into()
                } else {
                    format!("{count}D")
                };
                list.push(str);
                i += count;
                continue;
            }
            Action::DrawKing(_) => {
                list.push("DK".into());
            }
            Action::RemoveKing(slot) => {
                list.push(format!("K{}.{}", slot.row, slot.col));
            }
            Action::RemovePair(a, b) => {
                list.push(format!("{}.{}+{}.{}", a.row, a.col, b.row, b.col));
            }
            Action::RemoveWithWaste(_, slot) => {
                list.push(format!("W+{}.{}", slot.row, slot.col));
            }
            Action::Recycle => {
                list.push("R".into());
            }
        }
        i += 1;
    }

    let mut output = String::new();
    let max_width = list.iter().map(|s| s.len()).max().unwrap_or_default() + 1;
    for chunk in list.chunks(10) {
        for cmd in chunk {
            output.push_str(&format!("{cmd:<width$}", width = max_width));
        }
        output.push('\n');
    }

    output
}
