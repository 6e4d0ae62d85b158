use crate::action::Action;

use anyhow::{Context, Result, bail, ensure};
use smallvec::SmallVec;

pub const PYRAMID_ROWS: usize = 7;
pub const PYRAMID_SIZE: usize = PYRAMID_ROWS * (PYRAMID_ROWS + 1) / 2;
pub const STOCK_SIZE: usize = 24;
pub const DECK_SIZE: usize = PYRAMID_SIZE + STOCK_SIZE;
pub const MAX_RANK: u8 = 13;
pub const MAX_SUIT: u8 = 4;
pub const MAX_CARD: u8 = MAX_SUIT * MAX_RANK;
/// Two cards can be removed together when their values add up to this.
pub const PAIR_SUM: u8 = 13;

const SUITS: [char; 5] = ['♣', '♦', '♥', '♠', '?'];
const SUIT_LETTERS: [char; 4] = ['c', 'd', 'h', 's'];
const SUIT_NAMES: [&str; 4] = ["Clubs", "Diamonds", "Hearts", "Spades"];
const RANKS: [char; 14] = [
    'A', '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', '?',
];
const RANK_TOKENS: [&str; 13] = [
    "a", "2", "3", "4", "5", "6", "7", "8", "9", "10", "j", "q", "k",
];
const RANK_NAMES: [&str; 13] = [
    "Ace", "2", "3", "4", "5", "6", "7", "8", "9", "10", "Jack", "Queen", "King",
];

pub type Talon = SmallVec<[Card; STOCK_SIZE]>;
pub type Exposed = SmallVec<[Slot; PYRAMID_ROWS]>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub pyramid: Pyramid,
    pub stock: Talon,
    pub waste: Talon,
}

impl Board {
    /// Deals a validated 52-card sequence: the first 28 cards build the pyramid
    /// row by row, the remaining 24 become the deck in draw order.
    pub fn new_from_cards(cards: &[Card]) -> Result<Self> {
        validate_deal(cards)?;
        Ok(Self::deal(cards))
    }

    pub fn new_from_seed(seed: u32) -> Self {
        let mut current_seed = seed.max(1);
        let mut rnd = || {
            current_seed = ((current_seed as u64 * 16807) % 0x7fffffff) as u32;
            current_seed
        };
        let mut deck: [Card; DECK_SIZE] = std::array::from_fn(|i| Card::new_with_id(i as u8));

        for _ in 0..7 {
            for j in 0..DECK_SIZE {
                let k = (rnd() as usize) % DECK_SIZE;
                deck.swap(j, k);
            }
        }

        Self::deal(&deck)
    }

    fn deal(cards: &[Card]) -> Self {
        Self {
            pyramid: Pyramid::new(&cards[..PYRAMID_SIZE]),
            stock: cards[PYRAMID_SIZE..].iter().copied().collect(),
            waste: Talon::new(),
        }
    }

    /// Parses a whitespace separated card sequence such as `"jd 6h 4c ..."`.
    /// Anything after a `#` on a line is ignored.
    pub fn parse(content: &str) -> Result<Self> {
        let cards = content
            .lines()
            .filter_map(|line| line.split('#').next())
            .flat_map(str::split_whitespace)
            .map(|token| Card::parse(token).with_context(|| format!("Failed to parse '{token}'")))
            .collect::<Result<Vec<_>>>()?;
        Self::new_from_cards(&cards)
    }

    /// Checks that every card on the board is known and appears at most once,
    /// and that the talon fits in the deck.
    pub fn is_valid(&self) -> bool {
        if self.stock.len() + self.waste.len() > STOCK_SIZE {
            return false;
        }

        let mut seen = [false; MAX_CARD as usize];
        let mut check_cards = |cards: &mut dyn Iterator<Item = Card>| -> bool {
            for card in cards {
                if card.is_unknown() {
                    return false;
                }
                let id = card.id() as usize;
                if seen[id] {
                    return false;
                }
                seen[id] = true;
            }
            true
        };

        check_cards(&mut self.pyramid.cards())
            && check_cards(&mut self.stock.iter().copied())
            && check_cards(&mut self.waste.iter().copied())
    }

    pub fn need_recycle(&self) -> bool {
        self.stock.is_empty() && !self.waste.is_empty()
    }

    /// Draws the front card of the deck. A King is discarded right away,
    /// any other card goes on top of the waste.
    pub fn draw(&mut self) -> Option<Card> {
        if self.stock.is_empty() {
            return None;
        }
        let card = self.stock.remove(0);
        if !card.is_king() {
            self.waste.push(card);
        }
        Some(card)
    }

    /// Turns the waste back into the deck, reversing its order.
    pub fn recycle(&mut self) {
        self.stock.extend(self.waste.drain(..).rev());
    }

    /// Replays an action after checking it is legal on this board.
    pub fn apply(&mut self, action: &Action) -> Result<()> {
        self.check(action)
            .with_context(|| format!("Illegal move: {action}"))?;
        self.play(action);
        Ok(())
    }

    /// Applies an action without checking it. Removing an empty pyramid slot
    /// still panics.
    pub fn play(&mut self, action: &Action) {
        match *action {
            Action::RemoveKing(slot) => {
                self.pyramid = self.pyramid.remove_at(slot.row, slot.col);
            }
            Action::RemovePair(a, b) => {
                self.pyramid = self
                    .pyramid
                    .remove_at(a.row, a.col)
                    .remove_at(b.row, b.col);
            }
            Action::RemoveWithWaste(_, slot) => {
                self.waste.pop();
                self.pyramid = self.pyramid.remove_at(slot.row, slot.col);
            }
            Action::Draw(_) | Action::DrawKing(_) => {
                self.draw();
            }
            Action::Recycle => self.recycle(),
        }
    }

    pub fn check(&self, action: &Action) -> Result<()> {
        match *action {
            Action::RemoveKing(slot) => {
                self.check_exposed(slot)?;
                ensure!(slot.card.is_king(), "{} is not a King", slot.card.name());
            }
            Action::RemovePair(a, b) => {
                ensure!(
                    (a.row, a.col) != (b.row, b.col),
                    "Cannot pair the card at ({},{}) with itself",
                    a.row,
                    a.col
                );
                self.check_exposed(a)?;
                self.check_exposed(b)?;
                check_pair(a.card, b.card)?;
            }
            Action::RemoveWithWaste(card, slot) => {
                ensure!(
                    self.waste.last() == Some(&card),
                    "{} is not on top of the waste",
                    card.name()
                );
                self.check_exposed(slot)?;
                check_pair(card, slot.card)?;
            }
            Action::Draw(card) | Action::DrawKing(card) => {
                ensure!(
                    self.stock.first() == Some(&card),
                    "{} is not at the front of the deck",
                    card.name()
                );
                ensure!(
                    card.is_king() == matches!(action, Action::DrawKing(_)),
                    "Drawn Kings must be discarded, other cards must go to the waste"
                );
            }
            Action::Recycle => {
                ensure!(
                    self.need_recycle(),
                    "The waste can only be recycled once the deck is empty"
                );
            }
        }
        Ok(())
    }

    fn check_exposed(&self, slot: Slot) -> Result<()> {
        let Slot { row, col, card } = slot;
        ensure!(
            row < PYRAMID_ROWS && col <= row,
            "Position ({row},{col}) is outside the pyramid"
        );
        ensure!(
            self.pyramid.get(row, col) == Some(card),
            "{} is not at ({row},{col})",
            card.name()
        );
        ensure!(
            self.pyramid.is_exposed(row, col),
            "{} at ({row},{col}) is covered",
            card.name()
        );
        Ok(())
    }

    pub fn pretty_print(&self) -> String {
        let mut output = String::new();

        // Pyramid
        for row in 0..PYRAMID_ROWS {
            output.push_str(&" ".repeat((PYRAMID_ROWS - 1 - row) * 2));
            let cards: Vec<String> = (0..=row)
                .map(|col| match self.pyramid.get(row, col) {
                    Some(card) => card.pretty_print(),
                    None => "--".into(),
                })
                .collect();
            output.push_str(&cards.join("  "));
            output.push('\n');
        }

        // Stock
        if !self.stock.is_empty() {
            output.push_str("Stock: ");
            for card in &self.stock {
                output.push_str(&card.pretty_print());
            }
            output.push('\n');
        }

        // Waste
        if !self.waste.is_empty() {
            output.push_str("Waste: ");
            for card in &self.waste {
                output.push_str(&card.pretty_print());
            }
            output.push('\n');
        }

        output.truncate(output.trim_end().len());
        output
    }
}

/// Verifies that `cards` is a full deck: 52 cards, every rank of every suit
/// exactly once.
pub fn validate_deal(cards: &[Card]) -> Result<()> {
    if cards.len() != DECK_SIZE {
        bail!(
            "deck must contain {DECK_SIZE} cards, but found {}",
            cards.len()
        );
    }
    let mut counts = [0usize; MAX_CARD as usize];
    for card in cards {
        if card.is_unknown() {
            bail!("unknown card in deck");
        }
        counts[card.id() as usize] += 1;
    }
    for rank in 0..MAX_RANK {
        for suit in 0..MAX_SUIT {
            let card = Card::new_with_rank_suit(rank, suit);
            match counts[card.id() as usize] {
                0 => bail!("missing card: {}", card.name()),
                1 => {}
                n => bail!("duplicate card: {} (appears {n} times)", card.name()),
            }
        }
    }
    Ok(())
}

fn check_pair(a: Card, b: Card) -> Result<()> {
    ensure!(
        a.value() + b.value() == PAIR_SUM,
        "{} and {} do not add up to {PAIR_SUM}",
        a.name(),
        b.name()
    );
    Ok(())
}

#[inline]
pub fn slot_index(row: usize, col: usize) -> usize {
    row * (row + 1) / 2 + col
}

/// The 28 pyramid slots stored row-major; `None` marks a removed card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pyramid {
    slots: [Option<Card>; PYRAMID_SIZE],
}

impl Pyramid {
    pub fn new(cards: &[Card]) -> Self {
        Self {
            slots: std::array::from_fn(|i| cards.get(i).copied()),
        }
    }

    pub fn from_slots(slots: [Option<Card>; PYRAMID_SIZE]) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<Card>; PYRAMID_SIZE] {
        &self.slots
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Card> {
        if row < PYRAMID_ROWS && col <= row {
            self.slots[slot_index(row, col)]
        } else {
            None
        }
    }

    #[inline]
    pub fn is_exposed(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_some()
            && (row == PYRAMID_ROWS - 1
                || (self.get(row + 1, col).is_none() && self.get(row + 1, col + 1).is_none()))
    }

    /// Every uncovered card, scanned row-major from the apex.
    pub fn exposed(&self) -> Exposed {
        let mut exposed = Exposed::new();
        for row in 0..PYRAMID_ROWS {
            for col in 0..=row {
                if let Some(card) = self.get(row, col)
                    && self.is_exposed(row, col)
                {
                    exposed.push(Slot::new(row, col, card));
                }
            }
        }
        exposed
    }

    /// Returns a copy with the card at `(row, col)` removed.
    ///
    /// Panics when the position is outside the pyramid or already empty.
    pub fn remove_at(&self, row: usize, col: usize) -> Self {
        assert!(
            row < PYRAMID_ROWS && col <= row,
            "position ({row},{col}) is outside the pyramid"
        );
        let mut pyramid = *self;
        let slot = &mut pyramid.slots[slot_index(row, col)];
        assert!(slot.is_some(), "slot ({row},{col}) is already empty");
        *slot = None;
        pyramid
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn removed_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.slots.iter().flatten().copied()
    }
}

/// A pyramid card together with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub row: usize,
    pub col: usize,
    pub card: Card,
}

impl Slot {
    pub fn new(row: usize, col: usize, card: Card) -> Self {
        Self { row, col, card }
    }

    pub fn value(&self) -> u8 {
        self.card.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card(u8);

impl Card {
    pub const UNKNOWN: Self = Self(MAX_CARD);

    pub fn new_with_id(id: u8) -> Self {
        if id >= MAX_CARD {
            Self::UNKNOWN
        } else {
            Self(id)
        }
    }

    pub fn new_with_rank_suit(rank: u8, suit: u8) -> Self {
        Self::new_with_id(suit * MAX_RANK + rank)
    }

    /// Parses tokens like `"10h"`, `"ks"`, `"As"` or `"T♦"`.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        let (rank, suit) = match token.strip_prefix("10") {
            Some(suit) => (9, suit),
            None => {
                let mut chars = token.chars();
                let c = chars.next().context("Empty card")?;
                let rank = RANKS[..MAX_RANK as usize]
                    .iter()
                    .position(|&r| r == c.to_ascii_uppercase())
                    .with_context(|| format!("Invalid rank at card {token}"))?;
                (rank, chars.as_str())
            }
        };
        let mut chars = suit.chars();
        let (Some(s), None) = (chars.next(), chars.next()) else {
            bail!("Invalid suit at card {token}");
        };
        let suit = SUIT_LETTERS
            .iter()
            .position(|&l| l == s.to_ascii_lowercase())
            .or_else(|| SUITS[..MAX_SUIT as usize].iter().position(|&p| p == s))
            .with_context(|| format!("Invalid suit at card {token}"))?;
        Ok(Card::new_with_rank_suit(rank as u8, suit as u8))
    }

    pub fn id(&self) -> u8 {
        self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 >= Card::UNKNOWN.0
    }

    pub fn rank(&self) -> u8 {
        self.0 % MAX_RANK
    }

    pub fn suit(&self) -> u8 {
        self.0 / MAX_RANK
    }

    /// Ace counts 1, number cards their face value, Jack 11, Queen 12, King 13.
    pub fn value(&self) -> u8 {
        if self.is_unknown() { 0 } else { self.rank() + 1 }
    }

    pub fn is_king(&self) -> bool {
        self.value() == MAX_RANK
    }

    /// The input form of the card, e.g. `10h`.
    pub fn token(&self) -> String {
        if self.is_unknown() {
            return "??".into();
        }
        format!(
            "{}{}",
            RANK_TOKENS[self.rank() as usize],
            SUIT_LETTERS[self.suit() as usize]
        )
    }

    /// The full name of the card, e.g. `10 of Hearts`.
    pub fn name(&self) -> String {
        if self.is_unknown() {
            return "Unknown".into();
        }
        format!(
            "{} of {}",
            RANK_NAMES[self.rank() as usize],
            SUIT_NAMES[self.suit() as usize]
        )
    }

    pub fn pretty_print(&self) -> String {
        if self.is_unknown() {
            return format!("{}{}", RANKS[MAX_RANK as usize], SUITS[MAX_SUIT as usize]);
        }
        format!(
            "{}{}",
            RANKS[self.rank() as usize],
            SUITS[self.suit() as usize]
        )
    }
}

impl Default for Card {
    fn default() -> Self {
        Card::UNKNOWN
    }
}

/// Value of a card token, or 0 when the token is not a card.
pub fn card_value(token: &str) -> u8 {
    Card::parse(token).map(|card| card.value()).unwrap_or(0)
}
