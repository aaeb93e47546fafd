//! The static side of a puzzle: which cells can hold letters, the slots those cells form, where
//! slots cross, and the vocabulary available to fill them. Nothing here changes while solving.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};

use bit_set::BitSet;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{SlotId, WordId, MAX_SLOT_LENGTH};

/// Zero-indexed (row, col) coords for a cell in the grid, where row = 0 is the top row.
pub type GridCoord = (usize, usize);

/// Marks a fillable cell in a structure description.
const OPEN_CELL: char = '_';

/// Marks a blocked cell in a structure description.
const BLOCKED_CELL: char = '#';

/// Problems with a structure description. Word lists can't be malformed; an unusable word list
/// just leaves the puzzle without a solution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("structure contains no cells")]
    EmptyStructure,

    #[error("unexpected character {found:?} at row {row}, column {col} (expected '_' or '#')")]
    UnknownCell { row: usize, col: usize, found: char },
}

/// Direction that a slot is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Across,
    Down,
}

/// A horizontal or vertical run of cells to be filled with one word. Two slots are the same slot
/// iff all four fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub row: usize,
    pub col: usize,
    pub length: usize,
    pub direction: Direction,
}

impl Slot {
    /// The coords of the cell holding character `cell_idx` of this slot's word.
    pub fn cell_coord(&self, cell_idx: usize) -> GridCoord {
        match self.direction {
            Direction::Across => (self.row, self.col + cell_idx),
            Direction::Down => (self.row + cell_idx, self.col),
        }
    }

    /// Generate the coords for each cell of this slot.
    pub fn cell_coords(&self) -> impl Iterator<Item = GridCoord> {
        let slot = *self;
        (0..slot.length).map(move |cell_idx| slot.cell_coord(cell_idx))
    }
}

/// The character positions at which two crossing slots must agree: `first` indexes into the word
/// for the slot the overlap was looked up from, `second` into the word for the other slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub first: usize,
    pub second: usize,
}

/// A crossing between one slot and another, referencing the other slot's id and the location of
/// the intersection within the other slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub other_slot_id: SlotId,
    pub other_slot_cell: usize,
}

/// A word that can be chosen for a slot. Overlaps index `glyphs`, so multi-byte characters count
/// as one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub string: String,
    pub glyphs: SmallVec<[char; MAX_SLOT_LENGTH]>,
}

impl Word {
    pub fn new(string: &str) -> Word {
        Word {
            string: string.to_string(),
            glyphs: string.chars().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// The set of candidate words. Duplicates are dropped, keeping the first occurrence, so word ids
/// follow input order.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: Vec<Word>,
}

impl Vocabulary {
    pub fn new<I, S>(words: I) -> Vocabulary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut vocabulary = Vocabulary::default();

        for word in words {
            let word = word.as_ref();
            if !word.is_empty() && seen.insert(word.to_string()) {
                vocabulary.words.push(Word::new(word));
            }
        }

        vocabulary
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, word_id: WordId) -> &Word {
        &self.words[word_id]
    }

    pub fn find(&self, string: &str) -> Option<WordId> {
        self.words.iter().position(|word| word.string == string)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WordId, &Word)> {
        self.words.iter().enumerate()
    }
}

/// Parse a structure description: one line per row, `_` for a fillable cell and `#` for a
/// blocked one. Trailing blank lines are ignored and short rows are padded later by
/// `Crossword::new`.
pub fn parse_structure(contents: &str) -> Result<Vec<Vec<bool>>, ParseError> {
    let mut rows: Vec<Vec<bool>> = contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .enumerate()
        .map(|(row, line)| {
            line.chars()
                .enumerate()
                .map(|(col, cell)| match cell {
                    OPEN_CELL => Ok(true),
                    BLOCKED_CELL => Ok(false),
                    found => Err(ParseError::UnknownCell { row, col, found }),
                })
                .collect::<Result<Vec<bool>, ParseError>>()
        })
        .collect::<Result<Vec<Vec<bool>>, ParseError>>()?;

    while rows.last().map(|row| row.is_empty()).unwrap_or(false) {
        rows.pop();
    }

    if rows.iter().all(|row| row.is_empty()) {
        return Err(ParseError::EmptyStructure);
    }

    Ok(rows)
}

/// Parse a word list: one word per line, normalized to upper case. Blank lines are skipped.
pub fn parse_words(contents: &str) -> Vocabulary {
    Vocabulary::new(
        contents
            .lines()
            .map(|line| line.trim().to_uppercase())
            .filter(|line| !line.is_empty()),
    )
}

/// The grid model: which cells are fillable, the slots derived from them, the crossings between
/// slots, and the vocabulary.
pub struct Crossword {
    pub height: usize,
    pub width: usize,
    pub structure: Vec<Vec<bool>>,
    pub slots: Vec<Slot>,
    pub words: Vocabulary,

    /// Indexed by slot id, then by cell index within the slot.
    crossings: Vec<SmallVec<[Option<Crossing>; MAX_SLOT_LENGTH]>>,

    /// Indexed by slot id: every other slot with a defined overlap.
    neighbors: Vec<BitSet>,
}

impl Debug for Crossword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crossword")
            .field("height", &self.height)
            .field("width", &self.width)
            .field("slots", &self.slots)
            .field("words", &(["(", &self.words.len().to_string(), " entries)"].join("")))
            .finish()
    }
}

impl Crossword {
    /// Build the grid model from a fillable-cell mask. Rows shorter than the widest row are treated
    /// as blocked past their end.
    pub fn new(structure: Vec<Vec<bool>>, words: Vocabulary) -> Result<Crossword, ParseError> {
        let height = structure.len();
        let width = structure.iter().map(|row| row.len()).max().unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(ParseError::EmptyStructure);
        }

        let structure: Vec<Vec<bool>> = structure
            .into_iter()
            .map(|mut row| {
                row.resize(width, false);
                row
            })
            .collect();

        let slots = find_slots(&structure);

        // Build a map from cell location to the slots covering it, which we can then use to
        // calculate crossings.
        let mut slots_by_loc: HashMap<GridCoord, Vec<(SlotId, usize)>> = HashMap::new();
        for (slot_id, slot) in slots.iter().enumerate() {
            for (cell_idx, loc) in slot.cell_coords().enumerate() {
                slots_by_loc.entry(loc).or_default().push((slot_id, cell_idx));
            }
        }

        let crossings: Vec<SmallVec<[Option<Crossing>; MAX_SLOT_LENGTH]>> = slots
            .iter()
            .enumerate()
            .map(|(slot_id, slot)| {
                slot.cell_coords()
                    .map(|loc| {
                        // At most one across and one down slot share a cell.
                        slots_by_loc[&loc]
                            .iter()
                            .find(|&&(other_slot_id, _)| other_slot_id != slot_id)
                            .map(|&(other_slot_id, other_slot_cell)| Crossing {
                                other_slot_id,
                                other_slot_cell,
                            })
                    })
                    .collect()
            })
            .collect();

        let neighbors: Vec<BitSet> = crossings
            .iter()
            .map(|slot_crossings| {
                let mut result = BitSet::with_capacity(slots.len());
                for crossing in slot_crossings.iter().flatten() {
                    result.insert(crossing.other_slot_id);
                }
                result
            })
            .collect();

        Ok(Crossword {
            height,
            width,
            structure,
            slots,
            words,
            crossings,
            neighbors,
        })
    }

    /// Build the grid model from the text of a structure description and a word list.
    pub fn from_text(structure: &str, words: &str) -> Result<Crossword, ParseError> {
        Crossword::new(parse_structure(structure)?, parse_words(words))
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, slot_id: SlotId) -> &Slot {
        &self.slots[slot_id]
    }

    pub fn is_fillable(&self, (row, col): GridCoord) -> bool {
        self.structure
            .get(row)
            .and_then(|cells| cells.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// The crossing (if any) at each cell of the given slot.
    pub fn crossings(&self, slot_id: SlotId) -> &[Option<Crossing>] {
        &self.crossings[slot_id]
    }

    /// Where `x` and `y` share a cell, or `None` if they don't cross.
    pub fn overlap(&self, x: SlotId, y: SlotId) -> Option<Overlap> {
        if x == y {
            return None;
        }

        self.crossings[x]
            .iter()
            .enumerate()
            .find_map(|(cell_idx, crossing)| match crossing {
                Some(crossing) if crossing.other_slot_id == y => Some(Overlap {
                    first: cell_idx,
                    second: crossing.other_slot_cell,
                }),
                _ => None,
            })
    }

    pub fn neighbors(&self, slot_id: SlotId) -> &BitSet {
        &self.neighbors[slot_id]
    }

    pub fn degree(&self, slot_id: SlotId) -> usize {
        self.neighbors[slot_id].len()
    }
}

/// Find every maximal run of at least two fillable cells, scanning in row-major order and
/// recording the across slot before the down slot when both start in the same cell.
fn find_slots(structure: &[Vec<bool>]) -> Vec<Slot> {
    let height = structure.len();
    let width = structure.first().map(|row| row.len()).unwrap_or(0);
    let open = |row: usize, col: usize| row < height && col < width && structure[row][col];

    let mut slots = vec![];
    for row in 0..height {
        for col in 0..width {
            if !open(row, col) {
                continue;
            }

            if col == 0 || !open(row, col - 1) {
                let length = (col..width).take_while(|&c| open(row, c)).count();
                if length > 1 {
                    slots.push(Slot { row, col, length, direction: Direction::Across });
                }
            }

            if row == 0 || !open(row - 1, col) {
                let length = (row..height).take_while(|&r| open(r, col)).count();
                if length > 1 {
                    slots.push(Slot { row, col, length, direction: Direction::Down });
                }
            }
        }
    }

    slots
}
