//! Fill a crossword grid with words from a vocabulary by treating it as a constraint satisfaction
//! problem: every slot is a variable, its domain is the set of candidate words, and crossing slots
//! must agree on their shared letter.
//!
//! The pipeline is node consistency, then AC-3, then backtracking search:
//!
//! ```no_run
//! use crossfill::{Crossword, Solver, SolverOptions, render_grid};
//!
//! let crossword = Crossword::from_text("#___#\n#_##_\n", "ONE\nTWO\n").unwrap();
//! match Solver::new(&crossword, SolverOptions::default()).solve() {
//!     Ok(success) => println!("{}", render_grid(&crossword, &success.assignment)),
//!     Err(failure) => println!("No solution. ({failure:?})"),
//! }
//! ```

pub mod consistency;
pub mod grid;
pub mod render;
pub mod search;

pub use consistency::{
    Arc, ArcConsistencyFailure, ArcConsistencyResult, ArcConsistencySuccess, Domains,
};
pub use grid::{
    parse_structure, parse_words, Crossing, Crossword, Direction, GridCoord, Overlap, ParseError,
    Slot, Vocabulary, Word,
};
pub use render::{letter_grid, render_grid};
pub use search::{
    Assignment, Choice, FillFailure, FillSuccess, Solver, SolverOptions, Statistics,
    ValueOrdering,
};

/// The expected maximum number of slots appearing in a grid.
pub const MAX_SLOT_COUNT: usize = 256;

/// The expected maximum length for a single slot.
pub const MAX_SLOT_LENGTH: usize = 21;

/// An identifier for a given slot, based on its index in the Crossword's `slots` field. The index
/// order is the order slots were discovered in, which also serves as the stable tie-break order.
pub type SlotId = usize;

/// An identifier for a given word, based on its index in the Vocabulary.
pub type WordId = usize;
