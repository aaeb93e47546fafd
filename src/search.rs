//! Backtracking search over slot assignments, drawing candidates from the pruned domains.

use std::cmp::Reverse;
use std::collections::HashSet;

use bit_set::BitSet;
use instant::{Duration, Instant};
use log::{debug, info, trace};
use smallvec::SmallVec;

use crate::consistency::{Arc, ArcConsistencyFailure, ArcConsistencyResult, Domains};
use crate::grid::Crossword;
use crate::{SlotId, WordId, MAX_SLOT_COUNT};

/// The order in which candidate words are tried for a chosen slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ValueOrdering {
    /// Try words in the order they appear in the slot's domain.
    #[default]
    DomainOrder,

    /// Try first the words that rule out the fewest options in unassigned crossing slots.
    LeastConstraining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolverOptions {
    pub value_ordering: ValueOrdering,

    /// Re-run AC-3 from each tentative choice, with the chosen slot's domain narrowed to the one
    /// word. Domains are restored when the choice is undone.
    pub forward_checking: bool,

    /// Refuse to place the same word in two slots.
    pub distinct_words: bool,
}

/// A struct recording a slot assignment made during the filling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub slot_id: SlotId,
    pub word_id: WordId,
}

/// A mapping from slot to chosen word, partial while searching and complete once every slot has
/// an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    words: SmallVec<[Option<WordId>; MAX_SLOT_COUNT]>,
    assigned: BitSet,
}

impl Assignment {
    pub fn new(slot_count: usize) -> Assignment {
        Assignment {
            words: (0..slot_count).map(|_| None).collect(),
            assigned: BitSet::with_capacity(slot_count),
        }
    }

    pub fn assign(&mut self, slot_id: SlotId, word_id: WordId) {
        self.words[slot_id] = Some(word_id);
        self.assigned.insert(slot_id);
    }

    pub fn unassign(&mut self, slot_id: SlotId) -> Option<WordId> {
        self.assigned.remove(slot_id);
        self.words[slot_id].take()
    }

    pub fn get(&self, slot_id: SlotId) -> Option<WordId> {
        self.words.get(slot_id).copied().flatten()
    }

    pub fn contains(&self, slot_id: SlotId) -> bool {
        self.assigned.contains(slot_id)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Does every slot have a word?
    pub fn is_complete(&self) -> bool {
        self.assigned.len() == self.words.len()
    }

    /// Assigned slots and their words, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, WordId)> + '_ {
        self.assigned.iter().filter_map(|slot_id| self.get(slot_id).map(|word_id| (slot_id, word_id)))
    }

    pub fn choices(&self) -> Vec<Choice> {
        self.iter().map(|(slot_id, word_id)| Choice { slot_id, word_id }).collect()
    }

    /// Every assigned word has its slot's length and every pair of assigned crossing slots agrees
    /// on the shared letter. Unassigned slots impose no constraint.
    pub fn is_consistent(&self, crossword: &Crossword) -> bool {
        self.iter().all(|(slot_id, word_id)| {
            crossword.words.get(word_id).len() == crossword.slot(slot_id).length
                && crossword.neighbors(slot_id).iter().all(|other_slot_id| {
                    self.get(other_slot_id)
                        .map(|other_word_id| {
                            letters_agree(crossword, slot_id, word_id, other_slot_id, other_word_id)
                        })
                        .unwrap_or(true)
                })
        })
    }

    /// Is any word used in more than one slot?
    pub fn has_repeated_words(&self) -> bool {
        let mut seen: HashSet<WordId> = HashSet::with_capacity(self.len());
        !self.iter().all(|(_, word_id)| seen.insert(word_id))
    }
}

/// Do the two words match where their slots cross? Slots that don't cross always agree.
fn letters_agree(
    crossword: &Crossword,
    slot_id: SlotId,
    word_id: WordId,
    other_slot_id: SlotId,
    other_word_id: WordId,
) -> bool {
    match crossword.overlap(slot_id, other_slot_id) {
        Some(overlap) => {
            let glyph = crossword.words.get(word_id).glyphs.get(overlap.first);
            let other_glyph = crossword.words.get(other_word_id).glyphs.get(overlap.second);
            glyph.is_some() && glyph == other_glyph
        }
        None => true,
    }
}

/// A struct tracking statistics about the filling process.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub states: u64,
    pub backtracks: u64,
    pub duration: Duration,
}

/// A struct representing the results of a fill operation.
#[derive(Debug)]
pub struct FillSuccess {
    pub statistics: Statistics,
    pub assignment: Assignment,
}

/// Why no fill exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillFailure {
    /// Consistency enforcement left this slot without any candidate words.
    EmptyDomain { slot_id: SlotId },

    /// The search tried every candidate at the root without finding a fill.
    Exhausted,
}

/// Owns the domain store for one puzzle and runs node consistency, AC-3 and backtracking search
/// over it.
#[derive(Debug)]
pub struct Solver<'a> {
    crossword: &'a Crossword,
    domains: Domains,
    options: SolverOptions,
    statistics: Statistics,
}

impl<'a> Solver<'a> {
    pub fn new(crossword: &'a Crossword, options: SolverOptions) -> Solver<'a> {
        Solver {
            crossword,
            domains: Domains::new(crossword),
            options,
            statistics: Statistics::default(),
        }
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn enforce_node_consistency(&mut self) {
        self.domains.enforce_node_consistency(self.crossword);
    }

    pub fn ac3(&mut self, arcs: Option<Vec<Arc>>) -> ArcConsistencyResult {
        self.domains.ac3(self.crossword, arcs)
    }

    /// Enforce node and arc consistency, then search for a complete assignment.
    pub fn solve(&mut self) -> Result<FillSuccess, FillFailure> {
        let start = Instant::now();
        self.statistics = Statistics::default();

        info!(
            "Filling {} slots from {} words ({:?})",
            self.crossword.slot_count(),
            self.crossword.words.len(),
            self.options,
        );

        self.enforce_node_consistency();
        match self.ac3(None) {
            Ok(success) => info!("Arc consistency removed {} options", success.eliminations),
            Err(ArcConsistencyFailure { slot_id }) => {
                info!("Slot {} has no candidate words", slot_id);
                return Err(FillFailure::EmptyDomain { slot_id });
            }
        }

        let mut assignment = Assignment::new(self.crossword.slot_count());
        let found = self.backtrack(&mut assignment);
        self.statistics.duration = start.elapsed();
        info!("{:?}", self.statistics);

        if found {
            debug_assert!(self.consistent(&assignment));
            Ok(FillSuccess {
                statistics: self.statistics.clone(),
                assignment,
            })
        } else {
            Err(FillFailure::Exhausted)
        }
    }

    /// The assignment's words fit their slots and agree at every crossing, and no word is repeated
    /// if `distinct_words` is set.
    pub fn consistent(&self, assignment: &Assignment) -> bool {
        assignment.is_consistent(self.crossword)
            && !(self.options.distinct_words && assignment.has_repeated_words())
    }

    /// Would adding this choice keep a consistent assignment consistent? Only the new word's
    /// constraints need checking.
    fn fits(&self, assignment: &Assignment, slot_id: SlotId, word_id: WordId) -> bool {
        if self.crossword.words.get(word_id).len() != self.crossword.slot(slot_id).length {
            return false;
        }

        if self.options.distinct_words && assignment.iter().any(|(_, other)| other == word_id) {
            return false;
        }

        self.crossword.neighbors(slot_id).iter().all(|other_slot_id| {
            assignment
                .get(other_slot_id)
                .map(|other_word_id| {
                    letters_agree(self.crossword, slot_id, word_id, other_slot_id, other_word_id)
                })
                .unwrap_or(true)
        })
    }

    /// Choose the unassigned slot with the fewest remaining options, preferring the slot with the
    /// most crossings when tied, then the earliest slot. Returns `None` once the assignment is
    /// complete.
    pub fn select_unassigned_slot(&self, assignment: &Assignment) -> Option<SlotId> {
        (0..self.crossword.slot_count())
            .filter(|&slot_id| !assignment.contains(slot_id))
            .min_by_key(|&slot_id| {
                (self.domains.size(slot_id), Reverse(self.crossword.degree(slot_id)))
            })
    }

    /// The candidate words for `slot_id`, in the order they should be tried.
    pub fn order_domain_values(&self, slot_id: SlotId, assignment: &Assignment) -> Vec<WordId> {
        let mut values = self.domains.options(slot_id).to_vec();

        if self.options.value_ordering == ValueOrdering::LeastConstraining {
            // Stable, so ties keep domain order.
            values.sort_by_cached_key(|&word_id| self.count_ruled_out(slot_id, word_id, assignment));
        }

        values
    }

    /// How many options in unassigned crossing slots would be ruled out by this choice?
    fn count_ruled_out(&self, slot_id: SlotId, word_id: WordId, assignment: &Assignment) -> usize {
        self.crossword
            .neighbors(slot_id)
            .iter()
            .filter(|&other_slot_id| !assignment.contains(other_slot_id))
            .map(|other_slot_id| {
                self.domains
                    .options(other_slot_id)
                    .iter()
                    .filter(|&&other_word_id| {
                        !letters_agree(self.crossword, slot_id, word_id, other_slot_id, other_word_id)
                    })
                    .count()
            })
            .sum()
    }

    /// Extend `assignment` to a complete, consistent one. Returns true on success, leaving the
    /// complete assignment in place; on failure `assignment` is left exactly as it was passed in.
    pub fn backtrack(&mut self, assignment: &mut Assignment) -> bool {
        let slot_id = match self.select_unassigned_slot(assignment) {
            Some(slot_id) => slot_id,
            None => return true,
        };
        self.statistics.states += 1;

        for word_id in self.order_domain_values(slot_id, assignment) {
            if !self.fits(assignment, slot_id, word_id) {
                continue;
            }

            trace!("Trying {} in slot {}", self.crossword.words.get(word_id).string, slot_id);
            assignment.assign(slot_id, word_id);

            if self.explore(assignment, slot_id, word_id) {
                return true;
            }

            assignment.unassign(slot_id);
            self.statistics.backtracks += 1;
        }

        debug!("Exhausted options for slot {} with {} slots assigned", slot_id, assignment.len());
        false
    }

    /// Recurse past a tentative choice, narrowing the domains first if forward checking is on.
    /// The domains are always restored before returning.
    fn explore(&mut self, assignment: &mut Assignment, slot_id: SlotId, word_id: WordId) -> bool {
        if !self.options.forward_checking {
            return self.backtrack(assignment);
        }

        let saved = self.domains.clone();
        self.domains.restrict(slot_id, word_id);

        let arcs: Vec<Arc> = self
            .crossword
            .neighbors(slot_id)
            .iter()
            .filter(|&other_slot_id| !assignment.contains(other_slot_id))
            .map(|other_slot_id| Arc { from: other_slot_id, to: slot_id })
            .collect();

        let found = match self.domains.ac3(self.crossword, Some(arcs)) {
            Ok(_) => self.backtrack(assignment),
            Err(ArcConsistencyFailure { slot_id: emptied }) => {
                trace!("Choice for slot {} leaves slot {} without options", slot_id, emptied);
                false
            }
        };

        self.domains = saved;
        found
    }
}

#[cfg(test)]
mod tests {
    use crate::grid::Crossword;
    use crate::search::{Assignment, FillFailure, Solver, SolverOptions, ValueOrdering};

    /// ___
    /// #_#
    /// #_#
    const CROSS: &str = "___\n#_#\n#_#\n";

    fn bundled_puzzle() -> Crossword {
        Crossword::from_text(
            include_str!("../data/structure0.txt"),
            include_str!("../data/words0.txt"),
        )
        .unwrap()
    }

    fn assign(crossword: &Crossword, assignment: &mut Assignment, slot_id: usize, word: &str) {
        assignment.assign(slot_id, crossword.words.find(word).expect("word should exist"));
    }

    fn word_at<'c>(crossword: &'c Crossword, assignment: &Assignment, slot_id: usize) -> &'c str {
        &crossword.words.get(assignment.get(slot_id).unwrap()).string
    }

    #[test]
    fn test_consistency_requires_matching_letters() {
        let crossword = Crossword::from_text(CROSS, "CAT\nCAR\nART").unwrap();

        let mut assignment = Assignment::new(2);
        assign(&crossword, &mut assignment, 0, "CAT");
        assign(&crossword, &mut assignment, 1, "ART");
        assert!(assignment.is_consistent(&crossword));

        assign(&crossword, &mut assignment, 1, "CAR");
        assert!(!assignment.is_consistent(&crossword));
    }

    #[test]
    fn test_consistency_ignores_unassigned_slots() {
        let crossword = Crossword::from_text(CROSS, "CAT\nCAR\nART").unwrap();

        let mut assignment = Assignment::new(2);
        assert!(assignment.is_consistent(&crossword));

        assign(&crossword, &mut assignment, 1, "CAR");
        assert!(assignment.is_consistent(&crossword));
        assert!(!assignment.is_complete());
    }

    #[test]
    fn test_consistency_checks_lengths() {
        let crossword = Crossword::from_text(CROSS, "CAT\nAT").unwrap();

        let mut assignment = Assignment::new(2);
        assign(&crossword, &mut assignment, 1, "AT");
        assert!(!assignment.is_consistent(&crossword));
    }

    #[test]
    fn test_slots_that_do_not_cross_never_conflict() {
        let crossword = Crossword::from_text("__#\n###\n#__\n", "AB\nCD").unwrap();

        for first in ["AB", "CD"] {
            for second in ["AB", "CD"] {
                let mut assignment = Assignment::new(2);
                assign(&crossword, &mut assignment, 0, first);
                assign(&crossword, &mut assignment, 1, second);
                assert!(assignment.is_consistent(&crossword));
            }
        }
    }

    #[test]
    fn test_repeated_words_only_rejected_when_distinct() {
        let crossword = Crossword::from_text("__#\n###\n#__\n", "AB").unwrap();
        let mut assignment = Assignment::new(2);
        assign(&crossword, &mut assignment, 0, "AB");
        assign(&crossword, &mut assignment, 1, "AB");

        assert!(Solver::new(&crossword, SolverOptions::default()).consistent(&assignment));

        let options = SolverOptions { distinct_words: true, ..Default::default() };
        assert!(!Solver::new(&crossword, options).consistent(&assignment));
    }

    #[test]
    fn test_assignment_iterates_in_slot_order() {
        let mut assignment = Assignment::new(4);
        assignment.assign(3, 7);
        assignment.assign(1, 2);

        assert_eq!(assignment.iter().collect::<Vec<_>>(), vec![(1, 2), (3, 7)]);
        assert_eq!(assignment.unassign(3), Some(7));
        assert_eq!(assignment.unassign(3), None);
        assert_eq!(assignment.len(), 1);
    }

    #[test]
    fn test_select_prefers_small_domains_then_high_degree() {
        let crossword = bundled_puzzle();
        let mut solver = Solver::new(&crossword, SolverOptions::default());
        solver.enforce_node_consistency();

        // Domain sizes are [4, 3, 3, 3]; degrees are [1, 2, 1, 2].
        let mut assignment = Assignment::new(crossword.slot_count());
        assert_eq!(solver.select_unassigned_slot(&assignment), Some(1));

        assign(&crossword, &mut assignment, 1, "SEVEN");
        assert_eq!(solver.select_unassigned_slot(&assignment), Some(3));

        assign(&crossword, &mut assignment, 3, "NINE");
        assert_eq!(solver.select_unassigned_slot(&assignment), Some(2));

        assign(&crossword, &mut assignment, 2, "FIVE");
        assert_eq!(solver.select_unassigned_slot(&assignment), Some(0));

        assign(&crossword, &mut assignment, 0, "SIX");
        assert_eq!(solver.select_unassigned_slot(&assignment), None);
    }

    #[test]
    fn test_least_constraining_ordering_puts_flexible_words_first() {
        let crossword = Crossword::from_text(CROSS, "CAT\nARC\nART\nAIM").unwrap();
        let mut solver = Solver::new(
            &crossword,
            SolverOptions { value_ordering: ValueOrdering::LeastConstraining, ..Default::default() },
        );
        solver.enforce_node_consistency();

        // Three of the four words start with A, so CAT keeps three crossing options and every
        // other across word keeps none.
        let ordered: Vec<_> = solver
            .order_domain_values(0, &Assignment::new(2))
            .into_iter()
            .map(|word_id| crossword.words.get(word_id).string.as_str())
            .collect();
        assert_eq!(ordered, vec!["CAT", "ARC", "ART", "AIM"]);

        let ordered: Vec<_> = solver
            .order_domain_values(1, &Assignment::new(2))
            .into_iter()
            .map(|word_id| crossword.words.get(word_id).string.as_str())
            .collect();
        assert_eq!(ordered, vec!["ARC", "ART", "AIM", "CAT"]);
    }

    #[test]
    fn test_failed_backtrack_restores_assignment() {
        let crossword = bundled_puzzle();
        let mut solver = Solver::new(&crossword, SolverOptions::default());
        solver.enforce_node_consistency();

        // TEN forces THREE down the left, and no four-letter word starts with E.
        let mut assignment = Assignment::new(crossword.slot_count());
        assign(&crossword, &mut assignment, 0, "TEN");
        let before = assignment.clone();

        assert!(!solver.backtrack(&mut assignment));
        assert_eq!(assignment, before);
        assert!(solver.statistics().backtracks > 0);
    }

    #[test]
    fn test_backtrack_without_arc_consistency_finds_no_fill() {
        let crossword = Crossword::from_text(CROSS, "CAT\nDOG").unwrap();
        let mut solver = Solver::new(&crossword, SolverOptions::default());
        solver.enforce_node_consistency();

        let mut assignment = Assignment::new(2);
        assert!(!solver.backtrack(&mut assignment));
        assert!(assignment.is_empty());
    }

    #[test]
    fn test_solve_small_cross() {
        let crossword = Crossword::from_text(CROSS, "CAT\nCAR\nART").unwrap();
        let mut solver = Solver::new(&crossword, SolverOptions::default());

        let result = solver.solve().expect("Failed to find a fill");

        assert!(result.assignment.is_complete());
        assert!(["CAT", "CAR"].contains(&word_at(&crossword, &result.assignment, 0)));
        assert_eq!(word_at(&crossword, &result.assignment, 1), "ART");
    }

    #[test]
    fn test_solve_bundled_puzzle_with_every_option_combination() {
        let crossword = bundled_puzzle();

        for value_ordering in [ValueOrdering::DomainOrder, ValueOrdering::LeastConstraining] {
            for forward_checking in [false, true] {
                for distinct_words in [false, true] {
                    let options = SolverOptions { value_ordering, forward_checking, distinct_words };
                    let mut solver = Solver::new(&crossword, options);

                    let result = solver.solve().expect("Failed to find a fill");

                    assert!(result.assignment.is_complete(), "{:?}", options);
                    assert!(result.assignment.is_consistent(&crossword), "{:?}", options);
                    assert!(solver.consistent(&result.assignment), "{:?}", options);
                    assert_eq!(word_at(&crossword, &result.assignment, 0), "SIX");
                    assert_eq!(word_at(&crossword, &result.assignment, 1), "SEVEN");
                    assert_eq!(word_at(&crossword, &result.assignment, 3), "NINE");
                }
            }
        }
    }

    #[test]
    fn test_forward_checking_restores_domains() {
        let crossword = bundled_puzzle();

        let mut reference = Solver::new(&crossword, SolverOptions::default());
        reference.enforce_node_consistency();
        reference.ac3(None).unwrap();

        let mut solver =
            Solver::new(&crossword, SolverOptions { forward_checking: true, ..Default::default() });
        solver.solve().expect("Failed to find a fill");

        assert_eq!(solver.domains(), reference.domains());
    }

    #[test]
    fn test_solve_reports_missing_word_length() {
        let crossword = Crossword::from_text(CROSS, "DOGS\nBIRDS").unwrap();

        let failure = Solver::new(&crossword, SolverOptions::default()).solve().unwrap_err();

        assert_eq!(failure, FillFailure::EmptyDomain { slot_id: 0 });
    }

    #[test]
    fn test_solve_reports_exhausted_search() {
        // Every slot in a 2x2 block must be AA, which the distinct rule forbids. Arc consistency
        // can't see that, so only the search does.
        let crossword = Crossword::from_text("__\n__\n", "AA").unwrap();

        let result = Solver::new(&crossword, SolverOptions::default()).solve();
        assert!(result.is_ok());

        let options = SolverOptions { distinct_words: true, ..Default::default() };
        let failure = Solver::new(&crossword, options).solve().unwrap_err();
        assert_eq!(failure, FillFailure::Exhausted);
    }

    #[test]
    fn test_solve_finds_a_fill_whenever_one_exists() {
        let vocabularies = [
            "AB\nBA",
            "AB\nCD",
            "AB\nBC",
            "AB\nBB\nCA",
            "AC\nCA\nAA\nBC",
            "AA",
        ];

        for words in vocabularies {
            let crossword = Crossword::from_text("__\n__\n", words).unwrap();
            let word_count = crossword.words.len();
            let slot_count = crossword.slot_count();

            let exists = (0..word_count.pow(slot_count as u32)).any(|mut code| {
                let mut assignment = Assignment::new(slot_count);
                for slot_id in 0..slot_count {
                    assignment.assign(slot_id, code % word_count);
                    code /= word_count;
                }
                assignment.is_consistent(&crossword)
            });

            let result = Solver::new(&crossword, SolverOptions::default()).solve();
            assert_eq!(result.is_ok(), exists, "vocabulary {:?}", words);
        }
    }

    #[test]
    fn test_solve_grid_without_slots() {
        let crossword = Crossword::from_text("_#\n#_\n", "CAT").unwrap();

        let result = Solver::new(&crossword, SolverOptions::default()).solve().unwrap();

        assert!(result.assignment.is_complete());
        assert!(result.assignment.is_empty());
    }
}
