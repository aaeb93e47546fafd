//! The domain store and the consistency passes that narrow it: node consistency (word length) and
//! arc consistency (agreement at every crossing) via AC-3.

use std::collections::{HashSet, VecDeque};

use log::{debug, info};

use crate::grid::Crossword;
use crate::{SlotId, WordId};

/// An ordered pair of slots: revising the arc removes words from `from` that have no support in
/// `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arc {
    pub from: SlotId,
    pub to: SlotId,
}

/// Results from a call to `Domains::ac3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcConsistencySuccess {
    /// Total number of words removed across all slots.
    pub eliminations: usize,
}

/// The slot whose domain was driven empty, which means the puzzle can't be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcConsistencyFailure {
    pub slot_id: SlotId,
}

pub type ArcConsistencyResult = Result<ArcConsistencySuccess, ArcConsistencyFailure>;

/// FIFO work-list of arcs used by `Domains::ac3`. An arc that's already waiting isn't queued a
/// second time.
#[derive(Debug)]
struct ConsistencyQueue {
    queue: VecDeque<Arc>,
    queued: HashSet<Arc>,
}

impl ConsistencyQueue {
    fn with_initial_queue<Items>(items: Items) -> ConsistencyQueue
    where
        Items: IntoIterator<Item = Arc>,
    {
        let mut queue = ConsistencyQueue {
            queue: VecDeque::new(),
            queued: HashSet::new(),
        };
        for arc in items {
            queue.enqueue(arc);
        }
        queue
    }

    fn pop_front(&mut self) -> Option<Arc> {
        let arc = self.queue.pop_front()?;
        self.queued.remove(&arc);
        Some(arc)
    }

    fn enqueue(&mut self, arc: Arc) {
        if self.queued.insert(arc) {
            self.queue.push_back(arc);
        }
    }
}

/// The current candidate words for each slot, indexed by slot id. Each slot's list keeps
/// vocabulary order, which is the order values are tried in during search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domains {
    options: Vec<Vec<WordId>>,
}

impl Domains {
    /// Start every slot off with the whole vocabulary.
    pub fn new(crossword: &Crossword) -> Domains {
        let all_words: Vec<WordId> = crossword.words.iter().map(|(word_id, _)| word_id).collect();

        Domains {
            options: crossword.slots.iter().map(|_| all_words.clone()).collect(),
        }
    }

    pub fn options(&self, slot_id: SlotId) -> &[WordId] {
        &self.options[slot_id]
    }

    pub fn size(&self, slot_id: SlotId) -> usize {
        self.options[slot_id].len()
    }

    pub fn contains(&self, slot_id: SlotId, word_id: WordId) -> bool {
        self.options[slot_id].contains(&word_id)
    }

    /// The first slot (in slot order) with no remaining options, if any.
    pub fn first_empty(&self) -> Option<SlotId> {
        self.options.iter().position(|options| options.is_empty())
    }

    /// Narrow a slot's domain to the single word chosen for it.
    pub(crate) fn restrict(&mut self, slot_id: SlotId, word_id: WordId) {
        self.options[slot_id].clear();
        self.options[slot_id].push(word_id);
    }

    /// Remove every word whose length differs from its slot's length.
    pub fn enforce_node_consistency(&mut self, crossword: &Crossword) {
        let mut eliminations = 0;

        for (slot_id, slot) in crossword.slots.iter().enumerate() {
            let before = self.options[slot_id].len();
            self.options[slot_id].retain(|&word_id| crossword.words.get(word_id).len() == slot.length);
            eliminations += before - self.options[slot_id].len();
        }

        info!("Node consistency removed {} options", eliminations);
    }

    /// Make `x` arc consistent with `y`: remove every word from `x`'s domain whose letter at the
    /// crossing doesn't appear at the crossing in any of `y`'s words. Returns whether anything was
    /// removed. `y`'s domain is never touched, and slots that don't cross are left alone.
    pub fn revise(&mut self, crossword: &Crossword, x: SlotId, y: SlotId) -> bool {
        let overlap = match crossword.overlap(x, y) {
            Some(overlap) => overlap,
            None => return false,
        };

        let words = &crossword.words;
        let supported: HashSet<char> = self.options[y]
            .iter()
            .filter_map(|&word_id| words.get(word_id).glyphs.get(overlap.second).copied())
            .collect();

        let before = self.options[x].len();
        self.options[x].retain(|&word_id| {
            words
                .get(word_id)
                .glyphs
                .get(overlap.first)
                .map(|glyph| supported.contains(glyph))
                .unwrap_or(false)
        });
        let removed = before - self.options[x].len();

        if removed > 0 {
            debug!("Revising slot {} against slot {} removed {} options", x, y, removed);
        }

        removed > 0
    }

    /// Enforce arc consistency with AC-3. With no `arcs`, the work-list starts out holding every
    /// ordered pair of distinct slots. Stops as soon as any domain is emptied.
    pub fn ac3(&mut self, crossword: &Crossword, arcs: Option<Vec<Arc>>) -> ArcConsistencyResult {
        let slot_count = crossword.slot_count();
        let mut queue = match arcs {
            Some(arcs) => ConsistencyQueue::with_initial_queue(arcs),
            None => ConsistencyQueue::with_initial_queue((0..slot_count).flat_map(|from| {
                (0..slot_count)
                    .filter(move |&to| to != from)
                    .map(move |to| Arc { from, to })
            })),
        };

        let before: usize = self.options.iter().map(|options| options.len()).sum();

        while let Some(Arc { from: x, to: y }) = queue.pop_front() {
            if !self.revise(crossword, x, y) {
                continue;
            }

            if self.options[x].is_empty() {
                debug!("Slot {} has no options left", x);
                return Err(ArcConsistencyFailure { slot_id: x });
            }

            // Shrinking x may leave words in x's other neighbors without support.
            for z in crossword.neighbors(x).iter() {
                if z != y {
                    queue.enqueue(Arc { from: z, to: x });
                }
            }
        }

        // A slot can already be empty without ever being revised, e.g. after node consistency
        // on a slot with no crossings.
        if let Some(slot_id) = self.first_empty() {
            return Err(ArcConsistencyFailure { slot_id });
        }

        let after: usize = self.options.iter().map(|options| options.len()).sum();
        Ok(ArcConsistencySuccess { eliminations: before - after })
    }
}
