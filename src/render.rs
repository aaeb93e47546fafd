use crate::grid::Crossword;
use crate::search::{Assignment, Choice};

/// The character drawn for a blocked cell.
const BLOCK: char = '█';

/// Lay the assigned words out on the grid. Cells no assigned word covers are `None`.
pub fn letter_grid(crossword: &Crossword, assignment: &Assignment) -> Vec<Vec<Option<char>>> {
    let mut letters: Vec<Vec<Option<char>>> = vec![vec![None; crossword.width]; crossword.height];

    for Choice { slot_id, word_id } in assignment.choices() {
        let slot = crossword.slot(slot_id);
        let word = crossword.words.get(word_id);

        for (cell_idx, &glyph) in word.glyphs.iter().enumerate().take(slot.length) {
            let (row, col) = slot.cell_coord(cell_idx);
            letters[row][col] = Some(glyph);
        }
    }

    letters
}

/// Turn the given crossword and assignment into a rendered string, one line per row.
pub fn render_grid(crossword: &Crossword, assignment: &Assignment) -> String {
    let letters = letter_grid(crossword, assignment);

    (0..crossword.height)
        .map(|row| {
            (0..crossword.width)
                .map(|col| {
                    if crossword.is_fillable((row, col)) {
                        letters[row][col].unwrap_or(' ')
                    } else {
                        BLOCK
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use crate::grid::Crossword;
    use crate::render::{letter_grid, render_grid};
    use crate::search::{Assignment, Solver, SolverOptions};

    #[test]
    fn test_render_solved_grid() {
        let crossword = Crossword::from_text(
            include_str!("../data/structure0.txt"),
            include_str!("../data/words0.txt"),
        )
        .unwrap();
        let options = SolverOptions { distinct_words: true, ..Default::default() };

        let result = Solver::new(&crossword, options).solve().expect("Failed to find a fill");

        assert_eq!(
            render_grid(&crossword, &result.assignment),
            ["█SIX█", "█E██F", "█V██I", "█E██V", "█NINE"].join("\n"),
        );
    }

    #[test]
    fn test_render_partial_grid() {
        let crossword = Crossword::from_text("___\n#_#\n", "CAT\nAT").unwrap();
        let mut assignment = Assignment::new(crossword.slot_count());
        assignment.assign(0, crossword.words.find("CAT").unwrap());

        assert_eq!(render_grid(&crossword, &assignment), "CAT\n█ █");

        let letters = letter_grid(&crossword, &assignment);
        assert_eq!(letters[0], vec![Some('C'), Some('A'), Some('T')]);
        assert_eq!(letters[1], vec![None, None, None]);
    }
}
