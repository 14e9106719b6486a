use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Debug, Formatter};
use std::io;
use std::ops::Index;
use std::path::{Path, PathBuf};

use bit_set::BitSet;
use instant::{Duration, Instant};
use log::{debug, info};
use smallvec::SmallVec;
use thiserror::Error;

/// The expected maximum length for a single slot. Also bounds the number of crossings per slot,
/// since a slot can't cross more slots than it has cells.
pub const MAX_SLOT_LENGTH: usize = 21;

/// An identifier for a given slot, based on its index in the GridConfig's `slot_configs` field.
pub type SlotId = usize;

/// An identifier for a given word, based on its index in the `WordList`.
pub type WordId = usize;

/// Zero-indexed (row, col) coords for a cell in the grid, where row = 0 is the top row.
type GridCoord = (usize, usize);

/// Everything that can go wrong while building a grid or reading input files. Filling itself never
/// fails: an unfillable grid just produces no solutions.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Grid structure is empty")]
    EmptyStructure,

    #[error("Slot at ({row}, {col}) has zero length")]
    ZeroLengthSlot { row: usize, col: usize },

    #[error("Slot at ({row}, {col}) extends outside the {width}x{height} grid")]
    SlotOutOfBounds {
        row: usize,
        col: usize,
        width: usize,
        height: usize,
    },

    #[error("Slots {first} and {second} share more than one cell")]
    AmbiguousOverlap { first: SlotId, second: SlotId },

    #[error("Failed to read {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Direction that a slot is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Across,
    Down,
}

/// The static description of a slot: where it starts, which way it runs and how long it is. Two
/// slots are the same slot iff all four fields match. The derived ordering (grid position first)
/// is what we fall back on to break ties when choosing the next slot to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotConfig {
    pub row: usize,
    pub col: usize,
    pub direction: Direction,
    pub length: usize,
}

impl SlotConfig {
    pub fn new(row: usize, col: usize, direction: Direction, length: usize) -> SlotConfig {
        SlotConfig { row, col, direction, length }
    }

    /// Generate the coords for each cell of this slot.
    pub fn cell_coords(&self) -> impl Iterator<Item = GridCoord> {
        let SlotConfig { row, col, direction, length } = *self;

        (0..length).map(move |cell_idx| match direction {
            Direction::Across => (row, col + cell_idx),
            Direction::Down => (row + cell_idx, col),
        })
    }
}

/// A struct representing a crossing between one slot and another, referencing the other slot's id,
/// the location of the intersection within this slot, and the location within the other slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crossing {
    pub other_slot_id: SlotId,
    pub cell: usize,
    pub other_slot_cell: usize,
}

/// A struct representing the aspects of a grid that are static during filling.
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,

    /// `cells[row][col]` is true if the cell can hold a letter.
    pub cells: Vec<Vec<bool>>,

    pub slot_configs: Vec<SlotConfig>,

    /// For each slot, every crossing with another slot, sorted by the other slot's id.
    pub crossings: Vec<SmallVec<[Crossing; MAX_SLOT_LENGTH]>>,
}

impl GridConfig {
    /// Build a grid from a fillable-cell map. Every maximal horizontal or vertical run of at least
    /// two fillable cells becomes a slot; slots are numbered in grid order. Short rows are padded
    /// with blocked cells.
    pub fn from_cells(mut cells: Vec<Vec<bool>>) -> Result<GridConfig> {
        let height = cells.len();
        let width = cells.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return Err(Error::EmptyStructure);
        }
        for row in &mut cells {
            row.resize(width, false);
        }

        // Returns (start, length) for each run of fillable cells long enough to be a slot.
        fn find_runs<I: Iterator<Item = bool>>(line: I) -> Vec<(usize, usize)> {
            let mut runs = vec![];
            let mut run_start: Option<usize> = None;
            let mut line_length = 0;

            for (idx, fillable) in line.enumerate() {
                line_length = idx + 1;
                match (fillable, run_start) {
                    (true, None) => run_start = Some(idx),
                    (false, Some(start)) => {
                        if idx - start > 1 {
                            runs.push((start, idx - start));
                        }
                        run_start = None;
                    }
                    _ => {}
                }
            }
            if let Some(start) = run_start {
                if line_length - start > 1 {
                    runs.push((start, line_length - start));
                }
            }

            runs
        }

        let mut slot_configs: Vec<SlotConfig> = vec![];

        for (row, line) in cells.iter().enumerate() {
            for (col, length) in find_runs(line.iter().copied()) {
                slot_configs.push(SlotConfig::new(row, col, Direction::Across, length));
            }
        }
        for col in 0..width {
            for (row, length) in find_runs(cells.iter().map(|line| line[col])) {
                slot_configs.push(SlotConfig::new(row, col, Direction::Down, length));
            }
        }
        slot_configs.sort();

        let crossings = build_crossings(&slot_configs)?;

        Ok(GridConfig { width, height, cells, slot_configs, crossings })
    }

    /// Build a grid from an explicit list of slots. The fillable cells are exactly the cells
    /// covered by some slot, and slot ids follow the order of `slot_configs`.
    pub fn from_slots(
        width: usize,
        height: usize,
        slot_configs: Vec<SlotConfig>,
    ) -> Result<GridConfig> {
        let mut cells = vec![vec![false; width]; height];

        for slot_config in &slot_configs {
            let SlotConfig { row, col, .. } = *slot_config;

            let Some((last_row, last_col)) = slot_config.cell_coords().last() else {
                return Err(Error::ZeroLengthSlot { row, col });
            };
            if last_row >= height || last_col >= width {
                return Err(Error::SlotOutOfBounds { row, col, width, height });
            }

            for (cell_row, cell_col) in slot_config.cell_coords() {
                cells[cell_row][cell_col] = true;
            }
        }

        let crossings = build_crossings(&slot_configs)?;

        Ok(GridConfig { width, height, cells, slot_configs, crossings })
    }

    /// Parse a grid template, with `_` representing fillable cells and anything else (whitespace
    /// included) representing blocks. Blank lines before the first row and after the last are
    /// skipped, and indentation shared by every row is stripped.
    pub fn from_template_string(template: &str) -> Result<GridConfig> {
        let lines: Vec<&str> = template.lines().map(|line| line.trim_end_matches('\r')).collect();

        let is_blank = |line: &&str| line.trim().is_empty();
        let (Some(first), Some(last)) = (
            lines.iter().position(|line| !is_blank(line)),
            lines.iter().rposition(|line| !is_blank(line)),
        ) else {
            return Err(Error::EmptyStructure);
        };
        let rows = &lines[first..=last];

        let indent = rows
            .iter()
            .filter(|line| !is_blank(*line))
            .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
            .min()
            .unwrap_or(0);

        let cells: Vec<Vec<bool>> = rows
            .iter()
            .map(|line| line.chars().skip(indent).map(|c| c == '_').collect())
            .collect();

        GridConfig::from_cells(cells)
    }

    pub fn slot_count(&self) -> usize {
        self.slot_configs.len()
    }

    /// Look up the id of a slot by its position, direction and length.
    pub fn slot_id(&self, slot_config: &SlotConfig) -> Option<SlotId> {
        self.slot_configs.iter().position(|candidate| candidate == slot_config)
    }

    /// The pair of cell indexes at which `slot_id` and `other_slot_id` intersect, in that order,
    /// or `None` if they don't cross.
    pub fn overlap(&self, slot_id: SlotId, other_slot_id: SlotId) -> Option<(usize, usize)> {
        self.crossings[slot_id]
            .iter()
            .find(|crossing| crossing.other_slot_id == other_slot_id)
            .map(|crossing| (crossing.cell, crossing.other_slot_cell))
    }

    /// All slots crossing the given one, in ascending id order.
    pub fn neighbors(&self, slot_id: SlotId) -> impl Iterator<Item = SlotId> + '_ {
        self.crossings[slot_id].iter().map(|crossing| crossing.other_slot_id)
    }

    pub fn degree(&self, slot_id: SlotId) -> usize {
        self.crossings[slot_id].len()
    }
}

/// Work out which slots share a cell. A pair of slots may only share a single cell, otherwise the
/// crossing constraint between them would be ambiguous.
fn build_crossings(
    slot_configs: &[SlotConfig],
) -> Result<Vec<SmallVec<[Crossing; MAX_SLOT_LENGTH]>>> {
    // (slot id, cell index within slot) for every slot touching a given cell.
    let mut entries_by_loc: HashMap<GridCoord, SmallVec<[(SlotId, usize); 2]>> = HashMap::new();

    for (slot_id, slot_config) in slot_configs.iter().enumerate() {
        for (cell_idx, loc) in slot_config.cell_coords().enumerate() {
            entries_by_loc.entry(loc).or_default().push((slot_id, cell_idx));
        }
    }

    let mut crossings: Vec<SmallVec<[Crossing; MAX_SLOT_LENGTH]>> =
        vec![SmallVec::new(); slot_configs.len()];

    for (slot_id, slot_config) in slot_configs.iter().enumerate() {
        for (cell_idx, loc) in slot_config.cell_coords().enumerate() {
            for &(other_slot_id, other_slot_cell) in &entries_by_loc[&loc] {
                if other_slot_id == slot_id {
                    continue;
                }
                if crossings[slot_id].iter().any(|c| c.other_slot_id == other_slot_id) {
                    return Err(Error::AmbiguousOverlap {
                        first: slot_id.min(other_slot_id),
                        second: slot_id.max(other_slot_id),
                    });
                }

                crossings[slot_id].push(Crossing {
                    other_slot_id,
                    cell: cell_idx,
                    other_slot_cell,
                });
            }
        }

        crossings[slot_id].sort_by_key(|crossing| crossing.other_slot_id);
    }

    Ok(crossings)
}

/// Read and parse a grid template file.
pub fn load_grid_config(path: impl AsRef<Path>) -> Result<GridConfig> {
    GridConfig::from_template_string(&read_file(path.as_ref())?)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// A struct representing a word that can be chosen for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub string: String,
    pub glyphs: SmallVec<[char; MAX_SLOT_LENGTH]>,
}

impl Word {
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// The set of words available for filling. Each distinct word appears once, and its `WordId` is its
/// position in the list.
#[derive(Clone, Default)]
pub struct WordList {
    words: Vec<Word>,
    ids_by_string: HashMap<String, WordId>,
}

impl Debug for WordList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordList")
            .field("words", &format!("({} entries)", self.words.len()))
            .finish()
    }
}

impl WordList {
    /// Build a word list, dropping any repeats. Words are kept exactly as given.
    pub fn new<I, S>(words: I) -> WordList
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut word_list = WordList::default();

        for word in words {
            let string: String = word.into();
            if word_list.ids_by_string.contains_key(&string) {
                continue;
            }

            word_list.ids_by_string.insert(string.clone(), word_list.words.len());
            word_list.words.push(Word {
                glyphs: string.chars().collect(),
                string,
            });
        }

        word_list
    }

    /// Parse a word list file's contents: one word per line, upper-cased, with blank lines skipped.
    pub fn from_text(text: &str) -> WordList {
        WordList::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_uppercase),
        )
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn id_of(&self, word: &str) -> Option<WordId> {
        self.ids_by_string.get(word).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Word> {
        self.words.iter()
    }
}

impl Index<WordId> for WordList {
    type Output = Word;

    fn index(&self, word_id: WordId) -> &Word {
        &self.words[word_id]
    }
}

/// Read and parse a word list file.
pub fn load_word_list(path: impl AsRef<Path>) -> Result<WordList> {
    Ok(WordList::from_text(&read_file(path.as_ref())?))
}

/// The candidate words remaining for each slot. Options are kept sorted by `WordId`, and are only
/// ever removed, never added back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domains {
    options: Vec<Vec<WordId>>,
}

impl Domains {
    /// Start every slot off with every word in the list.
    pub fn from_word_list(config: &GridConfig, words: &WordList) -> Domains {
        Domains {
            options: (0..config.slot_count()).map(|_| (0..words.len()).collect()).collect(),
        }
    }

    /// Start each slot off with its own set of candidates. Slots without an entry get no options,
    /// and ids that aren't in `words` are ignored.
    pub fn from_candidates(
        config: &GridConfig,
        words: &WordList,
        mut candidates: Vec<Vec<WordId>>,
    ) -> Domains {
        candidates.resize_with(config.slot_count(), Vec::new);

        for options in &mut candidates {
            options.retain(|&word_id| word_id < words.len());
            options.sort_unstable();
            options.dedup();
        }

        Domains { options: candidates }
    }

    pub fn options(&self, slot_id: SlotId) -> &[WordId] {
        &self.options[slot_id]
    }

    pub fn option_count(&self, slot_id: SlotId) -> usize {
        self.options[slot_id].len()
    }

    pub fn contains(&self, slot_id: SlotId, word_id: WordId) -> bool {
        self.options[slot_id].binary_search(&word_id).is_ok()
    }

    pub fn is_any_empty(&self) -> bool {
        self.options.iter().any(Vec::is_empty)
    }

    /// Remove every option whose length doesn't match its slot.
    pub fn enforce_node_consistency(&mut self, config: &GridConfig, words: &WordList) {
        for (slot_config, options) in config.slot_configs.iter().zip(&mut self.options) {
            options.retain(|&word_id| words[word_id].len() == slot_config.length);
        }
    }

    /// Make `slot_id` arc consistent with `other_slot_id`: drop every option for `slot_id` whose
    /// letter at the crossing doesn't appear at the crossing in any option for `other_slot_id`.
    /// Returns whether anything was removed. Slots that don't cross are left alone.
    pub fn revise(
        &mut self,
        config: &GridConfig,
        words: &WordList,
        slot_id: SlotId,
        other_slot_id: SlotId,
    ) -> bool {
        let Some((cell, other_slot_cell)) = config.overlap(slot_id, other_slot_id) else {
            return false;
        };

        let supported_glyphs: HashSet<char> = self.options[other_slot_id]
            .iter()
            .filter_map(|&word_id| words[word_id].glyphs.get(other_slot_cell).copied())
            .collect();

        let option_count = self.options[slot_id].len();
        self.options[slot_id].retain(|&word_id| {
            words[word_id].glyphs.get(cell).is_some_and(|glyph| supported_glyphs.contains(glyph))
        });

        self.options[slot_id].len() != option_count
    }

    /// AC-3. Revise arcs from a FIFO worklist, seeded with `arcs` or, if none are given, with every
    /// ordered pair of crossing slots. Whenever a slot loses options, every arc pointing at it
    /// (other than from the slot that caused the loss) is queued again. Returns false as soon as
    /// any slot runs out of options.
    pub fn ac3(
        &mut self,
        config: &GridConfig,
        words: &WordList,
        arcs: Option<Vec<(SlotId, SlotId)>>,
    ) -> bool {
        let mut queue: VecDeque<(SlotId, SlotId)> = match arcs {
            Some(arcs) => arcs.into(),
            None => (0..config.slot_count())
                .flat_map(move |slot_id| {
                    config.neighbors(slot_id).map(move |other_slot_id| (slot_id, other_slot_id))
                })
                .collect(),
        };

        let mut revisions: u64 = 0;

        while let Some((slot_id, other_slot_id)) = queue.pop_front() {
            if !self.revise(config, words, slot_id, other_slot_id) {
                continue;
            }
            revisions += 1;

            if self.options[slot_id].is_empty() {
                debug!(
                    "Slot {} ({:?}) has no options left after {} revisions",
                    slot_id, config.slot_configs[slot_id], revisions
                );
                return false;
            }

            queue.extend(
                config
                    .neighbors(slot_id)
                    .filter(|&neighbor_id| neighbor_id != other_slot_id)
                    .map(|neighbor_id| (neighbor_id, slot_id)),
            );
        }

        debug!("Arc consistency reached after {} revisions", revisions);
        true
    }
}

/// A partial mapping from slots to words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    choices: Vec<Option<WordId>>,
    assigned_count: usize,
}

impl Assignment {
    pub fn new(slot_count: usize) -> Assignment {
        Assignment { choices: vec![None; slot_count], assigned_count: 0 }
    }

    /// Set the word for a slot, returning the word it replaced.
    pub fn assign(&mut self, slot_id: SlotId, word_id: WordId) -> Option<WordId> {
        let previous = self.choices[slot_id].replace(word_id);
        if previous.is_none() {
            self.assigned_count += 1;
        }
        previous
    }

    pub fn unassign(&mut self, slot_id: SlotId) -> Option<WordId> {
        let previous = self.choices[slot_id].take();
        if previous.is_some() {
            self.assigned_count -= 1;
        }
        previous
    }

    pub fn get(&self, slot_id: SlotId) -> Option<WordId> {
        self.choices[slot_id]
    }

    pub fn is_assigned(&self, slot_id: SlotId) -> bool {
        self.choices[slot_id].is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.assigned_count == self.choices.len()
    }

    /// Number of slots with a word.
    pub fn len(&self) -> usize {
        self.assigned_count
    }

    pub fn is_empty(&self) -> bool {
        self.assigned_count == 0
    }

    /// Assigned (slot, word) pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, WordId)> + '_ {
        self.choices
            .iter()
            .enumerate()
            .filter_map(|(slot_id, word_id)| word_id.map(|word_id| (slot_id, word_id)))
    }

    /// The word chosen for each slot, if any, by slot id.
    pub fn words<'w>(&self, words: &'w WordList) -> Vec<Option<&'w str>> {
        self.choices
            .iter()
            .map(|word_id| word_id.map(|word_id| words[word_id].string.as_str()))
            .collect()
    }
}

/// Check that no word is used twice, that every word fits its slot, and that every pair of
/// assigned crossing slots agrees on the shared letter.
pub fn is_consistent(config: &GridConfig, words: &WordList, assignment: &Assignment) -> bool {
    let mut used_words = BitSet::with_capacity(words.len());

    for (slot_id, word_id) in assignment.iter() {
        if !used_words.insert(word_id) {
            return false;
        }
        if words[word_id].len() != config.slot_configs[slot_id].length {
            return false;
        }
    }

    // Lengths are all correct at this point, so the crossing indexes are in range.
    assignment.iter().all(|(slot_id, word_id)| {
        config.crossings[slot_id].iter().all(|crossing| {
            match assignment.get(crossing.other_slot_id) {
                Some(other_word_id) => {
                    words[word_id].glyphs[crossing.cell]
                        == words[other_word_id].glyphs[crossing.other_slot_cell]
                }
                None => true,
            }
        })
    })
}

/// Pick the next slot to fill: fewest remaining options first, then most crossings, then grid
/// position. Returns `None` once every slot is assigned.
pub fn select_unassigned_variable(
    config: &GridConfig,
    domains: &Domains,
    assignment: &Assignment,
) -> Option<SlotId> {
    (0..config.slot_count())
        .filter(|&slot_id| !assignment.is_assigned(slot_id))
        .min_by(|&a, &b| {
            domains
                .option_count(a)
                .cmp(&domains.option_count(b))
                .then_with(|| config.degree(b).cmp(&config.degree(a)))
                .then_with(|| config.slot_configs[a].cmp(&config.slot_configs[b]))
        })
}

/// Order the options for a slot so that the ones ruling out the fewest options in unassigned
/// crossing slots come first. Options that rule out the same number keep their domain order.
pub fn order_domain_values(
    config: &GridConfig,
    words: &WordList,
    domains: &Domains,
    slot_id: SlotId,
    assignment: &Assignment,
) -> Vec<WordId> {
    // For each unassigned crossing slot: the cell in our slot, how many options the crossing slot
    // has, and how many of those put each glyph in the shared cell.
    let crossing_glyph_counts: Vec<(usize, usize, HashMap<char, usize>)> = config.crossings[slot_id]
        .iter()
        .filter(|crossing| !assignment.is_assigned(crossing.other_slot_id))
        .map(|crossing| {
            let mut glyph_counts: HashMap<char, usize> = HashMap::new();
            for &word_id in domains.options(crossing.other_slot_id) {
                if let Some(&glyph) = words[word_id].glyphs.get(crossing.other_slot_cell) {
                    *glyph_counts.entry(glyph).or_insert(0) += 1;
                }
            }

            (crossing.cell, domains.option_count(crossing.other_slot_id), glyph_counts)
        })
        .collect();

    let mut options_by_conflicts: Vec<(usize, WordId)> = domains
        .options(slot_id)
        .iter()
        .map(|&word_id| {
            let conflicts: usize = crossing_glyph_counts
                .iter()
                .map(|(cell, option_count, glyph_counts)| {
                    let compatible = words[word_id]
                        .glyphs
                        .get(*cell)
                        .and_then(|glyph| glyph_counts.get(glyph))
                        .copied()
                        .unwrap_or(0);
                    option_count - compatible
                })
                .sum();

            (conflicts, word_id)
        })
        .collect();

    // Stable, so ties stay in domain order.
    options_by_conflicts.sort_by_key(|&(conflicts, _)| conflicts);

    options_by_conflicts.into_iter().map(|(_, word_id)| word_id).collect()
}

/// Settings for a fill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillOptions {
    /// Stop after this many solutions. `None` searches exhaustively.
    pub solution_limit: Option<usize>,
}

/// A struct tracking statistics about the filling process.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub states: u64,
    pub backtracks: u64,
    pub solutions: usize,
    pub duration: Duration,
}

/// Every complete assignment found, in the order the search reached them.
#[derive(Debug, Clone)]
pub struct FillResult {
    pub statistics: Statistics,
    pub solutions: Vec<Assignment>,
}

/// One level of the search: the slot being filled, its ordered options, and how far through them
/// we are.
#[derive(Debug)]
struct SearchFrame {
    slot_id: SlotId,
    candidates: Vec<WordId>,
    next_candidate: usize,
}

/// Depth-first backtracking search over the given (already pruned) domains. The domains are not
/// touched during search; each tentative choice is only checked with `is_consistent`. The search
/// doesn't stop at the first complete assignment but keeps going until every branch has been
/// explored or `solution_limit` is reached.
pub fn find_fills(
    config: &GridConfig,
    words: &WordList,
    domains: &Domains,
    options: &FillOptions,
) -> FillResult {
    let start = Instant::now();

    let mut statistics = Statistics::default();
    let mut solutions: Vec<Assignment> = vec![];

    if options.solution_limit == Some(0) {
        return FillResult { statistics, solutions };
    }

    let mut assignment = Assignment::new(config.slot_count());
    let mut stack: Vec<SearchFrame> = Vec::with_capacity(config.slot_count());

    // True when the last step extended the assignment, so we need to either record a solution or
    // open a frame for another slot.
    let mut extended = true;

    loop {
        if extended {
            statistics.states += 1;

            match select_unassigned_variable(config, domains, &assignment) {
                None => {
                    solutions.push(assignment.clone());
                    debug!(
                        "Found solution {} after {} states",
                        solutions.len(),
                        statistics.states
                    );

                    if options.solution_limit.is_some_and(|limit| solutions.len() >= limit) {
                        break;
                    }
                }
                Some(slot_id) => stack.push(SearchFrame {
                    slot_id,
                    candidates: order_domain_values(config, words, domains, slot_id, &assignment),
                    next_candidate: 0,
                }),
            }
        }

        let Some(frame) = stack.last_mut() else {
            break;
        };

        // Undo whatever this frame tried last before moving on to its next option.
        assignment.unassign(frame.slot_id);
        extended = false;

        while frame.next_candidate < frame.candidates.len() {
            let word_id = frame.candidates[frame.next_candidate];
            frame.next_candidate += 1;

            assignment.assign(frame.slot_id, word_id);
            if is_consistent(config, words, &assignment) {
                extended = true;
                break;
            }
            assignment.unassign(frame.slot_id);
        }

        if !extended {
            stack.pop();
            statistics.backtracks += 1;
        }
    }

    statistics.solutions = solutions.len();
    statistics.duration = start.elapsed();

    FillResult { statistics, solutions }
}

/// Prune the given domains with node and arc consistency, then search them. If pruning leaves any
/// slot without options there's nothing to search and the result is empty.
pub fn solve_with_domains(
    config: &GridConfig,
    words: &WordList,
    mut domains: Domains,
    options: &FillOptions,
) -> FillResult {
    let start = Instant::now();

    domains.enforce_node_consistency(config, words);

    if !domains.ac3(config, words, None) || domains.is_any_empty() {
        info!("No fill exists: a slot has no options after propagation");
        return FillResult {
            statistics: Statistics { duration: start.elapsed(), ..Statistics::default() },
            solutions: vec![],
        };
    }

    let mut result = find_fills(config, words, &domains, options);
    result.statistics.duration = start.elapsed();

    info!(
        "Found {} solutions in {:?} ({} states, {} backtracks)",
        result.statistics.solutions,
        result.statistics.duration,
        result.statistics.states,
        result.statistics.backtracks
    );

    result
}

/// Fill the grid from the word list, offering every word to every slot, and return every solution.
pub fn solve(config: &GridConfig, words: &WordList) -> Vec<Assignment> {
    solve_with_domains(
        config,
        words,
        Domains::from_word_list(config, words),
        &FillOptions::default(),
    )
    .solutions
}

/// The letter in each cell of the grid under the given assignment.
pub fn letter_grid(
    config: &GridConfig,
    words: &WordList,
    assignment: &Assignment,
) -> Vec<Vec<Option<char>>> {
    let mut letters = vec![vec![None; config.width]; config.height];

    for (slot_id, word_id) in assignment.iter() {
        let cells = config.slot_configs[slot_id].cell_coords();

        for ((row, col), &glyph) in cells.zip(&words[word_id].glyphs) {
            letters[row][col] = Some(glyph);
        }
    }

    letters
}

/// Turn the given grid config and assignment into a rendered string, with `█` for blocks and a
/// space for any fillable cell that has no letter yet.
pub fn render_grid(config: &GridConfig, words: &WordList, assignment: &Assignment) -> String {
    let letters = letter_grid(config, words, assignment);

    config
        .cells
        .iter()
        .zip(&letters)
        .map(|(cell_row, letter_row)| {
            cell_row
                .iter()
                .zip(letter_row)
                .map(|(&fillable, letter)| if fillable { letter.unwrap_or(' ') } else { '█' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
