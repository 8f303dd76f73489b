//! Kindle clippings domain library.
//! Keeps the core pure: parsing, deduplication, note association, and
//! rendering are plain functions over in-memory collections; the only I/O
//! lives behind the `storage` seam and in the CLI.

pub mod core {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Serialize};

    /* ---------------------------- Value Objects ---------------------------- */

    /// Closed integer interval addressing a passage in the source book.
    ///
    /// A single-point location has `start == end`. `start <= end` holds by
    /// construction of the source format and is not re-validated.
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    pub struct Location {
        pub start: u32,
        pub end: u32,
    }

    impl Location {
        pub fn new(start: u32, end: u32) -> Self {
            Self { start, end }
        }

        pub fn point(at: u32) -> Self {
            Self { start: at, end: at }
        }

        pub fn is_point(&self) -> bool {
            self.start == self.end
        }

        /// Whether two closed intervals overlap.
        ///
        /// Covers exact duplicates, partial overlap, and full encapsulation.
        /// Intervals that merely touch at an endpoint are adjacent, not
        /// overlapping; a point interval overlaps only intervals that
        /// strictly contain it or equal it.
        pub fn overlaps(&self, other: &Location) -> bool {
            if self == other {
                return true;
            }
            (self.start < other.start && other.start < self.end)
                || (self.start < other.end && other.end < self.end)
                || (other.start < self.start && self.start < other.end)
                || (other.start < self.end && self.end < other.end)
        }
    }

    /// Which of the three supported clipping kinds a record is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ClippingKind {
        Highlight,
        Note,
        Bookmark,
    }

    /* ------------------------------- Entities ------------------------------ */

    /// One parsed block from a `My Clippings.txt` export.
    ///
    /// Immutable after parsing; the pipeline derives `ProcessedHighlight`
    /// views instead of mutating records.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Clipping {
        pub book_title: String,
        pub kind: ClippingKind,
        pub location: Location,
        /// Original textual location, preserved for display.
        pub location_text: String,
        /// None when the date fragment fails to parse.
        pub added_at: Option<NaiveDateTime>,
        /// Trimmed body text. Bookmarks carry no body of interest.
        pub body: String,
        pub page: Option<String>,
    }

    /// A highlight enriched with its associated note and category hierarchies.
    /// The unit every exporter operates on.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProcessedHighlight {
        pub book_title: String,
        pub location: Location,
        pub location_text: String,
        /// Body of the originating highlight, or [`NO_HIGHLIGHT_TEXT`] when
        /// synthesized from an orphan note.
        pub highlight_text: String,
        /// Associated note body with category tags stripped; empty if none.
        pub note_text: String,
        /// Ordered category hierarchies, outermost level first. Never empty.
        pub categories: Vec<Vec<String>>,
    }

    impl ProcessedHighlight {
        /// A highlight that has (so far) no note attached.
        pub fn bare(clipping: &Clipping) -> Self {
            Self {
                book_title: clipping.book_title.clone(),
                location: clipping.location,
                location_text: clipping.location_text.clone(),
                highlight_text: clipping.body.clone(),
                note_text: String::new(),
                categories: vec![vec![NO_CATEGORY.to_string()]],
            }
        }
    }

    /// Placeholder highlight text for notes with no reconstructable passage.
    pub const NO_HIGHLIGHT_TEXT: &str = "[No highlight text]";

    /// Sentinel category for highlights whose note carries no tag group.
    pub const NO_CATEGORY: &str = "No Category";

    /* ---------------------------- Errors (domain) ---------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum ClippingError {
        #[error("unparseable location {location_text:?} for {book_title:?}")]
        InvalidLocation {
            book_title: String,
            location_text: String,
        },
    }

    #[cfg(test)]
    mod tests {
        use super::Location;

        #[test]
        fn overlap_exact_partial_and_encapsulation() {
            assert!(Location::new(100, 110).overlaps(&Location::new(100, 110)));
            assert!(Location::new(100, 110).overlaps(&Location::new(105, 115)));
            assert!(Location::new(100, 110).overlaps(&Location::new(95, 105)));
            assert!(Location::new(100, 110).overlaps(&Location::new(102, 108)));
            assert!(Location::new(100, 110).overlaps(&Location::new(95, 115)));
        }

        #[test]
        fn overlap_is_symmetric() {
            let pairs = [
                (Location::new(100, 110), Location::new(105, 115)),
                (Location::new(100, 110), Location::new(110, 120)),
                (Location::new(100, 110), Location::new(105, 105)),
                (Location::new(100, 110), Location::new(120, 130)),
            ];
            for (a, b) in pairs {
                assert_eq!(a.overlaps(&b), b.overlaps(&a), "{a:?} vs {b:?}");
            }
        }

        #[test]
        fn adjacent_intervals_do_not_overlap() {
            assert!(!Location::new(100, 110).overlaps(&Location::new(110, 120)));
            assert!(!Location::new(100, 110).overlaps(&Location::new(90, 100)));
            assert!(!Location::new(100, 110).overlaps(&Location::new(120, 130)));
        }

        #[test]
        fn point_intervals_overlap_only_strict_interior() {
            let range = Location::new(100, 110);
            assert!(range.overlaps(&Location::point(105)));
            assert!(!range.overlaps(&Location::point(110)));
            assert!(!range.overlaps(&Location::point(100)));
            assert!(Location::point(42).overlaps(&Location::point(42)));
            assert!(!Location::point(42).overlaps(&Location::point(43)));
        }
    }
}

pub mod storage {
    use super::core::Clipping;
    use anyhow::Result;
    use std::path::Path;

    /// Parsing is independent of where the bytes come from.
    pub trait ClippingsSource {
        /// Raw record blocks in input order, delimiter removed, empties dropped.
        fn read_blocks(&self, path: &Path) -> Result<Vec<String>>;

        /// Parsed records in input order.
        fn parse_file(&self, path: &Path) -> Result<Vec<Clipping>>;
    }
}

pub mod parser {
    //! Parser for the delimited `My Clippings.txt` format.
    //!
    //! A record block is: line 0 book title, line 1 metadata (kind marker,
    //! optional page, `Location`, `Added on` date; pipe-separated), line 2
    //! blank, remaining lines body. Blocks without a recognizable kind
    //! marker are unsupported clipping types and are dropped, not errors.

    use crate::core::{Clipping, ClippingError, ClippingKind, Location};
    use crate::storage::ClippingsSource;
    use anyhow::{Context, Result};
    use chrono::NaiveDateTime;
    use nom::{
        IResult,
        character::complete::{char, digit1},
        combinator::{map_res, opt},
        error::VerboseError,
        sequence::preceded,
    };
    use std::{collections::BTreeSet, fs, path::Path};

    pub const DELIMITER: &str = "==========\n";

    const HIGHLIGHT_MARKER: &str = "Your Highlight";
    const NOTE_MARKER: &str = "Your Note";
    const BOOKMARK_MARKER: &str = "Your Bookmark";
    const LOCATION_MARKER: &str = "Location";
    const PAGE_MARKER: &str = "page ";
    const DATE_MARKER: &str = "Added on ";

    /// Kindle's English-locale date form, e.g. `Monday, February 3, 2025 8:09:12 AM`.
    const DATE_FORMAT: &str = "%A, %B %d, %Y %I:%M:%S %p";

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    /* ------------------------ Public entry points ------------------------ */

    /// Split raw file content into record blocks, dropping empty ones.
    pub fn split_blocks(content: &str) -> Vec<String> {
        content
            .split(DELIMITER)
            .filter(|block| !block.trim().is_empty())
            .map(|block| block.to_string())
            .collect()
    }

    /// Parse every supported record out of the raw file content.
    pub fn parse_clippings_from_str(content: &str) -> Result<Vec<Clipping>> {
        let mut out = Vec::new();
        for block in split_blocks(content) {
            if let Some(clipping) = parse_block(&block)
                .with_context(|| format!("parsing clipping block:\n{}", block.trim()))?
            {
                out.push(clipping);
            }
        }
        Ok(out)
    }

    /// Parse a single record block. `Ok(None)` means the block is not an
    /// annotation of interest (too short, or no kind marker).
    pub fn parse_block(block: &str) -> Result<Option<Clipping>> {
        let lines: Vec<&str> = block.split('\n').collect();
        if lines.len() < 3 {
            return Ok(None);
        }

        let book_title = lines[0].trim().to_string();
        let metadata = lines[1].trim();

        let kind = if metadata.contains(HIGHLIGHT_MARKER) {
            ClippingKind::Highlight
        } else if metadata.contains(NOTE_MARKER) {
            ClippingKind::Note
        } else if metadata.contains(BOOKMARK_MARKER) {
            ClippingKind::Bookmark
        } else {
            return Ok(None);
        };

        let location_text = metadata
            .split(LOCATION_MARKER)
            .nth(1)
            .and_then(|rest| rest.split('|').next())
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        let location = parse_location(&book_title, &location_text)?;

        let page = parse_page(metadata);
        let added_at = parse_added_at(metadata);

        let body = if lines.len() > 3 {
            lines[3..].join("\n").trim().to_string()
        } else {
            String::new()
        };

        Ok(Some(Clipping {
            book_title,
            kind,
            location,
            location_text,
            added_at,
            body,
            page,
        }))
    }

    /// Concrete source implementing the `storage::ClippingsSource` trait.
    pub struct NomClippingsParser;

    impl ClippingsSource for NomClippingsParser {
        fn read_blocks(&self, path: &Path) -> Result<Vec<String>> {
            let text =
                fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
            Ok(split_blocks(&text))
        }

        fn parse_file(&self, path: &Path) -> Result<Vec<Clipping>> {
            let text =
                fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
            parse_clippings_from_str(&text)
        }
    }

    /* ------------------------------- Helpers ------------------------------- */

    /// `"<digits>"` is a point, `"<digits>-<digits>"` a range; empty text means
    /// the metadata carried no location at all. Anything else is fatal for
    /// the record, since no sane default exists.
    pub fn parse_location(book_title: &str, text: &str) -> Result<Location> {
        if text.is_empty() {
            return Ok(Location::new(0, 0));
        }
        match location_interval(text) {
            Ok(("", location)) => Ok(location),
            _ => Err(ClippingError::InvalidLocation {
                book_title: book_title.to_string(),
                location_text: text.to_string(),
            }
            .into()),
        }
    }

    fn location_interval(i: &str) -> PResult<'_, Location> {
        let (i, start) = map_res(digit1, |s: &str| s.parse::<u32>())(i)?;
        let (i, end) = opt(preceded(char('-'), map_res(digit1, |s: &str| s.parse::<u32>())))(i)?;
        Ok((i, Location::new(start, end.unwrap_or(start))))
    }

    fn parse_page(metadata: &str) -> Option<String> {
        let at = metadata.find(PAGE_MARKER)?;
        let rest = &metadata[at + PAGE_MARKER.len()..];
        let (_, digits) = digit1::<_, VerboseError<&str>>(rest).ok()?;
        Some(digits.to_string())
    }

    fn parse_added_at(metadata: &str) -> Option<NaiveDateTime> {
        let at = metadata.find(DATE_MARKER)?;
        let fragment = metadata[at + DATE_MARKER.len()..].trim();
        NaiveDateTime::parse_from_str(fragment, DATE_FORMAT).ok()
    }

    /// Keep only records of one book, by exact title match.
    pub fn filter_by_book(clippings: Vec<Clipping>, book_title: &str) -> Vec<Clipping> {
        clippings
            .into_iter()
            .filter(|c| c.book_title == book_title)
            .collect()
    }

    /// All distinct book titles, sorted.
    pub fn list_books(clippings: &[Clipping]) -> Vec<String> {
        let titles: BTreeSet<&str> = clippings.iter().map(|c| c.book_title.as_str()).collect();
        titles.into_iter().map(|t| t.to_string()).collect()
    }

}

pub mod dedup {
    //! Overlap deduplication of highlights, per book.

    use crate::core::{Clipping, ClippingKind, Location};
    use std::collections::HashMap;

    /// Drop highlights whose interval overlaps an already-kept one of the
    /// same book, preferring the most recently added. Notes and bookmarks
    /// pass through untouched. The result is restored to ascending order by
    /// interval start.
    ///
    /// The accepted-interval map is local to one call; repeated runs in the
    /// same process never share state.
    pub fn remove_duplicates(clippings: Vec<Clipping>) -> Vec<Clipping> {
        // Newest first; records with no parseable date sort oldest, and ties
        // keep input order (stable sort).
        let mut ordered = clippings;
        ordered.sort_by(|a, b| b.added_at.cmp(&a.added_at));

        let mut accepted: HashMap<String, Vec<Location>> = HashMap::new();
        let mut kept = Vec::with_capacity(ordered.len());

        for clipping in ordered {
            if clipping.kind != ClippingKind::Highlight {
                kept.push(clipping);
                continue;
            }
            let ranges = accepted.entry(clipping.book_title.clone()).or_default();
            if ranges.iter().any(|range| range.overlaps(&clipping.location)) {
                continue;
            }
            ranges.push(clipping.location);
            kept.push(clipping);
        }

        kept.sort_by_key(|c| c.location.start);
        kept
    }

}

pub mod categories {
    //! Category tag extraction from note text.
    //!
    //! A tag group is a parenthesized run like `(P>FIB, N)`: comma-separated
    //! codes, each a `>`-separated hierarchy of levels. Level tokens are
    //! looked up in the fixed shorthand table; unknown tokens pass through
    //! verbatim. Extraction and stripping share one group scanner so they
    //! always agree on what constitutes a tag group.

    use crate::core::NO_CATEGORY;
    use nom::{
        IResult,
        bytes::complete::is_not,
        character::complete::char,
        error::VerboseError,
        sequence::delimited,
    };

    /// Shorthand code to full category name, in two parallel vocabularies.
    const SHORTHANDS: &[(&str, &str)] = &[
        ("Б", "Білки"),
        ("Ж", "Жири"),
        ("В", "Вуглеводи"),
        ("К", "Клітчатка"),
        ("М", "Мікроелементи та вітаміни"),
        ("А", "водА"),
        ("P", "Protein"),
        ("F", "Fat"),
        ("C", "Carbohydrates"),
        ("N", "Notes and Thoughts"),
        ("FIB", "Fiber"),
        ("MIC", "Micronutrients and Vitamins"),
        ("W", "Water"),
    ];

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    fn tag_group(i: &str) -> PResult<'_, &str> {
        delimited(char('('), is_not(")"), char(')'))(i)
    }

    /// Every tag group in the note as `(start byte, end byte, content)`,
    /// in order. The end excludes trailing whitespace.
    fn scan_groups(note: &str) -> Vec<(usize, usize, &str)> {
        let mut out = Vec::new();
        let mut offset = 0;
        while let Some(open) = note[offset..].find('(') {
            let at = offset + open;
            match tag_group(&note[at..]) {
                Ok((rest, content)) => {
                    let end = note.len() - rest.len();
                    out.push((at, end, content));
                    offset = end;
                }
                Err(_) => offset = at + 1,
            }
        }
        out
    }

    fn expand(token: &str) -> String {
        SHORTHANDS
            .iter()
            .find(|(code, _)| *code == token)
            .map(|(_, name)| (*name).to_string())
            .unwrap_or_else(|| token.to_string())
    }

    /// Ordered category hierarchies read out of the note's tag groups.
    /// No groups at all means the single `No Category` hierarchy.
    pub fn extract_categories(note: &str) -> Vec<Vec<String>> {
        let mut hierarchies = Vec::new();
        for (_, _, content) in scan_groups(note) {
            for code in content.split(',') {
                let hierarchy = code.split('>').map(|level| expand(level.trim())).collect();
                hierarchies.push(hierarchy);
            }
        }
        if hierarchies.is_empty() {
            vec![vec![NO_CATEGORY.to_string()]]
        } else {
            hierarchies
        }
    }

    /// The note with every tag group removed, along with one trailing run of
    /// whitespace after each.
    pub fn strip_categories(note: &str) -> String {
        let mut out = String::with_capacity(note.len());
        let mut pos = 0;
        for (start, end, _) in scan_groups(note) {
            out.push_str(&note[pos..start]);
            let mut after = end;
            while let Some(c) = note[after..].chars().next() {
                if c.is_whitespace() {
                    after += c.len_utf8();
                } else {
                    break;
                }
            }
            pos = after;
        }
        out.push_str(&note[pos..]);
        out
    }

}

pub mod projectors {
    pub mod highlight_projector {
        //! Merges deduplicated records into `ProcessedHighlight`s: every
        //! highlight becomes one, each note is folded into the first
        //! highlight it matches, and unmatched notes become synthetic
        //! highlights of their own.

        use crate::categories::{extract_categories, strip_categories};
        use crate::core::{
            Clipping, ClippingKind, ProcessedHighlight, NO_HIGHLIGHT_TEXT,
        };

        /// Project processed highlights from deduplicated records.
        ///
        /// Notes are evaluated in record order against highlights in record
        /// order; the first candidate satisfying one of the positional rules
        /// wins, and a highlight already carrying a note is withdrawn from
        /// candidacy. Matching is implicitly per book: the caller has already
        /// filtered or selected the records of one pass.
        pub fn project(clippings: &[Clipping]) -> Vec<ProcessedHighlight> {
            let mut highlights = Vec::new();
            let mut notes = Vec::new();
            for clipping in clippings {
                match clipping.kind {
                    ClippingKind::Highlight => {
                        highlights.push(ProcessedHighlight::bare(clipping))
                    }
                    ClippingKind::Note => notes.push(clipping),
                    ClippingKind::Bookmark => {}
                }
            }

            let mut taken = vec![false; highlights.len()];
            for note in notes {
                let note_start = note.location.start;
                let mut matched = false;
                for (idx, highlight) in highlights.iter_mut().enumerate() {
                    if taken[idx] {
                        continue;
                    }
                    let (start, end) = (highlight.location.start, highlight.location.end);
                    // Kindle places a note at, or one position before, the end
                    // of the passage it annotates.
                    let at_tail = note_start == end || note_start + 1 == end;
                    let inside = start <= note_start && note_start <= end;
                    let on_point = start == end && note_start == start;
                    if at_tail || inside || on_point {
                        highlight.note_text = strip_categories(&note.body);
                        highlight.categories = extract_categories(&note.body);
                        taken[idx] = true;
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    highlights.push(ProcessedHighlight {
                        book_title: note.book_title.clone(),
                        location: note.location,
                        location_text: note.location_text.clone(),
                        highlight_text: NO_HIGHLIGHT_TEXT.to_string(),
                        note_text: strip_categories(&note.body),
                        categories: extract_categories(&note.body),
                    });
                    taken.push(true);
                }
            }

            highlights
        }

    }
}

pub mod tree {
    //! Merged category tree for the hierarchical document renderer.
    //!
    //! Built fresh per export call from the full set of processed
    //! highlights, then discarded after rendering.

    use crate::core::ProcessedHighlight;
    use indexmap::IndexMap;
    use serde::Serialize;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct CategoryEntry {
        pub highlight_text: String,
        pub note_text: String,
    }

    /// One category with its attached highlight/note pairs and children,
    /// keyed by normalized name so spelling variants merge.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct CategoryNode {
        pub display_name: String,
        pub entries: Vec<CategoryEntry>,
        pub children: IndexMap<String, CategoryNode>,
    }

    impl CategoryNode {
        fn new(display_name: String) -> Self {
            Self {
                display_name,
                entries: Vec::new(),
                children: IndexMap::new(),
            }
        }
    }

    /// Merge identity: lowercase, with any whitespace around a hyphen
    /// collapsed to the bare hyphen. "A - B", "a- b" and "a-b" key alike.
    pub fn normalize_category(raw: &str) -> String {
        rewrite_hyphen_spacing(&raw.to_lowercase(), "-")
    }

    /// Display form: hyphens re-spaced to `" - "`, words title-cased except
    /// fully uppercase words longer than one character (acronyms).
    pub fn format_category_display(raw: &str) -> String {
        let spaced = rewrite_hyphen_spacing(raw, " - ");
        spaced
            .split_whitespace()
            .map(|word| {
                let is_acronym = word.chars().count() > 1
                    && word.chars().any(|c| c.is_uppercase())
                    && !word.chars().any(|c| c.is_lowercase());
                if is_acronym {
                    word.to_string()
                } else {
                    capitalize(word)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn capitalize(word: &str) -> String {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            }
            None => String::new(),
        }
    }

    /// Replace every hyphen, together with the whitespace around it, by `repl`.
    fn rewrite_hyphen_spacing(s: &str, repl: &str) -> String {
        let chars: Vec<char> = s.chars().collect();
        let mut out = String::with_capacity(s.len());
        let mut i = 0;
        while i < chars.len() {
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && chars[j] == '-' {
                j += 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                out.push_str(repl);
                i = j;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        out
    }

    /// Build the merged tree. The first-seen raw spelling of each normalized
    /// key supplies the display name; every hierarchy of every highlight
    /// attaches its highlight/note pair at the hierarchy's last level.
    pub fn build_tree(highlights: &[ProcessedHighlight]) -> IndexMap<String, CategoryNode> {
        let mut display_names: IndexMap<String, String> = IndexMap::new();
        for highlight in highlights {
            for hierarchy in &highlight.categories {
                for raw in hierarchy {
                    display_names
                        .entry(normalize_category(raw))
                        .or_insert_with(|| format_category_display(raw));
                }
            }
        }

        let mut roots: IndexMap<String, CategoryNode> = IndexMap::new();
        for highlight in highlights {
            for hierarchy in &highlight.categories {
                let keys: Vec<String> =
                    hierarchy.iter().map(|raw| normalize_category(raw)).collect();
                let mut level = &mut roots;
                for (depth, key) in keys.iter().enumerate() {
                    let node = level.entry(key.clone()).or_insert_with(|| {
                        let display = display_names
                            .get(key)
                            .cloned()
                            .unwrap_or_else(|| key.clone());
                        CategoryNode::new(display)
                    });
                    if depth + 1 == keys.len() {
                        node.entries.push(CategoryEntry {
                            highlight_text: highlight.highlight_text.clone(),
                            note_text: highlight.note_text.clone(),
                        });
                    }
                    level = &mut node.children;
                }
            }
        }
        roots
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::Location;

        fn processed(categories: Vec<Vec<&str>>, text: &str) -> ProcessedHighlight {
            ProcessedHighlight {
                book_title: "Book".to_string(),
                location: Location::new(1, 2),
                location_text: "1-2".to_string(),
                highlight_text: text.to_string(),
                note_text: String::new(),
                categories: categories
                    .into_iter()
                    .map(|h| h.into_iter().map(|c| c.to_string()).collect())
                    .collect(),
            }
        }

        #[test]
        fn case_and_hyphen_variants_merge_into_one_node() {
            let highlights = vec![
                processed(vec![vec!["Diet", "Sub"]], "one"),
                processed(vec![vec!["diet", "Sub"]], "two"),
                processed(vec![vec!["Diet - Plan", "Sub"]], "three"),
                processed(vec![vec!["diet-plan"]], "four"),
            ];
            let tree = build_tree(&highlights);
            assert_eq!(tree.len(), 2);
            let diet = tree.get("diet").expect("diet node");
            assert_eq!(diet.display_name, "Diet");
            assert_eq!(diet.children.len(), 1);
            assert_eq!(diet.children.get("sub").unwrap().entries.len(), 2);
            let plan = tree.get("diet-plan").expect("diet-plan node");
            assert_eq!(plan.display_name, "Diet - Plan");
            assert_eq!(plan.entries.len(), 1);
        }

        #[test]
        fn acronyms_survive_display_formatting() {
            assert_eq!(format_category_display("DNA repair"), "DNA Repair");
            assert_eq!(format_category_display("fasting"), "Fasting");
            assert_eq!(format_category_display("my-plan"), "My - Plan");
        }

        #[test]
        fn normalization_collapses_spacing_around_hyphens() {
            for variant in ["A - B", "a- b", "A -B", "a-b"] {
                assert_eq!(normalize_category(variant), "a-b");
            }
        }

        #[test]
        fn pair_attaches_once_per_hierarchy() {
            let highlights = vec![processed(vec![vec!["One"], vec!["Two", "Deep"]], "both")];
            let tree = build_tree(&highlights);
            assert_eq!(tree.get("one").unwrap().entries.len(), 1);
            let two = tree.get("two").unwrap();
            assert!(two.entries.is_empty());
            assert_eq!(two.children.get("deep").unwrap().entries.len(), 1);
        }
    }
}

pub mod export {
    //! The three output renderers. Each builds the complete document in
    //! memory so the caller can write it in a single operation.

    use crate::core::ProcessedHighlight;
    use crate::parser::DELIMITER;
    use crate::tree::CategoryNode;
    use indexmap::IndexMap;

    /// Hierarchical category document: one `#` per depth level, a bullet per
    /// highlight, notes attached beneath their bullet.
    pub fn render_markdown(tree: &IndexMap<String, CategoryNode>) -> String {
        let mut out = String::new();
        write_nodes(&mut out, tree, 1);
        out
    }

    fn write_nodes(out: &mut String, nodes: &IndexMap<String, CategoryNode>, level: usize) {
        for node in nodes.values() {
            out.push_str(&"#".repeat(level));
            out.push(' ');
            out.push_str(&node.display_name);
            out.push_str("\n\n");
            for entry in &node.entries {
                out.push_str("* ");
                out.push_str(&entry.highlight_text);
                out.push('\n');
                if entry.note_text.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str("\n  **Note**: *");
                    out.push_str(&entry.note_text);
                    out.push_str("*\n\n");
                }
            }
            if !node.entries.is_empty() {
                out.push('\n');
            }
            write_nodes(out, &node.children, level + 1);
        }
    }

    /// Flat bullet list with a separator line per new book, in input order.
    pub fn render_bullets(highlights: &[ProcessedHighlight]) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut current_title = "";
        for highlight in highlights {
            if highlight.book_title != current_title {
                lines.push(format!("=========== {} ===========\n", highlight.book_title));
                current_title = &highlight.book_title;
            }
            lines.push(format!("* {}", highlight.highlight_text));
            if highlight.note_text.is_empty() {
                lines.push(String::new());
            } else {
                lines.push(format!("  - Note: {}\n", highlight.note_text));
            }
        }
        lines.join("\n")
    }

    /// Raw blocks re-emitted verbatim, each terminated by the delimiter when
    /// it does not already end with one.
    pub fn render_raw(blocks: &[String]) -> String {
        let mut out = String::new();
        for block in blocks {
            out.push_str(block);
            if !block.trim().ends_with(DELIMITER.trim_end()) {
                out.push_str(DELIMITER);
            }
        }
        out
    }

}

pub use export::{render_bullets, render_markdown, render_raw};
pub use parser::parse_clippings_from_str;
