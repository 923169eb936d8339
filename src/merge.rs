use crate::source::LineSource;

/// One line emitted by the merge, with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLine {
    pub text: String,
    /// Index of the source in the list given to [`MergedLines::new`]
    pub source: usize,
    pub line_number: usize,
}

struct Slot<'a> {
    source: Box<dyn LineSource + 'a>,
    current: Option<String>,
    line_number: usize,
}

impl<'a> Slot<'a> {
    fn new(mut source: Box<dyn LineSource + 'a>) -> Self {
        let current = source.next_line();
        let line_number = source.line_number();
        Slot {
            source,
            current,
            line_number,
        }
    }

    fn advance(&mut self) -> Option<(String, usize)> {
        let line = self.current.take()?;
        let line_number = self.line_number;
        self.current = self.source.next_line();
        self.line_number = self.source.line_number();
        Some((line, line_number))
    }
}

/// K-way merge of individually sorted line sources.
///
/// Every source is assumed to be sorted ascending already. Each step picks
/// the smallest buffered line (lowest source index on ties) and advances
/// only that source, so the output is the stable union of all inputs.
/// A linear scan per line is fine for the handful of files this sees.
pub struct MergedLines<'a> {
    slots: Vec<Slot<'a>>,
}

impl<'a> MergedLines<'a> {
    pub fn new(sources: Vec<Box<dyn LineSource + 'a>>) -> Self {
        MergedLines {
            slots: sources.into_iter().map(Slot::new).collect(),
        }
    }

    pub fn source_count(&self) -> usize {
        self.slots.len()
    }

    pub fn source_name(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|slot| slot.source.name())
    }

    pub fn is_exhausted(&self) -> bool {
        self.slots.iter().all(|slot| slot.current.is_none())
    }
}

impl Iterator for MergedLines<'_> {
    type Item = MergedLine;

    fn next(&mut self) -> Option<MergedLine> {
        // min_by keeps the first of equal elements, which gives the tie-break
        let index = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.current.as_deref().map(|line| (i, line)))
            .min_by(|a, b| a.1.cmp(b.1))?
            .0;

        let (text, line_number) = self.slots[index].advance()?;
        Some(MergedLine {
            text,
            source: index,
            line_number,
        })
    }
}
