//! Buffer for text inside a fenced code region.

/// A code region that was closed by its ending marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBlock {
    pub text: String,
    pub lines: usize,
}

/// Holds only the current contiguous code region.
///
/// `live` is non-empty only while a region is open. Closing the region moves
/// it to `last_block`, which is dropped when the next region opens or on
/// [`CodeAccumulator::clear`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeAccumulator {
    live: String,
    live_lines: usize,
    last_block: Option<CodeBlock>,
}

impl CodeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of the open region.
    pub fn buffer(&self) -> &str {
        &self.live
    }

    /// Newlines seen in the open region.
    pub fn line_count(&self) -> usize {
        self.live_lines
    }

    pub fn last_block(&self) -> Option<&CodeBlock> {
        self.last_block.as_ref()
    }

    /// Starts a new region, dropping the previously closed one.
    pub fn open_region(&mut self) {
        self.live.clear();
        self.live_lines = 0;
        self.last_block = None;
    }

    /// Appends `segment` to the open region and returns its newline count.
    pub fn append(&mut self, segment: &str) -> usize {
        let lines = count_newlines(segment);
        self.live.push_str(segment);
        self.live_lines += lines;
        lines
    }

    /// Closes the open region. Empty regions leave no block behind.
    pub fn close_region(&mut self) {
        let text = std::mem::take(&mut self.live);
        let lines = std::mem::take(&mut self.live_lines);
        if !text.is_empty() {
            self.last_block = Some(CodeBlock { text, lines });
        }
    }

    pub fn clear(&mut self) {
        self.live.clear();
        self.live_lines = 0;
        self.last_block = None;
    }
}

pub fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|byte| *byte == b'\n').count()
}
