//! Fence-marker scanning across frame boundaries.

/// Default delimiter marking entry/exit of a code region.
pub const DEFAULT_FENCE_MARKER: &str = "```";

/// Classification of streamed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Prose,
    Code,
}

impl Mode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Prose => Self::Code,
            Self::Code => Self::Prose,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prose => "prose",
            Self::Code => "code",
        }
    }
}

/// Piece of a scanned token, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Marker,
}

/// Splits token text at fence markers.
///
/// The scanner does not track [`Mode`]; it only reports where markers occur. A
/// trailing fragment that could be the start of a marker is held back and
/// resolved against the next call to [`FenceScanner::scan`], so a marker split
/// across frames is still reported exactly once.
#[derive(Debug, Clone)]
pub struct FenceScanner {
    marker: String,
    pending: String,
}

impl Default for FenceScanner {
    fn default() -> Self {
        Self::new(DEFAULT_FENCE_MARKER)
    }
}

impl FenceScanner {
    /// Creates a scanner for `marker`. An empty marker falls back to [`DEFAULT_FENCE_MARKER`].
    pub fn new(marker: impl Into<String>) -> Self {
        let marker = marker.into();
        let marker = if marker.is_empty() {
            DEFAULT_FENCE_MARKER.to_string()
        } else {
            marker
        };

        Self {
            marker,
            pending: String::new(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Partial-marker prefix currently held back.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn scan(&mut self, text: &str) -> Vec<Piece> {
        let mut input = std::mem::take(&mut self.pending);
        input.push_str(text);

        let mut pieces = Vec::new();
        let mut rest = input.as_str();

        while let Some(index) = rest.find(self.marker.as_str()) {
            if index > 0 {
                pieces.push(Piece::Text(rest[..index].to_string()));
            }
            pieces.push(Piece::Marker);
            rest = &rest[index + self.marker.len()..];
        }

        let held = partial_marker_suffix_len(rest, &self.marker);
        let (emit, hold) = rest.split_at(rest.len() - held);
        if !emit.is_empty() {
            pieces.push(Piece::Text(emit.to_string()));
        }
        self.pending = hold.to_string();

        pieces
    }

    /// Releases the held-back fragment as literal text.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Length of the longest proper prefix of `marker` that `text` ends with.
fn partial_marker_suffix_len(text: &str, marker: &str) -> usize {
    let longest = text.len().min(marker.len().saturating_sub(1));
    (1..=longest)
        .rev()
        .find(|&len| marker.is_char_boundary(len) && text.ends_with(&marker[..len]))
        .unwrap_or(0)
}
