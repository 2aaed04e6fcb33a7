//! Line tables over source bytes.
//!
//! Lines and columns are 1-indexed; columns count bytes. The decoder fills in
//! missing fact positions from a [`LineIndex`], and the renderer cuts segments
//! at its line starts.

// ============================================================================
// Line Scanning
// ============================================================================

/// Byte offset of the end of the line containing `offset` (the `\n` or EOF).
pub fn line_end(content: &[u8], offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[offset..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| offset + p)
        .unwrap_or(content.len())
}

// ============================================================================
// Line Index
// ============================================================================

/// Line start table for a file, built once per file.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first byte of each line. Always starts with 0.
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(content: &[u8]) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            content
                .iter()
                .enumerate()
                .filter(|&(_, &b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        LineIndex {
            line_starts,
            len: content.len(),
        }
    }

    /// Convert a byte offset to (line, col). Offsets past the end clamp.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line_idx = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let col = offset - self.line_starts[line_idx];
        ((line_idx + 1) as u32, (col + 1) as u32)
    }

    /// Byte offsets where each line starts, ascending.
    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }
}

// ============================================================================
// Tests
// ============================================================================
