use chronicle_store::types::Message;

/// Which half of an incremental run a window belongs to. Full-mode windows
/// are always [`WindowPhase::New`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    /// Re-derived analyzer state only — the analyzer must not write during
    /// this phase (§4.3, §4.5 "incremental catch-up").
    Context,
    New,
}

/// One contiguous slice of eligible messages handed to the analyzer.
#[derive(Debug, Clone)]
pub struct Window {
    pub phase: WindowPhase,
    pub window_index: usize,
    pub messages: Vec<Message>,
}

impl Window {
    pub fn start_message_id(&self) -> Option<chronicle_core::types::MessageId> {
        self.messages.first().map(|m| m.id)
    }

    pub fn end_message_id(&self) -> Option<chronicle_core::types::MessageId> {
        self.messages.last().map(|m| m.id)
    }
}

/// Stride and window-count math shared by both modes (§4.3).
///
/// `window_count(N)` is `ceil(max(1, N) / (window_size - overlap))` —
/// deliberately at least 1 even for an empty corpus, since a room with zero
/// or few eligible messages still produces exactly one (possibly empty)
/// window.
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    pub window_size: usize,
    pub overlap: usize,
}

impl WindowConfig {
    pub fn stride(&self) -> usize {
        self.window_size - self.overlap
    }

    pub fn window_count(&self, eligible_count: usize) -> usize {
        let stride = self.stride();
        let n = eligible_count.max(1);
        n.div_ceil(stride)
    }

    /// `(start, end)` index bounds (into an ordered id list) for window `i`.
    /// `end` is clamped to `total_len`; `start` may equal `total_len` for a
    /// trailing window of an otherwise-empty corpus, in which case the slice
    /// is empty.
    pub fn bounds(&self, i: usize, total_len: usize) -> (usize, usize) {
        let start = (i * self.stride()).min(total_len);
        let end = (start + self.window_size).min(total_len);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_plus_one_still_advances() {
        let cfg = WindowConfig { window_size: 11, overlap: 10 };
        assert_eq!(cfg.stride(), 1);
    }

    #[test]
    fn short_corpus_is_exactly_one_window() {
        let cfg = WindowConfig { window_size: 300, overlap: 40 };
        assert_eq!(cfg.window_count(5), 1);
        assert_eq!(cfg.bounds(0, 5), (0, 5));
    }

    #[test]
    fn empty_corpus_still_yields_one_window() {
        let cfg = WindowConfig { window_size: 300, overlap: 40 };
        assert_eq!(cfg.window_count(0), 1);
        assert_eq!(cfg.bounds(0, 0), (0, 0));
    }

    #[test]
    fn windows_advance_by_stride() {
        let cfg = WindowConfig { window_size: 10, overlap: 4 };
        assert_eq!(cfg.window_count(20), 20_usize.div_ceil(6));
        assert_eq!(cfg.bounds(0, 20), (0, 10));
        assert_eq!(cfg.bounds(1, 20), (6, 16));
        assert_eq!(cfg.bounds(2, 20), (12, 20));
    }
}
