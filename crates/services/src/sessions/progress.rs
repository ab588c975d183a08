/// Aggregated view of attempt progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    /// Questions without an answer yet.
    pub remaining: usize,
    /// Zero-based cursor into the question order.
    pub current_index: usize,
    pub is_complete: bool,
}
