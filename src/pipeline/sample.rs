//! Page sampling for large documents.
//!
//! Rasterisation and OCR cost seconds per page; on a 400-page scan the full
//! run would never finish within the budget. Sampling bounds that cost by
//! choosing which pages may receive expensive work. Pages left out still get
//! a section in the output, with a placeholder.

use std::collections::BTreeSet;

/// Sizes of the three sampling groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePolicy {
    /// Leading pages always selected.
    pub head: usize,
    /// Trailing pages always selected.
    pub tail: usize,
    /// Upper bound on head + needs-visual pages.
    pub cap: usize,
}

impl Default for SamplePolicy {
    fn default() -> Self {
        Self {
            head: 5,
            tail: 3,
            cap: 20,
        }
    }
}

/// Choose the 0-based pages eligible for expensive work.
///
/// Groups are added in a fixed order: the first `head` pages, then pages
/// flagged in `needs_visual` in ascending order while the selection is below
/// `cap`, then the last `tail` pages. The result is sorted and deduplicated.
/// Indices outside `0..total_pages` are ignored.
pub fn select_sample(
    total_pages: usize,
    needs_visual: &BTreeSet<usize>,
    policy: SamplePolicy,
) -> BTreeSet<usize> {
    let mut selected: BTreeSet<usize> = (0..policy.head.min(total_pages)).collect();

    for &page in needs_visual.range(..total_pages) {
        if selected.len() >= policy.cap {
            break;
        }
        selected.insert(page);
    }

    // Short documents are already covered by the head.
    if total_pages > policy.head {
        selected.extend(total_pages.saturating_sub(policy.tail)..total_pages);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pages: &[usize]) -> BTreeSet<usize> {
        pages.iter().copied().collect()
    }

    #[test]
    fn head_needs_visual_and_tail() {
        let sample = select_sample(100, &set(&[10, 40, 70]), SamplePolicy::default());
        assert_eq!(sample, set(&[0, 1, 2, 3, 4, 10, 40, 70, 97, 98, 99]));
    }

    #[test]
    fn needs_visual_is_capped() {
        let needs: BTreeSet<usize> = (0..200).collect();
        let sample = select_sample(200, &needs, SamplePolicy::default());
        // 20 from head + needs-visual, then 3 tail pages.
        assert_eq!(sample.len(), 23);
        assert_eq!(sample.iter().next_back(), Some(&199));
        assert!(sample.contains(&19));
        assert!(!sample.contains(&20));
    }

    #[test]
    fn short_documents_are_fully_selected() {
        let sample = select_sample(3, &BTreeSet::new(), SamplePolicy::default());
        assert_eq!(sample, set(&[0, 1, 2]));
        assert!(select_sample(0, &set(&[0]), SamplePolicy::default()).is_empty());
    }

    #[test]
    fn out_of_range_flags_are_ignored() {
        let sample = select_sample(6, &set(&[5, 9, 100]), SamplePolicy::default());
        assert_eq!(sample, set(&[0, 1, 2, 3, 4, 5]));
    }

    #[test]
    fn selection_is_deterministic() {
        let needs = set(&[12, 13, 55, 81]);
        let first = select_sample(90, &needs, SamplePolicy::default());
        for _ in 0..10 {
            assert_eq!(select_sample(90, &needs, SamplePolicy::default()), first);
        }
    }
}
