use std::ops::Range;

use bytes::Bytes;

use super::Side;

#[derive(Debug, Clone)]
pub(super) struct Insertion {
    pub position: usize,
    pub side: Side,
    pub sequence: usize,
    pub content: Bytes,
}

/// Sorts ranges and merges the ones that overlap or touch. Empty ranges are dropped.
pub(super) fn coalesce(ranges: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut sorted: Vec<Range<usize>> = ranges.iter().filter(|r| !r.is_empty()).cloned().collect();
    sorted.sort_by_key(|range| range.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Single pass over `original`: at every boundary the left insertions are
/// emitted in call order, then the right insertions in call order, then the
/// original byte at that boundary unless a removal covers it.
pub(super) fn apply(original: &[u8], insertions: &[Insertion], removals: &[Range<usize>]) -> Vec<u8> {
    let removals = coalesce(removals);

    let mut ordered: Vec<&Insertion> = insertions.iter().collect();
    ordered.sort_by_key(|insertion| (insertion.position, insertion.side, insertion.sequence));

    let inserted: usize = ordered.iter().map(|insertion| insertion.content.len()).sum();
    let mut output = Vec::with_capacity(original.len() + inserted);

    let mut cursor = 0;
    for insertion in ordered {
        copy_surviving(original, cursor..insertion.position, &removals, &mut output);
        cursor = insertion.position;
        output.extend_from_slice(&insertion.content);
    }
    copy_surviving(original, cursor..original.len(), &removals, &mut output);

    output
}

fn copy_surviving(
    original: &[u8],
    span: Range<usize>,
    removals: &[Range<usize>],
    output: &mut Vec<u8>,
) {
    let mut start = span.start;
    for removal in removals {
        if removal.end <= start {
            continue;
        }
        if removal.start >= span.end {
            break;
        }
        if removal.start > start {
            output.extend_from_slice(&original[start..removal.start]);
        }
        start = removal.end;
        if start >= span.end {
            return;
        }
    }
    if start < span.end {
        output.extend_from_slice(&original[start..span.end]);
    }
}
