use super::{DecisionState, QueueRecord};
use serde::Serialize;

/// One queue position as drawn in a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSegment {
    Included,
    Excluded,
    Undecided,
}

impl ProgressSegment {
    fn symbol(&self) -> char {
        match self {
            ProgressSegment::Included => '+',
            ProgressSegment::Excluded => '-',
            ProgressSegment::Undecided => '.',
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub total: usize,
    pub decided: usize,
    pub included: usize,
    pub excluded: usize,
    pub undecided: usize,
}

pub(super) fn counts(records: &[QueueRecord]) -> QueueCounts {
    records
        .iter()
        .fold(QueueCounts::default(), |mut counts, record| {
            counts.total += 1;
            match record.decision() {
                DecisionState::Included => counts.included += 1,
                DecisionState::Excluded => counts.excluded += 1,
                DecisionState::Undecided => counts.undecided += 1,
            }
            counts.decided = counts.included + counts.excluded;
            counts
        })
}

pub(super) fn segments(records: &[QueueRecord]) -> Vec<ProgressSegment> {
    records
        .iter()
        .map(|record| match record.decision() {
            DecisionState::Included => ProgressSegment::Included,
            DecisionState::Excluded => ProgressSegment::Excluded,
            DecisionState::Undecided => ProgressSegment::Undecided,
        })
        .collect()
}

/// `[++-..]` with the cursor position bracketed as `(.)`.
pub fn render_bar(segments: &[ProgressSegment], cursor: Option<usize>) -> String {
    let mut bar = String::with_capacity(segments.len() + 4);
    bar.push('[');
    for (index, segment) in segments.iter().enumerate() {
        if cursor == Some(index) {
            bar.push('(');
            bar.push(segment.symbol());
            bar.push(')');
        } else {
            bar.push(segment.symbol());
        }
    }
    bar.push(']');
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_marks_cursor_position() {
        let segments = [
            ProgressSegment::Included,
            ProgressSegment::Excluded,
            ProgressSegment::Undecided,
            ProgressSegment::Undecided,
        ];
        assert_eq!(render_bar(&segments, Some(2)), "[+-(.).]");
        assert_eq!(render_bar(&segments, None), "[+-..]");
        assert_eq!(render_bar(&[], None), "[]");
    }
}
