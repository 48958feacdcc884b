// Inactivity trimming: split a run into retained segments, cutting every
// player-inactive period down to the configured cap.
// Pure pass over in-memory samples; DB access stays in metrics_repo.

use crate::models::{minutes_between, DiscardedSpan, RunStatistics, Sample, Segment};
use tracing::debug;

/// A maximal run of consecutive samples sharing the same inactivity state,
/// as a half-open index range into the sorted sample slice.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InactivityGroup {
    inactive: bool,
    start: usize,
    end: usize,
}

/// Trims long player-inactivity periods out of one run.
///
/// Samples are sorted by timestamp first; the run is then partitioned into
/// maximal groups of consecutive samples with the same "zero players" state.
/// Active groups and tolerable inactive groups (span at most
/// `max_minutes_without_players`) accumulate into the current segment. A
/// longer inactive group keeps only its leading portion up to the cap, the
/// current segment is closed, and the rest of the group is recorded as a
/// discarded span.
///
/// An empty run yields no segments and zeroed statistics. A run with no
/// inactive sample comes back as a single segment with nothing rejected.
pub fn segment_run(
    mut samples: Vec<Sample>,
    max_minutes_without_players: f64,
) -> (Vec<Segment>, RunStatistics) {
    if samples.is_empty() {
        return (Vec::new(), RunStatistics::default());
    }
    samples.sort_by_key(|s| s.timestamp);

    let total_minutes = minutes_between(
        samples[0].timestamp,
        samples[samples.len() - 1].timestamp,
    );

    let mut segments: Vec<Segment> = Vec::new();
    let mut current: Vec<Sample> = Vec::new();
    let mut discarded: Vec<DiscardedSpan> = Vec::new();
    let mut rejected_minutes = 0.0;

    for group in group_by_inactivity(&samples) {
        if !group.inactive {
            current.extend_from_slice(&samples[group.start..group.end]);
            continue;
        }

        let duration = inactive_group_minutes(&samples, &group);
        if duration <= max_minutes_without_players {
            // Tolerable: keep the short inactive stretch inside the segment.
            current.extend_from_slice(&samples[group.start..group.end]);
            continue;
        }

        // Long inactive period: retain the leading cap, drop the rest.
        let cut = cut_index(&samples, &group, max_minutes_without_players);
        current.extend_from_slice(&samples[group.start..=cut]);
        if !current.is_empty() {
            segments.push(Segment {
                samples: std::mem::take(&mut current),
            });
        }

        let span_start = samples[cut].timestamp;
        let span_end = samples[group.end - 1].timestamp;
        let span_minutes = (duration - max_minutes_without_players).clamp(0.0, duration);
        debug!(
            start = %span_start,
            end = %span_end,
            minutes = span_minutes,
            "discarding inactive span"
        );
        rejected_minutes += span_minutes;
        discarded.push(DiscardedSpan {
            start: span_start,
            end: span_end,
            duration_minutes: span_minutes,
        });
    }

    if !current.is_empty() {
        segments.push(Segment { samples: current });
    }
    segments.retain(|s| !s.samples.is_empty());

    let stats = RunStatistics {
        total_minutes,
        accepted_minutes: total_minutes - rejected_minutes,
        rejected_minutes,
        discarded,
    };
    (segments, stats)
}

/// Run-length grouping over the `players_online == 0` predicate: a linear
/// scan tracking the current state and run start, emitting a group at every
/// state change.
fn group_by_inactivity(samples: &[Sample]) -> Vec<InactivityGroup> {
    let mut groups = Vec::new();
    let mut run_start = 0usize;
    let mut run_inactive = samples[0].is_inactive();

    for (i, sample) in samples.iter().enumerate().skip(1) {
        if sample.is_inactive() != run_inactive {
            groups.push(InactivityGroup {
                inactive: run_inactive,
                start: run_start,
                end: i,
            });
            run_start = i;
            run_inactive = sample.is_inactive();
        }
    }
    groups.push(InactivityGroup {
        inactive: run_inactive,
        start: run_start,
        end: samples.len(),
    });
    groups
}

/// Span of an inactive group in minutes. A single-sample group has no
/// internal span, so it measures the forward gap to the next sample
/// (zero when it closes the run).
fn inactive_group_minutes(samples: &[Sample], group: &InactivityGroup) -> f64 {
    if group.end - group.start > 1 {
        minutes_between(
            samples[group.start].timestamp,
            samples[group.end - 1].timestamp,
        )
    } else if group.end < samples.len() {
        minutes_between(samples[group.start].timestamp, samples[group.end].timestamp)
    } else {
        0.0
    }
}

/// Index of the cut point: the last sample of the group at or before
/// `group start + cap`. Falls back to the group's first sample when even
/// that instant precedes every later sample, so cuts always land on sample
/// boundaries.
fn cut_index(samples: &[Sample], group: &InactivityGroup, cap_minutes: f64) -> usize {
    let group_start = samples[group.start].timestamp;
    let mut cut = group.start;
    for i in group.start..group.end {
        if minutes_between(group_start, samples[i].timestamp) <= cap_minutes {
            cut = i;
        } else {
            break;
        }
    }
    cut
}
