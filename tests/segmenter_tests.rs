// Inactivity segmenter tests: trimming scenarios, conservation, and
// threshold monotonicity.

use chrono::{DateTime, Duration, TimeZone, Utc};
use mcperf::models::Sample;
use mcperf::segmenter::segment_run;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 11, 18, 0, 0).unwrap()
}

fn sample_at(minute: i64, players: u32) -> Sample {
    Sample {
        timestamp: base() + Duration::minutes(minute),
        players_online: Some(players),
        tps: Some(20.0),
        cpu_usage: Some(35.0),
        ram_usage: Some(2048.0),
        avg_ping: Some(40.0),
    }
}

/// One sample per minute with the given player counts.
fn run_of(players: &[u32]) -> Vec<Sample> {
    players
        .iter()
        .enumerate()
        .map(|(i, &p)| sample_at(i as i64, p))
        .collect()
}

fn flatten(segments: &[mcperf::models::Segment]) -> Vec<Sample> {
    segments
        .iter()
        .flat_map(|s| s.samples.iter().cloned())
        .collect()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "expected {b}, got {a}");
}

#[test]
fn empty_run_returns_empty() {
    let (segments, stats) = segment_run(Vec::new(), 5.0);
    assert!(segments.is_empty());
    assert_eq!(stats.total_minutes, 0.0);
    assert_eq!(stats.accepted_minutes, 0.0);
    assert_eq!(stats.rejected_minutes, 0.0);
    assert!(stats.discarded.is_empty());
}

#[test]
fn single_sample_run_is_one_segment() {
    let (segments, stats) = segment_run(vec![sample_at(0, 3)], 5.0);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].samples.len(), 1);
    assert_eq!(stats.total_minutes, 0.0);
    assert_eq!(stats.rejected_minutes, 0.0);
}

#[test]
fn all_active_run_is_one_untouched_segment() {
    let samples = run_of(&[5, 3, 4, 2, 1]);
    let (segments, stats) = segment_run(samples.clone(), 2.0);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].samples, samples);
    assert_eq!(stats.rejected_minutes, 0.0);
    assert_close(stats.accepted_minutes, stats.total_minutes);
}

#[test]
fn tolerable_inactivity_is_folded_into_segment() {
    let samples = run_of(&[5, 0, 0, 0, 5]);
    let (segments, stats) = segment_run(samples.clone(), 5.0);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].samples, samples);
    assert_eq!(stats.rejected_minutes, 0.0);
    assert!(stats.discarded.is_empty());
}

#[test]
fn long_inactive_period_is_cut_at_the_cap() {
    // 10 samples at 1-min spacing; inactive minutes 3..=7 span 4 minutes.
    let samples = run_of(&[5, 5, 5, 0, 0, 0, 0, 0, 5, 5]);
    let (segments, stats) = segment_run(samples, 2.0);

    assert_eq!(segments.len(), 2);
    // Active prefix plus the first 2 minutes of inactivity.
    assert_eq!(segments[0].samples.len(), 6);
    assert_eq!(segments[0].end(), base() + Duration::minutes(5));
    // Resumes after the inactive group.
    assert_eq!(segments[1].samples.len(), 2);
    assert_eq!(segments[1].start(), base() + Duration::minutes(8));

    assert_close(stats.total_minutes, 9.0);
    assert_close(stats.rejected_minutes, 2.0);
    assert_close(stats.accepted_minutes, 7.0);
    assert_eq!(stats.discarded.len(), 1);
    assert_eq!(stats.discarded[0].start, base() + Duration::minutes(5));
    assert_eq!(stats.discarded[0].end, base() + Duration::minutes(7));
    assert_close(stats.discarded[0].duration_minutes, 2.0);
}

#[test]
fn entirely_inactive_run_keeps_leading_cap() {
    // 5 zero-player samples at 1-min spacing, cap 1 minute.
    let samples = run_of(&[0, 0, 0, 0, 0]);
    let (segments, stats) = segment_run(samples, 1.0);

    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].samples.len(), 2);
    assert_close(stats.total_minutes, 4.0);
    assert_close(stats.rejected_minutes, 3.0);
    assert_close(stats.accepted_minutes, 1.0);
}

#[test]
fn zero_cap_discards_whole_inactive_span() {
    let samples = run_of(&[5, 0, 0, 0, 5]);
    let (segments, stats) = segment_run(samples, 0.0);

    assert_eq!(segments.len(), 2);
    // Cut lands on the group's first sample.
    assert_eq!(segments[0].samples.len(), 2);
    assert_eq!(segments[1].samples.len(), 1);
    assert_close(stats.rejected_minutes, 2.0);
    assert_close(stats.accepted_minutes, 2.0);
}

#[test]
fn single_inactive_sample_measures_forward_gap() {
    let samples = vec![sample_at(0, 5), sample_at(1, 0), sample_at(10, 5)];
    let (segments, stats) = segment_run(samples, 2.0);

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].samples.len(), 2);
    assert_eq!(segments[1].samples.len(), 1);
    assert_close(stats.rejected_minutes, 7.0);
    assert_close(stats.accepted_minutes, 3.0);

    // The lone inactive sample yields a zero-extent span whose duration is
    // the trimmed forward gap.
    assert_eq!(stats.discarded.len(), 1);
    assert_eq!(stats.discarded[0].start, base() + Duration::minutes(1));
    assert_eq!(stats.discarded[0].end, stats.discarded[0].start);
    assert_close(stats.discarded[0].duration_minutes, 7.0);
}

#[test]
fn trailing_single_inactive_sample_has_zero_gap() {
    let samples = run_of(&[5, 5, 0]);
    let (segments, stats) = segment_run(samples.clone(), 1.0);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].samples, samples);
    assert_eq!(stats.rejected_minutes, 0.0);
}

#[test]
fn missing_players_online_counts_as_inactive() {
    let mut samples = run_of(&[5, 5, 0, 0, 0, 0, 0, 5]);
    for s in &mut samples[2..7] {
        s.players_online = None;
    }
    let (with_none, stats_none) = segment_run(samples, 2.0);
    let (with_zero, stats_zero) = segment_run(run_of(&[5, 5, 0, 0, 0, 0, 0, 5]), 2.0);

    assert_eq!(with_none.len(), with_zero.len());
    assert_close(stats_none.rejected_minutes, stats_zero.rejected_minutes);
}

#[test]
fn unsorted_input_is_sorted_before_trimming() {
    let sorted = run_of(&[5, 5, 5, 0, 0, 0, 0, 0, 5, 5]);
    let mut shuffled = sorted.clone();
    shuffled.swap(0, 9);
    shuffled.swap(2, 6);

    let (a, stats_a) = segment_run(sorted, 2.0);
    let (b, stats_b) = segment_run(shuffled, 2.0);
    assert_eq!(a, b);
    assert_close(stats_a.rejected_minutes, stats_b.rejected_minutes);
}

#[test]
fn accepted_plus_rejected_equals_total() {
    let runs: Vec<Vec<u32>> = vec![
        vec![5, 5, 5, 0, 0, 0, 0, 0, 5, 5],
        vec![0, 0, 0, 0, 0],
        vec![1, 0, 1, 0, 1, 0, 1],
        vec![0, 0, 5, 0, 0, 0, 0, 5, 0, 0, 0, 0, 0, 5],
        vec![3],
    ];
    for players in runs {
        for cap in [0.0, 1.0, 2.0, 3.5, 100.0] {
            let (_, stats) = segment_run(run_of(&players), cap);
            assert!(
                (stats.accepted_minutes + stats.rejected_minutes - stats.total_minutes).abs()
                    < 1e-6,
                "conservation failed for {players:?} cap {cap}"
            );
        }
    }
}

#[test]
fn retained_samples_are_an_ordered_subsequence() {
    let samples = run_of(&[0, 0, 5, 0, 0, 0, 0, 5, 0, 0, 0, 0, 0, 5]);
    let (segments, _) = segment_run(samples.clone(), 2.0);

    let retained = flatten(&segments);
    assert!(!retained.is_empty());
    // Strictly increasing timestamps: no reordering, no duplication.
    for pair in retained.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
    for sample in &retained {
        assert!(samples.contains(sample));
    }
}

#[test]
fn rerunning_on_own_output_does_not_shrink() {
    let cases: Vec<Vec<u32>> = vec![
        vec![5, 5, 5, 0, 0, 0, 0, 0, 5, 5],
        vec![0, 0, 0, 0, 0],
        vec![5, 0, 0, 0, 0, 0, 0, 0, 0, 5],
    ];
    for players in cases {
        let (segments, _) = segment_run(run_of(&players), 2.0);
        let retained = flatten(&segments);
        let count = retained.len();
        let (again, _) = segment_run(retained, 2.0);
        assert_eq!(flatten(&again).len(), count, "shrunk for {players:?}");
    }
}

#[test]
fn raising_the_cap_never_decreases_accepted_minutes() {
    let players = vec![5, 0, 0, 0, 0, 5, 5, 0, 0, 0, 0, 0, 0, 5, 0, 0];
    let mut previous = f64::NEG_INFINITY;
    for cap in [0.0, 0.5, 1.0, 2.0, 3.0, 4.0, 6.0, 10.0, 100.0] {
        let (_, stats) = segment_run(run_of(&players), cap);
        assert!(
            stats.accepted_minutes >= previous - 1e-9,
            "accepted dropped at cap {cap}"
        );
        previous = stats.accepted_minutes;
    }
}

#[test]
fn metric_fields_pass_through_unchanged() {
    let mut samples = run_of(&[5, 0, 0, 0, 0, 0, 5]);
    samples[0].tps = Some(19.7);
    samples[0].avg_ping = Some(83.2);
    let (segments, _) = segment_run(samples, 2.0);
    let first = &segments[0].samples[0];
    assert_eq!(first.tps, Some(19.7));
    assert_eq!(first.avg_ping, Some(83.2));
}
