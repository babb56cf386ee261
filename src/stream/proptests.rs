//! Property-based tests for decoding and coalescing
//!
//! - Chunk boundaries never change the decoded text
//! - Coalesced flushes only ever grow the visible text
//! - The final flush always lands on the full concatenation

use super::coalesce::{CoalescePolicy, Coalescer};
use super::decoder::Utf8StreamDecoder;
use proptest::prelude::*;
use std::time::{Duration, Instant};

/// Arbitrary text mixing 1- to 4-byte characters
fn arb_text() -> impl Strategy<Value = String> {
    "[a-z é€日🦀\n]{0,80}"
}

/// Split `bytes` at the given (sorted, deduplicated) cut points
fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for p in points {
        chunks.push(bytes[start..p].to_vec());
        start = p;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

proptest! {
    #[test]
    fn decoding_is_boundary_independent(
        text in arb_text(),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let chunks = split_at_cuts(text.as_bytes(), &cuts);
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for chunk in &chunks {
            out.push_str(&decoder.decode(chunk));
        }
        out.push_str(&decoder.finish());
        prop_assert_eq!(out, text);
    }

    #[test]
    fn flushes_are_monotonic_and_complete(
        deltas in proptest::collection::vec("[a-zé日]{0,6}", 0..60),
        gaps in proptest::collection::vec(0u64..30, 60),
        min_interval_ms in 1u64..80,
        min_chars in 1usize..32,
    ) {
        let policy = CoalescePolicy {
            min_interval: Duration::from_millis(min_interval_ms),
            min_chars,
        };
        let t0 = Instant::now();
        let mut now = t0;
        let mut coalescer = Coalescer::new(policy, t0);
        let mut visible = String::new();

        for (delta, gap) in deltas.iter().zip(gaps.iter()) {
            now += Duration::from_millis(*gap);
            if let Some(text) = coalescer.push(delta, now) {
                prop_assert!(text.starts_with(visible.as_str()));
                visible = text.to_string();
            }
        }
        if let Some(text) = coalescer.finish(now) {
            prop_assert!(text.starts_with(visible.as_str()));
            visible = text.to_string();
        }

        prop_assert_eq!(visible, deltas.concat());
    }
}

#[test]
fn one_char_every_5ms_is_coalesced() {
    let text: String = "The quick brown fox jumps over the lazy dog. ".repeat(4);
    let t0 = Instant::now();
    let mut coalescer = Coalescer::new(CoalescePolicy::default(), t0);
    let mut lengths = Vec::new();

    for (i, ch) in text.chars().enumerate() {
        let now = t0 + Duration::from_millis(5 * (i as u64 + 1));
        if let Some(flushed) = coalescer.push(&ch.to_string(), now) {
            lengths.push(flushed.chars().count());
        }
    }
    let end = t0 + Duration::from_millis(5 * (text.len() as u64 + 1));
    if let Some(flushed) = coalescer.finish(end) {
        lengths.push(flushed.chars().count());
    }

    let emitted = text.chars().count();
    assert!(
        lengths.len() * 4 <= emitted,
        "{} mutations for {} chars",
        lengths.len(),
        emitted
    );
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(lengths.last().copied(), Some(emitted));
}
