use tracing::debug;

use super::{Clip, DurationProbe};

/// Slack for floating point comparisons of clip boundaries (seconds).
const EPSILON: f64 = 1e-9;

/// Delays clips that start before the previous clip on the same track ends.
///
/// Clips are never reordered or moved earlier. Looping clips keep their
/// `end - start` length. Clips without a start are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapResolver {
    min_gap: f64,
}

impl OverlapResolver {
    /// Creates a resolver that keeps at least `min_gap` seconds between clips.
    pub fn new(min_gap: f64) -> Self {
        Self {
            min_gap: min_gap.max(0.0),
        }
    }

    /// Resolves overlaps in place and returns the number of shifted clips.
    pub fn resolve(&self, clips: &mut [Clip], probe: &dyn DurationProbe) -> usize {
        let mut order: Vec<usize> = clips
            .iter()
            .enumerate()
            .filter(|(_, c)| c.start.is_some())
            .map(|(i, _)| i)
            .collect();
        order.sort_by(|&a, &b| {
            let (sa, sb) = (clips[a].start.unwrap_or(0.0), clips[b].start.unwrap_or(0.0));
            sa.total_cmp(&sb)
        });

        let mut shifted = 0;
        let mut prev_end: Option<f64> = None;

        for index in order {
            let clip = &mut clips[index];
            let Some(start) = clip.start else { continue };
            let length = clip
                .end_time(probe)
                .map_or(0.0, |end| (end - start).max(0.0));

            if let Some(prev_end) = prev_end {
                let earliest = if clip.crossfade_allowance > 0.0 {
                    prev_end - clip.crossfade_allowance
                } else {
                    prev_end + self.min_gap
                };
                if start < earliest - EPSILON {
                    let delta = earliest - start;
                    clip.start = Some(earliest);
                    if let Some(end) = clip.end.as_mut() {
                        *end += delta;
                    }
                    shifted += 1;
                    debug!(file = %clip.file, from = start, to = earliest, "shifted overlapping clip");
                }
            }

            let placed_start = clip.start.unwrap_or(start);
            let end = placed_start + length;
            prev_end = Some(prev_end.map_or(end, |p: f64| p.max(end)));
        }
        shifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ClipRules;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn clip(file: &str, start: Option<f64>) -> Clip {
        Clip {
            file: file.into(),
            start,
            end: None,
            looping: false,
            gain: 0.0,
            eq_preset: None,
            semantic_role: None,
            fade_in: None,
            fade_out: None,
            rules: Arc::new(ClipRules::default()),
            crossfade_allowance: 0.0,
        }
    }

    fn looping(file: &str, start: f64, end: f64) -> Clip {
        Clip {
            looping: true,
            end: Some(end),
            ..clip(file, Some(start))
        }
    }

    fn durations() -> HashMap<String, f64> {
        [("a.wav", 4.0), ("b.wav", 3.0), ("c.wav", 2.0)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn intervals(clips: &[Clip], probe: &dyn DurationProbe) -> Vec<(f64, f64)> {
        let mut out: Vec<(f64, f64)> = clips
            .iter()
            .filter_map(|c| Some((c.start?, c.end_time(probe)?)))
            .collect();
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }

    #[test]
    fn test_shifts_overlapping_clip_forward() {
        let probe = durations();
        let mut clips = vec![clip("a.wav", Some(0.0)), clip("b.wav", Some(2.0))];
        let shifted = OverlapResolver::new(0.0).resolve(&mut clips, &probe);
        assert_eq!(shifted, 1);
        assert_eq!(clips[1].start, Some(4.0));
    }

    #[test]
    fn test_no_intervals_intersect_after_resolution() {
        let probe = durations();
        let mut clips = vec![
            clip("c.wav", Some(5.0)),
            clip("a.wav", Some(0.0)),
            looping("b.wav", 1.0, 9.0),
            clip("a.wav", None),
        ];
        OverlapResolver::new(0.0).resolve(&mut clips, &probe);

        let placed = intervals(&clips, &probe);
        for pair in placed.windows(2) {
            assert!(pair[0].1 <= pair[1].0 + 1e-9, "overlap: {:?}", pair);
        }
        assert_eq!(clips[3].start, None);
    }

    #[test]
    fn test_looping_clip_keeps_length() {
        let probe = durations();
        let mut clips = vec![clip("a.wav", Some(0.0)), looping("b.wav", 1.0, 9.0)];
        OverlapResolver::new(0.0).resolve(&mut clips, &probe);
        assert_eq!(clips[1].start, Some(4.0));
        assert_eq!(clips[1].end, Some(12.0));
    }

    #[test]
    fn test_min_gap_is_respected() {
        let probe = durations();
        let mut clips = vec![clip("a.wav", Some(0.0)), clip("c.wav", Some(4.1))];
        OverlapResolver::new(0.5).resolve(&mut clips, &probe);
        assert_eq!(clips[1].start, Some(4.5));
    }

    #[test]
    fn test_never_moves_clips_earlier() {
        let probe = durations();
        let mut clips = vec![clip("a.wav", Some(0.0)), clip("b.wav", Some(10.0))];
        let shifted = OverlapResolver::new(0.0).resolve(&mut clips, &probe);
        assert_eq!(shifted, 0);
        assert_eq!(clips[1].start, Some(10.0));
    }

    #[test]
    fn test_crossfade_overlap_is_kept() {
        let probe = durations();
        let mut clips = vec![looping("a.wav", 0.0, 20.0), looping("b.wav", 16.0, 40.0)];
        clips[1].crossfade_allowance = 4.05;
        let shifted = OverlapResolver::new(0.0).resolve(&mut clips, &probe);
        assert_eq!(shifted, 0);
        assert_eq!(clips[1].start, Some(16.0));
    }
}
