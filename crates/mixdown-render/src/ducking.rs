//! Ducking: gain reduction of target clips while a trigger role is active.
//!
//! Trigger activity is collected once from the whole compiled timeline, so a
//! clip's ducking gain depends only on absolute time. Chunked rendering can
//! evaluate it slice by slice without carrying any state.

use std::collections::{BTreeSet, HashMap, HashSet};

use mixdown_spec::{
    Clip, CompiledTimeline, CompiledTrack, DuckingConfig, DuckingMode, DuckingRule,
    DurationProbe, RoleSelector,
};
use tracing::{debug, warn};

use crate::buffer::db_to_gain;

/// A half-open time range `[start, end)` in seconds.
pub type TimeRange = (f64, f64);

/// Merges ranges whose gap is shorter than `min_pause` seconds.
///
/// Overlapping ranges are always merged. The result is sorted by start.
pub fn merge_ranges(mut ranges: Vec<TimeRange>, min_pause: f64) -> Vec<TimeRange> {
    ranges.retain(|(start, end)| end > start);
    ranges.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start - last.1 < min_pause => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Gain envelope of one ducking rule over a target.
///
/// The gain is linear in dB. Each range ramps down over `fade_down` from its
/// delayed start, holds at `amount_db` and ramps back up over `fade_up` after
/// its end. Overlapping ramps take the deeper value.
#[derive(Debug, Clone, PartialEq)]
pub struct DuckEnvelope {
    ranges: Vec<TimeRange>,
    amount_db: f64,
    fade_down: f64,
    fade_up: f64,
}

impl DuckEnvelope {
    /// Builds an envelope from raw trigger ranges and the effective rule timing.
    pub fn new(trigger_ranges: &[TimeRange], timing: &RuleTiming) -> Self {
        let ranges = merge_ranges(trigger_ranges.to_vec(), timing.min_pause)
            .into_iter()
            .map(|(start, end)| (start + timing.onset_delay, end))
            .collect();
        Self {
            ranges,
            amount_db: timing.amount_db,
            fade_down: timing.fade_down,
            fade_up: timing.fade_up,
        }
    }

    /// Returns true if the envelope never attenuates.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() || self.amount_db == 0.0
    }

    /// Delayed, merged ranges.
    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Depth of the duck at time `t`, from 0 (none) to 1 (full).
    fn depth_at(&self, t: f64) -> f64 {
        let mut depth: f64 = 0.0;
        for &(start, end) in &self.ranges {
            if t < start {
                // Ranges are sorted by start.
                break;
            }
            let down = if self.fade_down > 0.0 {
                ((t - start) / self.fade_down).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let up = if self.fade_up > 0.0 {
                ((end + self.fade_up - t) / self.fade_up).clamp(0.0, 1.0)
            } else if t < end {
                1.0
            } else {
                0.0
            };
            depth = depth.max(down.min(up));
        }
        depth
    }

    /// Gain in dB at time `t`.
    pub fn gain_db_at(&self, t: f64) -> f64 {
        self.amount_db * self.depth_at(t)
    }
}

/// Effective timing of one rule after per-rule overrides, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleTiming {
    pub amount_db: f64,
    pub fade_down: f64,
    pub fade_up: f64,
    pub min_pause: f64,
    pub onset_delay: f64,
}

impl RuleTiming {
    /// Resolves a rule's timing against its block defaults.
    pub fn resolve(config: &DuckingConfig, rule: &DuckingRule) -> Self {
        let ms = |value: Option<f64>, default: f64| value.unwrap_or(default).max(0.0) / 1000.0;
        Self {
            amount_db: rule.duck_amount.unwrap_or(config.duck_amount),
            fade_down: ms(rule.fade_down_ms, config.fade_down_ms),
            fade_up: ms(rule.fade_up_ms, config.fade_up_ms),
            min_pause: ms(rule.min_pause_ms, config.min_pause_ms),
            onset_delay: ms(rule.onset_delay_ms, config.onset_delay_ms),
        }
    }
}

/// Ducking applied to one clip: the deepest of all matching rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClipDucking {
    envelopes: Vec<DuckEnvelope>,
    /// Constant attenuation from scene-mode rules.
    constant_db: Option<f64>,
}

impl ClipDucking {
    /// Returns true if no rule attenuates the clip.
    pub fn is_empty(&self) -> bool {
        self.constant_db.is_none() && self.envelopes.is_empty()
    }

    /// Gain in dB at time `t`.
    pub fn gain_db_at(&self, t: f64) -> f64 {
        let mut gain = self.constant_db.unwrap_or(0.0).min(0.0);
        for envelope in &self.envelopes {
            gain = gain.min(envelope.gain_db_at(t));
        }
        gain
    }

    /// Linear gain at an absolute canvas frame.
    #[inline]
    pub fn gain_at_frame(&self, frame: usize, sample_rate: u32) -> f64 {
        let db = self.gain_db_at(frame as f64 / sample_rate as f64);
        if db == 0.0 {
            1.0
        } else {
            db_to_gain(db)
        }
    }
}

/// Active trigger range of one clip, tagged with its track.
#[derive(Debug, Clone, Copy)]
struct TriggerRange {
    track: usize,
    range: TimeRange,
}

/// Computes per-clip ducking from the whole compiled timeline.
#[derive(Debug)]
pub struct DuckingEngine {
    triggers: HashMap<RoleSelector, Vec<TriggerRange>>,
}

impl DuckingEngine {
    /// Collects trigger activity for every selector named by any clip's rules.
    pub fn new(timeline: &CompiledTimeline, probe: &dyn DurationProbe) -> Self {
        let mut selectors = HashSet::new();
        let mut invalid = BTreeSet::new();
        for (_, clip) in timeline.placed_clips() {
            let Some(config) = clip.rules.active_ducking() else {
                continue;
            };
            for rule in &config.rules {
                match (rule.trigger(), rule.targets()) {
                    (Ok(selector), Ok(_)) => {
                        selectors.insert(selector);
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        invalid.insert(e.to_string());
                    }
                }
            }
        }
        for error in invalid {
            warn!(error = %error, "ignoring ducking rule");
        }

        let duration = timeline.project.duration;
        let mut triggers = HashMap::new();
        for selector in selectors {
            let mut ranges = Vec::new();
            for (index, track) in timeline.tracks.iter().enumerate() {
                for clip in track.clips.iter().filter(|c| c.start.is_some()) {
                    if !selector.matches(track.kind, track.role, track.semantic_role_of(clip)) {
                        continue;
                    }
                    let (Some(start), Some(end)) = (clip.start, clip.end_time(probe)) else {
                        continue;
                    };
                    let end = end.min(duration);
                    if end > start {
                        ranges.push(TriggerRange {
                            track: index,
                            range: (start, end),
                        });
                    }
                }
            }
            debug!(selector = %selector, ranges = ranges.len(), "collected trigger ranges");
            triggers.insert(selector, ranges);
        }

        Self { triggers }
    }

    /// Trigger ranges of a selector, excluding those on `exclude_track`.
    fn ranges_for(&self, selector: &RoleSelector, exclude_track: usize) -> Vec<TimeRange> {
        self.triggers
            .get(selector)
            .map(|ranges| {
                ranges
                    .iter()
                    .filter(|r| r.track != exclude_track)
                    .map(|r| r.range)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ducking of one placed clip, or `None` if no rule targets it.
    ///
    /// A clip never ducks itself: trigger ranges from its own track are ignored.
    pub fn for_clip(
        &self,
        track_index: usize,
        track: &CompiledTrack,
        clip: &Clip,
    ) -> Option<ClipDucking> {
        let config = clip.rules.active_ducking()?;
        let semantic = track.semantic_role_of(clip);
        let mut ducking = ClipDucking::default();

        for rule in &config.rules {
            let (Ok(trigger), Ok(targets)) = (rule.trigger(), rule.targets()) else {
                continue;
            };
            if !targets
                .iter()
                .any(|t| t.matches(track.kind, track.role, semantic))
            {
                continue;
            }
            let ranges = self.ranges_for(&trigger, track_index);
            if ranges.is_empty() {
                continue;
            }
            let timing = RuleTiming::resolve(config, rule);
            match config.mode {
                DuckingMode::Scene => {
                    let current = ducking.constant_db.unwrap_or(0.0);
                    ducking.constant_db = Some(current.min(timing.amount_db));
                }
                DuckingMode::Envelope => {
                    let envelope = DuckEnvelope::new(&ranges, &timing);
                    if !envelope.is_empty() {
                        ducking.envelopes.push(envelope);
                    }
                }
            }
        }

        (!ducking.is_empty()).then_some(ducking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> RuleTiming {
        RuleTiming {
            amount_db: -6.0,
            fade_down: 0.5,
            fade_up: 0.5,
            min_pause: 0.3,
            onset_delay: 0.12,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_voice_over_music_envelope() {
        let envelope = DuckEnvelope::new(&[(2.0, 5.0)], &timing());

        assert_eq!(envelope.gain_db_at(0.0), 0.0);
        assert_eq!(envelope.gain_db_at(2.0), 0.0);
        assert!(close(envelope.gain_db_at(2.12), 0.0));
        assert!(close(envelope.gain_db_at(2.37), -3.0));
        assert!(close(envelope.gain_db_at(2.62), -6.0));
        assert!(close(envelope.gain_db_at(4.0), -6.0));
        assert!(close(envelope.gain_db_at(5.0), -6.0));
        assert!(close(envelope.gain_db_at(5.25), -3.0));
        assert_eq!(envelope.gain_db_at(5.5), 0.0);
        assert_eq!(envelope.gain_db_at(8.0), 0.0);
    }

    #[test]
    fn test_fades_are_monotonic() {
        let envelope = DuckEnvelope::new(&[(1.0, 3.0)], &timing());
        let mut previous = 0.0;
        for i in 0..=100 {
            let g = envelope.gain_db_at(1.0 + i as f64 * 0.01);
            assert!(g <= previous + 1e-12);
            previous = g;
        }
        for i in 0..=100 {
            let g = envelope.gain_db_at(3.0 + i as f64 * 0.01);
            assert!(g >= previous - 1e-12);
            previous = g;
        }
    }

    #[test]
    fn test_short_gaps_merge_into_one_region() {
        let envelope = DuckEnvelope::new(&[(1.0, 2.0), (2.2, 3.0)], &timing());
        assert_eq!(envelope.ranges().len(), 1);
        assert!(close(envelope.gain_db_at(2.1), -6.0));

        let envelope = DuckEnvelope::new(&[(1.0, 2.0), (4.0, 5.0)], &timing());
        assert_eq!(envelope.ranges().len(), 2);
        assert_eq!(envelope.gain_db_at(3.0), 0.0);
    }

    #[test]
    fn test_merge_ranges_sorts_and_drops_empty() {
        let merged = merge_ranges(vec![(5.0, 6.0), (1.0, 1.0), (0.0, 2.0), (1.5, 3.0)], 0.0);
        assert_eq!(merged, vec![(0.0, 3.0), (5.0, 6.0)]);
    }

    #[test]
    fn test_short_range_reaches_partial_depth() {
        let timing = RuleTiming {
            onset_delay: 0.0,
            ..timing()
        };
        let envelope = DuckEnvelope::new(&[(1.0, 1.1)], &timing);
        let deepest = (0..100)
            .map(|i| envelope.gain_db_at(1.0 + i as f64 * 0.01))
            .fold(0.0, f64::min);
        assert!(deepest > -6.0 && deepest < 0.0, "got {}", deepest);
    }

    #[test]
    fn test_deepest_rule_wins() {
        let shallow = DuckEnvelope::new(&[(0.0, 10.0)], &RuleTiming { amount_db: -3.0, ..timing() });
        let deep = DuckEnvelope::new(&[(0.0, 10.0)], &RuleTiming { amount_db: -9.0, ..timing() });
        let ducking = ClipDucking {
            envelopes: vec![shallow, deep],
            constant_db: Some(-4.0),
        };
        assert!(close(ducking.gain_db_at(5.0), -9.0));
        assert_eq!(ducking.gain_db_at(0.0), -4.0);
    }
}
