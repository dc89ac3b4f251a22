//! Inbound plotter stream: `a,b,c` lines, one reading per channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Number of samples the history keeps.
pub const MAX_POINTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub channel1: i64,
    pub channel2: i64,
    pub channel3: i64,
}

/// A line that is exactly three integers becomes a sample; anything else
/// (config echoes, debug prints from the firmware) is not telemetry.
pub fn parse_sample(line: &str) -> Option<TelemetrySample> {
    let values: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    let [a, b, c] = values.as_slice() else {
        return None;
    };
    Some(TelemetrySample {
        channel1: a.parse().ok()?,
        channel2: b.parse().ok()?,
        channel3: c.parse().ok()?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedSample {
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub sample: TelemetrySample,
}

/// Rolling window of the most recent samples.
#[derive(Debug, Clone)]
pub struct TelemetryHistory {
    samples: VecDeque<TimedSample>,
    capacity: usize,
}

impl Default for TelemetryHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_POINTS)
    }
}

impl TelemetryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    pub fn push(&mut self, sample: TelemetrySample) -> TimedSample {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        let timed = TimedSample { received_at: Utc::now(), sample };
        self.samples.push_back(timed);
        timed
    }

    /// Parse `line` and record it if it is a sample.
    pub fn ingest(&mut self, line: &str) -> Option<TimedSample> {
        parse_sample(line).map(|sample| self.push(sample))
    }

    pub fn latest(&self) -> Option<&TimedSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedSample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_integers_make_a_sample() {
        assert_eq!(
            parse_sample(" 12, 0,1023\r\n"),
            Some(TelemetrySample { channel1: 12, channel2: 0, channel3: 1023 })
        );
    }

    #[test]
    fn other_lines_are_not_samples() {
        assert_eq!(parse_sample("1,2"), None);
        assert_eq!(parse_sample("1,2,3,4"), None);
        assert_eq!(parse_sample("CFG,1,2"), None);
        assert_eq!(parse_sample(""), None);
    }

    #[test]
    fn history_keeps_the_newest_points() {
        let mut history = TelemetryHistory::new();
        for i in 0..250 {
            history.ingest(&format!("{i},{i},{i}"));
        }
        assert_eq!(history.len(), MAX_POINTS);
        assert_eq!(history.iter().next().unwrap().sample.channel1, 150);
        assert_eq!(history.latest().unwrap().sample.channel3, 249);
    }

    #[test]
    fn ignored_lines_do_not_touch_history() {
        let mut history = TelemetryHistory::with_capacity(3);
        assert!(history.ingest("hello").is_none());
        assert!(history.is_empty());
    }
}
