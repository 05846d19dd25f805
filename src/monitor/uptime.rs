//! Uptime Aggregator
//!
//! Dwell-time weighted availability: time spent online or slow divided by
//! total monitored time. Paused while monitoring is disabled. The
//! percentage is computed on read, so the open segment counts up to "now".

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use super::device::Status;

/// Time span the percentage covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UptimeWindow {
    /// Everything since monitoring began
    #[default]
    SinceStart,
    /// Only the trailing period
    Trailing(Duration),
}

impl UptimeWindow {
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) if secs > 0 => UptimeWindow::Trailing(Duration::seconds(secs as i64)),
            _ => UptimeWindow::SinceStart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    available: bool,
}

impl Segment {
    fn millis_within(&self, from: DateTime<Utc>) -> i64 {
        let start = self.start.max(from);
        (self.end - start).num_milliseconds().max(0)
    }
}

#[derive(Debug, Clone)]
pub struct UptimeLedger {
    window: UptimeWindow,

    /// Reported until monitored time accrues (persisted value or 100)
    seed: f64,

    /// Status and start of the segment being accrued; `None` while paused
    open: Option<(bool, DateTime<Utc>)>,

    available_ms: i64,
    total_ms: i64,

    /// Closed segments, only kept for a trailing window
    segments: VecDeque<Segment>,
}

impl UptimeLedger {
    pub fn new(window: UptimeWindow, seed: Option<f64>) -> Self {
        Self {
            window,
            seed: seed.filter(|s| s.is_finite()).unwrap_or(100.0).clamp(0.0, 100.0),
            open: None,
            available_ms: 0,
            total_ms: 0,
            segments: VecDeque::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.open.is_some()
    }

    /// Begin (or resume) accruing time in `status`
    pub fn start(&mut self, status: Status, at: DateTime<Utc>) {
        if self.open.is_none() {
            self.open = Some((status.is_available(), at));
        }
    }

    /// Close the open segment at `at` and continue in `status`
    pub fn record(&mut self, status: Status, at: DateTime<Utc>) {
        if let Some(end) = self.close(at) {
            self.open = Some((status.is_available(), end));
        }
    }

    /// Stop accruing (monitoring disabled)
    pub fn pause(&mut self, at: DateTime<Utc>) {
        self.close(at);
        self.open = None;
    }

    fn close(&mut self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let (available, start) = self.open?;
        // measurement timestamps may trail the segment start slightly
        let end = at.max(start);
        let segment = Segment { start, end, available };
        let millis = segment.millis_within(start);

        self.total_ms += millis;
        if available {
            self.available_ms += millis;
        }

        if let UptimeWindow::Trailing(period) = self.window {
            match self.segments.back_mut() {
                Some(last) if last.available == available && last.end == start => last.end = end,
                _ => self.segments.push_back(segment),
            }
            let cutoff = end - period;
            while self.segments.front().is_some_and(|s| s.end <= cutoff) {
                self.segments.pop_front();
            }
        }

        self.open = Some((available, end));
        Some(end)
    }

    /// Availability percentage as of `now`, in 0-100
    pub fn percentage(&self, now: DateTime<Utc>) -> f64 {
        let open = self.open.map(|(available, start)| Segment {
            start,
            end: now.max(start),
            available,
        });

        let (available, total) = match self.window {
            UptimeWindow::SinceStart => {
                let open_ms = open.map(|s| s.millis_within(s.start)).unwrap_or(0);
                let open_available = open.filter(|s| s.available).map(|_| open_ms).unwrap_or(0);
                (self.available_ms + open_available, self.total_ms + open_ms)
            }
            UptimeWindow::Trailing(period) => {
                let cutoff = now - period;
                self.segments
                    .iter()
                    .chain(open.iter())
                    .fold((0, 0), |(available, total), segment| {
                        let ms = segment.millis_within(cutoff);
                        (available + if segment.available { ms } else { 0 }, total + ms)
                    })
            }
        };

        if total <= 0 {
            return self.seed;
        }
        (available as f64 * 100.0 / total as f64).clamp(0.0, 100.0)
    }
}
