// Focus Ring Buffer (§4.4): an ordered, in-memory mirror of the segment
// files on disk, capped at `MaxSegments`, evicting from the front.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{NaiveDateTime, TimeZone, Utc};

/// A finalized media file on disk (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSegment {
    pub path: PathBuf,
    /// UTC epoch milliseconds at which the segment started.
    pub start_time_ms: i64,
    pub duration_seconds: f64,
}

impl VideoSegment {
    pub fn end_time_ms(&self) -> i64 {
        self.start_time_ms + (self.duration_seconds * 1000.0) as i64
    }
}

/// The in-memory descriptor of a [`VideoSegment`]; distinct name per §3, same
/// shape — the ring buffer's list is a sequence of these.
pub type RingBufferEntry = VideoSegment;

pub struct FocusRingBuffer {
    entries: RwLock<VecDeque<RingBufferEntry>>,
    max_segments: usize,
}

impl FocusRingBuffer {
    pub fn new(max_segments: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_segments: max_segments.max(1),
        }
    }

    /// Scans `dir` for files matching `yyyyMMdd_HHmmss*.mp4`, reconstructs
    /// entries ordered by parsed timestamp (ties broken by path), derives
    /// durations by diffing successive starts (the final entry gets a
    /// default of 5s), appends them, then runs the eviction pass once.
    pub fn recover(dir: &Path, max_segments: usize) -> Self {
        let buf = Self::new(max_segments);
        let mut found: Vec<(i64, PathBuf)> = Vec::new();
        if let Ok(read_dir) = std::fs::read_dir(dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                let name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(n) => n,
                    None => continue,
                };
                if !name.ends_with(".mp4") {
                    continue;
                }
                if let Some(ts) = parse_segment_timestamp(name) {
                    found.push((ts, path));
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        for i in 0..found.len() {
            let (start, path) = &found[i];
            let duration_seconds = if i + 1 < found.len() {
                ((found[i + 1].0 - start).max(0) as f64) / 1000.0
            } else {
                5.0
            };
            buf.add_segment(VideoSegment {
                path: path.clone(),
                start_time_ms: *start,
                duration_seconds,
            });
        }
        buf
    }

    /// Appends `entry`; if the count now exceeds `max_segments`, evicts from
    /// the front (oldest first) until it doesn't, best-effort deleting each
    /// evicted entry's file.
    pub fn add_segment(&self, entry: RingBufferEntry) {
        let mut entries = self.entries.write().unwrap();
        entries.push_back(entry);
        while entries.len() > self.max_segments {
            if let Some(evicted) = entries.pop_front() {
                if let Err(e) = std::fs::remove_file(&evicted.path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        eprintln!(
                            "ring_buffer: failed to delete evicted segment {}: {e}",
                            evicted.path.display()
                        );
                    }
                }
            }
        }
    }

    /// Entries whose `[start, start+duration)` intersects `[from, to)`, in
    /// segment-creation order. An empty or inverted window (`from >= to`)
    /// selects nothing.
    pub fn segments_for_range(&self, from_ms: i64, to_ms: i64) -> Vec<RingBufferEntry> {
        if from_ms >= to_ms {
            return Vec::new();
        }
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .filter(|e| e.start_time_ms < to_ms && e.end_time_ms() > from_ms)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn total_duration(&self) -> f64 {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|e| e.duration_seconds)
            .sum()
    }
}

/// Parses a `yyyyMMdd_HHmmss[_fff]` prefix (UTC, naive) out of a filename,
/// returning epoch milliseconds. Tolerates a trailing `_fff` millisecond
/// group and any extension.
fn parse_segment_timestamp(name: &str) -> Option<i64> {
    let stem = name.split('.').next().unwrap_or(name);
    let mut parts = stem.splitn(3, '_');
    let date = parts.next()?;
    let time = parts.next()?;
    let millis: i64 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);

    if date.len() != 8 || time.len() != 6 {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S").ok()?;
    let dt = Utc.from_utc_datetime(&naive);
    Some(dt.timestamp_millis() + millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start_ms: i64, dur: f64) -> VideoSegment {
        VideoSegment {
            path: PathBuf::from(format!("/tmp/nonexistent-ring-{start_ms}.mp4")),
            start_time_ms: start_ms,
            duration_seconds: dur,
        }
    }

    #[test]
    fn count_is_capped_at_max_segments() {
        let buf = FocusRingBuffer::new(2);
        for i in 0..5 {
            buf.add_segment(seg(i * 5_000, 5.0));
            assert_eq!(buf.count(), (i as usize + 1).min(2));
        }
        assert_eq!(buf.count(), 2);
    }

    #[test]
    fn segments_for_range_selects_intersecting_entries() {
        let buf = FocusRingBuffer::new(6);
        for i in 0..6 {
            buf.add_segment(seg(i * 5_000, 5.0));
        }
        // t=0..30_000ms in 5s segments; clip [20_000, 30_000) should hit the
        // last two segments: [20,25) and [25,30).
        let hits = buf.segments_for_range(20_000, 30_000);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].start_time_ms, 20_000);
        assert_eq!(hits[1].start_time_ms, 25_000);
    }

    #[test]
    fn zero_duration_range_selects_nothing() {
        let buf = FocusRingBuffer::new(6);
        buf.add_segment(seg(0, 5.0));
        assert!(buf.segments_for_range(100, 100).is_empty());
    }

    #[test]
    fn parses_segment_timestamp_with_millis() {
        let ts = parse_segment_timestamp("20260728_153000_123.mp4").unwrap();
        let expected = Utc
            .from_utc_datetime(
                &NaiveDateTime::parse_from_str("20260728153000", "%Y%m%d%H%M%S").unwrap(),
            )
            .timestamp_millis()
            + 123;
        assert_eq!(ts, expected);
    }

    #[test]
    fn rejects_non_matching_filenames() {
        assert!(parse_segment_timestamp("readme.mp4").is_none());
        assert!(parse_segment_timestamp("not_a_timestamp.mp4").is_none());
    }
}
