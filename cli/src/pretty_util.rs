//! Output formatting helpers (ambient stack).
//!
//! Trimmed to the one helper this CLI still has a use for — query
//! timing, in the `"N row(s) in set (DURATION)"` style every MySQL
//! client prints. The byte-size formatter this module used to carry
//! had no counterpart left once binlog-segment-size reporting dropped.

use std::time::Duration;

use pretty_duration::pretty_duration;

pub fn to_duration_pretty(duration: &Duration) -> String {
    pretty_duration(duration, None)
}
