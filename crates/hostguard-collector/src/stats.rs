//! Numeric system stats and their JSON wire shape.
//!
//! The remote stats query replies with a JSON document assembled on the
//! host. Remote WMI/CIM queries fail piecemeal, so every field defaults to
//! zero on absence — partial stats are still actionable for alerting on the
//! metrics that did come back.

use serde::{Deserialize, Serialize};

/// Flat numeric stats for one host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostStats {
    /// Average CPU load percentage.
    #[serde(default)]
    pub cpu_percent: f64,
    /// Physical memory figures.
    #[serde(default)]
    pub memory: MemoryStats,
    /// One entry per fixed volume.
    #[serde(default)]
    pub disks: Vec<DiskStats>,
    /// Count of active interactive sessions as the host reports it.
    #[serde(default)]
    pub active_sessions: u32,
}

/// Physical memory figures in gigabytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub total_gb: f64,
    #[serde(default)]
    pub used_gb: f64,
    #[serde(default)]
    pub free_gb: f64,
    /// Used fraction as a percentage; zero when the host omitted it.
    #[serde(default)]
    pub used_percent: f64,
}

/// Per-volume disk figures in gigabytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    /// Volume label, e.g. `C:`.
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub total_gb: f64,
    #[serde(default)]
    pub used_gb: f64,
    #[serde(default)]
    pub free_gb: f64,
    #[serde(default)]
    pub used_percent: f64,
}

/// Parses a stats reply document.
///
/// Missing fields default to zero; only a document that is not valid JSON
/// for the shape at all is an error, described by the returned string.
pub fn parse_stats(reply: &str) -> Result<HostStats, String> {
    serde_json::from_str(reply).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_document_round_trips() {
        let stats = HostStats {
            cpu_percent: 12.5,
            memory: MemoryStats {
                total_gb: 32.0,
                used_gb: 20.0,
                free_gb: 12.0,
                used_percent: 62.5,
            },
            disks: vec![DiskStats {
                volume: "C:".to_string(),
                total_gb: 256.0,
                used_gb: 200.0,
                free_gb: 56.0,
                used_percent: 78.1,
            }],
            active_sessions: 4,
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(parse_stats(&json).unwrap(), stats);
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let stats = parse_stats(r#"{ "cpu_percent": 97.5 }"#).unwrap();
        assert_eq!(stats.cpu_percent, 97.5);
        assert_eq!(stats.memory.total_gb, 0.0);
        assert!(stats.disks.is_empty());
        assert_eq!(stats.active_sessions, 0);
    }

    #[test]
    fn empty_object_is_all_zeroes() {
        let stats = parse_stats("{}").unwrap();
        assert_eq!(stats, HostStats::default());
    }

    #[test]
    fn non_json_reply_is_an_error() {
        assert!(parse_stats("ERROR: RPC server unavailable").is_err());
    }

    #[test]
    fn partial_disk_entries_fill_in() {
        let stats = parse_stats(r#"{ "disks": [ { "volume": "D:", "free_gb": 3.2 } ] }"#).unwrap();
        assert_eq!(stats.disks.len(), 1);
        assert_eq!(stats.disks[0].volume, "D:");
        assert_eq!(stats.disks[0].free_gb, 3.2);
        assert_eq!(stats.disks[0].total_gb, 0.0);
    }
}
