//! ASA-style syslog parsing
//!
//! Recognizes connection build/teardown events (302013-302016, allowed
//! traffic), explicit denies (106023), and per-ACL permit records (106100,
//! which carry the ACE hash used for direct rule mapping). A line with a
//! recognized event id whose fields cannot be extracted counts as malformed;
//! lines without a recognized id are ignored.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use tracing::debug;

use fpa_common::{Action, Protocol, TrafficLogEntry};

const CONN_EVENT_IDS: [&str; 4] = ["302013", "302014", "302015", "302016"];

/// Outcome of parsing one raw log batch
#[derive(Debug, Default)]
pub struct ParsedLog {
    /// Entries in input order
    pub entries: Vec<TrafficLogEntry>,
    /// Recognized event id, unusable fields
    pub malformed: u64,
    /// No recognized event id
    pub ignored: u64,
}

enum LineOutcome {
    Entry(Box<TrafficLogEntry>),
    Malformed,
    Ignored,
}

/// Compiled matchers for the recognized event formats
pub struct SyslogParser {
    conn: Regex,
    deny: Regex,
    permit: Regex,
    stamp: Regex,
    hash: Regex,
}

impl SyslogParser {
    /// Compile the event patterns
    pub fn new() -> Self {
        Self {
            // Built inbound/outbound carries an explicit direction;
            // Teardown usually omits it.
            conn: Regex::new(
                r"(?:Built|Teardown)(?:\s+(inbound|outbound))?\s+(\w+)\s+connection\s+\d+\s+for\s+([\w-]+):([\d.]+)/(\d+)(?:\s+\([\d./]+\))?\s+.*to\s+([\w-]+):([\d.]+)/(\d+)(?:\s+\([\d./]+\))?(?:\s+duration\s+(\d+:\d+:\d+)\s+bytes\s+(\d+))?",
            )
            .expect("Failed to compile connection pattern"),
            deny: Regex::new(r"Deny\s+(\w+)\s+src\s+([\w-]+):([\d.]+)\s+dst\s+([\w-]+):([\d.]+)")
                .expect("Failed to compile deny pattern"),
            permit: Regex::new(
                r"access-list\s+[\w-]+\s+permitted\s+(\w+)\s+([\w-]+)/([\d.]+)\((\d+)\)\s+->\s+([\w-]+)/([\d.]+)\((\d+)\)",
            )
            .expect("Failed to compile permit pattern"),
            stamp: Regex::new(r"^(\w+\s+\d+\s+\d+\s+\d+:\d+:\d+)")
                .expect("Failed to compile timestamp pattern"),
            hash: Regex::new(r"\[(0x[0-9a-fA-F]+),").expect("Failed to compile hash pattern"),
        }
    }

    /// Parse a raw multi-line batch
    pub fn parse(&self, raw: &str) -> ParsedLog {
        let mut out = ParsedLog::default();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.parse_line(line) {
                LineOutcome::Entry(entry) => out.entries.push(*entry),
                LineOutcome::Malformed => {
                    debug!(line = %line, "malformed log line dropped");
                    out.malformed += 1;
                }
                LineOutcome::Ignored => out.ignored += 1,
            }
        }
        out
    }

    fn parse_line(&self, line: &str) -> LineOutcome {
        let timestamp = self.timestamp_of(line);

        if CONN_EVENT_IDS.iter().any(|id| line.contains(id)) {
            return match self.parse_conn(line, timestamp) {
                Some(entry) => LineOutcome::Entry(Box::new(entry)),
                None => LineOutcome::Malformed,
            };
        }
        if line.contains("106023") {
            return match self.parse_deny(line, timestamp) {
                Some(entry) => LineOutcome::Entry(Box::new(entry)),
                None => LineOutcome::Malformed,
            };
        }
        if line.contains("106100") {
            return match self.parse_permit(line, timestamp) {
                Some(entry) => LineOutcome::Entry(Box::new(entry)),
                None => LineOutcome::Malformed,
            };
        }
        LineOutcome::Ignored
    }

    fn timestamp_of(&self, line: &str) -> Option<DateTime<Utc>> {
        let caps = self.stamp.captures(line)?;
        NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), "%b %d %Y %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }

    fn parse_conn(&self, line: &str, timestamp: Option<DateTime<Utc>>) -> Option<TrafficLogEntry> {
        let caps = self.conn.captures(line)?;
        let direction = caps.get(1).map(|m| m.as_str());
        let protocol = Protocol::parse(caps.get(2)?.as_str())
            .unwrap_or_else(|| Protocol::Other("ip".to_string()));
        let ip1: IpAddr = caps.get(4)?.as_str().parse().ok()?;
        let port1: u16 = caps.get(5)?.as_str().parse().ok()?;
        let ip2: IpAddr = caps.get(7)?.as_str().parse().ok()?;
        let port2: u16 = caps.get(8)?.as_str().parse().ok()?;
        let bytes: u64 = match caps.get(10) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };

        // Outbound lines list the destination first; without an explicit
        // direction the side with the ephemeral port is taken as the client.
        let (src, src_port, dst, dst_port) = match direction {
            Some("outbound") => (ip2, port2, ip1, port1),
            Some(_) => (ip1, port1, ip2, port2),
            None => {
                if port2 > 1024 && port1 <= 1024 {
                    (ip2, port2, ip1, port1)
                } else {
                    (ip1, port1, ip2, port2)
                }
            }
        };

        Some(TrafficLogEntry {
            timestamp,
            src,
            dst,
            protocol,
            src_port: Some(src_port),
            dst_port: Some(dst_port),
            action: Action::Allow,
            bytes,
            rule_hash: None,
        })
    }

    fn parse_deny(&self, line: &str, timestamp: Option<DateTime<Utc>>) -> Option<TrafficLogEntry> {
        let caps = self.deny.captures(line)?;
        let protocol = Protocol::parse(caps.get(1)?.as_str())
            .unwrap_or_else(|| Protocol::Other("ip".to_string()));
        let src: IpAddr = caps.get(3)?.as_str().parse().ok()?;
        let dst: IpAddr = caps.get(5)?.as_str().parse().ok()?;

        Some(TrafficLogEntry {
            timestamp,
            src,
            dst,
            protocol,
            src_port: None,
            dst_port: None,
            action: Action::Deny,
            bytes: 0,
            rule_hash: None,
        })
    }

    fn parse_permit(&self, line: &str, timestamp: Option<DateTime<Utc>>) -> Option<TrafficLogEntry> {
        let caps = self.permit.captures(line)?;
        let protocol = Protocol::parse(caps.get(1)?.as_str())
            .unwrap_or_else(|| Protocol::Other("ip".to_string()));
        let src: IpAddr = caps.get(3)?.as_str().parse().ok()?;
        let src_port: u16 = caps.get(4)?.as_str().parse().ok()?;
        let dst: IpAddr = caps.get(6)?.as_str().parse().ok()?;
        let dst_port: u16 = caps.get(7)?.as_str().parse().ok()?;
        let rule_hash = self
            .hash
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        Some(TrafficLogEntry {
            timestamp,
            src,
            dst,
            protocol,
            src_port: Some(src_port),
            dst_port: Some(dst_port),
            action: Action::Allow,
            bytes: 0,
            rule_hash,
        })
    }
}

impl Default for SyslogParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn entry(raw: &str) -> TrafficLogEntry {
        let parsed = SyslogParser::new().parse(raw);
        assert_eq!(parsed.entries.len(), 1, "expected one entry from {}", raw);
        parsed.entries.into_iter().next().unwrap()
    }

    #[test]
    fn test_built_outbound_orients_client_as_source() {
        let e = entry(
            "Feb 05 2026 12:09:08: %ASA-6-302013: Built outbound TCP connection 123456 \
             for OUTSIDE:203.0.113.50/443 (203.0.113.50/443) to INSIDE:10.1.1.20/54321 (10.1.1.20/54321)",
        );
        assert_eq!(e.src, "10.1.1.20".parse::<IpAddr>().unwrap());
        assert_eq!(e.dst, "203.0.113.50".parse::<IpAddr>().unwrap());
        assert_eq!(e.dst_port, Some(443));
        assert_eq!(e.action, Action::Allow);
        assert_eq!(e.protocol, Protocol::Tcp);

        let ts = e.timestamp.unwrap();
        assert_eq!((ts.month(), ts.day(), ts.year()), (2, 5, 2026));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (12, 9, 8));
    }

    #[test]
    fn test_built_inbound_keeps_log_order() {
        let e = entry(
            "Feb 05 2026 12:10:00: %ASA-6-302013: Built inbound TCP connection 7 \
             for OUTSIDE:198.51.100.7/51000 (198.51.100.7/51000) to DMZ:10.0.0.5/443 (10.0.0.5/443)",
        );
        assert_eq!(e.src, "198.51.100.7".parse::<IpAddr>().unwrap());
        assert_eq!(e.dst, "10.0.0.5".parse::<IpAddr>().unwrap());
        assert_eq!(e.dst_port, Some(443));
    }

    #[test]
    fn test_teardown_uses_port_heuristic_and_bytes() {
        let e = entry(
            "Feb 05 2026 12:11:19: %ASA-6-302014: Teardown TCP connection 123456 \
             for OUTSIDE:203.0.113.50/443 to INSIDE:10.1.1.20/54321 duration 0:02:11 bytes 4312",
        );
        // High port side is the client.
        assert_eq!(e.src, "10.1.1.20".parse::<IpAddr>().unwrap());
        assert_eq!(e.dst, "203.0.113.50".parse::<IpAddr>().unwrap());
        assert_eq!(e.dst_port, Some(443));
        assert_eq!(e.bytes, 4312);
    }

    #[test]
    fn test_deny_line_has_no_ports() {
        let e = entry(
            "Feb 05 2026 12:09:09: %ASA-4-106023: Deny icmp src OUTSIDE:10.1.0.162 \
             dst INSIDE:10.20.50.110 (type 3, code 1)",
        );
        assert_eq!(e.action, Action::Deny);
        assert_eq!(e.protocol, Protocol::Icmp);
        assert_eq!(e.src, "10.1.0.162".parse::<IpAddr>().unwrap());
        assert!(e.dst_port.is_none());
        assert_eq!(e.bytes, 0);
    }

    #[test]
    fn test_permit_line_extracts_ace_hash() {
        let e = entry(
            "Feb 05 2026 12:12:00: %ASA-6-106100: access-list OUTSIDE-IN permitted tcp \
             OUTSIDE/198.51.100.7(51234) -> DMZ/10.0.0.5(443) hit-cnt 1 first hit [0x8c3b1b8f, 0x0]",
        );
        assert_eq!(e.action, Action::Allow);
        assert_eq!(e.dst_port, Some(443));
        assert_eq!(e.rule_hash.as_deref(), Some("0x8c3b1b8f"));
    }

    #[test]
    fn test_recognized_id_with_bad_fields_is_malformed() {
        let parsed = SyslogParser::new().parse("Feb 05 2026 12:09:08: %ASA-6-302013: Built garbage");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.malformed, 1);
        assert_eq!(parsed.ignored, 0);
    }

    #[test]
    fn test_unrecognized_lines_are_ignored() {
        let parsed = SyslogParser::new()
            .parse("Feb 05 2026 12:09:08: %ASA-6-611101: User authentication succeeded\n\n");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.malformed, 0);
        assert_eq!(parsed.ignored, 1);
    }

    #[test]
    fn test_missing_timestamp_is_none() {
        let e = entry(
            "%ASA-4-106023: Deny tcp src OUTSIDE:10.1.0.162 dst INSIDE:10.20.50.110",
        );
        assert!(e.timestamp.is_none());
    }

    #[test]
    fn test_batch_counts_every_category() {
        let raw = "\
Feb 05 2026 12:09:08: %ASA-6-302013: Built outbound TCP connection 1 for OUTSIDE:203.0.113.50/443 to INSIDE:10.1.1.20/54321
Feb 05 2026 12:09:09: %ASA-4-106023: Deny icmp src OUTSIDE:10.1.0.162 dst INSIDE:10.20.50.110
Feb 05 2026 12:09:10: %ASA-6-106100: garbage that will not extract
Feb 05 2026 12:09:11: %ASA-6-611101: User authentication succeeded";
        let parsed = SyslogParser::new().parse(raw);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.malformed, 1);
        assert_eq!(parsed.ignored, 1);
    }
}
