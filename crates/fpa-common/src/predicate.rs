//! Network predicate algebra
//!
//! Firewall rules constrain traffic on three dimensions: source address,
//! destination address, and service (protocol + port). Each dimension is a
//! tagged predicate that resolves to a normalized set representation, and
//! every comparison in the engine (`overlaps`, `contains`, `equals`) runs on
//! those resolved sets. `Any` is the universal superset on both dimensions.
//!
//! Address sets are closed intervals over the 32- or 128-bit integer space,
//! with an explicit family tag so IPv4 and IPv6 never compare as related.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use crate::error::{FpaError, FpaResult};

// ============================================================================
// Protocol and ports
// ============================================================================

/// Transport protocol referenced by a service predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// ICMP (v4 and v6 folded together, as vendor configs do)
    Icmp,
    /// Any other named IP protocol (gre, esp, ...), stored lowercase
    Other(String),
}

impl Protocol {
    /// Parse a protocol token. `None` means "any protocol" (`ip` / `any`).
    pub fn parse(token: &str) -> Option<Protocol> {
        match token.trim().to_ascii_lowercase().as_str() {
            "" | "ip" | "any" | "any4" | "any6" => None,
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            "icmp" | "icmp6" | "icmpv6" => Some(Protocol::Icmp),
            other => Some(Protocol::Other(other.to_string())),
        }
    }

    /// Lowercase protocol name
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Other(name) => name,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed port interval; a single port is `lo == hi`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PortSpan {
    /// First port in the interval
    pub lo: u16,
    /// Last port in the interval
    pub hi: u16,
}

impl PortSpan {
    /// Interval covering both endpoints, in either order
    pub fn new(a: u16, b: u16) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Single-port interval
    pub fn single(port: u16) -> Self {
        Self { lo: port, hi: port }
    }

    /// Parse `"443"` or `"8000-9000"`
    pub fn parse(text: &str) -> FpaResult<Self> {
        let invalid = || FpaError::InvalidPredicate {
            text: text.to_string(),
        };
        match text.trim().split_once('-') {
            Some((a, b)) => {
                let lo = a.trim().parse::<u16>().map_err(|_| invalid())?;
                let hi = b.trim().parse::<u16>().map_err(|_| invalid())?;
                Ok(Self::new(lo, hi))
            }
            None => {
                let port = text.trim().parse::<u16>().map_err(|_| invalid())?;
                Ok(Self::single(port))
            }
        }
    }

    /// True when the interval is a single port
    pub fn is_single(&self) -> bool {
        self.lo == self.hi
    }

    /// True when `other` lies entirely inside this interval
    pub fn contains(&self, other: &PortSpan) -> bool {
        self.lo <= other.lo && other.hi <= self.hi
    }

    /// True when the intervals share at least one port
    pub fn overlaps(&self, other: &PortSpan) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }

    /// True when `port` lies inside this interval
    pub fn contains_port(&self, port: u16) -> bool {
        self.lo <= port && port <= self.hi
    }
}

impl fmt::Display for PortSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}-{}", self.lo, self.hi)
        }
    }
}

// ============================================================================
// Predicates as written in rules
// ============================================================================

/// Address constraint of a rule, before object resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetPredicate {
    /// Matches every address of every family
    Any,
    /// Single address
    Host(IpAddr),
    /// CIDR network
    Net(IpNetwork),
    /// Inclusive address range, both ends in the same family
    Range(IpAddr, IpAddr),
    /// Named object or object group, resolved through the object table
    Object(String),
    /// Union of predicates
    List(Vec<NetPredicate>),
}

impl NetPredicate {
    /// True for the syntactic `any` form
    pub fn is_any(&self) -> bool {
        matches!(self, NetPredicate::Any)
    }

    /// Collect names of referenced objects, recursing into lists
    pub fn collect_object_refs(&self, out: &mut BTreeSet<String>) {
        match self {
            NetPredicate::Object(name) => {
                out.insert(name.clone());
            }
            NetPredicate::List(items) => {
                for item in items {
                    item.collect_object_refs(out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for NetPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetPredicate::Any => f.write_str("any"),
            NetPredicate::Host(ip) => write!(f, "host {ip}"),
            NetPredicate::Net(net) => write!(f, "{net}"),
            NetPredicate::Range(lo, hi) => write!(f, "{lo}-{hi}"),
            NetPredicate::Object(name) => write!(f, "object-group {name}"),
            NetPredicate::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Service constraint of a rule, before object resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvcPredicate {
    /// Matches every protocol and port
    Any,
    /// One protocol, any port
    Proto(Protocol),
    /// One protocol restricted to a port interval
    Port {
        /// Transport protocol
        proto: Protocol,
        /// Allowed destination ports
        span: PortSpan,
    },
    /// Named service object or group
    Object(String),
    /// Union of predicates
    List(Vec<SvcPredicate>),
}

impl SvcPredicate {
    /// True for the syntactic `any` form
    pub fn is_any(&self) -> bool {
        matches!(self, SvcPredicate::Any)
    }

    /// Collect names of referenced objects, recursing into lists
    pub fn collect_object_refs(&self, out: &mut BTreeSet<String>) {
        match self {
            SvcPredicate::Object(name) => {
                out.insert(name.clone());
            }
            SvcPredicate::List(items) => {
                for item in items {
                    item.collect_object_refs(out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for SvcPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvcPredicate::Any => f.write_str("ip"),
            SvcPredicate::Proto(proto) => write!(f, "{proto}"),
            SvcPredicate::Port { proto, span } => write!(f, "{proto}/{span}"),
            SvcPredicate::Object(name) => write!(f, "object-group {name}"),
            SvcPredicate::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Textual forms
// ============================================================================

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let prefix = text.get(..keyword.len())?;
    if !prefix.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = text.get(keyword.len()..)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Parse an address expression: `any`, `host 10.0.0.5`, `10.0.0.0/24`,
/// `10.0.0.1-10.0.0.50`, a bare address, or `object[-group] NAME`.
pub fn parse_net(text: &str) -> FpaResult<NetPredicate> {
    let invalid = || FpaError::InvalidPredicate {
        text: text.to_string(),
    };
    let t = text.trim();
    if t.is_empty() {
        return Err(invalid());
    }
    if t.eq_ignore_ascii_case("any")
        || t.eq_ignore_ascii_case("any4")
        || t.eq_ignore_ascii_case("any6")
        || t == "0.0.0.0/0"
        || t == "::/0"
    {
        return Ok(NetPredicate::Any);
    }
    if let Some(rest) = strip_keyword(t, "host") {
        let ip = rest.parse::<IpAddr>().map_err(|_| invalid())?;
        return Ok(NetPredicate::Host(ip));
    }
    if let Some(rest) = strip_keyword(t, "object-group").or_else(|| strip_keyword(t, "object")) {
        return Ok(NetPredicate::Object(rest.to_string()));
    }
    if t.contains('/') {
        let net = t.parse::<IpNetwork>().map_err(|_| invalid())?;
        return Ok(NetPredicate::Net(net));
    }
    // IPv6 text contains ':' but never '-', so range splitting is v4-safe
    if let Some((a, b)) = t.split_once('-') {
        let lo = a.trim().parse::<IpAddr>().map_err(|_| invalid())?;
        let hi = b.trim().parse::<IpAddr>().map_err(|_| invalid())?;
        if lo.is_ipv4() != hi.is_ipv4() {
            return Err(invalid());
        }
        return Ok(NetPredicate::Range(lo, hi));
    }
    if let Ok(ip) = t.parse::<IpAddr>() {
        return Ok(NetPredicate::Host(ip));
    }
    Err(invalid())
}

/// Parse a service expression: `ip`/`any`, `tcp`, `tcp/443`, `tcp/8000-9000`,
/// or `object[-group] NAME`. A bare token is a protocol name.
pub fn parse_svc(text: &str) -> FpaResult<SvcPredicate> {
    let invalid = || FpaError::InvalidPredicate {
        text: text.to_string(),
    };
    let t = text.trim();
    if t.is_empty() {
        return Err(invalid());
    }
    if let Some(rest) = strip_keyword(t, "object-group").or_else(|| strip_keyword(t, "object")) {
        return Ok(SvcPredicate::Object(rest.to_string()));
    }
    if let Some((proto_text, port_text)) = t.split_once('/') {
        let span = PortSpan::parse(port_text)?;
        return Ok(match Protocol::parse(proto_text) {
            None => SvcPredicate::Any,
            Some(proto) if span == PortSpan::single(0) => SvcPredicate::Proto(proto),
            Some(proto) => SvcPredicate::Port { proto, span },
        });
    }
    Ok(match Protocol::parse(t) {
        None => SvcPredicate::Any,
        Some(proto) => SvcPredicate::Proto(proto),
    })
}

// ============================================================================
// Resolved address sets
// ============================================================================

/// Closed interval over the address space of one family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AddrSpan {
    /// Family tag; IPv4 and IPv6 spans never relate
    pub v6: bool,
    /// First address as an integer
    pub lo: u128,
    /// Last address as an integer
    pub hi: u128,
}

fn ip_to_parts(ip: IpAddr) -> (bool, u128) {
    match ip {
        IpAddr::V4(v4) => (false, u32::from(v4) as u128),
        IpAddr::V6(v6) => (true, u128::from(v6)),
    }
}

impl AddrSpan {
    /// Span covering a single address
    pub fn from_ip(ip: IpAddr) -> Self {
        let (v6, value) = ip_to_parts(ip);
        Self {
            v6,
            lo: value,
            hi: value,
        }
    }

    /// Span covering a CIDR network
    pub fn from_net(net: &IpNetwork) -> Self {
        match net {
            IpNetwork::V4(n) => {
                let base = u32::from(n.network()) as u128;
                let host_bits = 32 - n.prefix() as u32;
                Self {
                    v6: false,
                    lo: base,
                    hi: base + ((1u128 << host_bits) - 1),
                }
            }
            IpNetwork::V6(n) => {
                let base = u128::from(n.network());
                if n.prefix() == 0 {
                    Self {
                        v6: true,
                        lo: 0,
                        hi: u128::MAX,
                    }
                } else {
                    let host_bits = 128 - n.prefix() as u32;
                    Self {
                        v6: true,
                        lo: base,
                        hi: base + ((1u128 << host_bits) - 1),
                    }
                }
            }
        }
    }

    /// Span covering an inclusive range; both ends must share a family
    pub fn from_range(a: IpAddr, b: IpAddr) -> FpaResult<Self> {
        let (fam_a, lo) = ip_to_parts(a);
        let (fam_b, hi) = ip_to_parts(b);
        if fam_a != fam_b {
            return Err(FpaError::InvalidPredicate {
                text: format!("{a}-{b}"),
            });
        }
        Ok(Self {
            v6: fam_a,
            lo: lo.min(hi),
            hi: lo.max(hi),
        })
    }

    /// True when `other` lies entirely inside this span
    pub fn contains(&self, other: &AddrSpan) -> bool {
        self.v6 == other.v6 && self.lo <= other.lo && other.hi <= self.hi
    }

    /// True when the spans share at least one address
    pub fn overlaps(&self, other: &AddrSpan) -> bool {
        self.v6 == other.v6 && self.lo <= other.hi && other.lo <= self.hi
    }

    /// True when `ip` lies inside this span
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        let (v6, value) = ip_to_parts(ip);
        self.v6 == v6 && self.lo <= value && value <= self.hi
    }

    /// True for an IPv4 span covering more addresses than a `/prefix` network
    pub fn wider_than_v4(&self, prefix: u8) -> bool {
        !self.v6 && prefix <= 32 && (self.hi - self.lo) >= (1u128 << (32 - prefix as u32))
    }
}

/// Normalized address set: sorted, coalesced spans, or the universal `Any`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolvedNet {
    /// Every address of every family
    Any,
    /// Disjoint spans in canonical order
    Spans(Vec<AddrSpan>),
}

impl ResolvedNet {
    /// Build the canonical form: sort, then merge overlapping or adjacent
    /// spans of the same family.
    pub fn from_spans(mut spans: Vec<AddrSpan>) -> Self {
        spans.sort();
        let mut merged: Vec<AddrSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            if let Some(last) = merged.last_mut() {
                if last.v6 == span.v6 && span.lo <= last.hi.saturating_add(1) {
                    if span.hi > last.hi {
                        last.hi = span.hi;
                    }
                    continue;
                }
            }
            merged.push(span);
        }
        ResolvedNet::Spans(merged)
    }

    /// True for the universal set
    pub fn is_any(&self) -> bool {
        matches!(self, ResolvedNet::Any)
    }

    /// Superset test: every address of `other` is in `self`
    pub fn contains(&self, other: &ResolvedNet) -> bool {
        match (self, other) {
            (ResolvedNet::Any, _) => true,
            (_, ResolvedNet::Any) => false,
            (ResolvedNet::Spans(a), ResolvedNet::Spans(b)) => b
                .iter()
                .all(|sb| a.iter().any(|sa| sa.contains(sb))),
        }
    }

    /// True when the sets share at least one address
    pub fn overlaps(&self, other: &ResolvedNet) -> bool {
        match (self, other) {
            (ResolvedNet::Any, ResolvedNet::Any) => true,
            (ResolvedNet::Any, ResolvedNet::Spans(s))
            | (ResolvedNet::Spans(s), ResolvedNet::Any) => !s.is_empty(),
            (ResolvedNet::Spans(a), ResolvedNet::Spans(b)) => a
                .iter()
                .any(|sa| b.iter().any(|sb| sa.overlaps(sb))),
        }
    }

    /// Set equality; canonical form makes this structural
    pub fn equals(&self, other: &ResolvedNet) -> bool {
        self == other
    }

    /// True when `ip` is in the set
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        match self {
            ResolvedNet::Any => true,
            ResolvedNet::Spans(spans) => spans.iter().any(|s| s.contains_ip(ip)),
        }
    }

    /// True when the set is `Any` or holds an IPv4 span broader than `/prefix`
    pub fn is_broad_v4(&self, prefix: u8) -> bool {
        match self {
            ResolvedNet::Any => true,
            ResolvedNet::Spans(spans) => spans.iter().any(|s| s.wider_than_v4(prefix)),
        }
    }
}

// ============================================================================
// Resolved service sets
// ============================================================================

/// One protocol with an optional port restriction; `ports: None` means the
/// whole port space of that protocol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SvcItem {
    /// Transport protocol
    pub proto: Protocol,
    /// Allowed destination ports, or every port when absent
    pub ports: Option<PortSpan>,
}

impl SvcItem {
    /// Superset test on a single item
    pub fn covers(&self, other: &SvcItem) -> bool {
        if self.proto != other.proto {
            return false;
        }
        match (&self.ports, &other.ports) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => a.contains(b),
        }
    }

    /// True when the items admit at least one common (protocol, port) pair
    pub fn overlaps(&self, other: &SvcItem) -> bool {
        if self.proto != other.proto {
            return false;
        }
        match (&self.ports, &other.ports) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a.overlaps(b),
        }
    }
}

/// Normalized service set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolvedSvc {
    /// Every protocol and port
    Any,
    /// Items in canonical order, port spans coalesced per protocol
    Items(Vec<SvcItem>),
}

impl ResolvedSvc {
    /// Build the canonical form: per protocol, an unrestricted item swallows
    /// the rest; otherwise port spans are sorted and merged.
    pub fn from_items(items: Vec<SvcItem>) -> Self {
        use std::collections::BTreeMap;
        let mut by_proto: BTreeMap<String, (Protocol, bool, Vec<PortSpan>)> = BTreeMap::new();
        for item in items {
            let slot = by_proto
                .entry(item.proto.as_str().to_string())
                .or_insert_with(|| (item.proto.clone(), false, Vec::new()));
            match item.ports {
                None => slot.1 = true,
                Some(span) => slot.2.push(span),
            }
        }
        let mut out = Vec::new();
        for (_, (proto, any_port, mut spans)) in by_proto {
            if any_port {
                out.push(SvcItem { proto, ports: None });
                continue;
            }
            spans.sort();
            let mut merged: Vec<PortSpan> = Vec::with_capacity(spans.len());
            for span in spans {
                if let Some(last) = merged.last_mut() {
                    if span.lo <= last.hi.saturating_add(1) {
                        if span.hi > last.hi {
                            last.hi = span.hi;
                        }
                        continue;
                    }
                }
                merged.push(span);
            }
            for span in merged {
                out.push(SvcItem {
                    proto: proto.clone(),
                    ports: Some(span),
                });
            }
        }
        ResolvedSvc::Items(out)
    }

    /// True for the universal set
    pub fn is_any(&self) -> bool {
        matches!(self, ResolvedSvc::Any)
    }

    /// Superset test: every (protocol, port) pair of `other` is in `self`
    pub fn contains(&self, other: &ResolvedSvc) -> bool {
        match (self, other) {
            (ResolvedSvc::Any, _) => true,
            (_, ResolvedSvc::Any) => false,
            (ResolvedSvc::Items(a), ResolvedSvc::Items(b)) => {
                b.iter().all(|ib| a.iter().any(|ia| ia.covers(ib)))
            }
        }
    }

    /// True when the sets admit at least one common (protocol, port) pair
    pub fn overlaps(&self, other: &ResolvedSvc) -> bool {
        match (self, other) {
            (ResolvedSvc::Any, ResolvedSvc::Any) => true,
            (ResolvedSvc::Any, ResolvedSvc::Items(s))
            | (ResolvedSvc::Items(s), ResolvedSvc::Any) => !s.is_empty(),
            (ResolvedSvc::Items(a), ResolvedSvc::Items(b)) => {
                a.iter().any(|ia| b.iter().any(|ib| ia.overlaps(ib)))
            }
        }
    }

    /// Set equality; canonical form makes this structural
    pub fn equals(&self, other: &ResolvedSvc) -> bool {
        self == other
    }

    /// Would a packet with this protocol and destination port be admitted?
    ///
    /// A port-restricted item never admits a packet without a port.
    pub fn matches(&self, proto: &Protocol, dst_port: Option<u16>) -> bool {
        match self {
            ResolvedSvc::Any => true,
            ResolvedSvc::Items(items) => items.iter().any(|item| {
                if item.proto != *proto {
                    return false;
                }
                match (&item.ports, dst_port) {
                    (None, _) => true,
                    (Some(span), Some(port)) => span.contains_port(port),
                    (Some(_), None) => false,
                }
            }),
        }
    }

    /// True when the set admits `port` over TCP or UDP
    pub fn covers_port(&self, port: u16) -> bool {
        self.matches(&Protocol::Tcp, Some(port)) || self.matches(&Protocol::Udp, Some(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    fn v4(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_net_forms() {
        assert_eq!(parse_net("any").unwrap(), NetPredicate::Any);
        assert_eq!(parse_net("ANY4").unwrap(), NetPredicate::Any);
        assert_eq!(parse_net("0.0.0.0/0").unwrap(), NetPredicate::Any);
        assert_eq!(
            parse_net("host 10.0.0.5").unwrap(),
            NetPredicate::Host(v4("10.0.0.5"))
        );
        assert_eq!(
            parse_net("10.0.0.5").unwrap(),
            NetPredicate::Host(v4("10.0.0.5"))
        );
        assert!(matches!(
            parse_net("10.0.0.0/24").unwrap(),
            NetPredicate::Net(_)
        ));
        assert_eq!(
            parse_net("10.0.0.1-10.0.0.50").unwrap(),
            NetPredicate::Range(v4("10.0.0.1"), v4("10.0.0.50"))
        );
        assert_eq!(
            parse_net("object-group DMZ_SERVERS").unwrap(),
            NetPredicate::Object("DMZ_SERVERS".to_string())
        );
        assert_eq!(
            parse_net("object WEB_SRV").unwrap(),
            NetPredicate::Object("WEB_SRV".to_string())
        );
        assert!(parse_net("not an address").is_err());
        assert!(parse_net("10.0.0.1-fe80::1").is_err());
    }

    #[test]
    fn test_parse_svc_forms() {
        assert_eq!(parse_svc("ip").unwrap(), SvcPredicate::Any);
        assert_eq!(parse_svc("any").unwrap(), SvcPredicate::Any);
        assert_eq!(
            parse_svc("tcp").unwrap(),
            SvcPredicate::Proto(Protocol::Tcp)
        );
        assert_eq!(
            parse_svc("tcp/443").unwrap(),
            SvcPredicate::Port {
                proto: Protocol::Tcp,
                span: PortSpan::single(443)
            }
        );
        assert_eq!(
            parse_svc("udp/8000-9000").unwrap(),
            SvcPredicate::Port {
                proto: Protocol::Udp,
                span: PortSpan::new(8000, 9000)
            }
        );
        // port 0 means any port for that protocol
        assert_eq!(
            parse_svc("tcp/0").unwrap(),
            SvcPredicate::Proto(Protocol::Tcp)
        );
        assert_eq!(
            parse_svc("gre").unwrap(),
            SvcPredicate::Proto(Protocol::Other("gre".to_string()))
        );
        assert!(parse_svc("tcp/notaport").is_err());
    }

    #[test]
    fn test_span_coalescing() {
        let a = AddrSpan::from_net(&"10.0.0.0/25".parse().unwrap());
        let b = AddrSpan::from_net(&"10.0.0.128/25".parse().unwrap());
        let joined = ResolvedNet::from_spans(vec![b, a]);
        let full = ResolvedNet::from_spans(vec![AddrSpan::from_net(
            &"10.0.0.0/24".parse().unwrap(),
        )]);
        assert!(joined.equals(&full));
    }

    #[test]
    fn test_net_containment() {
        let net24 = ResolvedNet::from_spans(vec![AddrSpan::from_net(
            &"10.0.0.0/24".parse().unwrap(),
        )]);
        let host = ResolvedNet::from_spans(vec![AddrSpan::from_ip(v4("10.0.0.7"))]);
        assert!(ResolvedNet::Any.contains(&net24));
        assert!(!net24.contains(&ResolvedNet::Any));
        assert!(net24.contains(&host));
        assert!(!host.contains(&net24));
        assert!(net24.overlaps(&host));
        assert!(net24.contains_ip(v4("10.0.0.200")));
        assert!(!net24.contains_ip(v4("10.0.1.1")));
    }

    #[test]
    fn test_families_never_mix() {
        let v4_all = ResolvedNet::from_spans(vec![AddrSpan::from_net(
            &"0.0.0.0/1".parse().unwrap(),
        )]);
        let v6_host =
            ResolvedNet::from_spans(vec![AddrSpan::from_ip("2001:db8::1".parse().unwrap())]);
        assert!(!v4_all.contains(&v6_host));
        assert!(!v4_all.overlaps(&v6_host));
        assert!(!v4_all.contains_ip("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_svc_containment_and_match() {
        let web = ResolvedSvc::from_items(vec![
            SvcItem {
                proto: Protocol::Tcp,
                ports: Some(PortSpan::single(80)),
            },
            SvcItem {
                proto: Protocol::Tcp,
                ports: Some(PortSpan::single(443)),
            },
        ]);
        let https = ResolvedSvc::from_items(vec![SvcItem {
            proto: Protocol::Tcp,
            ports: Some(PortSpan::single(443)),
        }]);
        let tcp_all = ResolvedSvc::from_items(vec![SvcItem {
            proto: Protocol::Tcp,
            ports: None,
        }]);
        assert!(ResolvedSvc::Any.contains(&web));
        assert!(tcp_all.contains(&web));
        assert!(web.contains(&https));
        assert!(!https.contains(&web));
        assert!(web.matches(&Protocol::Tcp, Some(443)));
        assert!(!web.matches(&Protocol::Tcp, Some(8080)));
        assert!(!web.matches(&Protocol::Udp, Some(443)));
        assert!(!web.matches(&Protocol::Tcp, None));
        assert!(tcp_all.matches(&Protocol::Tcp, None));
    }

    #[test]
    fn test_svc_port_coalescing_equality() {
        let split = ResolvedSvc::from_items(vec![
            SvcItem {
                proto: Protocol::Tcp,
                ports: Some(PortSpan::new(80, 81)),
            },
            SvcItem {
                proto: Protocol::Tcp,
                ports: Some(PortSpan::single(82)),
            },
        ]);
        let joined = ResolvedSvc::from_items(vec![SvcItem {
            proto: Protocol::Tcp,
            ports: Some(PortSpan::new(80, 82)),
        }]);
        assert!(split.equals(&joined));
    }

    #[test]
    fn test_covers_port() {
        let ssh = ResolvedSvc::from_items(vec![SvcItem {
            proto: Protocol::Tcp,
            ports: Some(PortSpan::new(20, 25)),
        }]);
        assert!(ssh.covers_port(22));
        assert!(!ssh.covers_port(443));
        assert!(ResolvedSvc::Any.covers_port(22));
    }

    #[test]
    fn test_broad_v4() {
        let net16 = ResolvedNet::from_spans(vec![AddrSpan::from_net(
            &"172.16.0.0/16".parse().unwrap(),
        )]);
        let net24 = ResolvedNet::from_spans(vec![AddrSpan::from_net(
            &"172.16.0.0/24".parse().unwrap(),
        )]);
        assert!(net16.is_broad_v4(24));
        assert!(!net24.is_broad_v4(24));
        assert!(ResolvedNet::Any.is_broad_v4(24));
    }

    proptest! {
        #[test]
        fn prop_span_overlap_symmetric(a1: u32, a2: u32, b1: u32, b2: u32) {
            let a = AddrSpan { v6: false, lo: a1.min(a2) as u128, hi: a1.max(a2) as u128 };
            let b = AddrSpan { v6: false, lo: b1.min(b2) as u128, hi: b1.max(b2) as u128 };
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn prop_contains_implies_overlaps(a1: u32, a2: u32, b1: u32, b2: u32) {
            let a = AddrSpan { v6: false, lo: a1.min(a2) as u128, hi: a1.max(a2) as u128 };
            let b = AddrSpan { v6: false, lo: b1.min(b2) as u128, hi: b1.max(b2) as u128 };
            if a.contains(&b) {
                prop_assert!(a.overlaps(&b));
            }
        }

        #[test]
        fn prop_host_span_roundtrip(oct in proptest::array::uniform4(0u8..=255)) {
            let ip = IpAddr::V4(Ipv4Addr::new(oct[0], oct[1], oct[2], oct[3]));
            let span = AddrSpan::from_ip(ip);
            prop_assert!(span.contains_ip(ip));
            prop_assert_eq!(span.lo, span.hi);
        }
    }
}
