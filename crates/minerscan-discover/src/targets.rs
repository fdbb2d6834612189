//! Target host collection.
//!
//! The default source is the upstream `workers` table; a CIDR block or a
//! hosts file can stand in for it. Every source goes through
//! [`collect_hosts`] before dispatch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ipnet::IpNet;

use minerscan_core::Host;
use minerscan_store::OutcomeStore;

use crate::error::{DiscoverError, Result};

/// Widest network accepted for expansion, in host bits (a /16 in IPv4, a /112 in IPv6).
pub const MAX_CIDR_HOST_BITS: u8 = 16;

/// Where the bulk host set comes from.
#[derive(Debug, Clone)]
pub enum TargetSource {
    /// Distinct addresses in the store's `workers` table.
    Workers,
    /// Every host address of a network.
    Cidr(String),
    /// One address per line; blank lines and `#` comments are skipped.
    File(PathBuf),
}

impl TargetSource {
    /// Resolve the source into a deduplicated, non-empty host list.
    pub fn resolve(&self, store: &OutcomeStore) -> Result<Vec<Host>> {
        match self {
            Self::Workers => Ok(collect_hosts(store.worker_hosts()?)),
            Self::Cidr(cidr) => hosts_from_cidr(cidr),
            Self::File(path) => hosts_from_file(path),
        }
    }
}

/// Trim, drop empties, and deduplicate while keeping first-seen order.
pub fn collect_hosts<I, S>(raw: I) -> Vec<Host>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|addr| Host::parse(addr.as_ref()))
        .filter(|host| seen.insert(host.clone()))
        .collect()
}

/// Expand a network into its host addresses.
///
/// IPv4 networks exclude the network and broadcast addresses (except /31 and /32).
/// Networks wider than [`MAX_CIDR_HOST_BITS`] host bits are rejected.
pub fn hosts_from_cidr(cidr: &str) -> Result<Vec<Host>> {
    let net: IpNet = cidr
        .trim()
        .parse()
        .map_err(|e| DiscoverError::InvalidTarget(format!("{cidr}: {e}")))?;

    let host_bits = net.max_prefix_len() - net.prefix_len();
    if host_bits > MAX_CIDR_HOST_BITS {
        return Err(DiscoverError::InvalidTarget(format!(
            "{cidr}: network too large ({host_bits} host bits, at most {MAX_CIDR_HOST_BITS})"
        )));
    }

    Ok(collect_hosts(net.hosts().map(|ip| ip.to_string())))
}

pub fn hosts_from_file(path: &Path) -> Result<Vec<Host>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        DiscoverError::InvalidTarget(format!("cannot read {}: {e}", path.display()))
    })?;

    Ok(collect_hosts(
        contents
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn addrs(hosts: &[Host]) -> Vec<&str> {
        hosts.iter().map(Host::as_str).collect()
    }

    #[test]
    fn test_collect_hosts_filters_and_dedups() {
        let hosts = collect_hosts(["10.0.0.2", "", " 10.0.0.1 ", "10.0.0.2", "   ", "10.0.0.1"]);
        assert_eq!(addrs(&hosts), vec!["10.0.0.2", "10.0.0.1"]);
    }

    #[test]
    fn test_hosts_from_cidr() {
        let hosts = hosts_from_cidr("192.168.1.0/30").unwrap();
        assert_eq!(addrs(&hosts), vec!["192.168.1.1", "192.168.1.2"]);

        let single = hosts_from_cidr("10.0.0.7/32").unwrap();
        assert_eq!(addrs(&single), vec!["10.0.0.7"]);
    }

    #[test]
    fn test_hosts_from_cidr_ipv6() {
        let hosts = hosts_from_cidr("fd00::/126").unwrap();
        assert_eq!(addrs(&hosts), vec!["fd00::", "fd00::1", "fd00::2", "fd00::3"]);
        assert_eq!(hosts[1].authority(), "[fd00::1]");

        let single = hosts_from_cidr("::1/128").unwrap();
        assert_eq!(single[0].authority(), "[::1]");
    }

    #[test]
    fn test_hosts_from_cidr_rejects_oversized_networks() {
        for cidr in ["2001:db8::/64", "10.0.0.0/8", "fd00::/111"] {
            assert!(
                matches!(hosts_from_cidr(cidr), Err(DiscoverError::InvalidTarget(_))),
                "{cidr} should be rejected"
            );
        }
        assert_eq!(hosts_from_cidr("fd00::/112").unwrap().len(), 1 << 16);
        assert_eq!(hosts_from_cidr("10.1.0.0/16").unwrap().len(), (1 << 16) - 2);
    }

    #[test]
    fn test_hosts_from_cidr_rejects_garbage() {
        assert!(matches!(
            hosts_from_cidr("10.0.0.0/99"),
            Err(DiscoverError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_hosts_from_file_skips_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# rack 4").unwrap();
        writeln!(file, "10.4.0.1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "10.4.0.2  # spare").unwrap();
        writeln!(file, "10.4.0.1").unwrap();

        let hosts = hosts_from_file(file.path()).unwrap();
        assert_eq!(addrs(&hosts), vec!["10.4.0.1", "10.4.0.2"]);
    }

    #[test]
    fn test_workers_source_requires_table() {
        let store = OutcomeStore::open_in_memory().unwrap();
        assert!(matches!(
            TargetSource::Workers.resolve(&store),
            Err(DiscoverError::Store(_))
        ));
    }
}
