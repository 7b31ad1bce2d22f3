//! IP set entry validation

use std::net::IpAddr;

/// True for a bare IP address or a CIDR block with an in-range prefix.
pub fn is_valid_ip_entry(entry: &str) -> bool {
    let entry = entry.trim();
    match entry.split_once('/') {
        None => entry.parse::<IpAddr>().is_ok(),
        Some((addr, prefix)) => {
            let Ok(addr) = addr.parse::<IpAddr>() else {
                return false;
            };
            let Ok(prefix) = prefix.parse::<u8>() else {
                return false;
            };
            let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
            prefix <= max_prefix
        }
    }
}

/// Keep only valid entries, trimmed, preserving order.
pub fn filter_valid_ips<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.as_ref().trim())
        .filter(|entry| is_valid_ip_entry(entry))
        .map(str::to_string)
        .collect()
}
