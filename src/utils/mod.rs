use std::net::IpAddr;

/// Normalize a MAC address to uppercase colon-separated byte pairs.
///
/// Every non-hex character is dropped. When exactly 12 hex digits remain they
/// are regrouped as `AA:BB:CC:DD:EE:FF`; anything else comes back as the
/// ASCII-uppercased input so a malformed address never aborts a batch.
pub fn normalize_mac(mac: &str) -> String {
    let clean: Vec<char> = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if clean.len() != 12 {
        return mac.to_ascii_uppercase();
    }

    clean
        .chunks(2)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}

/// True if the string parses as an IPv4 or IPv6 address
pub fn is_usable_ip(ip: &str) -> bool {
    ip.trim().parse::<IpAddr>().is_ok()
}

/// Filter blank strings to None; the control plane sends "" for unknown values
pub fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
