use std::net::IpAddr;

/// IP utility functions for validation and manipulation

/// Check if a string is a valid IP address (IPv4 or IPv6)
pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok()
}

/// Split an overlay address written as `address/prefix` into its two parts.
///
/// Returns `None` unless there is exactly one `/` with a non-empty part on
/// each side. Neither part is checked any further: the certificate tool is
/// the authority on what it accepts.
///
/// # Examples
/// ```
/// use meshstarter::utils::ip_utils::split_cidr;
///
/// assert_eq!(split_cidr("10.0.0.1/24"), Some(("10.0.0.1", "24")));
/// assert_eq!(split_cidr("10.0.0.1"), None);
/// assert_eq!(split_cidr("/24"), None);
/// ```
pub fn split_cidr(value: &str) -> Option<(&str, &str)> {
    let (address, prefix) = value.split_once('/')?;
    if address.is_empty() || prefix.is_empty() || prefix.contains('/') {
        return None;
    }
    Some((address, prefix))
}
