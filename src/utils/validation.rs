use crate::utils::error::{OvpnError, Result};
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

pub const MIN_PORT: u16 = 1;
pub const MAX_PORT: u16 = 65534;

static DOTTED_QUAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").expect("static regex"));

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(OvpnError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(OvpnError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OvpnError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(OvpnError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Instance names end up in file paths, unit names and the `;`-separated registry.
pub fn validate_instance_name(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;

    if value.trim() != value {
        return Err(OvpnError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Name cannot start or end with whitespace".to_string(),
        });
    }

    if let Some(c) = value.chars().find(|c| *c == ';' || *c == '/' || c.is_control()) {
        return Err(OvpnError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Name cannot contain {:?}", c),
        });
    }

    Ok(())
}

pub fn validate_port(field_name: &str, value: i64) -> Result<u16> {
    validate_range(field_name, value, i64::from(MIN_PORT), i64::from(MAX_PORT))?;
    u16::try_from(value).map_err(|_| OvpnError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: "Value does not fit in a port number".to_string(),
    })
}

/// Dotted-quad shape check, then each octet must fit in a byte.
pub fn validate_ipv4(field_name: &str, value: &str) -> Result<Ipv4Addr> {
    let invalid = |reason: &str| OvpnError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if !DOTTED_QUAD.is_match(value) {
        return Err(invalid("Not a dotted-quad IPv4 address"));
    }

    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(value.split('.')) {
        *slot = part
            .parse::<u8>()
            .map_err(|_| invalid("Octet out of range 0-255"))?;
    }

    Ok(Ipv4Addr::from(octets))
}

/// RFC1918 only: 10/8, 172.16/12, 192.168/16. Loopback is not a VPN network.
pub fn is_private_network(addr: Ipv4Addr) -> bool {
    addr.is_private()
}

pub fn validate_private_network(field_name: &str, value: &str) -> Result<Ipv4Addr> {
    let addr = validate_ipv4(field_name, value)?;
    if !is_private_network(addr) {
        return Err(OvpnError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Not inside 10.0.0.0/8, 172.16.0.0/12 or 192.168.0.0/16".to_string(),
        });
    }
    Ok(addr)
}
