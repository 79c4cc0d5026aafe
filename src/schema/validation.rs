// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Value validators attached to schema attributes.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::LazyLock;

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid regex")
});

static PORT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    OneOf(&'static [&'static str]),
    PortNumber,
    /// Port number, or zero to let the server pick
    PortNumberOrZero,
    /// Port number or IANA service name
    PortNameOrNumber,
    IntAtLeast(i64),
    IntBetween(i64, i64),
    IpAddress,
    Cidr,
    DnsLabel,
    DnsSubdomain,
    /// Octal file mode string such as "0644"
    FileMode,
}

impl Validator {
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Validator::OneOf(allowed) => {
                let s = as_str(value)?;
                if allowed.contains(&s) {
                    Ok(())
                } else {
                    Err(format!("expected one of {:?}, got {:?}", allowed, s))
                }
            }
            Validator::PortNumber => int_between(value, 1, 65535),
            Validator::PortNumberOrZero => int_between(value, 0, 65535),
            Validator::IntAtLeast(min) => {
                let n = as_int(value)?;
                if n >= *min {
                    Ok(())
                } else {
                    Err(format!("expected value of at least {}, got {}", min, n))
                }
            }
            Validator::IntBetween(min, max) => int_between(value, *min, *max),
            Validator::PortNameOrNumber => {
                let s = as_str(value)?;
                if s.is_empty() {
                    return Ok(());
                }
                match s.parse::<i64>() {
                    Ok(n) if (1..=65535).contains(&n) => Ok(()),
                    Ok(n) => Err(format!("port {} is out of range (1-65535)", n)),
                    Err(_) if s.len() <= 15 && PORT_NAME.is_match(s) => Ok(()),
                    Err(_) => Err(format!("{:?} is neither a port number nor a port name", s)),
                }
            }
            Validator::IpAddress => {
                let s = as_str(value)?;
                if s.is_empty() {
                    return Ok(());
                }
                s.parse::<IpAddr>()
                    .map(|_| ())
                    .map_err(|_| format!("{:?} is not a valid IP address", s))
            }
            Validator::Cidr => validate_cidr(as_str(value)?),
            Validator::DnsLabel => {
                let s = as_str(value)?;
                if s.is_empty() || (s.len() <= 63 && DNS_LABEL.is_match(s)) {
                    Ok(())
                } else {
                    Err(format!(
                        "{:?} must consist of lower case alphanumeric characters or '-', at most 63 characters",
                        s
                    ))
                }
            }
            Validator::DnsSubdomain => {
                let s = as_str(value)?;
                if s.is_empty() || (s.len() <= 253 && DNS_SUBDOMAIN.is_match(s)) {
                    Ok(())
                } else {
                    Err(format!(
                        "{:?} must consist of lower case alphanumeric characters, '-' or '.', at most 253 characters",
                        s
                    ))
                }
            }
            Validator::FileMode => {
                let s = as_str(value)?;
                match i64::from_str_radix(s, 8) {
                    Ok(mode) if (0..=0o777).contains(&mode) => Ok(()),
                    _ => Err(format!("{:?} is not a valid octal file mode (0000-0777)", s)),
                }
            }
        }
    }
}

fn as_str(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "expected string".to_string())
}

fn as_int(value: &Value) -> Result<i64, String> {
    value.as_i64().ok_or_else(|| "expected int".to_string())
}

fn int_between(value: &Value, min: i64, max: i64) -> Result<(), String> {
    let n = as_int(value)?;
    if (min..=max).contains(&n) {
        Ok(())
    } else {
        Err(format!("expected value in range {}-{}, got {}", min, max, n))
    }
}

fn validate_cidr(s: &str) -> Result<(), String> {
    let invalid = || format!("{:?} is not a valid CIDR", s);
    let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_of() {
        let v = Validator::OneOf(&["ClusterIP", "NodePort"]);
        assert!(v.check(&json!("NodePort")).is_ok());
        assert!(v.check(&json!("Ingress")).is_err());
    }

    #[test]
    fn test_port_ranges() {
        assert!(Validator::PortNumber.check(&json!(80)).is_ok());
        assert!(Validator::PortNumber.check(&json!(0)).is_err());
        assert!(Validator::PortNumberOrZero.check(&json!(0)).is_ok());
        assert!(Validator::PortNumber.check(&json!(65536)).is_err());
    }

    #[test]
    fn test_port_name_or_number() {
        assert!(Validator::PortNameOrNumber.check(&json!("8080")).is_ok());
        assert!(Validator::PortNameOrNumber.check(&json!("http")).is_ok());
        assert!(Validator::PortNameOrNumber.check(&json!("")).is_ok());
        assert!(Validator::PortNameOrNumber.check(&json!("99999")).is_err());
        assert!(Validator::PortNameOrNumber.check(&json!("Not_A_Port")).is_err());
    }

    #[test]
    fn test_cidr() {
        assert!(Validator::Cidr.check(&json!("10.0.0.0/8")).is_ok());
        assert!(Validator::Cidr.check(&json!("fd00::/64")).is_ok());
        assert!(Validator::Cidr.check(&json!("10.0.0.0/33")).is_err());
        assert!(Validator::Cidr.check(&json!("10.0.0.0")).is_err());
    }

    #[test]
    fn test_ip_address() {
        assert!(Validator::IpAddress.check(&json!("192.168.1.1")).is_ok());
        assert!(Validator::IpAddress.check(&json!("::1")).is_ok());
        assert!(Validator::IpAddress.check(&json!("300.1.1.1")).is_err());
    }

    #[test]
    fn test_dns_names() {
        assert!(Validator::DnsSubdomain.check(&json!("my-app.example")).is_ok());
        assert!(Validator::DnsSubdomain.check(&json!("My_App")).is_err());
        assert!(Validator::DnsLabel.check(&json!("web-1")).is_ok());
        assert!(Validator::DnsLabel.check(&json!("web.1")).is_err());
        assert!(Validator::DnsLabel.check(&json!("")).is_ok());
    }

    #[test]
    fn test_file_mode() {
        assert!(Validator::FileMode.check(&json!("0644")).is_ok());
        assert!(Validator::FileMode.check(&json!("0999")).is_err());
        assert!(Validator::FileMode.check(&json!("1777")).is_err());
    }
}
