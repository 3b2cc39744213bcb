//! Host registry validation and signaling endpoint constants.

use validator::ValidateIp;

use crate::error::CoreError;

/// Path on the host that starts a signaling exchange.
pub const SIGNALING_START_PATH: &str = "/api/session/start";

/// Path on the host that ends a signaling exchange.
pub const SIGNALING_END_PATH: &str = "/api/session/end";

/// Path on the host that lists launchable programs.
pub const PROGRAMS_PATH: &str = "/api/session/programs";

/// Maximum length of a host name.
const MAX_NAME_LEN: usize = 128;

/// Validate a host name: non-blank and at most `MAX_NAME_LEN` characters.
pub fn validate_host_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Name cannot be blank".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate that `address` is a literal IPv4 or IPv6 address.
pub fn validate_ip_address(address: &str) -> Result<(), CoreError> {
    if address.trim().is_empty() {
        return Err(CoreError::Validation("IP address cannot be blank".into()));
    }
    if !address.validate_ip() {
        return Err(CoreError::Validation(format!(
            "'{address}' is not a valid IP address"
        )));
    }
    Ok(())
}

/// Validate a TCP port in `1..=65535`.
pub fn validate_port(port: i32) -> Result<(), CoreError> {
    if !(1..=65535).contains(&port) {
        return Err(CoreError::Validation(format!(
            "Port must be between 1 and 65535, got {port}"
        )));
    }
    Ok(())
}

/// Validate the full (name, address, port) registration triple.
pub fn validate_registration(name: &str, address: &str, port: i32) -> Result<(), CoreError> {
    validate_host_name(name)?;
    validate_ip_address(address)?;
    validate_port(port)
}

/// Build the URL of an endpoint exposed by a host.
///
/// IPv6 literals are bracketed.
pub fn endpoint_url(address: &str, port: i32, path: &str) -> String {
    if address.contains(':') {
        format!("http://[{address}]:{port}{path}")
    } else {
        format!("http://{address}:{port}{path}")
    }
}
