//! Client endpoint validation.

use crate::error::CoreError;
use crate::host::validate_ip_address;

/// Maximum length of a client name.
const MAX_NAME_LEN: usize = 128;

/// Validate a client registration (name + address).
pub fn validate_client(name: &str, ip_address: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Client name cannot be blank".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Client name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    validate_ip_address(ip_address)
}
