use crate::error::ValidationError;

lazy_static::lazy_static! {
    static ref SSH_KEY: regex::Regex = regex::Regex::new(
        r"^(ssh-rsa|ssh-ed25519|ssh-dss|ecdsa-sha2-nistp(256|384|521)) [A-Za-z0-9+/]+={0,3}( [^\r\n]+)?$"
    )
    .unwrap();
    static ref URL_SHAPE: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/]+").unwrap();
}

/// Trims and accepts any non-empty string.
pub fn non_empty(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(trimmed.to_owned())
}

/// Parses a whole number and checks it against an inclusive range.
pub fn int_in_range(input: &str, min: u32, max: u32) -> Result<u32, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::NotANumber(trimmed.to_owned()))?;
    if value < i64::from(min) || value > i64::from(max) {
        return Err(ValidationError::OutOfRange {
            min,
            max,
            got: value,
        });
    }
    Ok(value as u32)
}

/// Accepts a single-line OpenSSH public key: a recognized key-type prefix,
/// a base64 payload and an optional comment.
pub fn ssh_public_key(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !SSH_KEY.is_match(trimmed) {
        return Err(ValidationError::InvalidKey);
    }
    Ok(trimmed.to_owned())
}

pub fn yes_no(input: &str) -> Result<bool, ValidationError> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(ValidationError::InvalidChoice),
    }
}

/// Shape check only; the endpoint is never probed here.
pub fn url_shape(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !URL_SHAPE.is_match(trimmed) {
        return Err(ValidationError::InvalidUrl(trimmed.to_owned()));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_trims() {
        assert_eq!(non_empty("  dc01  ").unwrap(), "dc01");
        assert_eq!(non_empty("   "), Err(ValidationError::Empty));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        assert_eq!(int_in_range("1", 1, 5).unwrap(), 1);
        assert_eq!(int_in_range("5", 1, 5).unwrap(), 5);
        assert_eq!(
            int_in_range("0", 1, 5),
            Err(ValidationError::OutOfRange {
                min: 1,
                max: 5,
                got: 0
            })
        );
        assert_eq!(
            int_in_range("6", 1, 5),
            Err(ValidationError::OutOfRange {
                min: 1,
                max: 5,
                got: 6
            })
        );
    }

    #[test]
    fn range_rejects_non_numbers() {
        assert_eq!(
            int_in_range("three", 1, 5),
            Err(ValidationError::NotANumber("three".to_owned()))
        );
        assert_eq!(int_in_range("", 1, 5), Err(ValidationError::Empty));
    }

    #[test]
    fn range_never_returns_out_of_range() {
        for raw in ["-1", "0", "33", "9999999999"] {
            if let Ok(v) = int_in_range(raw, 6, 32) {
                assert!((6..=32).contains(&v));
            }
        }
    }

    #[test]
    fn ssh_key_prefixes() {
        assert!(ssh_public_key("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIDWoEncFRYnwMifsDSKp7u2c8XJNvLiXBAmvLYZf6DAm admin@lab").is_ok());
        assert!(ssh_public_key("ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQC7").is_ok());
        assert!(ssh_public_key("ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTY=").is_ok());
        assert_eq!(
            ssh_public_key("ssh-foo AAAA"),
            Err(ValidationError::InvalidKey)
        );
        assert_eq!(
            ssh_public_key("not a key at all"),
            Err(ValidationError::InvalidKey)
        );
        assert_eq!(ssh_public_key(""), Err(ValidationError::Empty));
    }

    #[test]
    fn yes_no_answers() {
        assert_eq!(yes_no("y").unwrap(), true);
        assert_eq!(yes_no("YES").unwrap(), true);
        assert_eq!(yes_no("n").unwrap(), false);
        assert_eq!(yes_no("maybe"), Err(ValidationError::InvalidChoice));
    }

    #[test]
    fn url_shapes() {
        assert!(url_shape("https://vcenter.lab.local").is_ok());
        assert!(url_shape("https://10.0.0.10/sdk").is_ok());
        assert_eq!(
            url_shape("vcenter.lab.local"),
            Err(ValidationError::InvalidUrl("vcenter.lab.local".to_owned()))
        );
    }
}
