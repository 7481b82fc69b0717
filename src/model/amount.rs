use alloy::primitives::U256;
use thiserror::Error;

/// Errors from converting human decimal strings to smallest units.
#[derive(Debug, Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount `{0}`")]
    Invalid(String),

    #[error("amount `{amount}` has more than {decimals} decimal places")]
    TooManyDecimals { amount: String, decimals: u8 },
}

/// 10^decimals as a U256.
pub fn scale(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Parse a human decimal string (e.g. "1.5") into smallest units.
///
/// Integer arithmetic only; amounts never pass through a float. More
/// fractional digits than the asset carries is an error, not a rounding.
pub fn parse_units(s: &str, decimals: u8) -> Result<U256, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if frac_part.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals {
            amount: s.to_string(),
            decimals,
        });
    }

    let int_units = if int_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int_part, 10).map_err(|_| AmountError::Invalid(s.to_string()))?
    };

    let frac_units = if frac_part.is_empty() {
        U256::ZERO
    } else {
        let padded = frac_part.len() as u8;
        let raw = U256::from_str_radix(frac_part, 10)
            .map_err(|_| AmountError::Invalid(s.to_string()))?;
        raw * scale(decimals - padded)
    };

    Ok(int_units * scale(decimals) + frac_units)
}

/// Format smallest units as a human decimal string, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let divisor = scale(decimals);
    let whole = value / divisor;
    let frac = value % divisor;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    let trimmed = frac_str.trim_end_matches('0');
    format!("{whole}.{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fractional() {
        assert_eq!(parse_units("1", 18).unwrap(), scale(18));
        assert_eq!(parse_units("0.5", 18).unwrap(), scale(17) * U256::from(5));
        assert_eq!(parse_units("1.5", 9).unwrap(), U256::from(1_500_000_000u64));
        assert_eq!(parse_units(".25", 2).unwrap(), U256::from(25u64));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        // more precision than the asset carries
        assert!(parse_units("0.123", 2).is_err());
    }

    #[test]
    fn format_trims_zeros() {
        assert_eq!(format_units(U256::from(1_500_000_000u64), 9), "1.5");
        assert_eq!(format_units(U256::from(1_000_000_000u64), 9), "1");
        assert_eq!(format_units(U256::from(1u64), 9), "0.000000001");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn round_trip_is_exact() {
        let v = parse_units("123.456789", 8).unwrap();
        assert_eq!(format_units(v, 8), "123.456789");
    }
}
