//! # Barcodes
//!
//! Validation of scanned codes and synthesis of in-house codes.
//!
//! ## Generated Format
//! ```text
//!   2 0 │ 4 8 2 9 1 7 3 6 │ 0 5 7
//!   ───   ───────────────   ─────
//!  prefix  last 8 digits    3 random
//!          of epoch millis  digits
//! ```
//! The `20` prefix falls in the GS1 "restricted circulation" range, so a
//! generated code never clashes with a manufacturer's EAN-13.
//!
//! Uniqueness is enforced by the database index, not here: two codes made in
//! the same millisecond with the same random suffix surface as a duplicate.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Prefix of every generated barcode.
pub const GENERATED_PREFIX: &str = "20";

/// Accepted length range for caller-supplied barcodes.
pub const MIN_BARCODE_LEN: usize = 4;
pub const MAX_BARCODE_LEN: usize = 64;

/// Validates and trims a caller-supplied barcode.
///
/// ## Example
/// ```rust
/// use medstore_core::barcode::validate_barcode;
///
/// assert_eq!(validate_barcode(" 0360-AB_12 ").unwrap(), "0360-AB_12");
/// assert!(validate_barcode("abc").is_err());
/// assert!(validate_barcode("has space").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<String> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(ValidationError::required("barcode"));
    }
    if barcode.len() < MIN_BARCODE_LEN {
        return Err(ValidationError::TooShort {
            field: "barcode".to_string(),
            min: MIN_BARCODE_LEN,
        });
    }
    if barcode.len() > MAX_BARCODE_LEN {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: MAX_BARCODE_LEN,
        });
    }
    if !barcode
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(barcode.to_string())
}

/// Synthesizes a 13-digit barcode from a timestamp and a random suffix.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use medstore_core::barcode::generate_barcode;
///
/// let at = Utc.timestamp_millis_opt(1_718_048_291_736).unwrap();
/// let code = generate_barcode(at, &mut rand::thread_rng());
/// assert_eq!(code.len(), 13);
/// assert!(code.starts_with("2048291736"));
/// ```
pub fn generate_barcode<R: Rng + ?Sized>(at: DateTime<Utc>, rng: &mut R) -> String {
    let millis = at.timestamp_millis().rem_euclid(100_000_000);
    let suffix: u16 = rng.gen_range(0..1000);
    format!("{GENERATED_PREFIX}{millis:08}{suffix:03}")
}

// =============================================================================
// Unit Tests
// =============================================================================
