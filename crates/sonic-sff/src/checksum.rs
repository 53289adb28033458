//! Base-ID page check codes.
//!
//! Both SFF-8472 and SFF-8636 protect the identification page with two
//! additive check codes: CC_BASE covers bytes 0..=62 and is stored in byte
//! 63, CC_EXT covers bytes 64..=94 and is stored in byte 95. Each is the low
//! eight bits of the plain byte sum.

use std::ops::Range;

use crate::SffError;

/// Range covered by CC_BASE.
pub const BASE_RANGE: Range<usize> = 0..63;

/// Offset of the stored CC_BASE byte.
pub const CC_BASE: usize = 63;

/// Range covered by CC_EXT.
pub const EXT_RANGE: Range<usize> = 64..95;

/// Offset of the stored CC_EXT byte.
pub const CC_EXT: usize = 95;

/// Low eight bits of the sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Verifies CC_BASE and CC_EXT of an identification page.
pub fn verify(page: &[u8]) -> Result<(), SffError> {
    if page.len() <= CC_EXT {
        return Err(SffError::Truncated {
            needed: CC_EXT + 1,
            actual: page.len(),
        });
    }

    check("CC_BASE", page, BASE_RANGE, CC_BASE)?;
    check("CC_EXT", page, EXT_RANGE, CC_EXT)
}

fn check(field: &'static str, page: &[u8], range: Range<usize>, at: usize) -> Result<(), SffError> {
    let computed = checksum(&page[range]);
    let stored = page[at];
    if computed == stored {
        Ok(())
    } else {
        Err(SffError::ChecksumMismatch {
            field,
            stored,
            computed,
        })
    }
}
