//! Role-prefixed sequential registration IDs (`FRM001`, `COL012`, ...).

use core::fmt;

use crate::RoleKind;

/// Three prefix bytes plus up to ten digits for a `u32` sequence.
const CAPACITY: usize = 13;
const MIN_DIGITS: usize = 3;

/// A human-readable registration ID, stored inline so it can be minted
/// without allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId {
    buf: [u8; CAPACITY],
    len: u8,
}

impl RegistrationId {
    /// Mint the ID for the `sequence`-th registration under `role`.
    ///
    /// The counter is zero-padded to three digits and widens past `999`.
    /// Sequences start at 1; `0` returns `None`.
    pub fn new(role: RoleKind, sequence: u32) -> Option<Self> {
        if sequence == 0 {
            return None;
        }

        let mut digits = [0u8; 10];
        let mut n = sequence;
        let mut count = 0;
        while n > 0 {
            digits[count] = b'0' + (n % 10) as u8;
            n /= 10;
            count += 1;
        }
        let width = if count < MIN_DIGITS { MIN_DIGITS } else { count };

        let mut buf = [b'0'; CAPACITY];
        let prefix = role.prefix().as_bytes();
        buf[..prefix.len()].copy_from_slice(prefix);
        for i in 0..count {
            buf[prefix.len() + width - 1 - i] = digits[i];
        }

        Some(Self {
            buf,
            len: (prefix.len() + width) as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII prefix letters and digits are ever written.
        core::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistrationId({})", self.as_str())
    }
}
