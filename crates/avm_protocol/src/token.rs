//! Token identifiers.
//!
//! A token is 21 bytes: a 20-byte type followed by a 1-byte kind flag
//! (`0` fungible, `1` non-fungible). On the stack a token travels as a
//! 256-bit integer whose most significant 21 bytes carry the identifier
//! and whose low 11 bytes are zero.

use std::fmt;

use ethereum_types::U256;

pub const TOKEN_TYPE_LEN: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenType([u8; TOKEN_TYPE_LEN]);

impl TokenType {
    pub fn new(bytes: [u8; TOKEN_TYPE_LEN]) -> TokenType {
        TokenType(bytes)
    }

    pub fn is_fungible(&self) -> bool {
        self.0[TOKEN_TYPE_LEN - 1] == 0
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_TYPE_LEN] {
        &self.0
    }

    /// The 256-bit stack encoding: identifier in the top 21 bytes.
    pub fn as_int(&self) -> U256 {
        let mut buf = [0u8; 32];
        buf[..TOKEN_TYPE_LEN].copy_from_slice(&self.0);
        U256::from_big_endian(&buf)
    }

    /// Decode the stack encoding; the low 11 bytes are ignored.
    pub fn from_int(n: U256) -> TokenType {
        let mut buf = [0u8; 32];
        n.to_big_endian(&mut buf);
        let mut bytes = [0u8; TOKEN_TYPE_LEN];
        bytes.copy_from_slice(&buf[..TOKEN_TYPE_LEN]);
        TokenType(bytes)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(first: u8, kind: u8) -> TokenType {
        let mut bytes = [0u8; TOKEN_TYPE_LEN];
        bytes[0] = first;
        bytes[20] = kind;
        TokenType::new(bytes)
    }

    #[test]
    fn kind_flag_is_the_last_byte() {
        assert!(token(15, 0).is_fungible());
        assert!(!token(15, 1).is_fungible());
    }

    #[test]
    fn int_roundtrip_keeps_all_21_bytes() {
        let t = token(15, 1);
        assert_eq!(TokenType::from_int(t.as_int()), t);
        // Low 11 bytes of the integer form are zero.
        let mut buf = [0u8; 32];
        t.as_int().to_big_endian(&mut buf);
        assert!(buf[TOKEN_TYPE_LEN..].iter().all(|b| *b == 0));
    }

    #[test]
    fn from_int_ignores_low_bytes() {
        let t = token(15, 1);
        let noisy = t.as_int() + U256::from(12345u64);
        assert_eq!(TokenType::from_int(noisy), t);
    }

    proptest::proptest! {
        #[test]
        fn int_roundtrip_any_identifier(bytes in proptest::array::uniform21(0u8..)) {
            let t = TokenType::new(bytes);
            proptest::prop_assert_eq!(TokenType::from_int(t.as_int()), t);
        }
    }
}
