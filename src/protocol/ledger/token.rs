use crate::macros::bytes32_newtype;

bytes32_newtype! {
    /// identifies a token.  The all-zero id is the native token that pays fees.
    pub struct TokenType;
}

impl TokenType {
    pub const fn native() -> Self {
        Self::from_bytes([0u8; 32])
    }

    pub fn is_native(&self) -> bool {
        *self == Self::native()
    }

    /// a deterministic custom token id derived from a name.
    pub fn custom(name: &str) -> Self {
        Self::from_bytes(super::domain_hash("token-type", &[name.as_bytes()]))
    }
}

impl Default for TokenType {
    fn default() -> Self {
        Self::native()
    }
}
