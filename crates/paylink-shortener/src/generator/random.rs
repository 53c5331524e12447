use crate::generator::TokenGenerator;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use paylink_core::{ShortToken, ValidationError};
use rand::RngCore;

/// Default token length. 7 base64url characters carry 42 bits of entropy.
pub const DEFAULT_TOKEN_LENGTH: usize = 7;
/// Shortest token the generator will produce.
pub const MIN_TOKEN_LENGTH: usize = 6;
/// Longest token the generator will produce.
pub const MAX_TOKEN_LENGTH: usize = 32;

/// Generates tokens from the thread-local CSPRNG, encoded as URL-safe base64.
///
/// Tokens are not derived from a counter or clock, so live links cannot be
/// enumerated by guessing neighbours.
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
    length: usize,
}

impl RandomTokenGenerator {
    /// Creates a generator producing tokens of `length` characters.
    pub fn new(length: usize) -> Result<Self, ValidationError> {
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&length) {
            return Err(ValidationError::InvalidShortToken(format!(
                "token length must be between {} and {}, got {}",
                MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH, length
            )));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_TOKEN_LENGTH,
        }
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> ShortToken {
        // Each base64 character carries 6 bits.
        let mut bytes = vec![0u8; (self.length * 6).div_ceil(8)];
        rand::rng().fill_bytes(&mut bytes);

        let mut encoded = URL_SAFE_NO_PAD.encode(&bytes);
        encoded.truncate(self.length);
        ShortToken::new_unchecked(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_tokens_are_seven_url_safe_chars() {
        let generator = RandomTokenGenerator::default();

        for _ in 0..100 {
            let token = generator.generate();
            assert_eq!(token.as_str().len(), 7);
            // Round-trips through validation.
            assert!(ShortToken::new(token.as_str()).is_ok());
        }
    }

    #[test]
    fn custom_length() {
        let generator = RandomTokenGenerator::new(12).unwrap();
        assert_eq!(generator.generate().as_str().len(), 12);
    }

    #[test]
    fn rejects_out_of_range_lengths() {
        assert!(RandomTokenGenerator::new(5).is_err());
        assert!(RandomTokenGenerator::new(33).is_err());
    }

    #[test]
    fn tokens_do_not_repeat_in_practice() {
        let generator = RandomTokenGenerator::default();
        let tokens: HashSet<String> = (0..1000)
            .map(|_| generator.generate().as_str().to_owned())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RandomTokenGenerator>();
    }
}
