use crate::encoder;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The identifier substituted for a long URL.
///
/// A token is the hex encoding of the original URL bytes, so it is a pure
/// function of the URL and can always be decoded back into it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortToken(String);

impl ShortToken {
    /// Derives the token for an original URL.
    pub fn from_url(original_url: &str) -> Self {
        Self(encoder::encode(original_url))
    }

    /// Parses a token received from a client, checking that it decodes.
    pub fn parse(token: impl Into<String>) -> Result<Self, CoreError> {
        let token = token.into();
        encoder::decode(&token)?;
        Ok(Self(token))
    }

    /// Creates a token without validation.
    ///
    /// Use this only for values read back from a backend that stored a token
    /// produced by [`ShortToken::from_url`].
    pub fn new_unchecked(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generates the fully qualified short URL under the given base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ShortToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
