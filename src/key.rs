use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, TryRngCore};

use crate::classify::AspectCategory;

const KEY_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("Couldn't read from the system random source")]
pub(crate) struct KeyError(#[source] <OsRng as TryRngCore>::Error);

/// An unguessable name for a stored object
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Key {
    encoded: String,
}

impl Key {
    pub(crate) fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; KEY_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(KeyError)?;

        Ok(Key {
            encoded: URL_SAFE_NO_PAD.encode(bytes),
        })
    }

    /// `<key>.<extension>`
    pub(crate) fn with_extension(&self, extension: &str) -> String {
        format!("{}.{extension}", self.encoded)
    }

    /// `<category>/<key>.<extension>`
    pub(crate) fn in_category(&self, category: AspectCategory, extension: &str) -> String {
        format!("{}/{}", category.as_str(), self.with_extension(extension))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded)
    }
}
