use sha1::{Digest, Sha1};

use crate::constants::layout::ARTICLE_EXTENSION;
use crate::types::ContentKey;

/// Feed a fresh SHA-1 hasher and return the lowercase hex digest.
pub fn sha1_hex_with(f: impl FnOnce(&mut Sha1)) -> String {
    let mut hasher = Sha1::new();
    f(&mut hasher);
    hex::encode(hasher.finalize())
}

/// Content key of a title: SHA-1 over its UTF-8 bytes, no salt.
pub fn content_key(title: &str) -> ContentKey {
    sha1_hex_with(|hasher| hasher.update(title.as_bytes()))
}

/// Article filename (`<content key>.txt`) for a title.
pub fn article_file_name(title: &str) -> String {
    format!("{}.{}", content_key(title), ARTICLE_EXTENSION)
}
