//! Paste Identifier Generation
//!
//! Ids are 10 symbols drawn uniformly from a 64-character URL-safe alphabet,
//! which gives 60 bits of entropy per id. They come from the thread-local
//! CSPRNG, so they are unguessable as well as unique in practice.

use rand::Rng;

/// Length of a generated id.
pub const ID_LEN: usize = 10;

/// URL-safe alphabet (the nanoid alphabet).
pub const ALPHABET: &[u8; 64] =
    b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

/// Generates a fresh paste id.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Checks whether `id` could have been produced by [`generate_id`].
///
/// Lookups for ids that fail this check can skip the store entirely.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| ALPHABET.contains(&b))
}
