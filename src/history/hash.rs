use sha2::{Digest, Sha256};

const ID_BYTES: usize = 8;

/// Short lowercase-hex id derived from `seed`.
pub fn record_id(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    hex::encode(&digest[..ID_BYTES])
}

pub fn is_record_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= 64
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
