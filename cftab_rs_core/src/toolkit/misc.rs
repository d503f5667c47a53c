use md5::{Digest, Md5};

pub fn hash_code(code: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(code);
    format!("{:x}", hasher.finalize())
}
