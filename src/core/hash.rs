use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable id for a capture so batch output can be correlated with its input.
pub fn capture_id(url: &str, html: &str) -> String {
    let mut buf = String::with_capacity(url.len() + html.len() + 1);
    buf.push_str(url.trim());
    buf.push('|');
    buf.push_str(html);
    format!("cap_{}", &sha256_hex(buf.as_bytes())[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_id_is_deterministic() {
        let a = capture_id("http://example.com", "<html></html>");
        let b = capture_id(" http://example.com ", "<html></html>");
        assert_eq!(a, b);
        assert!(a.starts_with("cap_"));
        assert_ne!(a, capture_id("http://example.org", "<html></html>"));
    }
}
