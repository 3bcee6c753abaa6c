// Logic to generate unique session keys

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// Generates a new unique key for a session
///
/// # Arguments
///
/// * `prefix` - Prefix identifying the session kind, for example `FLVSUB`
///
/// # Return value
///
/// Returns the prefix followed by a process-wide monotonic number
pub fn gen_unique_key(prefix: &str) -> String {
    let id = NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", prefix, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_unique_key() {
        let k1 = gen_unique_key("FLVSUB");
        let k2 = gen_unique_key("FLVSUB");

        assert!(k1.starts_with("FLVSUB"));
        assert!(k2.starts_with("FLVSUB"));
        assert_ne!(k1, k2);
    }
}
