// crates/trustwatch-queue/src/ids.rs
// ============================================================================
// Module: Id Generation
// Description: Random opaque identifier generation for newly created rows.
// Purpose: trustwatch-core's identifiers are storage-agnostic opaque strings
//          (see identifiers.rs); this worker crate is where new entities are
//          minted, so it owns the generation scheme.
// Dependencies: rand
// ============================================================================

//! Random opaque identifier generation for newly created rows.

use rand::RngCore;

/// Generates a random 128-bit identifier rendered as lowercase hex.
#[must_use]
pub fn new_id() -> String {
    let mut bytes = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::new_id;

    #[test]
    fn generates_32_char_hex_ids_that_differ() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
