//! The document written when a workspace is first created.

use serde_json::json;

/// Format version written into fresh documents.
pub const DOCUMENT_VERSION: u64 = 4;

/// Bytes of an empty state document with a new lineage.
pub fn empty_document() -> Vec<u8> {
    let doc = json!({
        "version": DOCUMENT_VERSION,
        "serial": 0,
        "lineage": uuid::Uuid::new_v4().to_string(),
        "outputs": {},
        "resources": [],
    });
    // Serializing a `Value` cannot fail.
    let mut bytes = serde_json::to_vec_pretty(&doc).unwrap_or_default();
    bytes.push(b'\n');
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_valid_json() {
        let doc: serde_json::Value = serde_json::from_slice(&empty_document()).unwrap();
        assert_eq!(doc["version"], DOCUMENT_VERSION);
        assert_eq!(doc["serial"], 0);
        assert!(doc["resources"].as_array().unwrap().is_empty());
    }

    #[test]
    fn each_document_gets_its_own_lineage() {
        let a: serde_json::Value = serde_json::from_slice(&empty_document()).unwrap();
        let b: serde_json::Value = serde_json::from_slice(&empty_document()).unwrap();
        assert_ne!(a["lineage"], b["lineage"]);
    }
}
