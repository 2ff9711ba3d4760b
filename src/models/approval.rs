use serde::{Deserialize, Serialize};

/// Registry value meaning "physically checked and approved".
pub const APPROVED_RESULT: &str = "sesuai";

/// One approval entry returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Check outcome; only [`APPROVED_RESULT`] permits archival.
    #[serde(rename = "hasil_cek")]
    pub match_result: String,
    /// School identifier (NPSN).
    #[serde(rename = "npsn")]
    pub school_id: String,
    /// Document serial (SN BAPP).
    #[serde(rename = "sn_bapp")]
    pub document_serial: String,
    #[serde(rename = "nama_sekolah", default, skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(rename = "kode", default, skip_serializing_if = "Option::is_none")]
    pub issued_code: Option<String>,
}

impl RegistryRecord {
    pub fn is_approved(&self) -> bool {
        self.match_result == APPROVED_RESULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_wire_format() {
        let json = r#"{"hasil_cek":"sesuai","npsn":"20100001","sn_bapp":"BAPP77","nama_sekolah":"SDN 1"}"#;
        let record: RegistryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.school_id, "20100001");
        assert_eq!(record.document_serial, "BAPP77");
        assert_eq!(record.school_name.as_deref(), Some("SDN 1"));
        assert!(record.issued_code.is_none());
        assert!(record.is_approved());
    }

    #[test]
    fn other_results_are_not_approved() {
        for value in ["tidak sesuai", "SESUAI", "", "pending"] {
            let record = RegistryRecord {
                match_result: value.to_string(),
                school_id: "1".into(),
                document_serial: "2".into(),
                school_name: None,
                issued_code: None,
            };
            assert!(!record.is_approved(), "{value:?} must not count as approved");
        }
    }

    #[test]
    fn optional_fields_skipped_when_absent() {
        let record = RegistryRecord {
            match_result: "sesuai".into(),
            school_id: "1".into(),
            document_serial: "2".into(),
            school_name: None,
            issued_code: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("nama_sekolah"));
        assert!(!json.contains("kode"));
    }
}
