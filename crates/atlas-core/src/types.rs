//! Probe records shared across atlasgrid crates.
//!
//! The registry ships every probe as a positional JSON array of 14
//! scalars. `CompactProbeRecord` gives those positions names while
//! keeping the wire form (and the cached form) an array in the same
//! order. Positions hold the raw JSON value, so a record whose values are
//! out of type or out of range is carried through verbatim; the accessors
//! give the interpreted view and read such values as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable integer identifier of a probe.
pub type ProbeId = u32;

/// Number of positional fields in a compact probe record.
pub const COMPACT_RECORD_WIDTH: usize = 14;

/// Connection status of a probe as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    NeverConnected,
    Connected,
    Disconnected,
    Abandoned,
    Unknown(i64),
}

impl ProbeStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ProbeStatus::NeverConnected,
            1 => ProbeStatus::Connected,
            2 => ProbeStatus::Disconnected,
            3 => ProbeStatus::Abandoned,
            other => ProbeStatus::Unknown(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbeStatus::NeverConnected => "Never Connected",
            ProbeStatus::Connected => "Connected",
            ProbeStatus::Disconnected => "Disconnected",
            ProbeStatus::Abandoned => "Abandoned",
            ProbeStatus::Unknown(_) => "Unknown",
        }
    }
}

/// One probe in the registry's compact positional encoding.
///
/// Field order is the wire order and must not change: consumers index
/// into the array form. Only the array width is checked when reading;
/// numeric placeholders (`0`) for absent asn, prefix and address values
/// are kept as-is, as is anything else the registry sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireRecord", into = "WireRecord")]
pub struct CompactProbeRecord {
    pub probe_id: Value,
    pub asn_v4: Value,
    pub asn_v6: Value,
    pub country_code: Value,
    pub is_anchor: Value,
    pub is_public: Value,
    pub latitude: Value,
    pub longitude: Value,
    pub prefix_v4: Value,
    pub prefix_v6: Value,
    pub address_v4: Value,
    pub address_v6: Value,
    pub status: Value,
    /// Unix seconds since the current status was entered.
    pub status_since: Value,
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

impl CompactProbeRecord {
    /// The probe id, if the first position holds one.
    pub fn probe_id(&self) -> Option<ProbeId> {
        as_u32(&self.probe_id)
    }

    pub fn asn_v4(&self) -> Option<u32> {
        as_u32(&self.asn_v4).filter(|asn| *asn != 0)
    }

    pub fn asn_v6(&self) -> Option<u32> {
        as_u32(&self.asn_v6).filter(|asn| *asn != 0)
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_str()
    }

    /// `1` and `true` both count; anything else is false.
    pub fn is_anchor(&self) -> bool {
        as_flag(&self.is_anchor)
    }

    pub fn is_public(&self) -> bool {
        as_flag(&self.is_public)
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude.as_f64()
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude.as_f64()
    }

    pub fn prefix_v4(&self) -> Option<&str> {
        self.prefix_v4.as_str()
    }

    pub fn prefix_v6(&self) -> Option<&str> {
        self.prefix_v6.as_str()
    }

    pub fn address_v4(&self) -> Option<&str> {
        self.address_v4.as_str()
    }

    pub fn address_v6(&self) -> Option<&str> {
        self.address_v6.as_str()
    }

    pub fn probe_status(&self) -> Option<ProbeStatus> {
        self.status.as_i64().map(ProbeStatus::from_code)
    }

    pub fn status_since(&self) -> Option<i64> {
        self.status_since.as_i64()
    }

    /// Whether both coordinates are present and non-zero.
    ///
    /// The registry has probes with null locations; map layers skip them.
    pub fn is_located(&self) -> bool {
        matches!(
            (self.latitude(), self.longitude()),
            (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0
        )
    }

    /// The 14 positions in wire order.
    pub fn positions(&self) -> [&Value; COMPACT_RECORD_WIDTH] {
        [
            &self.probe_id,
            &self.asn_v4,
            &self.asn_v6,
            &self.country_code,
            &self.is_anchor,
            &self.is_public,
            &self.latitude,
            &self.longitude,
            &self.prefix_v4,
            &self.prefix_v6,
            &self.address_v4,
            &self.address_v6,
            &self.status,
            &self.status_since,
        ]
    }
}

/// Positional twin of `CompactProbeRecord`; serde writes tuple structs as arrays.
#[derive(Clone, Serialize, Deserialize)]
struct WireRecord(
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
    Value,
);

impl From<WireRecord> for CompactProbeRecord {
    fn from(w: WireRecord) -> Self {
        CompactProbeRecord {
            probe_id: w.0,
            asn_v4: w.1,
            asn_v6: w.2,
            country_code: w.3,
            is_anchor: w.4,
            is_public: w.5,
            latitude: w.6,
            longitude: w.7,
            prefix_v4: w.8,
            prefix_v6: w.9,
            address_v4: w.10,
            address_v6: w.11,
            status: w.12,
            status_since: w.13,
        }
    }
}

impl From<CompactProbeRecord> for WireRecord {
    fn from(r: CompactProbeRecord) -> Self {
        WireRecord(
            r.probe_id,
            r.asn_v4,
            r.asn_v6,
            r.country_code,
            r.is_anchor,
            r.is_public,
            r.latitude,
            r.longitude,
            r.prefix_v4,
            r.prefix_v6,
            r.address_v4,
            r.address_v6,
            r.status,
            r.status_since,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AMSTERDAM: &str = r#"[6001,3333,3333,"NL",1,1,52.3559,4.9512,"193.0.0.0/21","2001:67c:2e8::/48","193.0.0.164","2001:67c:2e8:11::c100:13a4",1,1700000000]"#;
    const SPARSE: &str = r#"[17,0,0,null,0,0,null,null,0,0,0,0,2,null]"#;

    #[test]
    fn parses_positional_array() {
        let record: CompactProbeRecord = serde_json::from_str(AMSTERDAM).unwrap();
        assert_eq!(record.probe_id(), Some(6001));
        assert_eq!(record.country_code(), Some("NL"));
        assert!(record.is_anchor());
        assert_eq!(record.prefix_v4(), Some("193.0.0.0/21"));
        assert_eq!(record.probe_status(), Some(ProbeStatus::Connected));
        assert_eq!(record.status_since(), Some(1_700_000_000));
        assert!(record.is_located());
    }

    #[test]
    fn placeholders_read_as_absent() {
        let record: CompactProbeRecord = serde_json::from_str(SPARSE).unwrap();
        assert_eq!(record.asn_v4(), None);
        assert_eq!(record.asn_v4, json!(0));
        assert_eq!(record.address_v6(), None);
        assert!(!record.is_public());
        assert!(!record.is_located());
        assert_eq!(record.status_since(), None);
    }

    #[test]
    fn writes_back_the_same_positions() {
        for raw in [AMSTERDAM, SPARSE] {
            let record: CompactProbeRecord = serde_json::from_str(raw).unwrap();
            let written = serde_json::to_value(&record).unwrap();
            let original: Value = serde_json::from_str(raw).unwrap();
            assert_eq!(written, original);
            assert_eq!(written.as_array().unwrap().len(), COMPACT_RECORD_WIDTH);
        }
    }

    #[test]
    fn off_type_values_are_kept_verbatim() {
        let raw = json!([2, "3333", 0, 31, true, "yes", "52.1", null, 0, 0, 0, 0, "1", 1.5]);
        let record: CompactProbeRecord = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(record.probe_id(), Some(2));
        assert!(record.is_anchor());
        assert!(!record.is_public());
        assert_eq!(record.asn_v4(), None);
        assert_eq!(record.country_code(), None);
        assert_eq!(record.probe_status(), None);
        assert!(!record.is_located());
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn non_numeric_id_has_no_probe_id() {
        let record: CompactProbeRecord =
            serde_json::from_value(json!(["x", 0, 0, null, 0, 0, null, null, 0, 0, 0, 0, 1, null]))
                .unwrap();
        assert_eq!(record.probe_id(), None);
    }

    #[test]
    fn short_array_is_rejected() {
        let result: Result<CompactProbeRecord, _> = serde_json::from_str("[1,0,0]");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_status_code_is_kept() {
        assert_eq!(ProbeStatus::from_code(9), ProbeStatus::Unknown(9));
        assert_eq!(ProbeStatus::from_code(3).label(), "Abandoned");
    }
}
