//! Compact record → structured probe.

use atlas_core::{COMPACT_RECORD_WIDTH, CompactProbeRecord, ProbeId};
use serde::ser::{Serialize, SerializeTuple, Serializer};
use serde_json::{Value, json};

/// Width of the positional form: two layout slots plus the record.
pub const POSITIONAL_WIDTH: usize = COMPACT_RECORD_WIDTH + 2;

/// A decoded probe.
///
/// `layout_slots` are two scratch positions a map renderer used to write
/// x/y screen coordinates into. Nothing in this workspace reads or writes
/// them; they are always `None` after [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub layout_slots: [Option<f64>; 2],
    pub properties: CompactProbeRecord,
}

impl Probe {
    /// The probe id, when the record carries a numeric one.
    pub fn id(&self) -> Option<ProbeId> {
        self.properties.probe_id()
    }

    /// `[slot0, slot1, probeId, asnV4, ..., statusSince]`.
    pub fn to_positional(&self) -> Vec<Value> {
        let slots = self.layout_slots.iter().map(|slot| json!(slot));
        let record = self.properties.positions().into_iter().cloned();
        slots.chain(record).collect()
    }
}

impl Serialize for Probe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(POSITIONAL_WIDTH)?;
        for slot in &self.layout_slots {
            tuple.serialize_element(slot)?;
        }
        for value in self.properties.positions() {
            tuple.serialize_element(value)?;
        }
        tuple.end()
    }
}

/// Decode one record. Values are copied as-is, including out-of-range ones.
pub fn decode(record: &CompactProbeRecord) -> Probe {
    Probe {
        layout_slots: [None, None],
        properties: record.clone(),
    }
}

pub fn decode_all(records: &[CompactProbeRecord]) -> Vec<Probe> {
    records.iter().map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> CompactProbeRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decode_prepends_two_empty_slots() {
        let wire = json!([
            6001, 3333, 0, "NL", 1, 1, 52.3731, 4.8922,
            "193.0.0.0/21", "2001:67c:2e8::/48", "193.0.10.1", 0, 1, 1_600_000_000
        ]);
        let probe = decode(&record(wire.clone()));

        let positional = probe.to_positional();
        assert_eq!(positional.len(), POSITIONAL_WIDTH);
        assert_eq!(positional[0], Value::Null);
        assert_eq!(positional[1], Value::Null);
        assert_eq!(Value::Array(positional[2..].to_vec()), wire);
        assert_eq!(probe.id(), Some(6001));
    }

    #[test]
    fn serialize_matches_positional_form() {
        let wire = json!([7, 0, 0, null, 0, 0, null, null, 0, 0, 0, 0, 2, null]);
        let probe = decode(&record(wire));
        assert_eq!(
            serde_json::to_value(&probe).unwrap(),
            Value::Array(probe.to_positional())
        );
    }

    #[test]
    fn out_of_range_values_pass_through() {
        let wire = json!([1, 0, 0, "ZZ", 7, 9, 123.0, -500.0, 0, 0, 0, 0, 99, -1]);
        let probe = decode(&record(wire.clone()));
        assert_eq!(Value::Array(probe.to_positional()[2..].to_vec()), wire);
    }

    #[test]
    fn off_type_values_pass_through() {
        let wire = json!([2, 3333, 0, "NL", true, 1, "52.3", null, 0, 0, 0, 0, 1, null]);
        let probe = decode(&record(wire.clone()));
        assert_eq!(Value::Array(probe.to_positional()[2..].to_vec()), wire);
        assert_eq!(serde_json::to_value(&probe).unwrap()[6], json!(true));
    }

    #[test]
    fn decode_all_keeps_order() {
        let records = vec![
            record(json!([3, 0, 0, "DE", 0, 1, 1.0, 1.0, 0, 0, 0, 0, 1, null])),
            record(json!([1, 0, 0, "FR", 0, 1, 2.0, 2.0, 0, 0, 0, 0, 1, null])),
        ];
        let ids: Vec<Option<ProbeId>> = decode_all(&records).iter().map(Probe::id).collect();
        assert_eq!(ids, vec![Some(3), Some(1)]);
    }
}
