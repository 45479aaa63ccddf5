use super::*;

#[test]
fn vector_record_serialization() {
    let record = VectorRecord {
        position: 4,
        vector: vec![0.1, 0.2, 0.3],
    };

    let json = serde_json::to_string(&record).expect("can serialize json");
    let deserialized: VectorRecord = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(record, deserialized);
}
