use super::*;

#[test]
fn chunk_record_new() {
    let record = ChunkRecord::new(
        "https://growlity.com",
        3,
        "Growlity is an ESG consultancy.".to_string(),
        vec![0.1, 0.2, 0.3],
    );

    assert_eq!(record.source_url, "https://growlity.com");
    assert_eq!(record.chunk_index, 3);
    assert_eq!(record.vector.len(), 3);
    assert!(uuid::Uuid::parse_str(&record.id).is_ok());
    assert!(chrono::DateTime::parse_from_rfc3339(&record.created_at).is_ok());

    let other = ChunkRecord::new("https://growlity.com", 3, String::new(), vec![]);
    assert_ne!(record.id, other.id);
}

#[test]
fn snippet_counts_characters() {
    let record = ChunkRecord::new("company-info.txt", 0, "Café ESG reporting".to_string(), vec![]);
    assert_eq!(record.snippet(4), "Café");
    assert_eq!(record.snippet(100), "Café ESG reporting");
    assert_eq!(record.snippet(0), "");
}

#[test]
fn chunk_record_serialization() {
    let record = ChunkRecord::new("company-info.txt", 0, "text".to_string(), vec![0.5]);
    let json = serde_json::to_string(&record).expect("can serialize json");
    let deserialized: ChunkRecord = serde_json::from_str(&json).expect("can parse json");
    assert_eq!(record, deserialized);
}
