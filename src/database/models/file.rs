use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub file_type: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub size: i64,
    pub file_type: String,
    pub storage_key: String,
}

impl NewFile {
    /// Storage keys are derived from the owner and the file name.
    pub fn storage_key_for(user_id: i64, name: &str) -> String {
        format!("user_{}/{}", user_id, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_scoped_by_owner() {
        assert_eq!(NewFile::storage_key_for(42, "notes.txt"), "user_42/notes.txt");
    }

    #[test]
    fn serializes_type_field_name() {
        let record = FileRecord {
            id: 1,
            name: "a.png".to_string(),
            size: 10,
            file_type: "image/png".to_string(),
            storage_key: "user_1/a.png".to_string(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "image/png");
        assert!(value.get("file_type").is_none());
    }
}
