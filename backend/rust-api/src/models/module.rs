use serde::{Deserialize, Serialize};

/// Collaborator-owned module record. The engine reads it for existence checks
/// and mutates exactly one field, the `upvotes` counter, via atomic `$inc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub upvotes: i64,
}
