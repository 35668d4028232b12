use serde::{Deserialize, Serialize};

pub const ROLE_PARENT: &str = "parent";
pub const ROLE_CHILD: &str = "child";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_age: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentChildRelation {
    pub parent_user_id: i64,
    pub child_user_id: i64,
}

/// Slim view of a user embedded in family-roster responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_age: Option<i64>,
}
