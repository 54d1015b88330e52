use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Building-type flags detected in the project description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingFlags {
    #[serde(default)]
    pub apartment: bool,
    #[serde(default)]
    pub detached_house: bool,
    #[serde(default)]
    pub multi_family: bool,
    #[serde(default)]
    pub old_building: bool,
}

impl BuildingFlags {
    pub fn any(&self) -> bool {
        self.apartment || self.detached_house || self.multi_family || self.old_building
    }
}

/// Facts derived once from the free-text description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFacts {
    #[serde(default)]
    pub window_count: Option<u32>,
    #[serde(default)]
    pub door_count: Option<u32>,
    #[serde(default)]
    pub room_count: Option<u32>,
    #[serde(default)]
    pub floor_area_m2: Option<f64>,
    /// Detected measures, e.g. "Fassadendämmung"
    #[serde(default)]
    pub measures: Vec<String>,
    /// Detected rooms, e.g. "Bad", "Küche"
    #[serde(default)]
    pub rooms: Vec<String>,
    #[serde(default)]
    pub building: BuildingFlags,
}

impl ExtractedFacts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Project entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub description: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub timeframe: Option<String>,
    pub budget: Option<String>,
    pub extracted_facts: ExtractedFacts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a project
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
}

/// The slice of a project every generation task gets to see.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
}

impl ProjectContext {
    /// Description plus categories, the text rule patterns are matched against.
    pub fn searchable_text(&self) -> String {
        let mut text = self.description.clone();
        for extra in [&self.category, &self.sub_category].into_iter().flatten() {
            text.push('\n');
            text.push_str(extra);
        }
        text
    }
}

impl From<&Project> for ProjectContext {
    fn from(p: &Project) -> Self {
        Self {
            description: p.description.clone(),
            category: p.category.clone(),
            sub_category: p.sub_category.clone(),
            timeframe: p.timeframe.clone(),
            budget: p.budget.clone(),
        }
    }
}
