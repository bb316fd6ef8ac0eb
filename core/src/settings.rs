//! Tree display preferences and saved node positions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patch::double_option;
use crate::{CoreError, PersonId, Result};

/// Display settings for the tree view. A single row is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSettings {
    pub id: i64,
    pub name: String,

    pub male_color: String,
    pub female_color: String,
    pub unknown_color: String,
    pub direct_lineage_color: String,
    pub deceased_opacity: f64,

    pub line_color: String,
    pub line_width: i32,
    /// solid or dashed
    pub marriage_line_style: String,

    pub card_width: i32,
    pub card_height: i32,
    pub card_border_radius: i32,
    pub show_photos: bool,
    pub show_dates: bool,
    pub show_places: bool,
    pub show_occupation: bool,

    pub background_color: String,
    pub background_image: Option<String>,

    pub font_family: String,
    pub font_size: i32,

    pub default_root_person_id: Option<PersonId>,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            id: 0,
            name: "default".to_string(),
            male_color: "#4A90D9".to_string(),
            female_color: "#D94A8C".to_string(),
            unknown_color: "#808080".to_string(),
            direct_lineage_color: "#E8B84A".to_string(),
            deceased_opacity: 0.7,
            line_color: "#666666".to_string(),
            line_width: 2,
            marriage_line_style: "solid".to_string(),
            card_width: 200,
            card_height: 100,
            card_border_radius: 8,
            show_photos: true,
            show_dates: true,
            show_places: false,
            show_occupation: false,
            background_color: "#F5F5F5".to_string(),
            background_image: None,
            font_family: "Arial, sans-serif".to_string(),
            font_size: 14,
            default_root_person_id: None,
        }
    }
}

/// Partial update of [`TreeSettings`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeSettingsPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub male_color: Option<String>,
    #[serde(default)]
    pub female_color: Option<String>,
    #[serde(default)]
    pub unknown_color: Option<String>,
    #[serde(default)]
    pub direct_lineage_color: Option<String>,
    #[serde(default)]
    pub deceased_opacity: Option<f64>,
    #[serde(default)]
    pub line_color: Option<String>,
    #[serde(default)]
    pub line_width: Option<i32>,
    #[serde(default)]
    pub marriage_line_style: Option<String>,
    #[serde(default)]
    pub card_width: Option<i32>,
    #[serde(default)]
    pub card_height: Option<i32>,
    #[serde(default)]
    pub card_border_radius: Option<i32>,
    #[serde(default)]
    pub show_photos: Option<bool>,
    #[serde(default)]
    pub show_dates: Option<bool>,
    #[serde(default)]
    pub show_places: Option<bool>,
    #[serde(default)]
    pub show_occupation: Option<bool>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub background_image: Option<Option<String>>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_size: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub default_root_person_id: Option<Option<PersonId>>,
}

impl TreeSettings {
    pub fn apply_patch(&mut self, patch: TreeSettingsPatch) -> Result<()> {
        if let Some(opacity) = patch.deceased_opacity {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(CoreError::Validation(
                    "deceased_opacity must be between 0 and 1".to_string(),
                ));
            }
        }
        for (field, value) in [
            ("line_width", patch.line_width),
            ("card_width", patch.card_width),
            ("card_height", patch.card_height),
            ("font_size", patch.font_size),
        ] {
            if matches!(value, Some(v) if v <= 0) {
                return Err(CoreError::Validation(format!("{field} must be positive")));
            }
        }
        if matches!(patch.card_border_radius, Some(v) if v < 0) {
            return Err(CoreError::Validation(
                "card_border_radius cannot be negative".to_string(),
            ));
        }
        if let Some(style) = patch.marriage_line_style.as_deref() {
            if style != "solid" && style != "dashed" {
                return Err(CoreError::UnknownValue {
                    field: "marriage_line_style".to_string(),
                    value: style.to_string(),
                });
            }
        }

        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = patch.$field {
                    self.$field = v;
                })*
            };
        }
        set!(
            name,
            male_color,
            female_color,
            unknown_color,
            direct_lineage_color,
            deceased_opacity,
            line_color,
            line_width,
            marriage_line_style,
            card_width,
            card_height,
            card_border_radius,
            show_photos,
            show_dates,
            show_places,
            show_occupation,
            background_color,
            background_image,
            font_family,
            font_size,
            default_root_person_id,
        );
        Ok(())
    }
}

/// A node position saved after the user dragged a card, valid for one root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: i64,
    pub person_id: PersonId,
    pub root_person_id: PersonId,
    pub x: f64,
    pub y: f64,
    pub updated_at: DateTime<Utc>,
}

/// One position in a save request
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PositionInput {
    pub person_id: PersonId,
    pub x: f64,
    pub y: f64,
}

impl PositionInput {
    pub fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(CoreError::Validation(format!(
                "position of person {} must be finite",
                self.person_id
            )));
        }
        Ok(())
    }
}
