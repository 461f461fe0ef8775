//! Driver profile model for storage and registration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Driver profile stored under `DriverInfo/{driver_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    /// Auth user ID (also used as the document key, not stored in the body)
    #[serde(skip)]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    /// Avatar download URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub rating: f64,
}

impl DriverProfile {
    /// Full display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(first_name) = &update.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(phone_number) = &update.phone_number {
            self.phone_number = phone_number.clone();
        }
        if let Some(avatar) = &update.avatar {
            self.avatar = Some(avatar.clone());
        }
    }
}

/// Fields a driver fills in on first sign-in.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct RegistrationForm {
    #[validate(length(min = 1, message = "Please enter first name"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Please enter last name"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Please enter phone number"))]
    pub phone_number: String,
}

impl RegistrationForm {
    /// Fields in the order they are checked and reported.
    const FIELD_ORDER: [&'static str; 3] = ["first_name", "last_name", "phone_number"];

    /// Form pre-filled with the phone number the auth provider knows about.
    pub fn prefilled(phone_number: Option<&str>) -> Self {
        Self {
            phone_number: phone_number.unwrap_or_default().to_string(),
            ..Self::default()
        }
    }

    /// Trim every field and validate, returning the first message in field
    /// order on failure.
    pub fn check(&self) -> Result<RegistrationForm, String> {
        let trimmed = RegistrationForm {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
        };

        match trimmed.validate() {
            Ok(()) => Ok(trimmed),
            Err(errors) => {
                let field_errors = errors.field_errors();
                let message = Self::FIELD_ORDER
                    .iter()
                    .filter_map(|field| field_errors.get(*field))
                    .filter_map(|errs| errs.first())
                    .filter_map(|err| err.message.as_ref())
                    .map(|msg| msg.to_string())
                    .next()
                    .unwrap_or_else(|| "Invalid registration".to_string());
                Err(message)
            }
        }
    }

    /// Build a new profile with a zero rating.
    pub fn into_profile(self, driver_id: &str) -> DriverProfile {
        DriverProfile {
            id: driver_id.to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            avatar: None,
            rating: 0.0,
        }
    }
}

/// Partial profile update (profile edit, avatar upload).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn avatar(url: impl Into<String>) -> Self {
        Self {
            avatar: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
