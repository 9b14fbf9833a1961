use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub summary: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperienceEntry {
    pub title: Option<String>,
    pub company: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationEntry {
    pub degree: Option<String>,
    pub institution: Option<String>,
    pub year: Option<String>,
}

// Uniform result shape for one uploaded resume. Whether the model actually
// populated the fields is tracked by `ai_processed`, not `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub success: bool,
    pub file_name: String,
    pub extracted_data: ResumeProfile,
    pub ai_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_recommended: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_exceeded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ParseResponse {
    pub fn extracted(file_name: &str, profile: ResumeProfile, method: Option<&str>) -> Self {
        ParseResponse {
            success: true,
            file_name: file_name.into(),
            extracted_data: profile,
            ai_processed: true,
            extraction_method: method.map(|m| m.into()),
            message: None,
            parse_error: None,
            retry_recommended: None,
            quota_exceeded: None,
            raw_response: None,
        }
    }

    pub fn manual_entry(file_name: &str, message: &str) -> Self {
        ParseResponse {
            success: true,
            file_name: file_name.into(),
            extracted_data: ResumeProfile::default(),
            ai_processed: false,
            extraction_method: None,
            message: Some(message.into()),
            parse_error: Some(true),
            retry_recommended: None,
            quota_exceeded: None,
            raw_response: None,
        }
    }

    pub fn overloaded(file_name: &str, quota: bool) -> Self {
        ParseResponse {
            success: true,
            file_name: file_name.into(),
            extracted_data: ResumeProfile::default(),
            ai_processed: false,
            extraction_method: None,
            message: Some(
                "The AI service is currently overloaded. Your file was uploaded; please fill in \
                 the form manually or retry in a few minutes."
                    .into(),
            ),
            parse_error: None,
            retry_recommended: Some(true),
            quota_exceeded: quota.then_some(true),
            raw_response: None,
        }
    }

    pub fn degraded(file_name: &str) -> Self {
        ParseResponse {
            success: true,
            file_name: file_name.into(),
            extracted_data: ResumeProfile::default(),
            ai_processed: false,
            extraction_method: None,
            message: Some(
                "Automatic extraction was not possible for this file. Please fill in the form \
                 manually."
                    .into(),
            ),
            parse_error: None,
            retry_recommended: None,
            quota_exceeded: None,
            raw_response: None,
        }
    }

    pub fn parse_failure(file_name: &str, raw_excerpt: &str) -> Self {
        ParseResponse {
            success: false,
            file_name: file_name.into(),
            extracted_data: ResumeProfile::default(),
            ai_processed: false,
            extraction_method: None,
            message: Some("The model reply could not be parsed as resume data.".into()),
            parse_error: Some(true),
            retry_recommended: None,
            quota_exceeded: None,
            raw_response: Some(raw_excerpt.into()),
        }
    }

    pub fn failed(file_name: &str, error: String) -> Self {
        ParseResponse {
            success: false,
            file_name: file_name.into(),
            extracted_data: ResumeProfile::default(),
            ai_processed: false,
            extraction_method: None,
            message: Some(error),
            parse_error: None,
            retry_recommended: None,
            quota_exceeded: None,
            raw_response: None,
        }
    }
}
