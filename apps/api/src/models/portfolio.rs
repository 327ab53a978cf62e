//! Portfolio aggregate as served by the upstream portfolio backend.
//!
//! Every field is optional on the wire; absent strings decode as `""`, absent
//! lists as `[]` and absent flags as `false`. The compositor reads these types
//! and never mutates them.

use serde::{Deserialize, Deserializer, Serialize};

/// Accepts `null` wherever a defaultable value is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Portfolio {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub profile: Profile,
    #[serde(deserialize_with = "null_as_default")]
    pub educations: Vec<Education>,
    #[serde(deserialize_with = "null_as_default")]
    pub careers: Vec<Career>,
    #[serde(deserialize_with = "null_as_default")]
    pub certificates: Vec<Certificate>,
    #[serde(deserialize_with = "null_as_default")]
    pub languages: Vec<LanguageScore>,
    #[serde(deserialize_with = "null_as_default")]
    pub awards: Vec<Award>,
    #[serde(deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,
    #[serde(deserialize_with = "null_as_default")]
    pub about: About,
}

/// The backend uses numeric ids; older exports use strings.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Number(n)) => n.to_string(),
        Some(RawId::Text(s)) => s,
        None => String::new(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub birth_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub gender: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub introduction: String,
    /// Asset-host URL of the profile photo, or an embedded `data:`/`blob:` reference.
    pub image: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub sns: Vec<SnsLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnsLink {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    #[serde(deserialize_with = "null_as_default")]
    pub school: String,
    #[serde(deserialize_with = "null_as_default")]
    pub major: String,
    #[serde(deserialize_with = "null_as_default")]
    pub degree: String,
    #[serde(deserialize_with = "null_as_default")]
    pub start_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub end_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_attending: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Career {
    #[serde(deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(deserialize_with = "null_as_default")]
    pub position: String,
    #[serde(deserialize_with = "null_as_default")]
    pub start_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub end_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_working: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub issuer: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageScore {
    #[serde(deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(deserialize_with = "null_as_default")]
    pub test_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub score: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Award {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub issuer: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(deserialize_with = "null_as_default")]
    pub start_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub end_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_ongoing: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub scope: String,
    #[serde(deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    pub service_url: Option<String>,
    pub github_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

/// Free-text cover-letter blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct About {
    #[serde(deserialize_with = "null_as_default")]
    pub growth: String,
    #[serde(deserialize_with = "null_as_default")]
    pub personality: String,
    #[serde(deserialize_with = "null_as_default")]
    pub experience: String,
}

impl About {
    /// True when at least one block carries non-whitespace text.
    pub fn has_content(&self) -> bool {
        [&self.growth, &self.personality, &self.experience]
            .iter()
            .any(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_defaults_every_section() {
        let p: Portfolio = serde_json::from_str(r#"{"id": 7, "title": "t"}"#).unwrap();
        assert_eq!(p.id, "7");
        assert!(p.educations.is_empty());
        assert!(p.projects.is_empty());
        assert!(p.profile.image.is_none());
        assert!(!p.about.has_content());
    }

    #[test]
    fn test_null_sections_decode_as_empty() {
        let p: Portfolio = serde_json::from_str(
            r#"{"id":"a1","title":null,"profile":null,"careers":null,"about":null}"#,
        )
        .unwrap();
        assert_eq!(p.id, "a1");
        assert_eq!(p.title, "");
        assert!(p.careers.is_empty());
        assert_eq!(p.profile.name, "");
    }

    #[test]
    fn test_camel_case_fields_and_sns_type() {
        let p: Portfolio = serde_json::from_str(
            r#"{
                "id": 1,
                "profile": {"name": "홍길동", "birthDate": "1999-01-02", "image": "https://cdn.example.com/a.jpg",
                            "sns": [{"type": "github", "url": "https://github.com/hong"}]},
                "educations": [{"school": "한국대", "startDate": "2018-03-01", "endDate": "2022-02-28", "isAttending": false}],
                "languages": [{"language": "영어", "testName": "TOEIC", "score": "900"}],
                "projects": [{"title": "p", "isOngoing": true, "skills": ["Rust"], "githubUrl": "https://g"}],
                "userId": "ignored"
            }"#,
        )
        .unwrap();
        assert_eq!(p.profile.birth_date, "1999-01-02");
        assert_eq!(p.profile.sns[0].kind, "github");
        assert_eq!(p.educations[0].start_date, "2018-03-01");
        assert!(p.languages[0].date.is_none());
        assert!(p.projects[0].is_ongoing);
        assert_eq!(p.projects[0].github_url.as_deref(), Some("https://g"));
    }

    #[test]
    fn test_about_whitespace_only_is_not_content() {
        let about = About {
            growth: "  ".to_string(),
            personality: String::new(),
            experience: "\n".to_string(),
        };
        assert!(!about.has_content());
    }
}
