//! Document Assembler: maps a [`Portfolio`] onto the fixed resume layout.
//!
//! Section order is fixed: identity card, education, career, the combined
//! certificate/language/award table, projects, then an optional cover-letter
//! sheet. Tabular sections are never dropped; an empty backing list renders
//! a single placeholder row. Cover-letter subsections are dropped
//! individually when their text is empty.

use chrono::{DateTime, NaiveDate};

use crate::compositor::document::{
    Block, Column, DocumentTree, IdentityCard, NarrativeBlock, Sheet, SheetKind, TableBlock,
    TableBody,
};
use crate::compositor::inliner::InlineImage;
use crate::models::portfolio::{About, Portfolio};

// ────────────────────────────────────────────────────────────────────────────
// Fixed template text
// ────────────────────────────────────────────────────────────────────────────

pub const RESUME_TITLE: &str = "이력서";
pub const COVER_LETTER_TITLE: &str = "자기소개서";

pub const IDENTITY_HEADING: &str = "기본정보";
pub const PHOTO_PLACEHOLDER: &str = "사진";
pub const INTRODUCTION_PLACEHOLDER: &str = "한줄 소개를 입력해주세요";

pub const EDUCATION_HEADING: &str = "학력";
pub const CAREER_HEADING: &str = "경력";
pub const EXTRAS_HEADING: &str = "부가정보";
pub const PROJECT_HEADING: &str = "프로젝트";

pub const EDUCATION_EMPTY: &str = "학력 정보가 없습니다.";
pub const CAREER_EMPTY: &str = "경력사항이 없습니다.";
pub const EXTRAS_EMPTY: &str = "부가정보가 없습니다.";
pub const PROJECT_EMPTY: &str = "프로젝트 정보가 없습니다.";

pub const ATTENDING_TOKEN: &str = "재학중";
pub const WORKING_TOKEN: &str = "재직중";
pub const ONGOING_TOKEN: &str = "진행중";

pub const CERTIFICATE_TAG: &str = "자격증";
pub const LANGUAGE_TAG: &str = "어학";
pub const AWARD_TAG: &str = "수상";

pub const GROWTH_HEADING: &str = "1. 성장과정";
pub const PERSONALITY_HEADING: &str = "2. 성격 및 장단점";
pub const EXPERIENCE_HEADING: &str = "3. 경험 및 경력사항";

const DEFAULT_PROJECT_SCOPE: &str = "개인";
const MISSING_CELL: &str = "-";

// ────────────────────────────────────────────────────────────────────────────
// Assembly
// ────────────────────────────────────────────────────────────────────────────

/// Builds the document tree for `portfolio` with an already-inlined photo.
pub fn assemble(portfolio: &Portfolio, photo: InlineImage) -> DocumentTree {
    let resume = Sheet {
        kind: SheetKind::Resume,
        title: RESUME_TITLE.to_string(),
        blocks: vec![
            Block::Identity(identity_card(portfolio, photo)),
            Block::Table(education_table(portfolio)),
            Block::Table(career_table(portfolio)),
            Block::Table(extras_table(portfolio)),
            Block::Table(project_table(portfolio)),
        ],
    };

    let mut sheets = vec![resume];
    if let Some(cover_letter) = cover_letter_sheet(&portfolio.about) {
        sheets.push(cover_letter);
    }

    DocumentTree { sheets }
}

fn identity_card(portfolio: &Portfolio, photo: InlineImage) -> IdentityCard {
    let profile = &portfolio.profile;
    let sns = profile
        .sns
        .first()
        .map(|link| link.url.clone())
        .unwrap_or_default();
    let introduction = if profile.introduction.trim().is_empty() {
        INTRODUCTION_PLACEHOLDER.to_string()
    } else {
        profile.introduction.clone()
    };

    IdentityCard {
        heading: IDENTITY_HEADING.to_string(),
        photo,
        photo_placeholder: PHOTO_PLACEHOLDER.to_string(),
        fields: vec![
            ("성명".to_string(), profile.name.clone()),
            ("연락처".to_string(), profile.phone.clone()),
            ("이메일".to_string(), profile.email.clone()),
            ("SNS".to_string(), sns),
            ("한줄소개".to_string(), introduction),
        ],
    }
}

fn education_table(portfolio: &Portfolio) -> TableBlock {
    let rows = portfolio
        .educations
        .iter()
        .map(|edu| {
            vec![
                period(&edu.start_date, &edu.end_date, edu.is_attending, ATTENDING_TOKEN, "-"),
                edu.school.clone(),
                edu.major.clone(),
            ]
        })
        .collect();

    table(
        EDUCATION_HEADING,
        &[("재학기간", 0.3), ("학교명", 0.4), ("전공", 0.3)],
        rows,
        EDUCATION_EMPTY,
    )
}

fn career_table(portfolio: &Portfolio) -> TableBlock {
    let rows = portfolio
        .careers
        .iter()
        .map(|career| {
            vec![
                career.company.clone(),
                period(
                    &career.start_date,
                    &career.end_date,
                    career.is_working,
                    WORKING_TOKEN,
                    "-",
                ),
                career.position.clone(),
            ]
        })
        .collect();

    table(
        CAREER_HEADING,
        &[("회사명", 0.35), ("근무기간", 0.3), ("담당업무", 0.35)],
        rows,
        CAREER_EMPTY,
    )
}

/// Certificates, languages and awards share one table, tagged by category,
/// always in that order.
fn extras_table(portfolio: &Portfolio) -> TableBlock {
    let certificates = portfolio.certificates.iter().map(|cert| {
        vec![
            CERTIFICATE_TAG.to_string(),
            cert.name.clone(),
            cert.issuer.clone(),
            date_cell(&cert.date),
            MISSING_CELL.to_string(),
        ]
    });
    let languages = portfolio.languages.iter().map(|lang| {
        vec![
            LANGUAGE_TAG.to_string(),
            lang.language.clone(),
            lang.test_name.clone(),
            date_cell(lang.date.as_deref().unwrap_or_default()),
            lang.score.clone(),
        ]
    });
    let awards = portfolio.awards.iter().map(|award| {
        vec![
            AWARD_TAG.to_string(),
            award.name.clone(),
            award.issuer.clone(),
            date_cell(&award.date),
            MISSING_CELL.to_string(),
        ]
    });

    table(
        EXTRAS_HEADING,
        &[
            ("구분", 0.14),
            ("내용", 0.28),
            ("기관", 0.22),
            ("취득일", 0.16),
            ("점수/등급", 0.2),
        ],
        certificates.chain(languages).chain(awards).collect(),
        EXTRAS_EMPTY,
    )
}

fn project_table(portfolio: &Portfolio) -> TableBlock {
    let rows = portfolio
        .projects
        .iter()
        .map(|project| {
            let scope = if project.scope.trim().is_empty() {
                DEFAULT_PROJECT_SCOPE.to_string()
            } else {
                project.scope.clone()
            };
            let skills = if project.skills.is_empty() {
                MISSING_CELL.to_string()
            } else {
                project.skills.join(", ")
            };
            vec![
                period(
                    &project.start_date,
                    &project.end_date,
                    project.is_ongoing,
                    ONGOING_TOKEN,
                    "~",
                ),
                project.title.clone(),
                project.role.clone(),
                scope,
                skills,
            ]
        })
        .collect();

    table(
        PROJECT_HEADING,
        &[
            ("기간", 0.2),
            ("프로젝트명", 0.24),
            ("역할", 0.16),
            ("규모", 0.12),
            ("기술스택", 0.28),
        ],
        rows,
        PROJECT_EMPTY,
    )
}

fn cover_letter_sheet(about: &About) -> Option<Sheet> {
    if !about.has_content() {
        return None;
    }

    let blocks: Vec<Block> = [
        (GROWTH_HEADING, &about.growth),
        (PERSONALITY_HEADING, &about.personality),
        (EXPERIENCE_HEADING, &about.experience),
    ]
    .into_iter()
    .filter(|(_, body)| !body.trim().is_empty())
    .map(|(heading, body)| {
        Block::Narrative(NarrativeBlock {
            heading: heading.to_string(),
            body: body.trim().to_string(),
        })
    })
    .collect();

    Some(Sheet {
        kind: SheetKind::CoverLetter,
        title: COVER_LETTER_TITLE.to_string(),
        blocks,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn table(
    heading: &str,
    columns: &[(&str, f32)],
    rows: Vec<Vec<String>>,
    empty_text: &str,
) -> TableBlock {
    let body = if rows.is_empty() {
        TableBody::Empty(empty_text.to_string())
    } else {
        TableBody::Rows(rows)
    };

    TableBlock {
        heading: heading.to_string(),
        columns: columns
            .iter()
            .map(|(label, share)| Column {
                label: label.to_string(),
                share: *share,
            })
            .collect(),
        body,
    }
}

/// `start {sep} end`, where an ongoing flag always replaces the end date.
fn period(start: &str, end: &str, ongoing: bool, ongoing_token: &str, separator: &str) -> String {
    let end = if ongoing {
        ongoing_token.to_string()
    } else {
        format_year_month(end)
    };
    format!("{} {separator} {end}", format_year_month(start))
}

fn date_cell(raw: &str) -> String {
    let formatted = format_year_month(raw);
    if formatted.is_empty() {
        MISSING_CELL.to_string()
    } else {
        formatted
    }
}

/// Normalizes a date string to `YYYY.MM`, dropping the day of month.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM`, `.` or `/` separated variants and
/// RFC 3339 date-times. Unrecognized input is returned trimmed; empty input
/// stays empty.
pub fn format_year_month(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.format("%Y.%m").to_string();
    }

    // Drop any time-of-day suffix ("2018-03-01T09:00:00", "2018-03-01 09:00").
    let date_part = trimmed
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(trimmed);
    let normalized = date_part.trim_end_matches('.').replace(['.', '/'], "-");

    let parsed = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{normalized}-01"), "%Y-%m-%d"));

    match parsed {
        Ok(date) => date.format("%Y.%m").to_string(),
        Err(_) => trimmed.to_string(),
    }
}
