// Field validators and normalisers applied before anything is written

use once_cell::sync::Lazy;
use regex::Regex;

use super::SocialLink;
use crate::error::{AppError, AppResult};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_BIO_LENGTH: usize = 300;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_POST_LENGTH: usize = 20_000;
pub const MAX_DESCRIPTION_LENGTH: usize = 5_000;
pub const MAX_COMMENT_LENGTH: usize = 5_000;
pub const MAX_TAGS: usize = 10;

static HTTP_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url regex compiles"));

/// Checks the trimmed character count of `value` against `min..=max`.
pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(AppError::Validation(if min == 1 {
            format!("{} is required", field)
        } else {
            format!("{} must be at least {} characters", field, min)
        }));
    }
    if len > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn validate_url(field: &str, url: &str) -> AppResult<()> {
    if HTTP_URL.is_match(url.trim()) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{} must be an http(s) URL", field)))
    }
}

/// Trim, lowercase, strip a leading `#`, drop empties and duplicates, cap at `MAX_TAGS`.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().trim_start_matches('#').trim().to_lowercase();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        out.push(tag);
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

/// Skills are a set: first spelling wins, comparison ignores case.
pub fn normalize_skills(skills: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for skill in skills {
        let skill = skill.trim();
        if skill.is_empty() || out.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            continue;
        }
        out.push(skill.to_string());
    }
    out
}

/// Drops links with an empty url and validates the rest. Order is preserved.
pub fn normalize_socials(socials: Vec<SocialLink>) -> AppResult<Vec<SocialLink>> {
    let mut out = Vec::with_capacity(socials.len());
    for link in socials {
        let url = link.url.trim();
        if url.is_empty() {
            continue;
        }
        let platform = link.platform.trim();
        if platform.is_empty() {
            return Err(AppError::Validation("social link platform is required".to_string()));
        }
        validate_url(platform, url)?;
        out.push(SocialLink {
            platform: platform.to_string(),
            url: url.to_string(),
        });
    }
    Ok(out)
}

/// Placeholder avatar carrying the first letter of the name.
pub fn default_avatar_url(name: &str) -> String {
    let initial: String = name.trim().chars().take(1).collect();
    format!("https://placehold.co/128x128.png?text={}", initial.to_uppercase())
}
