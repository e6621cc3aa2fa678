//! Episode number and canonical name resolution
//!
//! The tree builder asks a [`NameResolver`] for each video file it discovers. The
//! default [`EpisodePatternResolver`] recognizes the numbering conventions fansub and
//! scene releases commonly use and renders a canonical name from a template.

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::Subscription;
use crate::utils::stem_of;

/// Default canonical name template
pub const DEFAULT_TEMPLATE: &str = "{title} S{season}E{episode}";

/// Outcome of resolving one file name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Episode number, fractional for specials such as 12.5
    pub episode: Option<f64>,
    /// Canonical name without extension; `None` or blank keeps the original name
    pub canonical_name: Option<String>,
}

/// Maps a release file name to an episode number and canonical name
pub trait NameResolver: Send + Sync {
    /// Resolve `file_name` in the context of `subscription`
    fn resolve(&self, file_name: &str, subscription: &Subscription) -> Result<Resolution>;
}

/// Regex based resolver for common release naming conventions
///
/// Recognized forms, tried in order:
/// - `S01E03`
/// - ` - 03` (optionally followed by a version suffix such as `v2`)
/// - `第03话` / `第03話` / `第03集`
/// - `[03]`
/// - `E03` / `EP03`
///
/// When the subscription pins a subgroup and the file's leading `[Group]` tag names a
/// different one, the episode is still reported but no canonical name is produced.
pub struct EpisodePatternResolver {
    patterns: Vec<Regex>,
    leading_group: Regex,
}

impl EpisodePatternResolver {
    /// Compile the built-in patterns
    pub fn new() -> Result<Self> {
        let patterns = [
            r"(?i)\bS\d{1,2}E(\d{1,4})",
            r" - (\d{1,4}(?:\.\d)?)(?:v\d+)?(?:\s|\[|\(|$)",
            r"第(\d{1,4}(?:\.\d)?)[话話集]",
            r"\[(\d{1,3}(?:\.\d)?)(?:v\d+)?(?:END)?\]",
            r"(?i)\bEP?(\d{1,3}(?:\.\d)?)\b",
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            leading_group: Regex::new(r"^\[([^\]]+)\]")?,
        })
    }

    fn episode_of(&self, stem: &str) -> Option<f64> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(stem)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        })
    }

    fn foreign_subgroup(&self, stem: &str, subscription: &Subscription) -> bool {
        let Some(pinned) = subscription
            .subgroup
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return false;
        };
        match self.leading_group.captures(stem).and_then(|c| c.get(1)) {
            Some(group) => !group.as_str().trim().eq_ignore_ascii_case(pinned),
            None => false,
        }
    }
}

impl NameResolver for EpisodePatternResolver {
    fn resolve(&self, file_name: &str, subscription: &Subscription) -> Result<Resolution> {
        let stem = stem_of(file_name);
        let episode = self
            .episode_of(stem)
            .ok_or_else(|| Error::Resolver(format!("no episode number in {file_name}")))?;

        let canonical_name = if self.foreign_subgroup(stem, subscription) {
            tracing::debug!(file = %file_name, "release from another subgroup, keeping name");
            None
        } else {
            render_name(subscription, episode)
        };

        Ok(Resolution {
            episode: Some(episode),
            canonical_name,
        })
    }
}

/// Render the canonical name for `episode`
///
/// Placeholders: `{title}`, `{season}` (two digits), `{episode}` (two digits, with a
/// one-digit fraction for specials). A blank title yields `None`.
pub fn render_name(subscription: &Subscription, episode: f64) -> Option<String> {
    let title = sanitize_component(&subscription.title);
    if title.is_empty() {
        return None;
    }
    let template = subscription
        .rename_template
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TEMPLATE);

    let rendered = template
        .replace("{title}", &title)
        .replace("{season}", &format!("{:02}", subscription.season))
        .replace("{episode}", &format_episode(episode));
    let rendered = sanitize_component(&rendered);
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

fn format_episode(episode: f64) -> String {
    let whole = episode.trunc() as u64;
    let tenths = ((episode - episode.trunc()) * 10.0).round() as u64;
    if tenths == 0 {
        format!("{whole:02}")
    } else {
        format!("{whole:02}.{tenths}")
    }
}

/// Replace characters that are invalid in file names on common hosts
fn sanitize_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c => c,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
