//! Filename filtering for release contents
//!
//! Shared by the collection flow and by callers that hand single torrents to a
//! BitTorrent client: both need to decide which files of a release are wanted.

use regex::Regex;

use crate::error::Result;
use crate::types::Subscription;
use crate::utils::file_name_of;

const PADDING_PREFIX: &str = "_____padding_file_";

/// Compiled include/exclude rules for one subscription
///
/// Patterns are unanchored regexes ("contains" semantics). A pattern written as
/// `{{Subgroup}}:pattern` applies only when the subscription's subgroup is exactly
/// `Subgroup`, and is ignored otherwise.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    exclude: Vec<Regex>,
    matches: Vec<Regex>,
    global_exclude: Vec<Regex>,
}

impl ContentFilter {
    /// Compile the subscription's patterns plus the global exclude list
    ///
    /// The global list only applies when the subscription opts into it.
    pub fn new(subscription: &Subscription, global_exclude: &[String]) -> Result<Self> {
        let tag = Regex::new(r"^\{\{(.+?)\}\}:(.+)$")?;
        let subgroup = subscription.subgroup.as_deref();
        let compile = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .filter_map(|p| scoped_pattern(&tag, p, subgroup))
                .map(|p| Regex::new(&p).map_err(Into::into))
                .collect()
        };

        Ok(Self {
            exclude: compile(&subscription.exclude_patterns)?,
            matches: compile(&subscription.match_patterns)?,
            global_exclude: if subscription.global_exclude {
                compile(global_exclude)?
            } else {
                Vec::new()
            },
        })
    }

    /// Whether a release file should be kept
    pub fn is_included(&self, name: &str) -> bool {
        if is_padding_file(name) {
            return false;
        }
        if self.exclude.iter().any(|re| re.is_match(name)) {
            return false;
        }
        if !self.matches.iter().all(|re| re.is_match(name)) {
            return false;
        }
        !self.global_exclude.iter().any(|re| re.is_match(name))
    }

    /// Normalize and filter a release's file names, preserving order
    pub fn select<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| normalize_release_name(name.as_ref()))
            .filter(|name| self.is_included(name))
            .collect()
    }
}

/// Resolve a possibly subgroup-scoped pattern for `subgroup`
///
/// Returns `None` when the pattern is scoped to another subgroup or ends up blank.
fn scoped_pattern(tag: &Regex, pattern: &str, subgroup: Option<&str>) -> Option<String> {
    let resolved = match tag.captures(pattern) {
        None => pattern,
        Some(caps) => {
            let scope = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if subgroup != Some(scope) {
                return None;
            }
            caps.get(2).map(|m| m.as_str()).unwrap_or_default()
        }
    };
    if resolved.trim().is_empty() {
        None
    } else {
        Some(resolved.to_string())
    }
}

/// BitComet pads torrents with placeholder files that are never wanted
pub fn is_padding_file(name: &str) -> bool {
    let base = file_name_of(name);
    (name.starts_with(PADDING_PREFIX) || base.starts_with(PADDING_PREFIX))
        && name.contains("BitComet")
}

/// Use `/` separators and drop a trailing separator
pub fn normalize_release_name(name: &str) -> String {
    name.trim_end_matches(['/', '\\']).replace('\\', "/")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> Subscription {
        Subscription {
            title: "Frieren".into(),
            subgroup: Some("SubsPlease".into()),
            ..Subscription::default()
        }
    }

    #[test]
    fn padding_files_are_excluded() {
        let filter = ContentFilter::new(&subscription(), &[]).unwrap();
        assert!(!filter.is_included("_____padding_file_0_if you see this file, please update to BitComet 0.85 or above____"));
        assert!(!filter.is_included("Release/_____padding_file_3_BitComet"));
        assert!(filter.is_included("_____padding_file_without_the_marker"));
    }

    #[test]
    fn any_exclude_match_rejects() {
        let sub = Subscription {
            exclude_patterns: vec!["720[pP]".into(), r"\.ass$".into()],
            ..subscription()
        };
        let filter = ContentFilter::new(&sub, &[]).unwrap();
        assert!(!filter.is_included("[Group] Frieren - 01 [720p].mkv"));
        assert!(!filter.is_included("[Group] Frieren - 01.ass"));
        assert!(filter.is_included("[Group] Frieren - 01 [1080p].mkv"));
    }

    #[test]
    fn every_match_pattern_must_hit() {
        let sub = Subscription {
            match_patterns: vec!["1080".into(), "(?i)chs|简".into()],
            ..subscription()
        };
        let filter = ContentFilter::new(&sub, &[]).unwrap();
        assert!(filter.is_included("[Group] Frieren - 01 [1080p][CHS].mkv"));
        assert!(!filter.is_included("[Group] Frieren - 01 [1080p][CHT].mkv"));
        assert!(!filter.is_included("[Group] Frieren - 01 [720p][CHS].mkv"));
    }

    #[test]
    fn subgroup_scoped_patterns_apply_only_to_that_subgroup() {
        let sub = Subscription {
            exclude_patterns: vec![
                "{{SubsPlease}}:480p".into(),
                "{{Erai-raws}}:1080p".into(),
            ],
            ..subscription()
        };
        let filter = ContentFilter::new(&sub, &[]).unwrap();
        assert!(!filter.is_included("Frieren - 01 [480p].mkv"));
        assert!(filter.is_included("Frieren - 01 [1080p].mkv"));
    }

    #[test]
    fn scoped_pattern_is_ignored_without_subgroup() {
        let sub = Subscription {
            subgroup: None,
            match_patterns: vec!["{{SubsPlease}}:never-present".into()],
            ..subscription()
        };
        let filter = ContentFilter::new(&sub, &[]).unwrap();
        assert!(filter.is_included("anything.mkv"));
    }

    #[test]
    fn global_excludes_apply_only_when_enabled() {
        let global = vec!["(?i)sample".to_string()];
        let disabled = ContentFilter::new(&subscription(), &global).unwrap();
        assert!(disabled.is_included("Frieren Sample.mkv"));

        let sub = Subscription {
            global_exclude: true,
            ..subscription()
        };
        let enabled = ContentFilter::new(&sub, &global).unwrap();
        assert!(!enabled.is_included("Frieren Sample.mkv"));
        assert!(enabled.is_included("Frieren - 01.mkv"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let sub = Subscription {
            exclude_patterns: vec!["([unclosed".into()],
            ..subscription()
        };
        assert!(ContentFilter::new(&sub, &[]).is_err());
    }

    #[test]
    fn select_normalizes_separators_and_keeps_order() {
        let sub = Subscription {
            exclude_patterns: vec![r"\.txt$".into()],
            ..subscription()
        };
        let filter = ContentFilter::new(&sub, &[]).unwrap();
        let selected = filter.select([
            "Release\\ep02.mkv",
            "Release\\notes.txt",
            "Release\\ep01.mkv",
            "Release\\Extras\\",
        ]);
        assert_eq!(
            selected,
            vec!["Release/ep02.mkv", "Release/ep01.mkv", "Release/Extras"]
        );
    }
}
