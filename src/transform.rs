//! Dataset normalization, login filtering, and aggregation.
//!
//! [`set_webs`] is a pure function of `(dataset, settings, tags)`. It is
//! applied before every dataset write and before every dataset response, so
//! it must be idempotent: running it on its own output changes nothing.

use std::collections::{HashMap, HashSet};

use crate::error::{NavError, Result};
use crate::models::{for_each_web, for_each_web_mut, Category, Dataset, Tag, ViewCounts, Web};
use crate::settings::{Settings, WebSort};

/// Normalizes a raw dataset and fills in the derived fields the front end
/// relies on.
///
/// 1. Entries with id `0` get fresh ids after the current maximum.
/// 2. Tag references are resolved against `tags`: unknown ids are dropped,
///    names filled in, and references ordered by tag-list position.
/// 3. Each entry's `breadcrumb` is set to its category path.
/// 4. Entries are sorted within their category per `settings.web_sort`.
/// 5. Each category's `web_count` is recomputed.
pub fn set_webs(mut dataset: Dataset, settings: &Settings, tags: &[Tag]) -> Dataset {
    assign_ids(&mut dataset);

    let positions: HashMap<u64, (usize, &Tag)> = tags
        .iter()
        .enumerate()
        .map(|(pos, tag)| (tag.id, (pos, tag)))
        .collect();

    let mut trail = Vec::new();
    normalize_categories(&mut dataset, &mut trail, &positions, settings.web_sort);
    dataset
}

fn assign_ids(dataset: &mut Dataset) {
    let mut max_id = 0;
    for_each_web(dataset, &mut |web| max_id = max_id.max(web.id));
    for_each_web_mut(dataset, &mut |web| {
        if web.id == 0 {
            max_id += 1;
            web.id = max_id;
        }
    });
}

fn normalize_categories(
    categories: &mut [Category],
    trail: &mut Vec<String>,
    tags: &HashMap<u64, (usize, &Tag)>,
    sort: WebSort,
) -> u64 {
    let mut total = 0;
    for category in categories {
        trail.push(category.title.clone());

        for web in &mut category.web {
            resolve_tags(web, tags);
            web.breadcrumb = trail.clone();
        }
        sort_webs(&mut category.web, sort);

        let nested = normalize_categories(&mut category.nav, trail, tags, sort);
        category.web_count = category.web.len() as u64 + nested;
        total += category.web_count;

        trail.pop();
    }
    total
}

fn resolve_tags(web: &mut Web, tags: &HashMap<u64, (usize, &Tag)>) {
    web.tags.retain(|t| tags.contains_key(&t.id));
    for tag_ref in &mut web.tags {
        if let Some((_, tag)) = tags.get(&tag_ref.id) {
            tag_ref.name = tag.name.clone();
        }
    }
    web.tags
        .sort_by_key(|t| tags.get(&t.id).map(|(pos, _)| *pos).unwrap_or(usize::MAX));
}

fn sort_webs(webs: &mut [Web], sort: WebSort) {
    match sort {
        WebSort::None => return,
        WebSort::Index => webs.sort_by_key(|w| w.index),
        WebSort::Name => webs.sort_by_key(|w| w.name.to_lowercase()),
        WebSort::Views => webs.sort_by_key(|w| std::cmp::Reverse(w.total_views())),
    }
    // Stable: pinned entries float to the top, keeping the order above.
    webs.sort_by_key(|w| !w.top);
}

/// Removes login-only categories and entries for anonymous callers.
pub fn filter_login_data(dataset: Dataset, is_login: bool) -> Dataset {
    if is_login {
        return dataset;
    }
    dataset
        .into_iter()
        .filter(|c| !c.own_visible)
        .map(|mut c| {
            c.web.retain(|w| !w.own_visible);
            c.nav = filter_login_data(c.nav, false);
            c
        })
        .collect()
}

/// Totals the anonymous and authenticated view counters.
pub fn compute_view_counts(dataset: &[Category]) -> ViewCounts {
    let mut counts = ViewCounts::default();
    for_each_web(dataset, &mut |web| {
        counts.user_view_count = counts.user_view_count.saturating_add(web.user_view_count);
        counts.login_view_count = counts.login_view_count.saturating_add(web.login_view_count);
    });
    counts
}

/// Rejects datasets with duplicate entry ids. Run after [`set_webs`].
pub fn validate_dataset(dataset: &[Category]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut duplicate = None;
    for_each_web(dataset, &mut |web| {
        if !seen.insert(web.id) && duplicate.is_none() {
            duplicate = Some(web.id);
        }
    });
    match duplicate {
        Some(id) => Err(NavError::validation(format!("duplicate entry id: {}", id))),
        None => Ok(()),
    }
}

/// Rejects tag lists with duplicate names.
pub fn validate_tags(tags: &[Tag]) -> Result<()> {
    let mut seen = HashSet::new();
    for tag in tags {
        if !seen.insert(tag.name.as_str()) {
            return Err(NavError::validation(format!(
                "duplicate tag name: {}",
                tag.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WebTag;

    fn web(id: u64, name: &str) -> Web {
        Web {
            id,
            name: name.to_string(),
            url: format!("https://{}.example.com", name.to_lowercase()),
            ..Default::default()
        }
    }

    fn tag(id: u64, name: &str) -> Tag {
        Tag {
            id,
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn tag_ref(id: u64) -> WebTag {
        WebTag {
            id,
            ..Default::default()
        }
    }

    fn sample() -> Dataset {
        let mut a = web(0, "Beta");
        a.tags = vec![tag_ref(2), tag_ref(99), tag_ref(1)];
        a.user_view_count = 3;
        let mut b = web(7, "alpha");
        b.login_view_count = 10;
        b.own_visible = true;
        let mut c = web(0, "Gamma");
        c.top = true;

        vec![
            Category {
                id: 1,
                title: "Dev".into(),
                web: vec![a, b],
                nav: vec![Category {
                    id: 2,
                    title: "Tools".into(),
                    web: vec![c],
                    ..Default::default()
                }],
                ..Default::default()
            },
            Category {
                id: 3,
                title: "Private".into(),
                own_visible: true,
                web: vec![web(9, "Secret")],
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_assigns_missing_ids_after_max() {
        let out = set_webs(sample(), &Settings::default(), &[]);
        let mut ids = Vec::new();
        for_each_web(&out, &mut |w| ids.push(w.id));
        assert_eq!(ids, vec![10, 7, 11, 9]);
        validate_dataset(&out).unwrap();
    }

    #[test]
    fn test_resolves_tags_in_list_order() {
        let tags = vec![tag(1, "rust"), tag(2, "web")];
        let out = set_webs(sample(), &Settings::default(), &tags);
        let names: Vec<_> = out[0].web[0].tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "web"]);
    }

    #[test]
    fn test_breadcrumb_and_counts() {
        let out = set_webs(sample(), &Settings::default(), &[]);
        assert_eq!(out[0].nav[0].web[0].breadcrumb, vec!["Dev", "Tools"]);
        assert_eq!(out[0].web_count, 3);
        assert_eq!(out[0].nav[0].web_count, 1);
        assert_eq!(out[1].web_count, 1);
    }

    #[test]
    fn test_input_order_kept_without_sort() {
        let out = set_webs(sample(), &Settings::default(), &[]);
        let names: Vec<_> = out[0].web.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "alpha"]);
    }

    #[test]
    fn test_sort_policies() {
        let settings = Settings {
            web_sort: WebSort::Name,
            ..Default::default()
        };
        let out = set_webs(sample(), &settings, &[]);
        let names: Vec<_> = out[0].web.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Beta"]);

        let settings = Settings {
            web_sort: WebSort::Views,
            ..Default::default()
        };
        let out = set_webs(sample(), &settings, &[]);
        assert_eq!(out[0].web[0].name, "alpha");
    }

    #[test]
    fn test_top_entries_first_when_sorted() {
        let mut data = sample();
        data[0].web[1].top = true;
        let settings = Settings {
            web_sort: WebSort::Index,
            ..Default::default()
        };
        let out = set_webs(data, &settings, &[]);
        assert_eq!(out[0].web[0].name, "alpha");
    }

    #[test]
    fn test_idempotent() {
        let tags = vec![tag(1, "rust"), tag(2, "web")];
        for sort in [WebSort::None, WebSort::Index, WebSort::Name, WebSort::Views] {
            let settings = Settings {
                web_sort: sort,
                ..Default::default()
            };
            let once = set_webs(sample(), &settings, &tags);
            let twice = set_webs(once.clone(), &settings, &tags);
            assert_eq!(once, twice, "not idempotent for {:?}", sort);
        }
    }

    #[test]
    fn test_deterministic() {
        let tags = vec![tag(2, "web")];
        let a = set_webs(sample(), &Settings::default(), &tags);
        let b = set_webs(sample(), &Settings::default(), &tags);
        assert_eq!(a, b);
    }

    #[test]
    fn test_login_filtering() {
        let anon = filter_login_data(sample(), false);
        assert_eq!(anon.len(), 1);
        let mut names = Vec::new();
        for_each_web(&anon, &mut |w| names.push(w.name.clone()));
        assert_eq!(names, vec!["Beta", "Gamma"]);

        let all = filter_login_data(sample(), true);
        assert_eq!(all, sample());
    }

    #[test]
    fn test_view_counts() {
        let counts = compute_view_counts(&sample());
        assert_eq!(counts.user_view_count, 3);
        assert_eq!(counts.login_view_count, 10);
        assert_eq!(compute_view_counts(&[]), ViewCounts::default());
    }

    #[test]
    fn test_validation() {
        let dup = vec![Category {
            web: vec![web(1, "a"), web(1, "b")],
            ..Default::default()
        }];
        assert!(validate_dataset(&dup).is_err());
        assert!(validate_tags(&[tag(1, "x"), tag(2, "x")]).is_err());
        assert!(validate_tags(&[tag(1, "x"), tag(2, "y")]).is_ok());
    }
}
