//! Search utilities for the notification feed.
//!
//! Provides consistent search semantics for filtering and highlighting:
//! - Case-insensitive substring matching over app name, title and body
//! - Leftmost-first, non-overlapping highlight segments for display

use serde::Serialize;

use crate::models::CapturedNotification;

/// A run of text that either matched the query or didn't.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub is_match: bool,
}

impl Segment {
    fn plain(text: String) -> Self {
        Self {
            text,
            is_match: false,
        }
    }

    fn matched(text: String) -> Self {
        Self {
            text,
            is_match: true,
        }
    }
}

/// Check if text contains a search term (case-insensitive)
pub fn text_contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    text.to_lowercase().contains(&term.to_lowercase())
}

/// Keep notifications whose app name, title or body contains `query`.
///
/// A blank or absent query keeps everything. Absent titles and bodies never
/// match.
pub fn search(
    notifications: &[CapturedNotification],
    query: Option<&str>,
) -> Vec<CapturedNotification> {
    let query = match query {
        Some(q) if !q.trim().is_empty() => q.to_lowercase(),
        _ => return notifications.to_vec(),
    };

    notifications
        .iter()
        .filter(|n| matches_query(n, &query))
        .cloned()
        .collect()
}

/// `lowercase_query` must already be lowercased.
fn matches_query(notification: &CapturedNotification, lowercase_query: &str) -> bool {
    let field_matches =
        |field: Option<&str>| field.map_or(false, |f| f.to_lowercase().contains(lowercase_query));

    field_matches(Some(&notification.app_name))
        || field_matches(notification.title.as_deref())
        || field_matches(notification.body.as_deref())
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn chars_match_ignore_case(text: &[char], query: &[char], start: usize) -> bool {
    query
        .iter()
        .enumerate()
        .all(|(i, q)| text.get(start + i).map_or(false, |c| chars_eq_ignore_case(*c, *q)))
}

/// Split `text` into plain and matching segments for `query`.
///
/// Matching is case-insensitive, leftmost-first and non-overlapping. An empty
/// query yields the whole text as one plain segment; empty text yields no
/// segments.
pub fn highlight(text: &str, query: &str) -> Vec<Segment> {
    if text.is_empty() {
        return Vec::new();
    }
    if query.is_empty() {
        return vec![Segment::plain(text.to_string())];
    }

    let chars: Vec<char> = text.chars().collect();
    let query_chars: Vec<char> = query.chars().collect();
    let query_len = query_chars.len();

    let mut segments = Vec::new();
    let mut last_end = 0;
    let mut i = 0;

    while i + query_len <= chars.len() {
        if chars_match_ignore_case(&chars, &query_chars, i) {
            if i > last_end {
                segments.push(Segment::plain(chars[last_end..i].iter().collect()));
            }
            segments.push(Segment::matched(chars[i..i + query_len].iter().collect()));
            i += query_len;
            last_end = i;
        } else {
            i += 1;
        }
    }

    if last_end < chars.len() {
        segments.push(Segment::plain(chars[last_end..].iter().collect()));
    }

    segments
}
