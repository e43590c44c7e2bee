//! Markdown rendering for CLI output
//!
//! - User content is blockquoted (`> ` on every line)
//! - Stats use emoji and skip zeros (👍 likes  ♻️ reshares  💬 replies)
//! - Timestamps are UTC ISO 8601 without fractional seconds

use crate::atproto::types::{EmbedView, EmbeddedRecord, GenericRecord, PostView, ProfileView, RecordEnvelope};
use crate::resolve::{ResolvedContent, Resolution};
use crate::waypoints::recommend::{CategoryGroup, CategoryLinks, Destinations, Recommendation};
use chrono::{DateTime, SecondsFormat, Utc};
use unicode_segmentation::UnicodeSegmentation;

/// Longest post text shown before truncation, in graphemes
const MAX_TEXT_GRAPHEMES: usize = 500;
const MAX_DESCRIPTION_GRAPHEMES: usize = 300;
/// Generic record values are shown as JSON up to this many bytes
const MAX_RECORD_JSON: usize = 2000;

pub fn format_resolution(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Invalid { input, message } => {
            format!("# Invalid input\n\n`{}`\n\n{}\n", input, message)
        }
        Resolution::Unresolved { locator, message } => {
            format!("# Could not resolve\n\n`{}`\n\n{}\n", locator.to_at_uri(), message)
        }
        Resolution::RecordMissing { locator, did, message } => format!(
            "# Record not found\n\n`{}`\n\nOwner resolved to `{}`, but the record could not be fetched.\n\n{}\n",
            locator.to_at_uri(),
            did,
            message
        ),
        Resolution::Resolved(content) => format_content(content),
    }
}

fn format_content(content: &ResolvedContent) -> String {
    let mut out = String::new();
    let handle = content.actor.handle().unwrap_or(&content.actor.did);

    out.push_str(&format!("# {}\n\n", content.locator.to_at_uri()));
    out.push_str(&format!("**Link:** {}\n", content.link));
    out.push_str(&format!("**Owner:** @{} (`{}`)\n", handle, content.actor.did));
    out.push_str(&format!("**PDS:** {}\n", content.actor.pds_endpoint));
    out.push_str(&format!("**Type:** {}\n\n", content.content_type));

    if let Some(profile) = &content.profile {
        if content.locator.is_profile() {
            out.push_str(&format_profile(profile));
            out.push('\n');
        }
    }

    match &content.record {
        Some(RecordEnvelope::Post(thread)) => {
            if let Some(post) = thread.root() {
                out.push_str(&format_post(post));
                out.push('\n');
            }
        }
        Some(RecordEnvelope::Record(record)) => {
            out.push_str(&format_record(record));
            out.push('\n');
        }
        None => {}
    }

    out.push_str(&format_destinations(&content.destinations));
    out
}

pub fn format_profile(profile: &ProfileView) -> String {
    let mut out = match &profile.display_name {
        Some(name) if !name.is_empty() => format!("## {} (@{})\n\n", name, profile.handle),
        _ => format!("## @{}\n\n", profile.handle),
    };

    if let Some(description) = profile.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&blockquote_content(&truncate_graphemes(
            description,
            MAX_DESCRIPTION_GRAPHEMES,
        )));
        out.push_str("\n\n");
    }

    let counts: Vec<String> = [
        (profile.posts_count, "posts"),
        (profile.followers_count, "followers"),
        (profile.follows_count, "following"),
    ]
    .iter()
    .filter_map(|(count, label)| count.map(|c| format!("{} {}", c, label)))
    .collect();
    if !counts.is_empty() {
        out.push_str(&counts.join(" · "));
        out.push('\n');
    }
    out
}

pub fn format_post(post: &PostView) -> String {
    let mut out = String::new();
    let author = match &post.author.display_name {
        Some(name) if !name.is_empty() => format!("{} (@{})", name, post.author.handle),
        _ => format!("@{}", post.author.handle),
    };
    out.push_str(&format!("## Post by {}\n\n", author));

    out.push_str(&blockquote_content(&truncate_graphemes(
        post.text(),
        MAX_TEXT_GRAPHEMES,
    )));
    out.push('\n');

    if let Some(embed) = &post.embed {
        let rendered = format_embed(embed);
        if !rendered.is_empty() {
            out.push('\n');
            out.push_str(&rendered);
            out.push('\n');
        }
    }

    let stats = format_stats(post.like_count, post.repost_count, post.quote_count, post.reply_count);
    let when = post.created_at().map(format_timestamp);
    match (when, stats.is_empty()) {
        (Some(when), false) => out.push_str(&format!("\n{}  {}\n", when, stats)),
        (Some(when), true) => out.push_str(&format!("\n{}\n", when)),
        (None, false) => out.push_str(&format!("\n{}\n", stats)),
        (None, true) => {}
    }
    out
}

pub fn format_record(record: &GenericRecord) -> String {
    let mut out = format!(
        "## Record `{}`\n\n",
        record.record_type().unwrap_or("unknown type")
    );
    let json = serde_json::to_string_pretty(&record.value).unwrap_or_default();
    out.push_str("```json\n");
    out.push_str(truncate_bytes(&json, MAX_RECORD_JSON));
    if json.len() > MAX_RECORD_JSON {
        out.push_str("\n…");
    }
    out.push_str("\n```\n");
    out
}

/// One Markdown block per embed kind; unknown kinds render as nothing
pub fn format_embed(embed: &EmbedView) -> String {
    match embed {
        EmbedView::Images { images } => images
            .iter()
            .map(|img| format!("![{}]({})", img.alt, img.fullsize))
            .collect::<Vec<_>>()
            .join("\n"),
        EmbedView::External { external } => {
            let title = if external.title.is_empty() {
                &external.uri
            } else {
                &external.title
            };
            let mut parts = vec![format!("[{}]({})", title, external.uri)];
            if !external.description.is_empty() {
                parts.push(blockquote_content(&external.description));
            }
            parts.join("\n")
        }
        EmbedView::Record { record } => format_embedded_record(record),
        EmbedView::RecordWithMedia { record, media } => {
            let quoted = format_embedded_record(&record.record);
            let media = format_embed(media);
            [quoted, media]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        }
        EmbedView::Video { alt, .. } => match alt {
            Some(alt) if !alt.is_empty() => format!("🎞️ Video: {}", alt),
            _ => "🎞️ Video".to_string(),
        },
        EmbedView::Unknown => String::new(),
    }
}

fn format_embedded_record(record: &EmbeddedRecord) -> String {
    match record {
        EmbeddedRecord::ViewRecord { uri, author, value } => {
            let text = value
                .get("text")
                .and_then(|t| t.as_str())
                .unwrap_or_default();
            blockquote_content(&format!(
                "Quoting @{}: {}\n{}",
                author.handle,
                truncate_graphemes(text, MAX_DESCRIPTION_GRAPHEMES),
                uri
            ))
        }
        EmbeddedRecord::NotFound { uri } => blockquote_content(&format!("Quoted record not found: {}", uri)),
        EmbeddedRecord::Blocked { uri } => blockquote_content(&format!("Quoted record is blocked: {}", uri)),
        EmbeddedRecord::Unknown => String::new(),
    }
}

pub fn format_destinations(destinations: &Destinations) -> String {
    let mut out = String::new();
    if destinations.recommended.links.is_empty() {
        out.push_str("_No compatible apps for this content._\n");
        return out;
    }

    out.push_str(&format!("## {}\n\n", destinations.recommended.label));
    for link in &destinations.recommended.links {
        out.push_str(&format!("- [{}]({}): {}\n", link.name, link.url, link.description));
    }

    if !destinations.more.is_empty() {
        out.push_str("\n## More options\n");
        for group in &destinations.more {
            push_category_links(&mut out, group, 3);
        }
    }
    out
}

fn push_category_links(out: &mut String, group: &CategoryLinks, level: usize) {
    out.push_str(&format!("\n{} {}\n\n", "#".repeat(level), group.category));
    for link in &group.links {
        out.push_str(&format!("- [{}]({})\n", link.name, link.url));
    }
    for sub in &group.subcategories {
        push_category_links(out, sub, level + 1);
    }
}

/// Catalog listing for `aturi waypoints`
pub fn format_waypoints(recommendation: &Recommendation<'_>, groups: &[CategoryGroup<'_>]) -> String {
    let mut out = format!("## {}\n\n", recommendation.label);
    if recommendation.waypoints.is_empty() {
        out.push_str("_None._\n");
    }
    for waypoint in &recommendation.waypoints {
        out.push_str(&format!("- **{}**: {}\n", waypoint.name, waypoint.description));
    }
    for group in groups {
        push_category_group(&mut out, group, 2);
    }
    out
}

fn push_category_group(out: &mut String, group: &CategoryGroup<'_>, level: usize) {
    out.push_str(&format!("\n{} {}\n\n", "#".repeat(level), group.name));
    for waypoint in &group.waypoints {
        out.push_str(&format!("- {} (`{}`)\n", waypoint.name, waypoint.id));
    }
    for sub in &group.subcategories {
        push_category_group(out, sub, level + 1);
    }
}

/// Blockquote user content - prefix every line with `> `
pub fn blockquote_content(text: &str) -> String {
    if text.is_empty() {
        return ">".to_string();
    }

    text.lines()
        .map(|line| format!("> {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// ♻️ combines reposts + quotes; zero counts are omitted
pub fn format_stats(likes: u64, reposts: u64, quotes: u64, replies: u64) -> String {
    let mut parts = Vec::new();

    if likes > 0 {
        parts.push(format!("👍 {}", likes));
    }

    let reshares = reposts + quotes;
    if reshares > 0 {
        parts.push(format!("♻️ {}", reshares));
    }

    if replies > 0 {
        parts.push(format!("💬 {}", replies));
    }

    parts.join("  ")
}

/// `2024-10-06T12:15:33.123+02:00` -> `2024-10-06T10:15:33Z`. Unparseable input is returned as is.
pub fn format_timestamp(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        Err(_) => timestamp.to_string(),
    }
}

/// Cut to at most `max` graphemes, appending `…` when shortened
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
