//! Neighborhood tagging by plain substring match.
//!
//! Matching is case-sensitive and not word-boundary aware, so "Fenway"
//! matches inside "Fenway Park" and "Roxbury" inside "Roxbury's". That is
//! good enough for a best-effort label and is not meant as entity
//! recognition.

/// Boston neighborhoods stories are tagged with.
///
/// No entry is a substring of another, so one mention never produces two
/// tags.
pub const NEIGHBORHOODS: [&str; 23] = [
    "Allston",
    "Back Bay",
    "Bay Village",
    "Beacon Hill",
    "Brighton",
    "Charlestown",
    "Chinatown",
    "Dorchester",
    "Downtown",
    "East Boston",
    "Fenway",
    "Hyde Park",
    "Jamaica Plain",
    "Leather District",
    "Longwood",
    "Mattapan",
    "Mission Hill",
    "North End",
    "Roslindale",
    "Roxbury",
    "South Boston",
    "South End",
    "West End",
];

/// Return every neighborhood named in `text`, in vocabulary order.
pub fn tag(text: &str) -> Vec<String> {
    NEIGHBORHOODS
        .iter()
        .filter(|name| text.contains(*name))
        .map(|name| name.to_string())
        .collect()
}

/// Collection name for a neighborhood tag.
///
/// # Examples
///
/// ```
/// use neighborhood_news::tagger::tag_collection_name;
/// assert_eq!(tag_collection_name("Back Bay"), "back_bay");
/// ```
pub fn tag_collection_name(tag: &str) -> String {
    tag.to_lowercase().replace(' ', "_")
}
