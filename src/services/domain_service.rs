use crate::models::grouping::Grouping;
use crate::models::tab::Tab;

/// Group name for tabs whose URL is missing or does not parse.
pub const UNCATEGORIZED_GROUP: &str = "Uncategorized";

/// Hostname with a leading `www.` removed, or `None` when the URL has no host.
pub fn domain_key(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let key = host.strip_prefix("www.").unwrap_or(&host);
    if key.is_empty() {
        return None;
    }
    Some(key.to_string())
}

/// Buckets tabs by normalized hostname, in first-seen order.
pub fn group_by_domain(tabs: &[Tab]) -> Grouping {
    let mut grouping = Grouping::new();
    for tab in tabs {
        let key = tab.effective_url().and_then(domain_key);
        match key {
            Some(key) => grouping.assign(&key, tab.id),
            None => {
                tracing::debug!("Tab {} has no parsable URL, using {UNCATEGORIZED_GROUP}", tab.id);
                grouping.assign(UNCATEGORIZED_GROUP, tab.id)
            }
        };
    }
    grouping
}
