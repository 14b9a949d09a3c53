//! AbuseIPDB report categories.

/// Known category ids and their labels, sorted by id.
pub const CATEGORIES: &[(u32, &str)] = &[
    (1, "DNS Compromise"),
    (2, "DNS Poisoning"),
    (3, "Fraud Orders"),
    (4, "DDoS Attack"),
    (5, "FTP Brute-Force"),
    (6, "Ping of Death"),
    (7, "Phishing"),
    (8, "Fraud VoIP"),
    (9, "Open Proxy"),
    (10, "Web Spam"),
    (11, "Email Spam"),
    (12, "Blog Spam"),
    (13, "VPN IP"),
    (14, "Port Scan"),
    (15, "Hacking"),
    (16, "SQL Injection"),
    (17, "Spoofing"),
    (18, "Brute-Force"),
    (19, "Bad Web Bot"),
    (20, "Exploited Host"),
    (21, "Web App Attack"),
    (22, "SSH"),
    (23, "IoT Targeted"),
];

/// Look up the label for a category id.
pub fn category_name(id: u32) -> Option<&'static str> {
    CATEGORIES
        .binary_search_by_key(&id, |(k, _)| *k)
        .ok()
        .map(|idx| CATEGORIES[idx].1)
}

/// Render a category as `id (Label)`, or the bare id when unknown.
pub fn describe(id: u32) -> String {
    match category_name(id) {
        Some(name) => format!("{} ({})", id, name),
        None => id.to_string(),
    }
}
