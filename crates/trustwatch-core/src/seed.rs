// crates/trustwatch-core/src/seed.rs
// ============================================================================
// Module: Seed URL Derivation
// Description: Category -> path rules used when a company is created.
// Dependencies: crate::model::Category
// ============================================================================

//! Category -> path rules used when a company is created.

use crate::model::Category;

/// Returns the path suffixes seeded for a given category.
#[must_use]
pub const fn paths_for_category(category: Category) -> &'static [&'static str] {
    match category {
        Category::Security => &["/security", "/trust", "/compliance"],
        Category::Privacy => &["/privacy", "/terms"],
        Category::Sla => &["/sla", "/status"],
        Category::Pricing => &["/pricing"],
    }
}

/// Derives the host to seed targets under from a company's `domain` field.
///
/// The host is `https://{domain}` unless `domain` already contains a path
/// component (a `/` after stripping any scheme), in which case it is used
/// verbatim.
#[must_use]
pub fn seed_host(domain: &str) -> String {
    let without_scheme = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain);
    if without_scheme.contains('/') {
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    } else {
        format!("https://{domain}")
    }
}

/// Derives the deduplicated, order-stable set of seed URLs for a company
/// given its enabled categories.
#[must_use]
pub fn derive_seed_urls(domain: &str, categories: &std::collections::BTreeSet<Category>) -> Vec<String> {
    let host = seed_host(domain);
    let mut urls = Vec::new();
    for category in categories {
        for path in paths_for_category(*category) {
            let url = format!("{host}{path}");
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::derive_seed_urls;
    use super::seed_host;
    use crate::model::Category;

    #[test]
    fn host_defaults_to_https() {
        assert_eq!(seed_host("acme.example"), "https://acme.example");
    }

    #[test]
    fn host_with_path_is_used_verbatim_with_scheme() {
        assert_eq!(
            seed_host("https://acme.example/app"),
            "https://acme.example/app"
        );
    }

    #[test]
    fn host_with_bare_path_gets_https_prefix() {
        assert_eq!(seed_host("acme.example/app"), "https://acme.example/app");
    }

    #[test]
    fn security_and_privacy_categories_union_paths() {
        let mut categories = BTreeSet::new();
        categories.insert(Category::Security);
        categories.insert(Category::Privacy);
        let urls = derive_seed_urls("acme.example", &categories);
        assert_eq!(
            urls,
            vec![
                "https://acme.example/security",
                "https://acme.example/trust",
                "https://acme.example/compliance",
                "https://acme.example/privacy",
                "https://acme.example/terms",
            ]
        );
    }

    #[test]
    fn pricing_category_seeds_single_path() {
        let mut categories = BTreeSet::new();
        categories.insert(Category::Pricing);
        let urls = derive_seed_urls("acme.example", &categories);
        assert_eq!(urls, vec!["https://acme.example/pricing"]);
    }
}
