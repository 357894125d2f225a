use crate::config::DomainRestriction;

/// Checks if `candidate` is `base` or one of its subdomains
///
/// # Examples
///
/// ```
/// use crawl_engine::url::is_same_or_subdomain;
///
/// assert!(is_same_or_subdomain("example.com", "example.com"));
/// assert!(is_same_or_subdomain("example.com", "blog.example.com"));
/// assert!(is_same_or_subdomain("example.com", "api.v2.example.com"));
/// assert!(!is_same_or_subdomain("example.com", "myexample.com"));
/// ```
pub fn is_same_or_subdomain(base: &str, candidate: &str) -> bool {
    candidate == base
        || candidate
            .strip_suffix(base)
            .is_some_and(|prefix| prefix.ends_with('.') && prefix.len() > 1)
}

/// Applies a domain-restriction policy to a candidate host
///
/// Both hosts are expected to be lowercase already.
pub fn host_in_scope(restriction: DomainRestriction, start_host: &str, candidate: &str) -> bool {
    match restriction {
        DomainRestriction::Same => candidate == start_host,
        DomainRestriction::Subdomains => is_same_or_subdomain(start_host, candidate),
        DomainRestriction::Any => true,
    }
}
