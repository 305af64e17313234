/// What a paginated run does when a data page cannot be fetched or parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFailurePolicy {
    /// Fail the whole run and drop the results of earlier pages.
    ///
    /// This is what existing callers expect: a run either produces a complete report or none.
    #[default]
    Discard,
    /// Stop fetching and return the results of earlier pages, marked as interrupted.
    KeepPartial,
}

/// Ceilings and paging parameters of a paginated observation run.
///
/// Both ceilings are checked after a page has been validated, so they bound how much work is
/// attempted, not how many results the report holds. Fields are only set through the `with_*`
/// builders, which keep every count at one or above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    chunk_size: u64,
    max_pages: u64,
    max_violations: u64,
    /// Fetch page N+1 while page N is being validated.
    prefetch: bool,
    on_page_failure: PageFailurePolicy,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        ValidationLimits {
            chunk_size: 10,
            max_pages: 10,
            max_violations: 20,
            prefetch: false,
            on_page_failure: PageFailurePolicy::Discard,
        }
    }
}

impl ValidationLimits {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_max_violations(mut self, max_violations: u64) -> Self {
        self.max_violations = max_violations.max(1);
        self
    }

    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_page_failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.on_page_failure = policy;
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn max_pages(&self) -> u64 {
        self.max_pages
    }

    pub fn max_violations(&self) -> u64 {
        self.max_violations
    }

    pub fn prefetch(&self) -> bool {
        self.prefetch
    }

    pub fn on_page_failure(&self) -> PageFailurePolicy {
        self.on_page_failure
    }

    /// Upper bound on the number of observations a run inspects.
    pub fn max_observations(&self) -> u64 {
        self.chunk_size.saturating_mul(self.max_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_inspect_at_most_one_hundred_observations() {
        let limits = ValidationLimits::default();
        assert_eq!(limits.max_observations(), 100);
        assert_eq!(limits.on_page_failure(), PageFailurePolicy::Discard);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let limits = ValidationLimits::default()
            .with_chunk_size(0)
            .with_max_pages(0)
            .with_max_violations(0);
        assert_eq!(
            (limits.chunk_size(), limits.max_pages(), limits.max_violations()),
            (1, 1, 1)
        );
        assert_eq!(limits.max_observations(), 1);
    }
}
