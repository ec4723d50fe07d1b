//! Element resolution pipeline
//!
//! Turns an element description into a selector that matches on the current
//! page. Strategies run in order and stop at the first match:
//!
//! 1. the persistent cache, verified against the live page
//! 2. heuristic XPath templates from [`crate::xpath`]
//! 3. one LLM call through [`ElementDetector`]
//!
//! Heuristic and AI successes are written back to the cache.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::ai_client::ElementDetector;
use crate::cache::{CacheEntry, ElementCache};
use crate::page::PageDriver;
use crate::types::{ResolutionSource, Selector};
use crate::xpath;

/// A selector that matched, and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub selector: Selector,
    pub source: ResolutionSource,
}

/// Per-run resolution counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverStats {
    pub lookups: usize,
    pub cache_hits: usize,
    pub heuristic_hits: usize,
    pub ai_calls: usize,
    pub ai_hits: usize,
    pub misses: usize,
    pub stale_evictions: usize,
}

pub struct SelectorResolver {
    cache: ElementCache,
    detector: Option<ElementDetector>,
    stats: ResolverStats,
}

/// True when the selector matches at least one element. Evaluation errors
/// (malformed expressions) count as no match.
async fn matches(page: &dyn PageDriver, selector: &Selector) -> bool {
    match page.count(selector).await {
        Ok(n) => {
            debug!("{} matched {} element(s)", selector, n);
            n > 0
        }
        Err(e) => {
            debug!("{} could not be evaluated: {:#}", selector, e);
            false
        }
    }
}

impl SelectorResolver {
    /// `detector` is `None` when the AI fallback is disabled
    pub fn new(cache: ElementCache, detector: Option<ElementDetector>) -> Self {
        SelectorResolver {
            cache,
            detector,
            stats: ResolverStats::default(),
        }
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    pub fn cache(&self) -> &ElementCache {
        &self.cache
    }

    pub fn ai_enabled(&self) -> bool {
        self.detector.is_some()
    }

    /// Find a selector for `description` on the page's current URL.
    ///
    /// Returns `Ok(None)` when every strategy misses. Errors come only from
    /// the page itself (reading the URL or the page source).
    pub async fn resolve(
        &mut self,
        page: &dyn PageDriver,
        description: &str,
    ) -> Result<Option<Resolution>> {
        self.stats.lookups += 1;
        let url = page.current_url().await?;
        let mut tried: HashSet<Selector> = HashSet::new();

        let cached = self
            .cache
            .get(&url, description)
            .map(CacheEntry::to_selector);
        if let Some(selector) = cached {
            if matches(page, &selector).await {
                self.stats.cache_hits += 1;
                info!("Using cached selector for '{}': {}", description, selector);
                return Ok(Some(Resolution {
                    selector,
                    source: ResolutionSource::Cache,
                }));
            }
            warn!(
                "Cached selector for '{}' no longer matches, evicting: {}",
                description, selector
            );
            self.cache.remove(&url, description);
            self.stats.stale_evictions += 1;
            tried.insert(selector);
        }

        for selector in xpath::candidates(description) {
            if !tried.insert(selector.clone()) {
                continue;
            }
            if matches(page, &selector).await {
                self.stats.heuristic_hits += 1;
                info!("Found element with heuristic for '{}': {}", description, selector);
                self.cache
                    .set(&url, description, &selector, ResolutionSource::Heuristic);
                return Ok(Some(Resolution {
                    selector,
                    source: ResolutionSource::Heuristic,
                }));
            }
        }

        let Some(detector) = &self.detector else {
            debug!("AI fallback disabled, giving up on '{}'", description);
            self.stats.misses += 1;
            return Ok(None);
        };

        info!("Using {} to find element: {}", detector.provider_name(), description);
        self.stats.ai_calls += 1;
        let html = page.page_source().await?;
        let analysis = detector.find_selector(&html, description, &url).await;
        if let Some(error) = &analysis.error {
            debug!("AI analysis reported: {}", error);
        }

        for selector in analysis.ranked() {
            if !tried.insert(selector.clone()) {
                continue;
            }
            if matches(page, &selector).await {
                self.stats.ai_hits += 1;
                info!("AI found element for '{}': {}", description, selector);
                self.cache.set(&url, description, &selector, ResolutionSource::Ai);
                return Ok(Some(Resolution {
                    selector,
                    source: ResolutionSource::Ai,
                }));
            }
        }

        warn!("Could not find element: {}", description);
        self.stats.misses += 1;
        Ok(None)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;
