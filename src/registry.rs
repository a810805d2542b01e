//! Parser Registry — detects a line's originating vendor and resolves the
//! parser to run against it.
//!
//! Kept as a sorted `Vec` rebuilt on mutation rather than a max-heap:
//! mutations (vendor registration) are rare, lookups are frequent, and a
//! `Vec` keeps the priority order directly observable for debugging (see
//! design note in SPEC_FULL.md §9).

use std::sync::{Mutex, MutexGuard};

use crate::errors::RegistryError;
use crate::events::Event;

/// The reserved pseudo-vendor identifier; cannot be registered.
pub const AUTO_VENDOR: &str = "auto";

/// A vendor parser: detects whether a line belongs to it, and translates
/// matching lines into normalized events.
pub trait VendorParser: Send + Sync {
    /// Stable, short, lowercase vendor identifier.
    fn vendor(&self) -> &str;

    /// Fast, pure, cheap predicate. Must never panic or propagate a
    /// failure — any internal error is equivalent to `false`.
    fn detect(&self, line: &str) -> bool;

    /// Translate one line into zero or more normalized events.
    fn parse(&self, line: &str) -> Result<Vec<Event>, crate::errors::ParseError>;

    /// Optional parser version string.
    fn version(&self) -> Option<&str> {
        None
    }

    /// Optional list of supported upstream source versions.
    fn supported_versions(&self) -> &[&str] {
        &[]
    }

    /// Optional documentation reference.
    fn doc_url(&self) -> Option<&str> {
        None
    }

    /// Confidence-scored detection (§4.B.1 `detectVendorWithConfidence`).
    /// Advisory beyond monotonicity: stronger structural matches should
    /// yield higher confidence. Returns `None` if this vendor does not
    /// match at all. The default implementation rewards a clean JSON parse
    /// plus a passing `detect`; vendors with a free-text fallback (Gemini)
    /// override this to report a low, fixed confidence for that case.
    fn confidence(&self, line: &str) -> Option<(f64, String)> {
        if !self.detect(line) {
            return None;
        }
        if serde_json::from_str::<serde_json::Value>(line).is_ok() {
            Some((0.9, "valid JSON with a recognized discriminator".to_string()))
        } else {
            Some((0.5, "matched a cheap structural heuristic".to_string()))
        }
    }
}

struct RegistryEntry {
    parser: Box<dyn VendorParser>,
    priority: f64,
    /// Monotonic insertion counter, used as the tie-break within equal
    /// priority (stable, not re-randomized on re-registration of *other*
    /// vendors).
    inserted_at: u64,
}

/// The result of a confidence-scored detection (§4.B.1
/// `detectVendorWithConfidence`). Advisory beyond monotonicity — callers
/// should not branch on the exact number (SPEC_FULL OQ-2).
pub struct Confidence {
    pub vendor: String,
    pub confidence: f64,
    pub reason: String,
}

/// The priority-ordered collection of vendor parsers.
pub struct ParserRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
    next_insertion: Mutex<u64>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Number of leading lines inspected by [`Self::detect_vendor_multi_line`]
    /// (SPEC_FULL OQ-3).
    pub const MULTI_LINE_DETECTION_WINDOW: usize = 10;

    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_insertion: Mutex::new(0),
        }
    }

    /// A registry pre-loaded with the three built-in vendor parsers at
    /// their default priorities (Claude 100, Amp 80, Gemini 10).
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry
            .register(Box::new(crate::vendors::claude::ClaudeParser::default()), 100.0)
            .expect("default vendor registration cannot fail");
        registry
            .register(Box::new(crate::vendors::amp::AmpParser::default()), 80.0)
            .expect("default vendor registration cannot fail");
        registry
            .register(Box::new(crate::vendors::gemini::GeminiParser::default()), 10.0)
            .expect("default vendor registration cannot fail");
        registry
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RegistryEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a parser at the given priority. Replaces any prior entry
    /// for the same vendor identifier (insertion order for the tie-break
    /// is *not* reset by a replace — this crate treats a replace as keeping
    /// the original slot's relative position stable among same-priority
    /// peers; see `register` test for the observable behavior).
    pub fn register(
        &self,
        parser: Box<dyn VendorParser>,
        priority: f64,
    ) -> Result<(), RegistryError> {
        let vendor = parser.vendor().trim().to_string();
        if vendor.is_empty() {
            return Err(RegistryError::EmptyVendor);
        }
        if vendor == AUTO_VENDOR {
            return Err(RegistryError::ReservedVendor);
        }
        if !priority.is_finite() {
            return Err(RegistryError::NonFinitePriority);
        }

        let mut next_insertion = self.next_insertion.lock().unwrap_or_else(|e| e.into_inner());
        let inserted_at = *next_insertion;
        *next_insertion += 1;
        drop(next_insertion);

        let mut entries = self.lock();
        entries.retain(|e| e.parser.vendor() != vendor);
        entries.push(RegistryEntry {
            parser,
            priority,
            inserted_at,
        });
        // Descending priority, then ascending insertion order.
        entries.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap()
                .then(a.inserted_at.cmp(&b.inserted_at))
        });
        Ok(())
    }

    /// Remove a vendor's entry. No-op if absent.
    pub fn unregister(&self, vendor: &str) {
        self.lock().retain(|e| e.parser.vendor() != vendor);
    }

    /// Run a closure with direct access to a registered vendor's parser.
    pub fn get<T>(&self, vendor: &str, f: impl FnOnce(&dyn VendorParser) -> T) -> Option<T> {
        let entries = self.lock();
        entries
            .iter()
            .find(|e| e.parser.vendor() == vendor)
            .map(|e| f(e.parser.as_ref()))
    }

    pub fn is_registered(&self, vendor: &str) -> bool {
        self.lock().iter().any(|e| e.parser.vendor() == vendor)
    }

    pub fn registered_vendors(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.parser.vendor().to_string()).collect()
    }

    /// Try parsers in descending-priority order; the first whose `detect`
    /// returns `true` wins. Parsers must uphold "never throw", but a
    /// third-party `detect` that panics anyway is caught and logged at
    /// debug rather than poisoning detection for every vendor behind it
    /// (§4.B.1 `DetectProbeError`); detection continues with the next
    /// parser.
    pub fn detect_vendor(&self, line: &str) -> Option<String> {
        let entries = self.lock();
        for entry in entries.iter() {
            let parser = entry.parser.as_ref();
            let matched = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| parser.detect(line)));
            match matched {
                Ok(true) => return Some(parser.vendor().to_string()),
                Ok(false) => {}
                Err(_) => {
                    tracing::debug!(vendor = parser.vendor(), "detect() panicked, skipping vendor");
                }
            }
        }
        None
    }

    /// Analyze up to [`Self::MULTI_LINE_DETECTION_WINDOW`] lines and return
    /// the vendor with the most positive detections; ties broken by
    /// priority, then insertion order.
    pub fn detect_vendor_multi_line(&self, lines: &[&str]) -> Option<String> {
        let window = &lines[..lines.len().min(Self::MULTI_LINE_DETECTION_WINDOW)];
        let entries = self.lock();
        let mut best: Option<(usize, &RegistryEntry)> = None;
        for entry in entries.iter() {
            let count = window.iter().filter(|l| entry.parser.detect(l)).count();
            if count == 0 {
                continue;
            }
            match best {
                Some((best_count, _)) if count <= best_count => {}
                _ => best = Some((count, entry)),
            }
        }
        best.map(|(_, entry)| entry.parser.vendor().to_string())
    }

    /// Higher-layer heuristic: each registered vendor scores the line, and
    /// the registry reports the single best result.
    pub fn detect_vendor_with_confidence(&self, line: &str) -> Option<Confidence> {
        let entries = self.lock();
        entries
            .iter()
            .filter_map(|entry| {
                entry.parser.confidence(line).map(|(confidence, reason)| Confidence {
                    vendor: entry.parser.vendor().to_string(),
                    confidence,
                    reason,
                })
            })
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
    }

    /// Resolve an explicit vendor (must be registered) or auto-detect
    /// against `sample_line`.
    pub fn select(
        &self,
        vendor: Option<&str>,
        sample_line: Option<&str>,
    ) -> Result<String, RegistryError> {
        match vendor {
            Some(v) if v != AUTO_VENDOR => {
                if self.is_registered(v) {
                    Ok(v.to_string())
                } else {
                    Err(RegistryError::UnknownVendor(v.to_string()))
                }
            }
            _ => {
                let Some(line) = sample_line else {
                    return Err(RegistryError::NoSampleLine);
                };
                self.detect_vendor(line)
                    .ok_or_else(|| RegistryError::DetectionFailed(truncate(line, 80)))
            }
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let boundary = s
        .char_indices()
        .take_while(|(i, _)| *i < max_len)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!("{}...", &s[..boundary])
}
