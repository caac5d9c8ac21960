//! Discovery contracts: sources yield candidates, candidates resolve into a
//! registration or ask to be retried once another type is discovered.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::deferral::Dependency;
use crate::descriptor::ComponentRegistration;
use crate::error::CallbackError;
use crate::manager::ModuleManager;

/// Result of resolving a candidate.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The candidate is ready to register.
    Ready(ComponentRegistration),
    /// Retry after the named type has been discovered.
    Defer(Dependency),
}

/// A component source that may not be resolvable yet.
pub trait ComponentCandidate: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Resolves the candidate. May call engine services through the context.
    fn resolve(&self, context: &DiscoveryContext<'_>) -> Result<Resolution, CallbackError>;
}

/// Yields candidates in discovery order.
pub trait DiscoverySource {
    fn candidates(&self) -> Vec<Arc<dyn ComponentCandidate>>;
}

/// What a candidate can see while resolving.
pub struct DiscoveryContext<'a> {
    manager: &'a ModuleManager,
    candidate: &'a str,
}

impl<'a> DiscoveryContext<'a> {
    pub(crate) fn new(manager: &'a ModuleManager, candidate: &'a str) -> Self {
        Self { manager, candidate }
    }

    /// The engine performing discovery.
    pub fn manager(&self) -> &ModuleManager {
        self.manager
    }

    /// Name of the candidate being resolved.
    pub fn candidate(&self) -> &str {
        self.candidate
    }

    /// Returns `Some(dependency)` to defer on when `component_type` has not
    /// been discovered yet.
    pub fn require_discovered(&self, component_type: &str) -> Option<Dependency> {
        self.manager.require_discovered(component_type)
    }
}

/// A registration is its own always-ready candidate.
impl ComponentCandidate for ComponentRegistration {
    fn name(&self) -> &str {
        self.component_type()
    }

    fn resolve(&self, _context: &DiscoveryContext<'_>) -> Result<Resolution, CallbackError> {
        Ok(Resolution::Ready(self.clone()))
    }
}

/// A fixed, ordered list of candidates.
#[derive(Clone, Default)]
pub struct StaticSource {
    candidates: Vec<Arc<dyn ComponentCandidate>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candidate.
    pub fn with(mut self, candidate: Arc<dyn ComponentCandidate>) -> Self {
        self.candidates.push(candidate);
        self
    }

    /// Appends several candidates.
    pub fn extend(mut self, candidates: impl IntoIterator<Item = Arc<dyn ComponentCandidate>>) -> Self {
        self.candidates.extend(candidates);
        self
    }
}

impl DiscoverySource for StaticSource {
    fn candidates(&self) -> Vec<Arc<dyn ComponentCandidate>> {
        self.candidates.clone()
    }
}

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    /// Types registered during the pass, in registration order.
    pub discovered: Vec<String>,
    /// Candidates still waiting, with what they wait for.
    pub deferred: BTreeMap<String, Dependency>,
    /// Candidates skipped because resolution failed.
    pub failed: BTreeMap<String, String>,
}

impl DiscoveryReport {
    /// Returns whether every candidate was registered.
    pub fn is_complete(&self) -> bool {
        self.deferred.is_empty() && self.failed.is_empty()
    }
}
