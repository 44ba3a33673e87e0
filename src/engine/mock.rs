//! Scripted engine for tests, built with the `mock` feature

use super::{EngineFailure, EngineRequest, ExtractionEngine, FetchOutcome, MediaMetadata};
use crate::core::Persona;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// What a scripted fetch does for a persona
#[derive(Debug, Clone)]
pub enum MockFetch {
    /// Write a small file with extension `ext`, optionally reporting its path
    Write { ext: String, report: bool },
    /// Fail with this engine message
    Fail(String),
    /// Report success without producing a file
    Silent,
}

impl Default for MockFetch {
    fn default() -> Self {
        MockFetch::Write {
            ext: "mp4".to_string(),
            report: true,
        }
    }
}

/// One recorded engine invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Probe(Persona),
    Fetch(Persona),
}

/// Engine whose replies are scripted per persona
#[derive(Default)]
pub struct MockEngine {
    probes: Mutex<HashMap<Persona, Result<MediaMetadata, String>>>,
    fetches: Mutex<HashMap<Persona, MockFetch>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the probe reply for `persona`
    pub fn on_probe(self, persona: Persona, reply: Result<MediaMetadata, String>) -> Self {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(persona, reply);
        self
    }

    /// Script the fetch behavior for `persona`
    pub fn on_fetch(self, persona: Persona, fetch: MockFetch) -> Self {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(persona, fetch);
        self
    }

    /// Every invocation so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of probe invocations so far
    pub fn probe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, MockCall::Probe(_)))
            .count()
    }

    fn record(&self, call: MockCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl ExtractionEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(
        &self,
        _url: &str,
        request: &EngineRequest,
    ) -> Result<MediaMetadata, EngineFailure> {
        self.record(MockCall::Probe(request.persona));

        let reply = self
            .probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.persona)
            .cloned();

        match reply {
            Some(Ok(metadata)) => Ok(metadata),
            Some(Err(message)) => Err(EngineFailure::Reported(message)),
            None => Err(EngineFailure::Reported("no scripted reply".to_string())),
        }
    }

    async fn fetch(
        &self,
        _url: &str,
        request: &EngineRequest,
    ) -> Result<FetchOutcome, EngineFailure> {
        self.record(MockCall::Fetch(request.persona));

        let fetch = self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.persona)
            .cloned()
            .unwrap_or_default();

        match fetch {
            MockFetch::Fail(message) => Err(EngineFailure::Reported(message)),
            MockFetch::Silent => Ok(FetchOutcome::default()),
            MockFetch::Write { ext, report } => {
                let template = request
                    .output_template
                    .as_ref()
                    .ok_or_else(|| EngineFailure::Output("no output template".to_string()))?;
                let path = PathBuf::from(template.to_string_lossy().replace("%(ext)s", &ext));
                std::fs::write(&path, b"mock media payload")?;

                Ok(FetchOutcome {
                    reported_path: report.then_some(path),
                })
            }
        }
    }
}
