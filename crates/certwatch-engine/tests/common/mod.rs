#![allow(dead_code)]

use async_trait::async_trait;
use certwatch_common::datetime::{format_canonical, now_utc};
use certwatch_common::types::{CertificateFields, CertificateInfo};
use certwatch_engine::{CertWatchApp, CertificateProbe, ProbeError};
use certwatch_storage::CertStore;
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Probe with canned answers: a known domain yields a certificate expiring
/// in the configured number of days, anything else is refused.
pub struct ScriptedProbe {
    days_by_domain: HashMap<String, i64>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new(entries: &[(&str, i64)]) -> Self {
        Self {
            days_by_domain: entries
                .iter()
                .map(|(domain, days)| (domain.to_string(), *days))
                .collect(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateProbe for ScriptedProbe {
    async fn probe(&self, domain: &str) -> Result<CertificateInfo, ProbeError> {
        self.calls.lock().unwrap().push(domain.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let days = *self.days_by_domain.get(domain).ok_or_else(|| ProbeError::Connect {
            domain: domain.to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        })?;

        let now = now_utc();
        // One hour past the day boundary keeps the floored day count stable.
        let not_after = now + ChronoDuration::days(days) + ChronoDuration::hours(1);
        let fields = CertificateFields {
            domain: domain.to_string(),
            issuer: "Scripted CA".to_string(),
            subject: domain.to_string(),
            not_before: format_canonical(&(now - ChronoDuration::days(30))),
            not_after,
            serial_number: "42".to_string(),
            version: 3,
            san_domains: vec![domain.to_string()],
        };
        Ok(CertificateInfo::classify(fields, &now))
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<CertStore>,
    pub probe: Arc<ScriptedProbe>,
    pub app: CertWatchApp,
}

pub fn build_test_context(probe: ScriptedProbe) -> TestContext {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(CertStore::new(temp_dir.path()).unwrap());
    let probe = Arc::new(probe);
    let app = CertWatchApp::new(store.clone(), probe.clone());
    TestContext {
        temp_dir,
        store,
        probe,
        app,
    }
}
