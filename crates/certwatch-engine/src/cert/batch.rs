use certwatch_common::types::CertificateInfo;
use certwatch_storage::CertStore;
use std::sync::{Arc, Mutex};

use super::checker::{CertificateProbe, ProbeError};

/// A successful probe together with the outcome of recording it.
#[derive(Debug, Clone)]
pub struct RecordedCheck {
    pub certificate: CertificateInfo,
    /// Set when the history append failed. The probe result stays valid.
    pub history_warning: Option<String>,
}

/// Probes `domain` and appends the result to history.
///
/// Shared by single and batch checks so both record identically. A storage
/// failure is downgraded to [`RecordedCheck::history_warning`].
pub async fn check_and_record(
    probe: &dyn CertificateProbe,
    store: &CertStore,
    domain: &str,
) -> Result<RecordedCheck, ProbeError> {
    let certificate = probe.probe(domain).await?;

    let history_warning = match store.append_history(&certificate) {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(domain, error = %e, "Failed to save certificate to history");
            Some(e.to_string())
        }
    };

    Ok(RecordedCheck {
        certificate,
        history_warning,
    })
}

/// Splits newline-separated input into domains. Lines are trimmed and blank
/// lines dropped; there is no comment syntax.
pub fn parse_domain_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub success: bool,
    pub total: usize,
    /// Successful probes in completion order.
    pub results: Vec<CertificateInfo>,
    /// One `"<domain>: <error>"` line per failed domain.
    pub errors: Vec<String>,
}

#[derive(Default)]
struct BatchAccumulator {
    results: Vec<CertificateInfo>,
    errors: Vec<String>,
}

/// Probes many domains at once, one task per domain, and waits for all of
/// them before returning.
pub struct BatchOrchestrator {
    store: Arc<CertStore>,
    probe: Arc<dyn CertificateProbe>,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<CertStore>, probe: Arc<dyn CertificateProbe>) -> Self {
        Self { store, probe }
    }

    pub async fn check_batch(&self, text: &str) -> BatchResult {
        let domains = parse_domain_list(text);
        self.check_domains(domains).await
    }

    pub async fn check_domains(&self, domains: Vec<String>) -> BatchResult {
        let total = domains.len();
        if total == 0 {
            return BatchResult::default();
        }

        tracing::info!(count = total, "Checking certificates in batch");

        let accumulator = Arc::new(Mutex::new(BatchAccumulator::default()));
        let mut handles = Vec::with_capacity(total);

        for domain in domains {
            let store = self.store.clone();
            let probe = self.probe.clone();
            let accumulator = accumulator.clone();
            let task_domain = domain.clone();

            let handle = tokio::spawn(async move {
                let outcome = check_and_record(probe.as_ref(), &store, &task_domain).await;

                let mut acc = accumulator.lock().unwrap_or_else(|p| p.into_inner());
                match outcome {
                    Ok(recorded) => {
                        tracing::debug!(
                            domain = %task_domain,
                            days_remaining = recorded.certificate.days_remaining,
                            "Batch certificate checked"
                        );
                        acc.results.push(recorded.certificate);
                    }
                    Err(e) => {
                        tracing::warn!(
                            domain = %task_domain,
                            error = %e,
                            "Batch certificate check failed"
                        );
                        acc.errors.push(format!("{task_domain}: {}", e.cause()));
                    }
                }
            });

            handles.push((domain, handle));
        }

        for (domain, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(domain = %domain, error = %e, "Certificate check task panicked");
                let mut acc = accumulator.lock().unwrap_or_else(|p| p.into_inner());
                acc.errors.push(format!("{domain}: check aborted: {e}"));
            }
        }

        let mut acc = accumulator.lock().unwrap_or_else(|p| p.into_inner());
        let results = std::mem::take(&mut acc.results);
        let errors = std::mem::take(&mut acc.errors);

        tracing::info!(
            total,
            succeeded = results.len(),
            failed = errors.len(),
            "Batch certificate check finished"
        );

        BatchResult {
            success: !results.is_empty(),
            total,
            results,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_domain_list_trims_and_drops_blanks() {
        let domains = parse_domain_list("  a.com \n\n\tb.com\n   \n#c.com\n");
        assert_eq!(domains, vec!["a.com", "b.com", "#c.com"]);
    }

    #[test]
    fn parse_domain_list_handles_crlf() {
        assert_eq!(parse_domain_list("a.com\r\nb.com\r\n"), vec!["a.com", "b.com"]);
    }

    #[test]
    fn parse_domain_list_empty_input() {
        assert!(parse_domain_list("").is_empty());
        assert!(parse_domain_list(" \n \n").is_empty());
    }
}
