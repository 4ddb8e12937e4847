use async_trait::async_trait;
use certwatch_common::datetime::{format_canonical, now_utc};
use certwatch_common::types::{CertificateFields, CertificateInfo};
use chrono::{DateTime, NaiveDateTime};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

/// Port every probe connects to.
pub const TLS_PORT: u16 = 443;
/// Bound on the TCP connect and on the TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a probe produced no certificate.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Timeout, refused connection, DNS failure or TLS error.
    #[error("cannot connect to {domain}: {source}")]
    Connect {
        domain: String,
        #[source]
        source: io::Error,
    },

    /// The handshake completed but the peer presented no certificate.
    #[error("{domain} returned no certificate")]
    NoCertificate { domain: String },

    /// The leaf certificate could not be decoded.
    #[error("cannot parse certificate of {domain}: {reason}")]
    Parse { domain: String, reason: String },
}

impl ProbeError {
    /// The underlying cause without the domain prefix, as reported per item
    /// in batch results.
    pub fn cause(&self) -> String {
        match self {
            ProbeError::Connect { source, .. } => source.to_string(),
            ProbeError::NoCertificate { .. } => "no certificate returned".to_string(),
            ProbeError::Parse { reason, .. } => reason.clone(),
        }
    }

    fn connect(domain: &str, source: io::Error) -> Self {
        ProbeError::Connect {
            domain: domain.to_string(),
            source,
        }
    }
}

/// Reads the leaf certificate a domain presents on port 443.
///
/// Implementations must not retry; callers decide what to do with failures.
#[async_trait]
pub trait CertificateProbe: Send + Sync {
    async fn probe(&self, domain: &str) -> Result<CertificateInfo, ProbeError>;
}

/// Probe backed by a real TCP + TLS handshake.
///
/// Peer validation is disabled: expired, self-signed and mismatched
/// certificates must still be readable.
pub struct TlsProbe {
    connector: TlsConnector,
    connect_timeout: Duration,
}

impl TlsProbe {
    pub fn new(connect_timeout: Duration) -> Result<Self, rustls::Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = Arc::new(AcceptAnyCertificate {
            schemes: provider
                .signature_verification_algorithms
                .supported_schemes(),
        });
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            connect_timeout,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

#[async_trait]
impl CertificateProbe for TlsProbe {
    async fn probe(&self, domain: &str) -> Result<CertificateInfo, ProbeError> {
        let server_name = ServerName::try_from(domain.to_string()).map_err(|e| {
            ProbeError::connect(domain, io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;

        let addr = format!("{domain}:{TLS_PORT}");
        let timeout_secs = self.connect_timeout.as_secs();

        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                ProbeError::connect(
                    domain,
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connection timed out after {timeout_secs}s"),
                    ),
                )
            })?
            .map_err(|e| ProbeError::connect(domain, e))?;

        let handshake = self.connector.connect(server_name, tcp);
        let tls_stream = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                ProbeError::connect(
                    domain,
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("TLS handshake timed out after {timeout_secs}s"),
                    ),
                )
            })?
            .map_err(|e| ProbeError::connect(domain, e))?;

        let (_io, conn) = tls_stream.get_ref();
        let leaf = conn
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| ProbeError::NoCertificate {
                domain: domain.to_string(),
            })?;

        let info = parse_leaf(domain, leaf.as_ref(), &now_utc())?;
        tracing::debug!(
            domain,
            days_remaining = info.days_remaining,
            status = %info.status,
            "Probed certificate"
        );
        Ok(info)
    }
}

/// Decodes a DER leaf certificate and classifies it against `now`.
pub fn parse_leaf(
    domain: &str,
    der: &[u8],
    now: &NaiveDateTime,
) -> Result<CertificateInfo, ProbeError> {
    let parse_error = |reason: String| ProbeError::Parse {
        domain: domain.to_string(),
        reason,
    };

    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| parse_error(format!("failed to parse X.509 certificate: {e}")))?;

    let not_before = asn1_to_naive(&cert.validity().not_before)
        .ok_or_else(|| parse_error("notBefore out of range".to_string()))?;
    let not_after = asn1_to_naive(&cert.validity().not_after)
        .ok_or_else(|| parse_error("notAfter out of range".to_string()))?;

    let san_domains: Vec<String> = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let fields = CertificateFields {
        domain: domain.to_string(),
        issuer: common_name(cert.issuer()),
        subject: common_name(cert.subject()),
        not_before: format_canonical(&not_before),
        not_after,
        serial_number: cert.tbs_certificate.serial.to_string(),
        // X.509 encodes v3 as 2
        version: cert.version().0 as i32 + 1,
        san_domains,
    };
    Ok(CertificateInfo::classify(fields, now))
}

fn asn1_to_naive(time: &ASN1Time) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(time.to_datetime().unix_timestamp(), 0).map(|dt| dt.naive_utc())
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Accepts every server certificate and handshake signature.
#[derive(Debug)]
struct AcceptAnyCertificate {
    schemes: Vec<SignatureScheme>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_cause_drops_domain_prefix() {
        let err = ProbeError::connect(
            "example.com",
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        );
        assert_eq!(err.to_string(), "cannot connect to example.com: connection refused");
        assert_eq!(err.cause(), "connection refused");

        let err = ProbeError::NoCertificate {
            domain: "example.com".to_string(),
        };
        assert_eq!(err.cause(), "no certificate returned");
    }

    #[test]
    fn parse_leaf_rejects_garbage() {
        let now = now_utc();
        let err = parse_leaf("example.com", b"not a certificate", &now).unwrap_err();
        assert!(matches!(err, ProbeError::Parse { ref domain, .. } if domain == "example.com"));
    }

    #[test]
    fn tls_probe_builds_with_timeout() {
        let probe = TlsProbe::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
        assert_eq!(probe.connect_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_server_name_fails_before_connecting() {
        let probe = TlsProbe::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
        let err = probe.probe("not a domain!").await.unwrap_err();
        match err {
            ProbeError::Connect { domain, source } => {
                assert_eq!(domain, "not a domain!");
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_domain_is_a_connect_error() {
        let probe = TlsProbe::new(Duration::from_secs(2)).unwrap();
        let err = probe.probe("certwatch-does-not-exist.invalid").await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect { .. }), "{err}");
    }
}
