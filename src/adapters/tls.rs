//! TLS client configuration for upstream connections.
//!
//! [`TlsTrustPolicy::Verified`] trusts the platform's native roots and checks
//! certificates and hostnames. [`TlsTrustPolicy::Insecure`] accepts any
//! certificate for any name; handshake signatures are still verified against
//! the crypto provider so the session itself stays sound.
use std::sync::Arc;

use eyre::{Result, eyre};
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use rustls_native_certs::load_native_certs;

use crate::core::routes::TlsTrustPolicy;

/// Build the rustls client configuration for a trust policy.
pub fn build_tls_config(policy: TlsTrustPolicy) -> Result<ClientConfig> {
    let provider = crypto_provider();
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| eyre!("Unsupported TLS protocol versions: {e}"))?;

    let config = match policy {
        TlsTrustPolicy::Verified => builder
            .with_root_certificates(native_root_store())
            .with_no_client_auth(),
        TlsTrustPolicy::Insecure => {
            tracing::warn!("Upstream TLS certificate and hostname verification is DISABLED");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
                .with_no_client_auth()
        }
    };

    Ok(config)
}

/// Process default provider if one is installed, aws-lc-rs otherwise.
fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn native_root_store() -> RootCertStore {
    let mut root_cert_store = RootCertStore::empty();
    let native_certs = load_native_certs();

    for cert in native_certs.certs {
        if root_cert_store.add(cert).is_err() {
            tracing::warn!("Failed to add native certificate to rustls RootCertStore");
        }
    }
    tracing::info!("Loaded {} native root certificates.", root_cert_store.len());

    if !native_certs.errors.is_empty() {
        tracing::warn!(
            "Some native certificates failed to load: {:?}",
            native_certs.errors
        );
    }

    root_cert_store
}

/// Certificate verifier that skips chain and name checks.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
