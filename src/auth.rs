use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Certificate container formats the vault accepts for upload.
///
/// Format *parsing* is delegated to the external authentication
/// capability; the core checks only that the artifact carries one of
/// these extensions.
pub const ACCEPTED_CERTIFICATE_CONTAINERS: [&str; 4] = ["p12", "pfx", "pem", "crt"];

/// Which authentication method a credential uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMethod {
    Password,
    Certificate,
}

impl CredentialMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Certificate => "certificate",
        }
    }
}

impl std::fmt::Display for CredentialMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uploaded digital-certificate artifact, treated as an opaque blob.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateArtifact {
    file_name: String,
    bytes: Vec<u8>,
}

impl CertificateArtifact {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercased container extension, if the file name has one.
    #[must_use]
    pub fn container(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl std::fmt::Debug for CertificateArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateArtifact")
            .field("file_name", &self.file_name)
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .finish()
    }
}

/// One authentication attempt.
///
/// Exactly one method is active per attempt (enum by construction); the
/// payload is handed to the external capability and discarded when the
/// call returns. Never persisted, never serialized back out.
#[derive(Clone, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Credential {
    Password { email: String, secret: String },
    Certificate { artifact: CertificateArtifact },
}

impl Credential {
    #[must_use]
    pub fn password(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::Password {
            email: email.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn certificate(artifact: CertificateArtifact) -> Self {
        Self::Certificate { artifact }
    }

    #[must_use]
    pub fn method(&self) -> CredentialMethod {
        match self {
            Self::Password { .. } => CredentialMethod::Password,
            Self::Certificate { .. } => CredentialMethod::Certificate,
        }
    }

    /// Fail-fast input check, performed before any external call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] when a required input is
    /// absent, or [`Error::UnsupportedCertificate`] when the artifact is
    /// not an accepted container format.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Password { email, secret } => {
                if email.trim().is_empty() {
                    return Err(Error::MissingCredential("email"));
                }
                if secret.is_empty() {
                    return Err(Error::MissingCredential("secret"));
                }
                Ok(())
            }
            Self::Certificate { artifact } => {
                if artifact.bytes.is_empty() {
                    return Err(Error::MissingCredential("certificate"));
                }
                match artifact.container() {
                    Some(ext) if ACCEPTED_CERTIFICATE_CONTAINERS.contains(&ext.as_str()) => {
                        Ok(())
                    }
                    _ => Err(Error::UnsupportedCertificate(artifact.file_name.clone())),
                }
            }
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { email, .. } => f
                .debug_struct("Credential::Password")
                .field("email", email)
                .field("secret", &"<redacted>")
                .finish(),
            Self::Certificate { artifact } => f
                .debug_struct("Credential::Certificate")
                .field("artifact", artifact)
                .finish(),
        }
    }
}

/// Outcome reported by the external authentication capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    Accepted,
    Rejected,
}

/// Consumer-provided authentication capability.
///
/// Credential verification itself (password checking, certificate
/// validation) lives behind this trait; the flow only sequences around
/// it. The call is asynchronous with unspecified latency — the flow
/// awaits it and does not advance past `Authenticating` until the
/// verdict is known.
///
/// # Example
///
/// ```rust,ignore
/// impl Authenticator for DirectoryClient {
///     async fn authenticate(
///         &self,
///         credential: &Credential,
///     ) -> Result<AuthVerdict, Box<dyn std::error::Error + Send + Sync>> {
///         let ok = self.verify(credential).await?;
///         Ok(if ok { AuthVerdict::Accepted } else { AuthVerdict::Rejected })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Verify one credential. A transport-level `Err` is treated by the
    /// flow as a rejected-class failure (retryable).
    fn authenticate(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<AuthVerdict, Box<dyn std::error::Error + Send + Sync>>> + Send;
}
