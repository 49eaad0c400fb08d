//! Deployment identity derivation
//!
//! A deployment of a (version, stage) pair for a service is identified by a
//! single `safe_name` shared across the target group, the invoke permission
//! statement, and the function alias. The identity is derived, never stored.

use thiserror::Error;

/// Prefix for invoke-permission statement ids minted by this tool.
///
/// The statement id is the authoritative "already bound" marker, so the
/// prefix must stay stable across releases.
pub const STATEMENT_PREFIX: &str = "AlbBind";

/// Target group names are capped by the load balancer control plane.
const MAX_SAFE_NAME_LEN: usize = 32;

/// Identity derivation errors, raised before any remote mutation
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Sanitization stripped a field down to nothing
    #[error("{0} '{1}' contains no usable characters")]
    Unusable(&'static str, String),

    #[error("deployment name '{name}' is {len} characters, the limit is {MAX_SAFE_NAME_LEN}")]
    NameTooLong { name: String, len: usize },
}

/// The (service, version, stage) triple naming one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentIdentity {
    service: String,
    version: String,
    stage: String,
    safe_name: String,
}

impl DeploymentIdentity {
    /// Derive the identity for a deployment, validating that the resulting
    /// name is usable as a target group name.
    pub fn new(service: &str, version: &str, stage: &str) -> Result<Self, IdentityError> {
        let version_part = sanitize_segment("version", version)?;
        let stage_part = sanitize_segment("stage", stage)?;
        let service_part = sanitize_segment("service name", service)?;

        let safe_name = format!("{version_part}-{stage_part}-{service_part}");
        if safe_name.len() > MAX_SAFE_NAME_LEN {
            return Err(IdentityError::NameTooLong {
                len: safe_name.len(),
                name: safe_name,
            });
        }

        Ok(Self {
            service: service.to_string(),
            version: version.to_string(),
            stage: stage.to_string(),
            safe_name,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Name shared by the target group and the function alias.
    pub fn safe_name(&self) -> &str {
        &self.safe_name
    }

    /// Deterministic id of the invoke-permission statement for this identity.
    pub fn statement_id(&self) -> String {
        format!("{STATEMENT_PREFIX}_{}", self.safe_name.replace('-', "_"))
    }
}

/// Collapse every run of non-alphanumeric characters into a single `-`.
fn sanitize_segment(field: &'static str, raw: &str) -> Result<String, IdentityError> {
    if raw.is_empty() {
        return Err(IdentityError::EmptyField(field));
    }

    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() {
        return Err(IdentityError::Unusable(field, raw.to_string()));
    }
    Ok(out)
}
