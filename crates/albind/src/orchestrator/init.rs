//! Binding initialization and the provisioning selector
//!
//! Decides between reusing an existing load balancer and creating a new one
//! with its default listener, validates every operator answer before any
//! mutation, optionally creates the function, and persists the binding
//! configuration.

use crate::aws::api::{
    CreateLoadBalancerSpec, FunctionsApi, IamApi, LoadBalancer, LoadBalancingApi, NetworkApi,
};
use crate::aws::inventory::RegionInventory;
use crate::config::{self, BindingConfig, FunctionConfig, DEFAULT_RUNTIME};
use crate::orchestrator::publish;
use crate::template::{self, RouteVars, TemplateError};
use crate::wait::RetryPolicy;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Balancer kind required when reusing an existing balancer
const APPLICATION_KIND: &str = "application";

/// Operator answers consumed by `init`; validation happens here, not at the
/// prompt
#[derive(Debug, Clone)]
pub struct InitAnswers {
    pub load_balancer: String,
    /// Only consulted when the balancer has to be created
    pub subnet_ids: Vec<String>,
    /// Only consulted when the balancer has to be created
    pub security_group_ids: Vec<String>,
    pub service_name: String,
    pub path_template: String,
    pub function_name: String,
    /// Packaging directory, relative to the project directory
    pub package_dir: String,
    /// Entry module file name; the stored module is its stem
    pub entry_module: String,
    /// Create and upload the function immediately
    pub deploy_now: bool,
}

/// Operator input that violates an invariant; raised before any mutation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("at least 2 subnets are required to create a load balancer, got {0}")]
    TooFewSubnets(usize),

    #[error("subnets '{first}' and '{second}' are both in availability zone {zone}; pick one subnet per zone")]
    DuplicateAvailabilityZone {
        first: String,
        second: String,
        zone: String,
    },

    #[error("subnet '{0}' does not exist in this region")]
    UnknownSubnet(String),

    #[error("at least one security group is required to create a load balancer")]
    NoSecurityGroups,

    #[error("security group '{0}' does not exist in this region")]
    UnknownSecurityGroup(String),

    #[error("load balancer '{name}' is of type '{kind}'; only application load balancers can be reused")]
    WrongLoadBalancerKind { name: String, kind: String },

    #[error("rendered route path '{0}' must start with '/'")]
    PathMissingLeadingSlash(String),

    #[error("rendered route path '{0}' must not end with '/'")]
    PathTrailingSlash(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("packaging directory '{0}' does not exist or is not a directory")]
    MissingPackageDir(PathBuf),

    #[error("entry module '{0}' does not exist")]
    MissingEntryModule(PathBuf),
}

/// The provisioning decision for the named balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadBalancerPlan {
    Reuse(LoadBalancer),
    Create(CreateLoadBalancerSpec),
}

/// Check the path template invariant: every substitution must yield a path
/// with a leading slash and no trailing slash.
pub fn validate_path_template(template: &str) -> Result<(), ValidationError> {
    let sample = template::render(
        template,
        &RouteVars {
            service: "service",
            stage: "stage",
            version: "version",
        },
    )?;

    if !sample.starts_with('/') {
        return Err(ValidationError::PathMissingLeadingSlash(sample));
    }
    if sample.ends_with('/') {
        return Err(ValidationError::PathTrailingSlash(sample));
    }
    Ok(())
}

fn validate_subnet_selection(
    inventory: &RegionInventory,
    subnet_ids: &[String],
) -> Result<(), ValidationError> {
    if subnet_ids.len() < 2 {
        return Err(ValidationError::TooFewSubnets(subnet_ids.len()));
    }

    let mut zone_owner: Vec<(&str, &str)> = Vec::new();
    for id in subnet_ids {
        let subnet = inventory
            .subnets
            .get(id)
            .ok_or_else(|| ValidationError::UnknownSubnet(id.clone()))?;

        let zone = subnet.availability_zone.as_str();
        if let Some((first, _)) = zone_owner.iter().find(|(_, z)| *z == zone) {
            return Err(ValidationError::DuplicateAvailabilityZone {
                first: (*first).to_string(),
                second: id.clone(),
                zone: zone.to_string(),
            });
        }
        zone_owner.push((id, zone));
    }
    Ok(())
}

fn validate_security_group_selection(
    inventory: &RegionInventory,
    group_ids: &[String],
) -> Result<(), ValidationError> {
    if group_ids.is_empty() {
        return Err(ValidationError::NoSecurityGroups);
    }
    for id in group_ids {
        if !inventory.security_groups.contains_key(id) {
            return Err(ValidationError::UnknownSecurityGroup(id.clone()));
        }
    }
    Ok(())
}

/// Decide reuse-vs-create for the named balancer, validating the answers
/// against the inventory. Pure decision logic; nothing is created here.
pub fn resolve_load_balancer(
    inventory: &RegionInventory,
    answers: &InitAnswers,
) -> Result<LoadBalancerPlan, ValidationError> {
    match inventory.load_balancers.get(&answers.load_balancer) {
        Some(existing) => {
            if existing.kind != APPLICATION_KIND {
                return Err(ValidationError::WrongLoadBalancerKind {
                    name: existing.name.clone(),
                    kind: existing.kind.clone(),
                });
            }
            Ok(LoadBalancerPlan::Reuse(existing.clone()))
        }
        None => {
            validate_subnet_selection(inventory, &answers.subnet_ids)?;
            validate_security_group_selection(inventory, &answers.security_group_ids)?;
            Ok(LoadBalancerPlan::Create(CreateLoadBalancerSpec {
                name: answers.load_balancer.clone(),
                subnet_ids: answers.subnet_ids.clone(),
                security_group_ids: answers.security_group_ids.clone(),
            }))
        }
    }
}

/// Initialize the binding for a project: resolve or provision the balancer,
/// optionally create the function, and persist the configuration.
pub async fn initialize(
    project_dir: &Path,
    region: &str,
    answers: &InitAnswers,
    elb: &impl LoadBalancingApi,
    network: &impl NetworkApi,
    iam: &impl IamApi,
    functions: &impl FunctionsApi,
    retry: &RetryPolicy,
) -> Result<BindingConfig> {
    if config::load_binding(project_dir)?.is_some() {
        bail!(
            "project '{}' already has a binding configuration",
            project_dir.display()
        );
    }

    validate_path_template(&answers.path_template)?;

    let package_dir = project_dir.join(&answers.package_dir);
    if !package_dir.is_dir() {
        return Err(ValidationError::MissingPackageDir(package_dir).into());
    }
    let entry_path = package_dir.join(&answers.entry_module);
    if !entry_path.is_file() {
        return Err(ValidationError::MissingEntryModule(entry_path).into());
    }
    let module = Path::new(&answers.entry_module)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| answers.entry_module.clone());

    info!(region = %region, "Loading current resource state");
    let inventory = RegionInventory::load(region, elb, network).await?;

    let plan = match resolve_load_balancer(&inventory, answers) {
        Ok(plan) => plan,
        Err(e) => {
            if matches!(e, ValidationError::TooFewSubnets(_)) {
                let candidates = inventory.default_vpc_subnets();
                if !candidates.is_empty() {
                    info!(
                        "Default VPC subnets available: {}",
                        candidates
                            .iter()
                            .map(|s| format!("{} ({})", s.id, s.availability_zone))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
            }
            return Err(e.into());
        }
    };

    let load_balancer = match plan {
        LoadBalancerPlan::Reuse(existing) => {
            info!(name = %existing.name, "Reusing existing load balancer");
            if !answers.subnet_ids.is_empty() || !answers.security_group_ids.is_empty() {
                warn!("Subnet and security group selections are ignored when reusing a balancer");
            }
            existing
        }
        LoadBalancerPlan::Create(spec) => {
            let created = elb.create_load_balancer(&spec).await?;
            elb.create_default_listener(&created.arn).await?;
            created
        }
    };

    let mut lambda = FunctionConfig {
        role: String::new(),
        name: answers.function_name.clone(),
        module,
        dir: answers.package_dir.clone(),
        runtime: DEFAULT_RUNTIME.to_string(),
    };

    if answers.deploy_now {
        let stack =
            publish::create_function_stack(iam, functions, &lambda, &package_dir, retry).await?;
        lambda.role = stack.role_arn;
    }

    let binding = BindingConfig {
        service_name: answers.service_name.clone(),
        path_template: answers.path_template.clone(),
        load_balancer: load_balancer.name.clone(),
        region: region.to_string(),
        lambda,
    };

    info!("Saving binding configuration");
    config::store_binding(project_dir, &binding)?;
    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::api::{SecurityGroup, Subnet};

    fn inventory() -> RegionInventory {
        let mut inv = RegionInventory {
            region: "us-east-1".to_string(),
            ..RegionInventory::default()
        };
        for (id, zone) in [
            ("subnet-a", "us-east-1a"),
            ("subnet-b", "us-east-1b"),
            ("subnet-c", "us-east-1a"),
        ] {
            inv.subnets.insert(
                id.to_string(),
                Subnet {
                    id: id.to_string(),
                    vpc_id: "vpc-default".to_string(),
                    availability_zone: zone.to_string(),
                },
            );
        }
        inv.security_groups.insert(
            "sg-1".to_string(),
            SecurityGroup {
                id: "sg-1".to_string(),
                name: "default".to_string(),
                vpc_id: "vpc-default".to_string(),
            },
        );
        inv.load_balancers.insert(
            "edge".to_string(),
            LoadBalancer {
                name: "edge".to_string(),
                arn: "arn:lb/edge".to_string(),
                dns_name: "edge.example.com".to_string(),
                kind: "application".to_string(),
            },
        );
        inv.load_balancers.insert(
            "tcp-edge".to_string(),
            LoadBalancer {
                name: "tcp-edge".to_string(),
                arn: "arn:lb/tcp-edge".to_string(),
                dns_name: "tcp.example.com".to_string(),
                kind: "network".to_string(),
            },
        );
        inv
    }

    fn answers(lb: &str, subnets: &[&str], groups: &[&str]) -> InitAnswers {
        InitAnswers {
            load_balancer: lb.to_string(),
            subnet_ids: subnets.iter().map(|s| s.to_string()).collect(),
            security_group_ids: groups.iter().map(|s| s.to_string()).collect(),
            service_name: "orders".to_string(),
            path_template: "/{service}/{stage}/{version}".to_string(),
            function_name: "orders".to_string(),
            package_dir: "dist".to_string(),
            entry_module: "index.js".to_string(),
            deploy_now: true,
        }
    }

    #[test]
    fn reuses_existing_application_balancer() {
        let plan = resolve_load_balancer(&inventory(), &answers("edge", &[], &[])).unwrap();
        assert!(matches!(plan, LoadBalancerPlan::Reuse(lb) if lb.name == "edge"));
    }

    #[test]
    fn rejects_non_application_balancer() {
        let err = resolve_load_balancer(&inventory(), &answers("tcp-edge", &[], &[])).unwrap_err();
        assert!(matches!(err, ValidationError::WrongLoadBalancerKind { kind, .. } if kind == "network"));
    }

    #[test]
    fn plans_creation_for_unknown_balancer() {
        let plan = resolve_load_balancer(
            &inventory(),
            &answers("fresh", &["subnet-a", "subnet-b"], &["sg-1"]),
        )
        .unwrap();
        match plan {
            LoadBalancerPlan::Create(spec) => {
                assert_eq!(spec.name, "fresh");
                assert_eq!(spec.subnet_ids, vec!["subnet-a", "subnet-b"]);
                assert_eq!(spec.security_group_ids, vec!["sg-1"]);
            }
            other => panic!("expected creation plan, got {other:?}"),
        }
    }

    #[test]
    fn rejects_fewer_than_two_subnets() {
        let err =
            resolve_load_balancer(&inventory(), &answers("fresh", &["subnet-a"], &["sg-1"]))
                .unwrap_err();
        assert!(matches!(err, ValidationError::TooFewSubnets(1)));
    }

    #[test]
    fn rejects_subnets_sharing_an_availability_zone() {
        let err = resolve_load_balancer(
            &inventory(),
            &answers("fresh", &["subnet-a", "subnet-c"], &["sg-1"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DuplicateAvailabilityZone { zone, .. } if zone == "us-east-1a"
        ));
    }

    #[test]
    fn rejects_unknown_subnets_and_groups() {
        let err = resolve_load_balancer(
            &inventory(),
            &answers("fresh", &["subnet-a", "subnet-x"], &["sg-1"]),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownSubnet(id) if id == "subnet-x"));

        let err = resolve_load_balancer(
            &inventory(),
            &answers("fresh", &["subnet-a", "subnet-b"], &[]),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NoSecurityGroups));

        let err = resolve_load_balancer(
            &inventory(),
            &answers("fresh", &["subnet-a", "subnet-b"], &["sg-404"]),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownSecurityGroup(id) if id == "sg-404"));
    }

    #[test]
    fn path_template_invariants() {
        validate_path_template("/{service}/{stage}/{version}").unwrap();
        validate_path_template("/api/{stage}").unwrap();

        assert!(matches!(
            validate_path_template("{service}/{stage}"),
            Err(ValidationError::PathMissingLeadingSlash(_))
        ));
        assert!(matches!(
            validate_path_template("/{service}/"),
            Err(ValidationError::PathTrailingSlash(_))
        ));
        assert!(matches!(
            validate_path_template("/{service}/{env}"),
            Err(ValidationError::Template(TemplateError::UnknownPlaceholder(_)))
        ));
    }
}
