//! Region resource inventory
//!
//! A read-only snapshot of the load balancers, subnets, security groups, and
//! VPCs visible in a region, indexed for the provisioning decision. Loading
//! performs no retries; a failed read surfaces which collection failed and
//! the caller decides what to do.

use crate::aws::api::{LoadBalancer, LoadBalancingApi, NetworkApi, SecurityGroup, Subnet, Vpc};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// A transport or read failure while snapshotting a region
#[derive(Debug, Error)]
#[error("failed to fetch {what} inventory for region {region}")]
pub struct InventoryFetchError {
    pub what: &'static str,
    pub region: String,
    #[source]
    pub source: anyhow::Error,
}

impl InventoryFetchError {
    fn new(what: &'static str, region: &str, source: anyhow::Error) -> Self {
        Self {
            what,
            region: region.to_string(),
            source,
        }
    }
}

/// Snapshot of existing resources in one region
#[derive(Debug, Default)]
pub struct RegionInventory {
    pub region: String,
    /// Load balancers by name
    pub load_balancers: BTreeMap<String, LoadBalancer>,
    /// Subnets by id
    pub subnets: BTreeMap<String, Subnet>,
    /// Security groups by id
    pub security_groups: BTreeMap<String, SecurityGroup>,
    /// VPCs by id
    pub vpcs: BTreeMap<String, Vpc>,
    /// Id of the region's default VPC, when one exists
    pub default_vpc: Option<String>,
}

impl RegionInventory {
    /// Snapshot the region. Pure read; no resource is created or modified.
    pub async fn load(
        region: &str,
        elb: &impl LoadBalancingApi,
        network: &impl NetworkApi,
    ) -> Result<Self, InventoryFetchError> {
        let mut inventory = Self {
            region: region.to_string(),
            ..Self::default()
        };

        for lb in elb
            .list_load_balancers()
            .await
            .map_err(|e| InventoryFetchError::new("load balancer", region, e))?
        {
            inventory.load_balancers.insert(lb.name.clone(), lb);
        }

        for subnet in network
            .subnets()
            .await
            .map_err(|e| InventoryFetchError::new("subnet", region, e))?
        {
            inventory.subnets.insert(subnet.id.clone(), subnet);
        }

        for group in network
            .security_groups()
            .await
            .map_err(|e| InventoryFetchError::new("security group", region, e))?
        {
            inventory.security_groups.insert(group.id.clone(), group);
        }

        for vpc in network
            .vpcs()
            .await
            .map_err(|e| InventoryFetchError::new("VPC", region, e))?
        {
            if vpc.is_default {
                inventory.default_vpc = Some(vpc.id.clone());
            }
            inventory.vpcs.insert(vpc.id.clone(), vpc);
        }

        debug!(
            region = %region,
            load_balancers = inventory.load_balancers.len(),
            subnets = inventory.subnets.len(),
            security_groups = inventory.security_groups.len(),
            vpcs = inventory.vpcs.len(),
            "Region inventory loaded"
        );
        Ok(inventory)
    }

    /// Subnets belonging to the default VPC, for operator guidance.
    pub fn default_vpc_subnets(&self) -> Vec<&Subnet> {
        match &self.default_vpc {
            Some(vpc_id) => self
                .subnets
                .values()
                .filter(|s| &s.vpc_id == vpc_id)
                .collect(),
            None => Vec::new(),
        }
    }
}
