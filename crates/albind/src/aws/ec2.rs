//! Network resource queries
//!
//! Read-only EC2 lookups backing the resource inventory: subnets, security
//! groups, and VPCs.

use crate::aws::api::{NetworkApi, SecurityGroup, Subnet, Vpc};
use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_ec2::Client;

/// EC2 client for networking queries
pub struct Ec2Client {
    client: Client,
}

impl Ec2Client {
    pub async fn new(region: &str) -> Self {
        let ctx = AwsContext::new(region).await;
        Self::from_context(&ctx)
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

impl NetworkApi for Ec2Client {
    async fn subnets(&self) -> Result<Vec<Subnet>> {
        let response = self
            .client
            .describe_subnets()
            .send()
            .await
            .context("describing subnets")?;

        Ok(response
            .subnets()
            .iter()
            .map(|s| Subnet {
                id: s.subnet_id().unwrap_or_default().to_string(),
                vpc_id: s.vpc_id().unwrap_or_default().to_string(),
                availability_zone: s.availability_zone().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let response = self
            .client
            .describe_security_groups()
            .send()
            .await
            .context("describing security groups")?;

        Ok(response
            .security_groups()
            .iter()
            .map(|g| SecurityGroup {
                id: g.group_id().unwrap_or_default().to_string(),
                name: g.group_name().unwrap_or_default().to_string(),
                vpc_id: g.vpc_id().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn vpcs(&self) -> Result<Vec<Vpc>> {
        let response = self
            .client
            .describe_vpcs()
            .send()
            .await
            .context("describing VPCs")?;

        Ok(response
            .vpcs()
            .iter()
            .map(|v| Vpc {
                id: v.vpc_id().unwrap_or_default().to_string(),
                is_default: v.is_default().unwrap_or(false),
            })
            .collect())
    }
}
