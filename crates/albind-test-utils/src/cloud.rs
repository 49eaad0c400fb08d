//! In-memory control plane
//!
//! `FakeCloud` implements the albind operation traits over plain in-memory
//! state, with mutation counters for idempotence assertions and switches for
//! injecting the failure modes the orchestrator must handle.

use albind::aws::api::{
    CreateFunctionError, CreateFunctionSpec, CreateLoadBalancerSpec, FunctionAlias, FunctionsApi,
    IamApi, Listener, LoadBalancer, LoadBalancingApi, NetworkApi, PublishedVersion, Rule,
    RulePriority, SecurityGroup, Subnet, TargetGroup, Vpc,
};
use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutation counts, for asserting that idempotent paths touch nothing
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counters {
    pub load_balancers_created: u32,
    pub listeners_created: u32,
    pub target_groups_created: u32,
    pub permissions_granted: u32,
    pub rules_created: u32,
    pub rules_deleted: u32,
    pub targets_registered: u32,
    pub functions_created: u32,
    pub roles_created: u32,
    pub versions_published: u32,
    pub aliases_created: u32,
    pub aliases_updated: u32,
    pub env_updates: u32,
}

#[derive(Debug, Default)]
struct FunctionRecord {
    arn: String,
    env: HashMap<String, String>,
    latest_version: u32,
    /// alias name -> function version
    aliases: HashMap<String, String>,
    /// qualifier -> statement ids
    permissions: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct CloudState {
    load_balancers: Vec<LoadBalancer>,
    /// lb arn -> listeners
    listeners: HashMap<String, Vec<Listener>>,
    /// listener arn -> rules
    rules: HashMap<String, Vec<Rule>>,
    target_groups: Vec<TargetGroup>,
    /// target group arn -> registered target ids
    targets: HashMap<String, Vec<String>>,
    subnets: Vec<Subnet>,
    security_groups: Vec<SecurityGroup>,
    vpcs: Vec<Vpc>,
    functions: HashMap<String, FunctionRecord>,
    roles: Vec<String>,
    counters: Counters,
    seq: u32,
    // failure injection
    policy_reads_fail: bool,
    role_not_ready_attempts: u32,
    create_function_attempts: u32,
}

/// The fake control plane
pub struct FakeCloud {
    region: String,
    state: Mutex<CloudState>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

impl FakeCloud {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            state: Mutex::new(CloudState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.state.lock().expect("fake cloud state poisoned")
    }

    // --- seeding -----------------------------------------------------------

    pub fn seed_subnet(&self, id: &str, vpc_id: &str, zone: &str) {
        self.lock().subnets.push(Subnet {
            id: id.to_string(),
            vpc_id: vpc_id.to_string(),
            availability_zone: zone.to_string(),
        });
    }

    pub fn seed_security_group(&self, id: &str, name: &str, vpc_id: &str) {
        self.lock().security_groups.push(SecurityGroup {
            id: id.to_string(),
            name: name.to_string(),
            vpc_id: vpc_id.to_string(),
        });
    }

    pub fn seed_vpc(&self, id: &str, is_default: bool) {
        self.lock().vpcs.push(Vpc {
            id: id.to_string(),
            is_default,
        });
    }

    /// Seed a balancer (with one HTTP listener) as pre-existing state.
    pub fn seed_load_balancer(&self, name: &str, kind: &str) -> LoadBalancer {
        let mut state = self.lock();
        state.seq += 1;
        let lb = LoadBalancer {
            name: name.to_string(),
            arn: format!(
                "arn:aws:elasticloadbalancing:{}:000000000000:loadbalancer/app/{}/{}",
                self.region, name, state.seq
            ),
            dns_name: format!("{}-{}.{}.elb.amazonaws.com", name, state.seq, self.region),
            kind: kind.to_string(),
        };
        let listener = Listener {
            arn: format!(
                "arn:aws:elasticloadbalancing:{}:000000000000:listener/app/{}/{}",
                self.region, name, state.seq
            ),
            protocol: "HTTP".to_string(),
            port: 80,
        };
        state.rules.insert(listener.arn.clone(), Vec::new());
        state.listeners.insert(lb.arn.clone(), vec![listener]);
        state.load_balancers.push(lb.clone());
        lb
    }

    /// Make every invoke-policy read fail as a transport error.
    pub fn fail_policy_reads(&self) {
        self.lock().policy_reads_fail = true;
    }

    /// Reject the first `attempts` function creations with a role-propagation
    /// error.
    pub fn role_not_ready_for(&self, attempts: u32) {
        self.lock().role_not_ready_attempts = attempts;
    }

    // --- inspection --------------------------------------------------------

    pub fn counters(&self) -> Counters {
        self.lock().counters.clone()
    }

    pub fn load_balancer(&self, name: &str) -> Option<LoadBalancer> {
        self.lock()
            .load_balancers
            .iter()
            .find(|lb| lb.name == name)
            .cloned()
    }

    pub fn listener_count(&self, lb_name: &str) -> usize {
        let state = self.lock();
        state
            .load_balancers
            .iter()
            .find(|lb| lb.name == lb_name)
            .and_then(|lb| state.listeners.get(&lb.arn))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn target_group(&self, name: &str) -> Option<TargetGroup> {
        self.lock()
            .target_groups
            .iter()
            .find(|tg| tg.name == name)
            .cloned()
    }

    pub fn registered_targets(&self, target_group_name: &str) -> Vec<String> {
        let state = self.lock();
        state
            .target_groups
            .iter()
            .find(|tg| tg.name == target_group_name)
            .and_then(|tg| state.targets.get(&tg.arn))
            .cloned()
            .unwrap_or_default()
    }

    /// All rules across every listener of the named balancer.
    pub fn rules_for(&self, lb_name: &str) -> Vec<Rule> {
        let state = self.lock();
        let Some(lb) = state.load_balancers.iter().find(|lb| lb.name == lb_name) else {
            return Vec::new();
        };
        state
            .listeners
            .get(&lb.arn)
            .into_iter()
            .flatten()
            .flat_map(|listener| state.rules.get(&listener.arn).into_iter().flatten())
            .cloned()
            .collect()
    }

    pub fn permission_sids(&self, function: &str, qualifier: &str) -> Vec<String> {
        self.lock()
            .functions
            .get(function)
            .and_then(|f| f.permissions.get(qualifier))
            .cloned()
            .unwrap_or_default()
    }

    pub fn alias_version(&self, function: &str, alias: &str) -> Option<String> {
        self.lock()
            .functions
            .get(function)
            .and_then(|f| f.aliases.get(alias))
            .cloned()
    }

    pub fn function_env(&self, function: &str, key: &str) -> Option<String> {
        self.lock()
            .functions
            .get(function)
            .and_then(|f| f.env.get(key))
            .cloned()
    }

    pub fn roles(&self) -> Vec<String> {
        self.lock().roles.clone()
    }
}

impl LoadBalancingApi for FakeCloud {
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        Ok(self.lock().load_balancers.clone())
    }

    async fn find_load_balancer(&self, name: &str) -> Result<Option<LoadBalancer>> {
        Ok(self
            .lock()
            .load_balancers
            .iter()
            .find(|lb| lb.name == name)
            .cloned())
    }

    async fn create_load_balancer(&self, spec: &CreateLoadBalancerSpec) -> Result<LoadBalancer> {
        {
            let state = self.lock();
            if state.load_balancers.iter().any(|lb| lb.name == spec.name) {
                bail!("load balancer '{}' already exists", spec.name);
            }
        }
        let lb = {
            let mut state = self.lock();
            state.seq += 1;
            let lb = LoadBalancer {
                name: spec.name.clone(),
                arn: format!(
                    "arn:aws:elasticloadbalancing:{}:000000000000:loadbalancer/app/{}/{}",
                    self.region, spec.name, state.seq
                ),
                dns_name: format!("{}-{}.{}.elb.amazonaws.com", spec.name, state.seq, self.region),
                kind: "application".to_string(),
            };
            state.listeners.insert(lb.arn.clone(), Vec::new());
            state.load_balancers.push(lb.clone());
            state.counters.load_balancers_created += 1;
            lb
        };
        Ok(lb)
    }

    async fn create_default_listener(&self, lb_arn: &str) -> Result<Listener> {
        let mut state = self.lock();
        state.seq += 1;
        let listener = Listener {
            arn: format!(
                "arn:aws:elasticloadbalancing:{}:000000000000:listener/app/fake/{}",
                self.region, state.seq
            ),
            protocol: "HTTP".to_string(),
            port: 80,
        };
        state.rules.insert(listener.arn.clone(), Vec::new());
        state
            .listeners
            .get_mut(lb_arn)
            .ok_or_else(|| anyhow!("unknown load balancer '{lb_arn}'"))?
            .push(listener.clone());
        state.counters.listeners_created += 1;
        Ok(listener)
    }

    async fn listeners(&self, lb_arn: &str) -> Result<Vec<Listener>> {
        Ok(self.lock().listeners.get(lb_arn).cloned().unwrap_or_default())
    }

    async fn rules(&self, listener_arn: &str) -> Result<Vec<Rule>> {
        Ok(self.lock().rules.get(listener_arn).cloned().unwrap_or_default())
    }

    async fn create_rule(
        &self,
        listener_arn: &str,
        priority: u32,
        path_pattern: &str,
        target_group_arn: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.seq += 1;
        let arn = format!(
            "arn:aws:elasticloadbalancing:{}:000000000000:listener-rule/app/fake/{}",
            self.region, state.seq
        );
        let rules = state
            .rules
            .get_mut(listener_arn)
            .ok_or_else(|| anyhow!("unknown listener '{listener_arn}'"))?;
        if rules
            .iter()
            .any(|r| r.priority == RulePriority::Numbered(priority))
        {
            bail!("priority {priority} is already in use on this listener");
        }
        rules.push(Rule {
            arn,
            priority: RulePriority::Numbered(priority),
            path_patterns: vec![path_pattern.to_string()],
            forward_target_groups: vec![target_group_arn.to_string()],
        });
        state.counters.rules_created += 1;
        Ok(())
    }

    async fn delete_rule(&self, rule_arn: &str) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        for rules in state.rules.values_mut() {
            if let Some(index) = rules.iter().position(|r| r.arn == rule_arn) {
                rules.remove(index);
                state.counters.rules_deleted += 1;
                return Ok(());
            }
        }
        bail!("rule '{rule_arn}' not found");
    }

    async fn create_lambda_target_group(&self, name: &str) -> Result<TargetGroup> {
        let mut state = self.lock();
        if state.target_groups.iter().any(|tg| tg.name == name) {
            bail!("target group '{name}' already exists");
        }
        state.seq += 1;
        let tg = TargetGroup {
            name: name.to_string(),
            arn: format!(
                "arn:aws:elasticloadbalancing:{}:000000000000:targetgroup/{}/{}",
                self.region, name, state.seq
            ),
        };
        state.target_groups.push(tg.clone());
        state.counters.target_groups_created += 1;
        Ok(tg)
    }

    async fn find_target_group(&self, name: &str) -> Result<Option<TargetGroup>> {
        Ok(self
            .lock()
            .target_groups
            .iter()
            .find(|tg| tg.name == name)
            .cloned())
    }

    async fn delete_target_group(&self, arn: &str) -> Result<()> {
        let mut state = self.lock();
        state.target_groups.retain(|tg| tg.arn != arn);
        state.targets.remove(arn);
        Ok(())
    }

    async fn register_function_target(
        &self,
        target_group_arn: &str,
        function_arn: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        if !state.target_groups.iter().any(|tg| tg.arn == target_group_arn) {
            bail!("target group '{target_group_arn}' not found");
        }
        state
            .targets
            .entry(target_group_arn.to_string())
            .or_default()
            .push(function_arn.to_string());
        state.counters.targets_registered += 1;
        Ok(())
    }
}

impl FunctionsApi for FakeCloud {
    async fn create_function(
        &self,
        spec: &CreateFunctionSpec,
    ) -> Result<PublishedVersion, CreateFunctionError> {
        let mut state = self.lock();
        state.create_function_attempts += 1;
        if state.create_function_attempts <= state.role_not_ready_attempts {
            return Err(CreateFunctionError::RoleNotReady);
        }
        if state.functions.contains_key(&spec.name) {
            return Err(CreateFunctionError::Other(anyhow!(
                "function '{}' already exists",
                spec.name
            )));
        }
        if spec.archive.is_empty() {
            return Err(CreateFunctionError::Other(anyhow!("empty archive")));
        }

        let arn = format!(
            "arn:aws:lambda:{}:000000000000:function:{}",
            self.region, spec.name
        );
        state.functions.insert(
            spec.name.clone(),
            FunctionRecord {
                arn: arn.clone(),
                latest_version: 1,
                ..FunctionRecord::default()
            },
        );
        state.counters.functions_created += 1;
        Ok(PublishedVersion {
            version: "1".to_string(),
            function_arn: arn,
        })
    }

    async fn set_environment_variable(
        &self,
        function: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .functions
            .get_mut(function)
            .ok_or_else(|| anyhow!("function '{function}' not found"))?;
        record.env.insert(key.to_string(), value.to_string());
        state.counters.env_updates += 1;
        Ok(())
    }

    async fn publish_version(&self, function: &str, archive: &[u8]) -> Result<PublishedVersion> {
        if archive.is_empty() {
            bail!("empty archive");
        }
        let mut state = self.lock();
        let record = state
            .functions
            .get_mut(function)
            .ok_or_else(|| anyhow!("function '{function}' not found"))?;
        record.latest_version += 1;
        let published = PublishedVersion {
            version: record.latest_version.to_string(),
            function_arn: record.arn.clone(),
        };
        state.counters.versions_published += 1;
        Ok(published)
    }

    async fn find_alias(&self, function: &str, alias: &str) -> Result<Option<FunctionAlias>> {
        Ok(self
            .lock()
            .functions
            .get(function)
            .and_then(|f| f.aliases.get(alias))
            .map(|version| FunctionAlias {
                name: alias.to_string(),
                function_version: version.clone(),
            }))
    }

    async fn create_alias(&self, function: &str, alias: &str, version: &str) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .functions
            .get_mut(function)
            .ok_or_else(|| anyhow!("function '{function}' not found"))?;
        if record.aliases.contains_key(alias) {
            bail!("alias '{alias}' already exists");
        }
        record.aliases.insert(alias.to_string(), version.to_string());
        state.counters.aliases_created += 1;
        Ok(())
    }

    async fn update_alias(&self, function: &str, alias: &str, version: &str) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .functions
            .get_mut(function)
            .ok_or_else(|| anyhow!("function '{function}' not found"))?;
        let slot = record
            .aliases
            .get_mut(alias)
            .ok_or_else(|| anyhow!("alias '{alias}' not found"))?;
        *slot = version.to_string();
        state.counters.aliases_updated += 1;
        Ok(())
    }

    async fn invoke_policy_sids(
        &self,
        function: &str,
        qualifier: &str,
    ) -> Result<Option<Vec<String>>> {
        let state = self.lock();
        if state.policy_reads_fail {
            bail!("access denied reading resource policy");
        }
        let record = state
            .functions
            .get(function)
            .ok_or_else(|| anyhow!("function '{function}' not found"))?;
        Ok(record.permissions.get(qualifier).cloned())
    }

    async fn add_invoke_permission(
        &self,
        function: &str,
        qualifier: &str,
        statement_id: &str,
        _principal: &str,
        _source_arn: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .functions
            .get_mut(function)
            .ok_or_else(|| anyhow!("function '{function}' not found"))?;
        let sids = record.permissions.entry(qualifier.to_string()).or_default();
        if sids.iter().any(|sid| sid == statement_id) {
            bail!("statement '{statement_id}' already exists");
        }
        sids.push(statement_id.to_string());
        state.counters.permissions_granted += 1;
        Ok(())
    }

    async fn remove_invoke_permission(
        &self,
        function: &str,
        qualifier: &str,
        statement_id: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        if let Some(record) = state.functions.get_mut(function) {
            if let Some(sids) = record.permissions.get_mut(qualifier) {
                sids.retain(|sid| sid != statement_id);
                if sids.is_empty() {
                    record.permissions.remove(qualifier);
                }
            }
        }
        Ok(())
    }
}

impl NetworkApi for FakeCloud {
    async fn subnets(&self) -> Result<Vec<Subnet>> {
        Ok(self.lock().subnets.clone())
    }

    async fn security_groups(&self) -> Result<Vec<SecurityGroup>> {
        Ok(self.lock().security_groups.clone())
    }

    async fn vpcs(&self) -> Result<Vec<Vpc>> {
        Ok(self.lock().vpcs.clone())
    }
}

impl IamApi for FakeCloud {
    async fn create_execution_role(&self, role_name: &str) -> Result<String> {
        let mut state = self.lock();
        if state.roles.iter().any(|r| r == role_name) {
            bail!("role '{role_name}' already exists");
        }
        state.roles.push(role_name.to_string());
        state.counters.roles_created += 1;
        Ok(format!("arn:aws:iam::000000000000:role/{role_name}"))
    }
}
