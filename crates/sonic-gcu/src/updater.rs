//! Update pipeline.
//!
//! [`GenericUpdater`] ties the pieces together. For every scope a patch
//! touches it:
//!
//! 1. snapshots the scope's CONFIG_DB;
//! 2. simulates the literal patch to obtain the target configuration;
//! 3. runs the validator gate on the literal operations and on the diff
//!    between snapshot and target;
//! 4. checks the target with the structural oracle;
//! 5. sorts the diff into a valid order;
//! 6. verifies that the ordered plan reproduces the target;
//! 7. applies the plan, unless this is a dry run.
//!
//! All scopes are planned before any of them is written, so a patch that
//! fails planning in one scope writes nothing anywhere.

use crate::applier;
use crate::checkpoint::CheckpointStore;
use crate::diff::diff;
use crate::error::{GcuError, GcuResult};
use crate::patch::{apply_operations, Move, PatchOperation};
use crate::scope::{split_config, split_operations, Scope};
use crate::sorter::{MoveSorter, ReferentialOracle, StructuralOracle, DEFAULT_NODE_BUDGET};
use crate::store::{ConfigStore, MemoryStateStore, StateStore};
use crate::validator::{PlatformInfo, RuleMetadata, ValidationContext, ValidatorGate};
use crate::value::{ConfigObject, ConfigValue};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Ordered moves for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePlan {
    pub scope: Scope,
    pub moves: Vec<Move>,
}

fn serialize_scope<S: Serializer>(scope: &Scope, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(scope)
}

/// What happened in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeReport {
    #[serde(serialize_with = "serialize_scope")]
    pub scope: Scope,
    /// The ordered plan as JSON Patch operations.
    pub moves: Vec<PatchOperation>,
    pub committed: usize,
}

/// Summary of an update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UpdateReport {
    pub dry_run: bool,
    pub scopes: Vec<ScopeReport>,
}

impl UpdateReport {
    pub fn total_moves(&self) -> usize {
        self.scopes.iter().map(|s| s.moves.len()).sum()
    }

    pub fn total_committed(&self) -> usize {
        self.scopes.iter().map(|s| s.committed).sum()
    }
}

/// Plans and applies configuration updates.
pub struct GenericUpdater {
    stores: BTreeMap<Scope, Box<dyn ConfigStore>>,
    state: Box<dyn StateStore>,
    platform: PlatformInfo,
    rules: RuleMetadata,
    oracle: Box<dyn StructuralOracle>,
    node_budget: usize,
    multi_asic: bool,
    dry_run: bool,
}

impl GenericUpdater {
    /// Creates an updater for a single-ASIC switch.
    ///
    /// Defaults: built-in rules, the SONiC referential oracle, no STATE_DB
    /// data, the default node budget.
    pub fn new(store: Box<dyn ConfigStore>, platform: PlatformInfo) -> Self {
        let mut stores = BTreeMap::new();
        stores.insert(Scope::Host, store);
        Self {
            stores,
            state: Box::new(MemoryStateStore::new()),
            platform,
            rules: RuleMetadata::builtin().clone(),
            oracle: Box::new(ReferentialOracle::sonic_default()),
            node_budget: DEFAULT_NODE_BUDGET,
            multi_asic: false,
            dry_run: false,
        }
    }

    /// Adds the CONFIG_DB of an ASIC namespace and switches to multi-ASIC mode.
    pub fn with_scope_store(mut self, scope: Scope, store: Box<dyn ConfigStore>) -> Self {
        if !scope.is_host() {
            self.multi_asic = true;
        }
        self.stores.insert(scope, store);
        self
    }

    pub fn with_multi_asic(mut self, multi_asic: bool) -> Self {
        self.multi_asic = multi_asic;
        self
    }

    pub fn with_state(mut self, state: Box<dyn StateStore>) -> Self {
        self.state = state;
        self
    }

    pub fn with_rules(mut self, rules: RuleMetadata) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_oracle(mut self, oracle: Box<dyn StructuralOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_node_budget(mut self, node_budget: usize) -> Self {
        self.node_budget = node_budget;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_multi_asic(&self) -> bool {
        self.multi_asic
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    fn store(&self, scope: Scope) -> GcuResult<&dyn ConfigStore> {
        self.stores
            .get(&scope)
            .map(|s| s.as_ref())
            .ok_or_else(|| GcuError::invalid_patch(format!("no configuration store for scope {}", scope)))
    }

    fn context(&self) -> ValidationContext<'_> {
        ValidationContext {
            platform: &self.platform,
            rules: &self.rules,
            state: self.state.as_ref(),
        }
    }

    /// Current configuration. In multi-ASIC mode the result is keyed by scope name.
    pub fn snapshot(&self) -> GcuResult<ConfigValue> {
        if !self.multi_asic {
            return Ok(self.store(Scope::Host)?.get_config()?);
        }
        let mut scopes = ConfigObject::new();
        for (scope, store) in &self.stores {
            scopes.insert(scope.to_string(), store.get_config()?);
        }
        Ok(ConfigValue::Object(scopes))
    }

    /// Plans one scope: gate, structural check, sort, verify.
    fn plan_scope(
        &self,
        scope: Scope,
        current: &ConfigValue,
        target: &ConfigValue,
        literal: &[PatchOperation],
    ) -> GcuResult<Vec<Move>> {
        let gate = ValidatorGate::new(self.context());
        gate.validate_operations(scope, literal)?;

        let moves = diff(current, target);
        if moves.is_empty() {
            info!(scope = %scope, "Target equals current configuration, nothing to do");
            return Ok(moves);
        }
        gate.validate(scope, &moves)?;

        self.oracle.validate(target).map_err(|rejection| {
            warn!(scope = %scope, reason = %rejection, "Target configuration rejected");
            GcuError::structural(format!("target configuration is invalid: {}", rejection), 0)
        })?;

        let sorter = MoveSorter::new(self.oracle.as_ref()).with_node_budget(self.node_budget);
        let sorted = sorter.sort(current, moves)?;

        let mut replay = current.clone();
        for (index, m) in sorted.iter().enumerate() {
            m.check_precondition(&replay)
                .map_err(|e| GcuError::path_resolution(Some(index), m.path.to_string(), e))?;
            m.apply_to(&mut replay)
                .map_err(|e| GcuError::path_resolution(Some(index), m.path.to_string(), e.into()))?;
        }
        if replay != *target {
            error!(scope = %scope, "Sorted plan does not reproduce the target");
            return Err(GcuError::structural(
                "sorted plan does not reproduce the target configuration",
                sorted.len(),
            ));
        }

        info!(scope = %scope, moves = sorted.len(), "Planned update");
        Ok(sorted)
    }

    /// Plans a literal JSON Patch without writing anything.
    pub fn plan_patch(&self, ops: Vec<PatchOperation>) -> GcuResult<Vec<ScopePlan>> {
        let mut plans = Vec::new();
        for (scope, ops) in split_operations(ops, self.multi_asic)? {
            let current = self.store(scope)?.get_config()?;
            let target = apply_operations(&current, &ops)?;
            let moves = self.plan_scope(scope, &current, &target, &ops)?;
            plans.push(ScopePlan { scope, moves });
        }
        Ok(plans)
    }

    /// Plans replacing the configuration with `target` without writing anything.
    pub fn plan_replace(&self, target: ConfigValue) -> GcuResult<Vec<ScopePlan>> {
        let mut plans = Vec::new();
        for (scope, target) in split_config(target, self.multi_asic)? {
            if !target.is_object() {
                return Err(GcuError::invalid_patch(format!(
                    "configuration for {} must be an object, found {}",
                    scope,
                    target.kind()
                )));
            }
            let current = self.store(scope)?.get_config()?;
            let moves = self.plan_scope(scope, &current, &target, &[])?;
            plans.push(ScopePlan { scope, moves });
        }
        Ok(plans)
    }

    /// Unordered, unvalidated differences between the running configuration and `target`.
    pub fn diff(&self, target: ConfigValue) -> GcuResult<Vec<ScopePlan>> {
        let mut plans = Vec::new();
        for (scope, target) in split_config(target, self.multi_asic)? {
            let current = self.store(scope)?.get_config()?;
            plans.push(ScopePlan {
                scope,
                moves: diff(&current, &target),
            });
        }
        Ok(plans)
    }

    fn execute(&mut self, plans: Vec<ScopePlan>) -> GcuResult<UpdateReport> {
        let mut report = UpdateReport {
            dry_run: self.dry_run,
            scopes: Vec::new(),
        };
        for plan in plans {
            let committed = if self.dry_run || plan.moves.is_empty() {
                0
            } else {
                let store = self
                    .stores
                    .get_mut(&plan.scope)
                    .ok_or_else(|| GcuError::invalid_patch(format!("no configuration store for scope {}", plan.scope)))?;
                match applier::apply(store.as_mut(), &plan.moves) {
                    Ok(commit) => commit.committed,
                    Err(e) => {
                        if report.total_committed() > 0 {
                            error!(
                                scope = %plan.scope,
                                earlier = report.total_committed(),
                                "Update failed after other scopes were committed"
                            );
                        }
                        return Err(e);
                    }
                }
            };
            report.scopes.push(ScopeReport {
                scope: plan.scope,
                moves: plan.moves.iter().map(Move::to_operation).collect(),
                committed,
            });
        }
        info!(
            dry_run = report.dry_run,
            moves = report.total_moves(),
            committed = report.total_committed(),
            "Update finished"
        );
        Ok(report)
    }

    /// Plans and applies a literal JSON Patch.
    pub fn apply_patch(&mut self, ops: Vec<PatchOperation>) -> GcuResult<UpdateReport> {
        info!(operations = ops.len(), dry_run = self.dry_run, "Applying patch");
        let plans = self.plan_patch(ops)?;
        self.execute(plans)
    }

    /// Replaces the running configuration with `target`.
    pub fn replace(&mut self, target: ConfigValue) -> GcuResult<UpdateReport> {
        info!(dry_run = self.dry_run, "Replacing configuration");
        let plans = self.plan_replace(target)?;
        self.execute(plans)
    }

    /// Saves the running configuration as checkpoint `name`.
    pub fn create_checkpoint(&self, checkpoints: &CheckpointStore, name: &str) -> GcuResult<()> {
        let config = self.snapshot()?;
        checkpoints.create(name, &config)?;
        Ok(())
    }

    /// Restores checkpoint `name`.
    pub fn rollback(&mut self, checkpoints: &CheckpointStore, name: &str) -> GcuResult<UpdateReport> {
        let target = checkpoints.load(name)?;
        info!(name, "Rolling back to checkpoint");
        self.replace(target)
    }
}
