// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-node execution profiling and tier bookkeeping.
//!
//! The profiler is keyed by [`ast::NodeId`], which the parser promises to
//! keep stable across reparses of identical source. Every "profilable" node the interpreter evaluates (binary
//! expressions, calls, loops, member accesses) gets an entry here; once its
//! count crosses a threshold the owning `Context` asks the bytecode
//! compiler or JIT to take over.

use ahash::AHashMap;

use ast::NodeId;

/// The four tiers a node can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Interpreter,
    Bytecode,
    Optimized,
    MachineCode,
}

/// Coarse type-feedback buckets. We don't
/// track every possible tag, only the ones the JIT's pattern table cares
/// about: numbers, strings, everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeFeedback {
    pub number: u32,
    pub string: u32,
    pub object: u32,
    pub boolean: u32,
}

impl TypeFeedback {
    fn total(&self) -> u32 {
        self.number + self.string + self.object + self.boolean
    }

    /// A site is monomorphic once one tag accounts for ≥95% of observed
    /// executions.
    pub fn is_monomorphic_number(&self) -> bool {
        let total = self.total();
        total > 0 && (self.number as f64 / total as f64) >= 0.95
    }

    pub fn record_number(&mut self) {
        self.number += 1;
    }
    pub fn record_string(&mut self) {
        self.string += 1;
    }
    pub fn record_object(&mut self) {
        self.object += 1;
    }
    pub fn record_boolean(&mut self) {
        self.boolean += 1;
    }
}

#[derive(Debug, Clone)]
pub struct NodeProfile {
    pub count: u64,
    pub tier: Tier,
    pub feedback: TypeFeedback,
    /// Number of times a compiled tier for this node deoptimized. Three
    /// strikes disables further compilation.
    pub deopt_count: u32,
    pub compilation_disabled: bool,
}

impl Default for NodeProfile {
    fn default() -> Self {
        NodeProfile { count: 0, tier: Tier::Interpreter, feedback: TypeFeedback::default(), deopt_count: 0, compilation_disabled: false }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub bytecode: u64,
    pub optimized: u64,
    pub machine_code: u64,
    pub max_deopts: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        // Conservative defaults: a handful of hot executions should be enough
        // to justify compiling, but not so few that one-shot code gets promoted.
        Thresholds { bytecode: 3, optimized: 8, machine_code: 15, max_deopts: 3 }
    }
}

#[derive(Debug, Default)]
pub struct Profiler {
    nodes: AHashMap<NodeId, NodeProfile>,
    pub thresholds: Thresholds,
}

impl Profiler {
    pub fn new(thresholds: Thresholds) -> Self {
        Profiler { nodes: AHashMap::new(), thresholds }
    }

    fn entry(&mut self, node: NodeId) -> &mut NodeProfile {
        self.nodes.entry(node).or_default()
    }

    /// Records one execution of `node`, returning the tier it should run
    /// at *after* this execution (the caller checks this to decide whether
    /// to lower to bytecode/JIT before the next invocation).
    pub fn record_execution(&mut self, node: NodeId) -> Tier {
        let thresholds = self.thresholds;
        let profile = self.entry(node);
        profile.count += 1;
        if profile.compilation_disabled {
            return profile.tier.min(Tier::Bytecode);
        }
        if profile.count >= thresholds.machine_code && profile.tier < Tier::MachineCode {
            profile.tier = Tier::MachineCode;
        } else if profile.count >= thresholds.optimized && profile.tier < Tier::Optimized {
            profile.tier = Tier::Optimized;
        } else if profile.count >= thresholds.bytecode && profile.tier < Tier::Bytecode {
            profile.tier = Tier::Bytecode;
        }
        profile.tier
    }

    pub fn tier_of(&self, node: NodeId) -> Tier {
        self.nodes.get(&node).map(|p| p.tier).unwrap_or(Tier::Interpreter)
    }

    pub fn feedback_mut(&mut self, node: NodeId) -> &mut TypeFeedback {
        &mut self.entry(node).feedback
    }

    pub fn feedback(&self, node: NodeId) -> TypeFeedback {
        self.nodes.get(&node).map(|p| p.feedback).unwrap_or_default()
    }

    /// Records a guard-speculation failure: the node drops a tier and, after three strikes,
    /// compilation is disabled for it entirely.
    pub fn record_deopt(&mut self, node: NodeId) {
        let max = self.thresholds.max_deopts;
        let profile = self.entry(node);
        profile.deopt_count += 1;
        profile.tier = Tier::Bytecode;
        if profile.deopt_count >= max {
            profile.compilation_disabled = true;
            tracing::warn!(node_id = node, "disabling further compilation after repeated deopts");
        } else {
            tracing::debug!(node_id = node, deopt_count = profile.deopt_count, "deoptimized");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_to_bytecode_at_the_default_threshold() {
        let mut profiler = Profiler::new(Thresholds::default());
        for _ in 0..2 {
            assert_eq!(profiler.record_execution(1), Tier::Interpreter);
        }
        assert_eq!(profiler.record_execution(1), Tier::Bytecode);
    }

    #[test]
    fn promotes_through_all_tiers_in_order() {
        let mut profiler = Profiler::new(Thresholds::default());
        let mut last = Tier::Interpreter;
        for _ in 0..20 {
            last = profiler.record_execution(7);
        }
        assert_eq!(last, Tier::MachineCode);
    }

    #[test]
    fn three_deopts_disable_compilation() {
        let mut profiler = Profiler::new(Thresholds::default());
        for _ in 0..20 {
            profiler.record_execution(3);
        }
        profiler.record_deopt(3);
        profiler.record_deopt(3);
        profiler.record_deopt(3);
        assert_eq!(profiler.record_execution(3), Tier::Bytecode);
    }

    #[test]
    fn monomorphic_feedback_requires_95_percent_share() {
        let mut feedback = TypeFeedback::default();
        for _ in 0..94 {
            feedback.record_number();
        }
        feedback.record_string();
        for _ in 0..5 {
            feedback.record_number();
        }
        assert!(feedback.is_monomorphic_number());
    }
}
