//! The rule driver: one attempt loop per site, splice on success, fixpoint
//! iteration with a ceiling, and ownership re-validation after every splice.

use tracing::{debug, trace};

use crate::matcher::{Conjecture, MatchCx, Outcome, Phase};
use crate::model::{Arena, NodeId, Slot, SubjectTree};
use crate::pattern::coupling::CouplingBindings;
use crate::pattern::Rule;
use crate::{Error, Result};

use super::duplicate::build_replacement;

/// Iteration ceiling used by [`Rule::run_repeating`]. A rule set that needs
/// more iterations than this is treated as non-terminating.
pub const DEFAULT_CEILING: usize = 10_000;

/// Counters accumulated across rule applications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Subject nodes a search pattern was anchored at.
    pub sites_examined: u64,
    /// Match attempts, counting every conjecture retry.
    pub attempts: u64,
    /// Successful rule applications.
    pub iterations: u64,
    /// Nodes added to the arena by substitution.
    pub nodes_created: u64,
}

impl Rule {
    /// One matcher attempt over the tree plus, on success, one substitution.
    /// Returns the number of successful iterations: 1 or 0.
    pub fn run_once(&self, tree: &mut SubjectTree) -> Result<usize> {
        let mut stats = RewriteStats::default();
        Ok(run_once_inner(self, tree, &mut stats)? as usize)
    }

    /// Loop [`Rule::run_once`] to a fixpoint, bounded by
    /// [`DEFAULT_CEILING`]. Freshness marks are cleared first, so the
    /// immutable-region wildcard sees only this rule's own substitutions.
    /// Returns the iteration count. A match-only rule reports at most one
    /// iteration, since it cannot make progress.
    pub fn run_repeating(&self, tree: &mut SubjectTree) -> Result<usize> {
        let mut stats = RewriteStats::default();
        run_repeating_inner(self, tree, DEFAULT_CEILING, &mut stats)
    }
}

fn run_repeating_inner(
    rule: &Rule,
    tree: &mut SubjectTree,
    ceiling: usize,
    stats: &mut RewriteStats,
) -> Result<usize> {
    tree.arena.mark_all_clean();
    if rule.replace.is_none() {
        return Ok(run_once_inner(rule, tree, stats)? as usize);
    }
    let mut count = 0usize;
    while run_once_inner(rule, tree, stats)? {
        count += 1;
        if count > ceiling {
            return Err(Error::IterationCeiling { limit: ceiling });
        }
    }
    Ok(count)
}

/// Try every site in preorder; apply the rule at the first confirmed match.
fn run_once_inner(rule: &Rule, tree: &mut SubjectTree, stats: &mut RewriteStats) -> Result<bool> {
    let sites = tree.arena.reachable(tree.root);
    for site in sites {
        stats.sites_examined += 1;
        let Some(bindings) = try_match_at(&tree.arena, rule, site, stats)? else {
            continue;
        };
        debug!(site = %tree.arena.label(site), "search pattern matched");
        let Some(replace) = rule.replace else {
            // Match-only rule: report the match, leave the tree alone.
            return Ok(true);
        };

        let before = tree.arena.len();
        let replacement = build_replacement(&mut tree.arena, rule, &bindings, replace)?;
        stats.nodes_created += (tree.arena.len() - before) as u64;
        splice(tree, site, replacement)?;
        tree.validate()?;
        stats.iterations += 1;
        debug!(replacement = %tree.arena.label(replacement), "spliced");
        return Ok(true);
    }
    Ok(false)
}

/// The per-site attempt loop: keying pass, restricting pass, advance on
/// failure, exhaustion means no match at this site.
fn try_match_at(
    arena: &Arena,
    rule: &Rule,
    site: NodeId,
    stats: &mut RewriteStats,
) -> Result<Option<CouplingBindings>> {
    let mut conjecture = Conjecture::new();
    loop {
        stats.attempts += 1;
        let mut bindings = CouplingBindings::new(rule.coupling_count());

        conjecture.begin_attempt();
        let keyed = MatchCx::new(arena, rule, &mut conjecture, &mut bindings, Phase::Keying)
            .compare(site, rule.search)?;

        let confirmed = if keyed == Outcome::Found {
            conjecture.begin_replay();
            MatchCx::new(arena, rule, &mut conjecture, &mut bindings, Phase::Restricting)
                .compare(site, rule.search)?
                == Outcome::Found
        } else {
            false
        };

        if confirmed {
            return Ok(Some(bindings));
        }
        trace!(site = %arena.label(site), depth = conjecture.depth(), "attempt failed");
        if !conjecture.advance() {
            return Ok(None);
        }
    }
}

/// Replace `site` with `replacement` in the live tree: either the root
/// itself or the one parent slot referencing it.
fn splice(tree: &mut SubjectTree, site: NodeId, replacement: NodeId) -> Result<()> {
    if site == tree.root {
        tree.root = replacement;
        return Ok(());
    }
    for id in tree.arena.reachable(tree.root) {
        let slot_count = tree.arena.node(id).slots().len();
        for i in 0..slot_count {
            if !tree.arena.node(id).slots()[i].children().contains(&site) {
                continue;
            }
            match &mut tree.arena.node_mut(id).slots[i] {
                Slot::Optional(opt) => *opt = Some(replacement),
                Slot::Sequence(v) => {
                    if let Some(pos) = v.iter().position(|&c| c == site) {
                        v[pos] = replacement;
                    }
                }
                Slot::Collection(v) => {
                    v.retain(|&c| c != site);
                    let at = v.partition_point(|&x| x <= replacement);
                    v.insert(at, replacement);
                }
            }
            return Ok(());
        }
    }
    Err(Error::OwnershipViolation {
        node: tree.arena.label(site),
        detail: "splice site is not reachable from the root".into(),
    })
}

// ============================================================================
// Rule sets
// ============================================================================

/// An ordered list of rules, each run to its own fixpoint in sequence:
/// the outer loop of a lowering pipeline.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    ceiling: Option<usize>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    pub fn add(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order, each to its fixpoint.
    pub fn run(&self, tree: &mut SubjectTree) -> Result<RewriteStats> {
        let ceiling = self.ceiling.unwrap_or(DEFAULT_CEILING);
        let mut stats = RewriteStats::default();
        for (i, rule) in self.rules.iter().enumerate() {
            let n = run_repeating_inner(rule, tree, ceiling, &mut stats)?;
            debug!(rule = i, iterations = n, "rule fixpoint reached");
        }
        Ok(stats)
    }
}
