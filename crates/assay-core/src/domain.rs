//! The domain-member tree: evaluated entities, hit ingestion, and
//! bottom-up metric propagation.
//!
//! An evaluation is an ordered tree of five member kinds, broadest first:
//! Evaluation → Corpus → Topic → QueryGroup → Query. Members are stored in
//! an append-only arena and addressed by [`MemberId`] handles; a member
//! keeps a parent handle (never an owning reference) so propagation can
//! walk upward without reference cycles.
//!
//! # Concurrency
//!
//! The tree is shared, mutable state: many worker threads may stream hits
//! for different queries (or different versions of one query) and
//! propagate results concurrently.
//!
//! - The arena is append-only behind an `RwLock`; resolving a handle takes
//!   a brief read lock and clones the member's `Arc`, so hot paths never
//!   hold the arena lock.
//! - Each member's children and metrics maps sit behind their own
//!   `RwLock`. Find-or-create holds the parent's children write lock
//!   across the whole check-then-insert, so a create race resolves to a
//!   single surviving node.
//! - Averaged folds during propagation run under the ancestor's metrics
//!   write lock, serializing every read-combine-write per ancestor.
//!
//! Ancestors change only through [`EvaluationTree::notify_collected_metrics`];
//! a query whose stream is abandoned mid-way leaves every ancestor
//! untouched.

use crate::error::EvaluationError;
use crate::hit::{Judgments, SearchHit};
use crate::math::Decimal;
use crate::metrics::{
    default_metric_specs, AveragedMetric, Metric, MetricSpec, RankedMetric, StaticMetric,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Entity kinds forming the evaluation hierarchy, broadest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Root of the tree; one per evaluation request.
    Evaluation,
    /// A document collection under evaluation.
    Corpus,
    /// A thematic grouping of query groups within a corpus.
    Topic,
    /// A set of query variants expressing one information need.
    QueryGroup,
    /// A single searched phrase; the leaf where hits are collected.
    Query,
}

impl MemberKind {
    /// Kind of the next level down; `None` at the leaf.
    pub fn child_kind(&self) -> Option<MemberKind> {
        match self {
            MemberKind::Evaluation => Some(MemberKind::Corpus),
            MemberKind::Corpus => Some(MemberKind::Topic),
            MemberKind::Topic => Some(MemberKind::QueryGroup),
            MemberKind::QueryGroup => Some(MemberKind::Query),
            MemberKind::Query => None,
        }
    }

    /// Lower-case label used in reports and log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Evaluation => "evaluation",
            MemberKind::Corpus => "corpus",
            MemberKind::Topic => "topic",
            MemberKind::QueryGroup => "query-group",
            MemberKind::Query => "query",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle addressing one member inside its [`EvaluationTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(usize);

/// Insertion-ordered children with a sibling-unique name index.
#[derive(Default)]
struct ChildSet {
    order: Vec<MemberId>,
    by_name: HashMap<String, MemberId>,
}

/// Per-version hit stream bookkeeping for a query.
#[derive(Default)]
struct VersionStream {
    /// Collected hits in rank order.
    hits: Vec<SearchHit>,
    /// Highest rank accepted so far; ranks must be strictly increasing.
    last_rank: u64,
}

/// Leaf-only state: judgments, reported totals, and collected hit lists.
#[derive(Default)]
struct QueryState {
    judgments: RwLock<Judgments>,
    total_hits: RwLock<HashMap<String, u64>>,
    streams: RwLock<HashMap<String, VersionStream>>,
}

/// One node of the tree.
struct Member {
    kind: MemberKind,
    name: String,
    parent: Option<MemberId>,
    children: RwLock<ChildSet>,
    metrics: RwLock<HashMap<String, Metric>>,
    query: Option<QueryState>,
}

impl Member {
    fn new(kind: MemberKind, name: &str, parent: Option<MemberId>, specs: &[MetricSpec]) -> Self {
        let mut metrics = HashMap::new();
        let query = if kind == MemberKind::Query {
            for spec in specs {
                metrics.insert(
                    spec.name.clone(),
                    Metric::Ranked(RankedMetric::new(spec.name.clone(), spec.kind)),
                );
            }
            Some(QueryState::default())
        } else {
            None
        };
        Self {
            kind,
            name: name.to_string(),
            parent,
            children: RwLock::new(ChildSet::default()),
            metrics: RwLock::new(metrics),
            query,
        }
    }

    fn query_state(&self) -> Result<&QueryState, EvaluationError> {
        self.query
            .as_ref()
            .ok_or_else(|| EvaluationError::NotAQuery(self.name.clone()))
    }
}

/// A poisoned lock only ever means some other thread panicked mid-test;
/// the protected data is still structurally valid, so recover it.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// The tree of evaluated entities for one evaluation run.
///
/// Members are created lazily by [`find_or_create`](Self::find_or_create)
/// and never deleted during a run; a new evaluation request gets a fresh
/// tree. All methods take `&self`, so the tree can be shared across worker
/// threads behind an `Arc`.
pub struct EvaluationTree {
    members: RwLock<Vec<Arc<Member>>>,
    specs: Vec<MetricSpec>,
    root: MemberId,
}

impl EvaluationTree {
    /// Builds a tree rooted at an Evaluation member, with the shipped
    /// metric set installed on every query.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_metrics(name, default_metric_specs().to_vec())
    }

    /// Builds a tree whose queries are born with the given metric set.
    ///
    /// An empty set is valid and is the configuration used when replaying
    /// persisted values through
    /// [`collect_static`](Self::collect_static).
    pub fn with_metrics(name: impl Into<String>, specs: Vec<MetricSpec>) -> Self {
        let root = Member::new(MemberKind::Evaluation, &name.into(), None, &[]);
        Self {
            members: RwLock::new(vec![Arc::new(root)]),
            specs,
            root: MemberId(0),
        }
    }

    /// Handle of the root Evaluation member.
    pub fn root(&self) -> MemberId {
        self.root
    }

    fn resolve(&self, id: MemberId) -> Result<Arc<Member>, EvaluationError> {
        read(&self.members)
            .get(id.0)
            .cloned()
            .ok_or_else(|| EvaluationError::UnknownMember(id.0.to_string()))
    }

    fn allocate(&self, member: Member) -> MemberId {
        let mut members = write(&self.members);
        let id = MemberId(members.len());
        members.push(Arc::new(member));
        id
    }

    /// Returns the existing child of `parent` with this name, or atomically
    /// creates and appends one of the next-level kind.
    ///
    /// Idempotent: a second call with the same name returns the identical
    /// node and does not grow the child list, even when two threads race to
    /// create it.
    pub fn find_or_create(
        &self,
        parent: MemberId,
        name: &str,
    ) -> Result<MemberId, EvaluationError> {
        if name.is_empty() {
            return Err(EvaluationError::InvalidInput(
                "member name cannot be empty".to_string(),
            ));
        }
        let parent_member = self.resolve(parent)?;
        let child_kind = parent_member
            .kind
            .child_kind()
            .ok_or_else(|| EvaluationError::ChildrenNotAllowed(parent_member.name.clone()))?;

        // The children lock is held across lookup and insert: a create race
        // must leave exactly one surviving instance.
        let mut children = write(&parent_member.children);
        if let Some(existing) = children.by_name.get(name) {
            return Ok(*existing);
        }
        let id = self.allocate(Member::new(child_kind, name, Some(parent), &self.specs));
        children.order.push(id);
        children.by_name.insert(name.to_string(), id);
        debug!(kind = child_kind.as_str(), name, "created domain member");
        Ok(id)
    }

    /// Installs the relevance judgments a query's collecting metrics score
    /// against. Supplied before the first hit of any version is streamed.
    pub fn set_judgments(
        &self,
        query: MemberId,
        judgments: Judgments,
    ) -> Result<(), EvaluationError> {
        let member = self.resolve(query)?;
        *write(&member.query_state()?.judgments) = judgments;
        Ok(())
    }

    /// Records the total hit count the search system reported for a
    /// version of this query.
    pub fn set_total_hits(
        &self,
        query: MemberId,
        version: &str,
        count: u64,
    ) -> Result<(), EvaluationError> {
        let member = self.resolve(query)?;
        write(&member.query_state()?.total_hits).insert(version.to_string(), count);
        Ok(())
    }

    /// Streams one ranked hit into every collecting metric of a query.
    ///
    /// `rank` is 1-based and must be strictly increasing within one
    /// (query, version) pair; a violating call is rejected before any
    /// metric or aggregate state is touched.
    pub fn collect(
        &self,
        query: MemberId,
        hit: SearchHit,
        rank: u64,
        version: &str,
    ) -> Result<(), EvaluationError> {
        let member = self.resolve(query)?;
        let state = member.query_state()?;
        if rank == 0 {
            return Err(EvaluationError::InvalidInput(
                "hit ranks are 1-based".to_string(),
            ));
        }
        {
            let mut streams = write(&state.streams);
            let stream = streams.entry(version.to_string()).or_default();
            if rank <= stream.last_rank {
                return Err(EvaluationError::InvalidInput(format!(
                    "rank {rank} does not increase on {} (last was {})",
                    member.name, stream.last_rank
                )));
            }
            stream.last_rank = rank;
            stream.hits.push(hit.clone());
        }
        let judgments = read(&state.judgments);
        let mut metrics = write(&member.metrics);
        for metric in metrics.values_mut() {
            if let Metric::Ranked(ranked) = metric {
                ranked.collect(&hit, rank, version, &judgments);
            }
        }
        Ok(())
    }

    /// Ingests an already-computed metric value on a query as a static
    /// snapshot, creating the static metric on first use.
    ///
    /// Used when rebuilding an aggregation tree from persisted data; such
    /// trees are built with [`with_metrics`](Self::with_metrics) and an
    /// empty spec set so ingested names cannot collide with collecting
    /// metrics.
    pub fn collect_static(
        &self,
        query: MemberId,
        metric_name: &str,
        version: &str,
        value: Decimal,
    ) -> Result<(), EvaluationError> {
        let member = self.resolve(query)?;
        member.query_state()?;
        let mut metrics = write(&member.metrics);
        match metrics
            .entry(metric_name.to_string())
            .or_insert_with(|| Metric::Static(StaticMetric::new(metric_name)))
        {
            Metric::Static(stored) => {
                stored.collect(version, value);
                Ok(())
            }
            Metric::Ranked(_) | Metric::Averaged(_) => Err(EvaluationError::InvalidInput(
                format!("metric {metric_name} on {} is not static", member.name),
            )),
        }
    }

    /// Propagates a query's finished metric values into every ancestor.
    ///
    /// For each (metric name, version) pair present on the query, the
    /// finished value is folded into the same-named averaged metric of
    /// each ancestor in turn (creating it the first time that ancestor
    /// sees the name). After every contributing query has notified, an
    /// ancestor's value is the unweighted arithmetic mean across its
    /// descendant queries, independent of notification order.
    ///
    /// Collaborators invoke this exactly once per query, after the hit
    /// streams of all its versions are exhausted; a second notification
    /// would fold the same values in again.
    pub fn notify_collected_metrics(&self, query: MemberId) -> Result<(), EvaluationError> {
        let member = self.resolve(query)?;
        member.query_state()?;

        // Snapshot the finished triples first so no query lock is held
        // while ancestors are updated.
        let mut finished: Vec<(String, String, Decimal)> = Vec::new();
        {
            let metrics = read(&member.metrics);
            for (name, metric) in metrics.iter() {
                for version in metric.versions() {
                    if let Some(value) = metric.value(&version) {
                        finished.push((name.clone(), version, value));
                    }
                }
            }
        }
        finished.sort();

        let mut ancestor = member.parent;
        while let Some(id) = ancestor {
            let node = self.resolve(id)?;
            let mut metrics = write(&node.metrics);
            for (name, version, value) in &finished {
                match metrics
                    .entry(name.clone())
                    .or_insert_with(|| Metric::Averaged(AveragedMetric::new(name.clone())))
                {
                    Metric::Averaged(aggregate) => aggregate.collect(version, *value),
                    Metric::Ranked(_) | Metric::Static(_) => warn!(
                        metric = name.as_str(),
                        member = node.name.as_str(),
                        "ancestor metric is not an aggregate; skipping fold"
                    ),
                }
            }
            drop(metrics);
            ancestor = node.parent;
        }
        debug!(
            query = member.name.as_str(),
            values = finished.len(),
            "propagated collected metrics"
        );
        Ok(())
    }

    // =========================================================================
    // Read access for reporting
    // =========================================================================

    /// Member name (unique among its siblings).
    pub fn name(&self, id: MemberId) -> Result<String, EvaluationError> {
        Ok(self.resolve(id)?.name.clone())
    }

    /// Member kind.
    pub fn kind(&self, id: MemberId) -> Result<MemberKind, EvaluationError> {
        Ok(self.resolve(id)?.kind)
    }

    /// Parent handle; `None` for the root Evaluation.
    pub fn parent(&self, id: MemberId) -> Result<Option<MemberId>, EvaluationError> {
        Ok(self.resolve(id)?.parent)
    }

    /// Child handles in insertion order.
    pub fn children(&self, id: MemberId) -> Result<Vec<MemberId>, EvaluationError> {
        Ok(read(&self.resolve(id)?.children).order.clone())
    }

    /// Names of the metrics present on a member, sorted.
    pub fn metric_names(&self, id: MemberId) -> Result<Vec<String>, EvaluationError> {
        let member = self.resolve(id)?;
        let mut names: Vec<String> = read(&member.metrics).keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Finished value of one metric for one version; `None` when that
    /// (metric, version) pair never collected data at this member.
    pub fn value(
        &self,
        id: MemberId,
        metric: &str,
        version: &str,
    ) -> Result<Option<Decimal>, EvaluationError> {
        let member = self.resolve(id)?;
        let result = read(&member.metrics)
            .get(metric)
            .and_then(|m| m.value(version));
        Ok(result)
    }

    /// Value holder of one metric for one version (see
    /// [`Metric::value_factory`]).
    pub fn value_factory(
        &self,
        id: MemberId,
        metric: &str,
        version: &str,
    ) -> Result<Option<crate::metrics::ValueFactory>, EvaluationError> {
        let member = self.resolve(id)?;
        let result = read(&member.metrics)
            .get(metric)
            .and_then(|m| m.value_factory(version));
        Ok(result)
    }

    /// Deterministically ordered snapshot of every (metric, version, value)
    /// on a member.
    pub fn metrics_snapshot(
        &self,
        id: MemberId,
    ) -> Result<BTreeMap<String, BTreeMap<String, Decimal>>, EvaluationError> {
        let member = self.resolve(id)?;
        let metrics = read(&member.metrics);
        let mut snapshot = BTreeMap::new();
        for (name, metric) in metrics.iter() {
            let mut by_version = BTreeMap::new();
            for version in metric.versions() {
                if let Some(value) = metric.value(&version) {
                    by_version.insert(version, value);
                }
            }
            if !by_version.is_empty() {
                snapshot.insert(name.clone(), by_version);
            }
        }
        Ok(snapshot)
    }

    /// Total hit count the search system reported for a query version.
    pub fn total_hits(
        &self,
        query: MemberId,
        version: &str,
    ) -> Result<Option<u64>, EvaluationError> {
        let member = self.resolve(query)?;
        let result = read(&member.query_state()?.total_hits)
            .get(version)
            .copied();
        Ok(result)
    }

    /// The hits collected for a query version, in rank order.
    pub fn collected_hits(
        &self,
        query: MemberId,
        version: &str,
    ) -> Result<Vec<SearchHit>, EvaluationError> {
        let member = self.resolve(query)?;
        let result = read(&member.query_state()?.streams)
            .get(version)
            .map(|stream| stream.hits.clone())
            .unwrap_or_default();
        Ok(result)
    }
}
