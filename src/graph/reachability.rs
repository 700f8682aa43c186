//! Transitive build inclusion over the usage graph.
//!
//! An asset is included when it is explicitly included, or when any asset
//! that uses it is included. Usage graphs are routinely cyclic; a branch
//! that returns to an asset already on the current path contributes
//! `false`. The walk is iterative so deep chains cannot exhaust the stack.
use super::{AssetId, UsageGraph};

/// Per-query state of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    InProgress,
    /// Fully explored in this query without reaching an included asset.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    asset: AssetId,
    next: usize,
}

/// Scratch buffers for one query, reset between queries.
#[derive(Debug, Default)]
pub struct DfsScratch {
    state: Vec<VisitState>,
    touched: Vec<AssetId>,
    frames: Vec<Frame>,
}

impl DfsScratch {
    fn reset(&mut self, len: usize) {
        if self.state.len() != len {
            self.state.clear();
            self.state.resize(len, VisitState::Unvisited);
        } else {
            for id in self.touched.drain(..) {
                self.state[id.0] = VisitState::Unvisited;
            }
        }
        self.touched.clear();
        self.frames.clear();
    }

    fn mark(&mut self, id: AssetId, state: VisitState) {
        if self.state[id.0] == VisitState::Unvisited {
            self.touched.push(id);
        }
        self.state[id.0] = state;
    }
}

/// Answers "is this asset part of a build" against one [`UsageGraph`].
#[derive(Debug, Clone, Copy)]
pub struct InclusionAnalyzer<'g> {
    graph: &'g UsageGraph,
}

impl<'g> InclusionAnalyzer<'g> {
    #[must_use]
    pub fn new(graph: &'g UsageGraph) -> Self {
        Self { graph }
    }

    #[must_use]
    pub fn is_included(&self, id: AssetId) -> bool {
        let mut scratch = DfsScratch::default();
        self.walk(id, &mut scratch, |_| None).0
    }

    /// Iterative walk from `start` over usage edges.
    ///
    /// `known` may short-circuit an asset with an already resolved answer.
    /// Returns the answer and, on success, the assets on the frame stack.
    fn walk(
        &self,
        start: AssetId,
        scratch: &mut DfsScratch,
        known: impl Fn(AssetId) -> Option<bool>,
    ) -> (bool, Vec<AssetId>) {
        scratch.reset(self.graph.len());
        if start.0 >= self.graph.len() {
            return (false, Vec::new());
        }
        if self.graph.is_explicitly_included(start) {
            return (true, vec![start]);
        }
        scratch.mark(start, VisitState::InProgress);
        scratch.frames.push(Frame { asset: start, next: 0 });

        while let Some(frame) = scratch.frames.last_mut() {
            let users = self.graph.usages(frame.asset);
            let Some(&user) = users.get(frame.next) else {
                let done = frame.asset;
                scratch.frames.pop();
                scratch.mark(done, VisitState::Exhausted);
                continue;
            };
            frame.next += 1;
            if self.graph.is_explicitly_included(user) || known(user) == Some(true) {
                let mut path: Vec<AssetId> = scratch.frames.iter().map(|f| f.asset).collect();
                path.push(user);
                return (true, path);
            }
            if known(user) == Some(false) {
                continue;
            }
            match scratch.state[user.0] {
                VisitState::Unvisited => {
                    scratch.mark(user, VisitState::InProgress);
                    scratch.frames.push(Frame { asset: user, next: 0 });
                }
                VisitState::InProgress | VisitState::Exhausted => {}
            }
        }
        (false, Vec::new())
    }
}

/// Inclusion queries over many assets with shared memoisation.
///
/// A negative answer holds for every asset the query touched, because each
/// of them only reaches a subset of what the start reaches. A positive
/// answer holds for every asset on the frame stack at the time it was found.
#[derive(Debug)]
pub struct BatchInclusion<'g> {
    analyzer: InclusionAnalyzer<'g>,
    memo: Vec<Option<bool>>,
    scratch: DfsScratch,
}

impl<'g> BatchInclusion<'g> {
    #[must_use]
    pub fn new(graph: &'g UsageGraph) -> Self {
        Self {
            analyzer: InclusionAnalyzer::new(graph),
            memo: vec![None; graph.len()],
            scratch: DfsScratch::default(),
        }
    }

    pub fn is_included(&mut self, id: AssetId) -> bool {
        if let Some(Some(answer)) = self.memo.get(id.0) {
            return *answer;
        }
        let memo = &self.memo;
        let (answer, path) =
            self.analyzer.walk(id, &mut self.scratch, |a| memo.get(a.0).copied().flatten());
        if answer {
            for a in path {
                if let Some(slot) = self.memo.get_mut(a.0) {
                    *slot = Some(true);
                }
            }
        } else {
            for a in &self.scratch.touched {
                self.memo[a.0] = Some(false);
            }
        }
        answer
    }
}
