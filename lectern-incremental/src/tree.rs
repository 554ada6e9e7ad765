//! Prefix-sharing tree of filter chains.
//!
//! Every (entry, view) context registers the ordered chain of filters it
//! needs. Chains that start with the same filters walk the same nodes, and
//! each node counts how many chains pass through it. Replaying a context's
//! path and cutting wherever that count changes yields the batches that are
//! cached as a unit:
//!
//! ```text
//! A = [markdown, h1, typography]      markdown(2) -> h1(2) -> typography(1)
//! B = [markdown, h1, summarize]                           \-> summarize(1)
//!
//! iter(A) = [[markdown, h1], [typography]]
//! ```
//!
//! All `add` calls must happen before the first `iter`: batch boundaries
//! depend on counts that are only final once every chain is registered.
//! `add` takes `&mut self` and `iter` takes `&self`, so a tree that is being
//! read from worker threads can no longer be extended.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Node<F> {
    filter: F,
    refs: usize,
    children: HashMap<F, usize>,
}

#[derive(Debug)]
struct Registered<F> {
    chain: Vec<F>,
    path: Vec<usize>,
}

/// Tree of filter chains keyed by context
#[derive(Debug)]
pub struct FilterTree<F, K> {
    roots: HashMap<F, usize>,
    nodes: Vec<Node<F>>,
    contexts: HashMap<K, Registered<F>>,
}

impl<F, K> FilterTree<F, K>
where
    F: Clone + Eq + Hash,
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            roots: HashMap::new(),
            nodes: Vec::new(),
            contexts: HashMap::new(),
        }
    }

    /// Register `chain` for `context`.
    ///
    /// Re-registering a context first releases the path it held before.
    pub fn add(&mut self, chain: Vec<F>, context: K) {
        if let Some(previous) = self.contexts.remove(&context) {
            for id in previous.path {
                self.nodes[id].refs -= 1;
            }
        }

        let mut path = Vec::with_capacity(chain.len());
        let mut parent: Option<usize> = None;

        for filter in &chain {
            let existing = match parent {
                None => self.roots.get(filter).copied(),
                Some(p) => self.nodes[p].children.get(filter).copied(),
            };

            let id = match existing {
                Some(id) => id,
                None => {
                    let id = self.nodes.len();
                    self.nodes.push(Node {
                        filter: filter.clone(),
                        refs: 0,
                        children: HashMap::new(),
                    });
                    match parent {
                        None => self.roots.insert(filter.clone(), id),
                        Some(p) => self.nodes[p].children.insert(filter.clone(), id),
                    };
                    id
                }
            };

            self.nodes[id].refs += 1;
            path.push(id);
            parent = Some(id);
        }

        self.contexts.insert(context, Registered { chain, path });
    }

    /// The chain originally registered for `context`
    pub fn path(&self, context: &K) -> Option<&[F]> {
        self.contexts.get(context).map(|r| r.chain.as_slice())
    }

    /// Batches for `context`, in application order.
    ///
    /// Unknown contexts and empty chains yield nothing.
    pub fn iter(&self, context: &K) -> Batches<'_, F> {
        let path = self
            .contexts
            .get(context)
            .map(|r| r.path.as_slice())
            .unwrap_or(&[]);
        Batches {
            nodes: &self.nodes,
            path,
            pos: 0,
        }
    }

    /// Number of chains sharing the `depth`-th filter of `context`'s path
    pub fn refs(&self, context: &K, depth: usize) -> Option<usize> {
        let id = *self.contexts.get(context)?.path.get(depth)?;
        Some(self.nodes[id].refs)
    }

    /// Number of registered contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Number of distinct nodes ever created
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl<F, K> Default for FilterTree<F, K>
where
    F: Clone + Eq + Hash,
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the batches of one context's path
#[derive(Debug)]
pub struct Batches<'a, F> {
    nodes: &'a [Node<F>],
    path: &'a [usize],
    pos: usize,
}

impl<'a, F> Iterator for Batches<'a, F> {
    type Item = Vec<&'a F>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = *self.path.get(self.pos)?;
        let refs = self.nodes[first].refs;

        let mut batch = vec![&self.nodes[first].filter];
        self.pos += 1;

        while let Some(&id) = self.path.get(self.pos) {
            if self.nodes[id].refs != refs {
                break;
            }
            batch.push(&self.nodes[id].filter);
            self.pos += 1;
        }

        Some(batch)
    }
}
