use super::*;

/// Orders two decimation candidates by the slope `-dd / dr` of their
/// distortion against rate trade-off. Candidates that save rate for free
/// come first, candidates that only add rate come last.
#[inline]
pub(crate) fn dddr_cmp(dd1: i32, dr1: i32, dd2: i32, dr2: i32) -> i32 {
    if dr1 == 0 {
        if dr2 == 0 {
            signum(dd2 as i64 - dd1 as i64)
        } else {
            (signum(dd1 as i64) << 1) - 1
        }
    } else if dr2 == 0 {
        (signum(-(dd2 as i64)) << 1) + 1
    } else {
        signum(dd2 as i64 * dr1 as i64 - dd1 as i64 * dr2 as i64)
    }
}

#[inline]
fn node_cmp(a: &MvNode, b: &MvNode) -> i32 {
    dddr_cmp(a.dd, a.dr, b.dd, b.dr)
}

/// Binary min-heap of decimation candidates, stored as node indices. Each
/// node keeps its own position in `heapi` so it can be updated in place.
#[derive(Debug, Clone, Default)]
pub(crate) struct DecHeap {
    heap: Vec<usize>,
}

impl DecHeap {
    pub(crate) fn new(capacity: usize) -> Result<Self, MeshError> {
        let mut heap = Vec::new();
        heap.try_reserve_exact(capacity)
            .map_err(|_| MeshError::OutOfMemory("decimation heap"))?;
        Ok(DecHeap { heap })
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Appends without ordering; call `heapify` once all are in.
    pub(crate) fn push_unordered(&mut self, nodes: &mut [MvNode], ni: usize) {
        nodes[ni].heapi = Some(self.heap.len());
        self.heap.push(ni);
    }

    #[inline]
    fn swap(&mut self, nodes: &mut [MvNode], p: usize, q: usize) {
        self.heap.swap(p, q);
        nodes[self.heap[p]].heapi = Some(p);
        nodes[self.heap[q]].heapi = Some(q);
    }

    fn down(&mut self, nodes: &mut [MvNode], mut p: usize) {
        let n = self.heap.len();
        let l = n >> 1;
        while p < l {
            let mut q = (p << 1) + 1;
            if q + 1 < n && node_cmp(&nodes[self.heap[q]], &nodes[self.heap[q + 1]]) >= 0 {
                q += 1;
            }
            if node_cmp(&nodes[self.heap[p]], &nodes[self.heap[q]]) <= 0 {
                break;
            }
            self.swap(nodes, p, q);
            p = q;
        }
    }

    fn up(&mut self, nodes: &mut [MvNode], mut q: usize) {
        while q > 0 {
            let p = ((q + 1) >> 1) - 1;
            if node_cmp(&nodes[self.heap[p]], &nodes[self.heap[q]]) <= 0 {
                break;
            }
            self.swap(nodes, p, q);
            q = p;
        }
    }

    pub(crate) fn heapify(&mut self, nodes: &mut [MvNode]) {
        for i in (0..self.heap.len() >> 1).rev() {
            self.down(nodes, i);
        }
    }

    pub(crate) fn head(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    pub(crate) fn pop(&mut self, nodes: &mut [MvNode]) -> Option<usize> {
        let head = self.head()?;
        nodes[head].heapi = None;
        let last = self.heap.pop()?;
        if !self.heap.is_empty() {
            self.heap[0] = last;
            nodes[last].heapi = Some(0);
            self.down(nodes, 0);
        }
        Some(head)
    }

    /// Removes `ni` if it is queued.
    pub(crate) fn remove(&mut self, nodes: &mut [MvNode], ni: usize) {
        let heapi = match nodes[ni].heapi {
            Some(i) => i,
            None => return,
        };
        nodes[ni].heapi = None;
        let last = match self.heap.pop() {
            Some(last) => last,
            None => return,
        };
        if heapi < self.heap.len() {
            self.heap[heapi] = last;
            nodes[last].heapi = Some(heapi);
            if node_cmp(&nodes[ni], &nodes[last]) >= 0 {
                self.up(nodes, heapi);
            } else {
                self.down(nodes, heapi);
            }
        }
    }

    /// Sets the cost of `ni` and restores its place if it is queued.
    pub(crate) fn update(&mut self, nodes: &mut [MvNode], ni: usize, dd: i32, dr: i32) {
        let node = &mut nodes[ni];
        let diff = dddr_cmp(dd, dr, node.dd, node.dr);
        node.dd = dd;
        node.dr = dr;
        if let Some(heapi) = node.heapi {
            if diff <= 0 {
                self.up(nodes, heapi);
            } else {
                self.down(nodes, heapi);
            }
        }
    }
}
