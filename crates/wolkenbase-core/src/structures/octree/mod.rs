//! Octree index of disk blocks.
//!
//! Nodes live in an arena and refer to each other by [`NodeHandle`]. Every
//! node has eight slots, one per octant of its cube; a slot is empty, names a
//! block, or points at a deeper node. The root is created internal with eight
//! empty slots. Terminals only ever become internal, never the reverse.

use crate::geometry::{Cube, Shape};
use crate::log_warn;
use crate::types::{IndexError, Xyz};

/// Arena index of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    const ROOT: NodeHandle = NodeHandle(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Content of one octant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot {
    /// Terminal with no block yet
    #[default]
    Empty,
    /// Terminal holding a disk block
    Block(u64),
    /// Internal, refined further
    Node(NodeHandle),
}

impl Slot {
    /// Block number of a terminal slot
    pub fn block(self) -> Option<u64> {
        match self {
            Slot::Block(n) => Some(n),
            _ => None,
        }
    }

    /// True for `Empty` and `Block`
    pub fn is_terminal(self) -> bool {
        !matches!(self, Slot::Node(_))
    }
}

#[derive(Debug, Clone)]
struct Node {
    cube: Cube,
    sub: [Slot; 8],
}

impl Node {
    fn new(cube: Cube) -> Self {
        Self { cube, sub: [Slot::Empty; 8] }
    }
}

/// Where a descent stopped: node, octant, and the terminal found there
#[derive(Debug, Clone, Copy)]
struct Terminal {
    node: NodeHandle,
    octant: usize,
    slot: Slot,
}

/// Spatial index from points to block numbers
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<Node>,
}

impl Octree {
    /// Create an index over `root` with eight empty octants
    pub fn new(root: Cube) -> Self {
        Self { nodes: vec![Node::new(root)] }
    }

    /// Extent of the whole index
    pub fn root(&self) -> Cube {
        self.nodes[NodeHandle::ROOT.index()].cube
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, h: NodeHandle) -> &Node {
        &self.nodes[h.index()]
    }

    fn descend(&self, p: Xyz) -> Terminal {
        let mut h = NodeHandle::ROOT;
        loop {
            let node = self.node(h);
            let octant = node.cube.octant(p);
            match node.sub[octant] {
                Slot::Node(next) => h = next,
                slot => return Terminal { node: h, octant, slot },
            }
        }
    }

    /// Block of the terminal reached by `p`, if it has one
    pub fn find_block(&self, p: Xyz) -> Option<u64> {
        self.descend(p).slot.block()
    }

    /// Extent of the terminal reached by `p`
    pub fn find_cube(&self, p: Xyz) -> Cube {
        let t = self.descend(p);
        self.node(t.node).cube.octant_cube(t.octant)
    }

    /// Extent and block of the terminal reached by `p`
    pub fn locate(&self, p: Xyz) -> (Cube, Option<u64>) {
        let t = self.descend(p);
        (self.node(t.node).cube.octant_cube(t.octant), t.slot.block())
    }

    /// Blocks whose cubes meet `shape`
    pub fn find_blocks(&self, shape: &dyn Shape) -> Vec<u64> {
        self.find_terminals(shape).into_iter().map(|(n, _)| n).collect()
    }

    /// Blocks whose cubes meet `shape`, with their cubes.
    ///
    /// Subtrees whose cube misses the shape are never visited.
    pub fn find_terminals(&self, shape: &dyn Shape) -> Vec<(u64, Cube)> {
        let mut out = Vec::new();
        let mut stack = vec![NodeHandle::ROOT];
        while let Some(h) = stack.pop() {
            let node = self.node(h);
            for (i, slot) in node.sub.iter().enumerate() {
                if *slot == Slot::Empty {
                    continue;
                }
                let cube = node.cube.octant_cube(i);
                if !shape.intersects(&cube) {
                    continue;
                }
                match *slot {
                    Slot::Block(n) => out.push((n, cube)),
                    Slot::Node(next) => stack.push(next),
                    Slot::Empty => {}
                }
            }
        }
        out
    }

    /// Every terminal with its cube, empty ones included
    pub fn terminals(&self) -> Vec<(Cube, Option<u64>)> {
        let mut out = Vec::new();
        for node in &self.nodes {
            for (i, slot) in node.sub.iter().enumerate() {
                if slot.is_terminal() {
                    out.push((node.cube.octant_cube(i), slot.block()));
                }
            }
        }
        out
    }

    /// Install `block` in the terminal reached by `p`.
    ///
    /// Installing the block a terminal already holds is a no-op. A terminal
    /// holding another block is left alone and reported as
    /// [`IndexError::Occupied`].
    pub fn set_block(&mut self, p: Xyz, block: u64) -> Result<(), IndexError> {
        let t = self.descend(p);
        match t.slot {
            Slot::Empty => {
                self.nodes[t.node.index()].sub[t.octant] = Slot::Block(block);
                Ok(())
            }
            Slot::Block(existing) if existing == block => Ok(()),
            Slot::Block(existing) => {
                log_warn!("terminal at {:?} already holds block {}, not installing {}", p, existing, block);
                Err(IndexError::Occupied { block, existing })
            }
            Slot::Node(_) => Err(IndexError::Inconsistent(format!(
                "descent for {p:?} stopped at an internal node"
            ))),
        }
    }

    /// Refine the terminal reached by `p` into eight octants.
    ///
    /// The old block moves to the new octant containing `p`; the other seven
    /// start empty. Points are not moved. Returns the cube of the new node.
    pub fn split(&mut self, p: Xyz) -> Result<Cube, IndexError> {
        let t = self.descend(p);
        Ok(self.refine(t, p))
    }

    /// Refine the terminal reached by `p`, which the caller saw as `cube`.
    ///
    /// Fails with [`IndexError::NotTerminal`] if `cube` was refined in the
    /// meantime, which is how a splitter learns it lost a race.
    pub fn split_cube(&mut self, p: Xyz, cube: &Cube) -> Result<Cube, IndexError> {
        let t = self.descend(p);
        let found = self.node(t.node).cube.octant_cube(t.octant);
        if found == *cube {
            Ok(self.refine(t, p))
        } else if found.side() < cube.side() && cube.contains_point(p) {
            Err(IndexError::NotTerminal(cube.center()))
        } else {
            Err(IndexError::Inconsistent(format!("{p:?} reaches {found:?}, not {cube:?}")))
        }
    }

    fn refine(&mut self, t: Terminal, p: Xyz) -> Cube {
        let cube = self.node(t.node).cube.octant_cube(t.octant);
        let mut node = Node::new(cube);
        node.sub[cube.octant(p)] = t.slot;
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(node);
        self.nodes[t.node.index()].sub[t.octant] = Slot::Node(handle);
        cube
    }

    /// A root cube for `points`: power-of-two side, center aligned to a
    /// sixteenth of the side, every point strictly inside.
    pub fn size_fit(points: &[Xyz]) -> Cube {
        let Some(first) = points.first() else {
            return Cube::new(Xyz::default(), 1.0);
        };
        let (mut lo, mut hi) = (*first, *first);
        for p in points {
            lo = Xyz::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z));
            hi = Xyz::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z));
        }
        let extent = (hi.x - lo.x).max(hi.y - lo.y).max(hi.z - lo.z);
        let mut side = if extent > 0.0 { 2f64.powi(extent.log2().ceil() as i32) } else { 1.0 };
        let mid = (lo + hi) / 2.0;
        loop {
            let step = side / 16.0;
            let align = |v: f64| (v / step).round() * step;
            let cube = Cube::new(Xyz::new(align(mid.x), align(mid.y), align(mid.z)), side);
            if points.iter().all(|p| cube.strictly_contains(*p)) {
                return cube;
            }
            side *= 2.0;
        }
    }
}
