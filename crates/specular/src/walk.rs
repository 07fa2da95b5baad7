//! Tree traversal
//!
//! [`Walk`] visits a node tree with an explicit stack. Children are visited
//! in a fixed order: the predicates subtree, then regular children sorted by
//! key, then the template subtree. Predicates and template are only entered
//! when requested. Childless non-root nodes are reported once.

use crate::node::Node;
use crate::path::{is_reserved, Path, PREDICATES, TEMPLATE};

/// Which visit of a node is being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Before the node's children
    Pre,
    /// After the node's children
    Post,
}

/// Visitor verdict controlling the rest of the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visit {
    /// Keep going
    #[default]
    Continue,
    /// Do not descend into the current node (only meaningful on `Pre`)
    SkipChildren,
    /// Abort the walk
    Stop,
}

/// Traversal options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Walk {
    /// Report nodes before their children
    pub preorder: bool,
    /// Report nodes after their children
    pub postorder: bool,
    /// Enter `.` subtrees
    pub predicates: bool,
    /// Enter `?` subtrees
    pub template: bool,
}

impl Default for Walk {
    fn default() -> Self {
        Self::postorder()
    }
}

enum Step<'a> {
    Enter(Path, &'a Node, bool),
    Exit(Path, &'a Node),
}

impl Walk {
    /// Post-order walk over regular children only
    #[must_use]
    pub const fn postorder() -> Self {
        Self {
            preorder: false,
            postorder: true,
            predicates: false,
            template: false,
        }
    }

    /// Pre-order walk over regular children only
    #[must_use]
    pub const fn preorder() -> Self {
        Self {
            preorder: true,
            postorder: false,
            predicates: false,
            template: false,
        }
    }

    /// Report both visits
    #[must_use]
    pub const fn both() -> Self {
        Self {
            preorder: true,
            postorder: true,
            predicates: false,
            template: false,
        }
    }

    /// Also enter predicates
    #[must_use]
    pub const fn with_predicates(mut self) -> Self {
        self.predicates = true;
        self
    }

    /// Also enter templates
    #[must_use]
    pub const fn with_template(mut self) -> Self {
        self.template = true;
        self
    }

    /// Run the walk, returning `false` if the visitor stopped it
    pub fn run<'a, F>(&self, root: &'a Node, mut visit: F) -> bool
    where
        F: FnMut(&Path, &'a Node, Order) -> Visit,
    {
        let mut stack = vec![Step::Enter(Path::root(), root, true)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(path, node, is_root) => {
                    if !is_root && node.nodes.is_empty() {
                        let order = if self.preorder { Order::Pre } else { Order::Post };
                        if (self.preorder || self.postorder)
                            && visit(&path, node, order) == Visit::Stop
                        {
                            return false;
                        }
                        continue;
                    }

                    if self.preorder {
                        match visit(&path, node, Order::Pre) {
                            Visit::Stop => return false,
                            Visit::SkipChildren => {
                                if self.postorder {
                                    stack.push(Step::Exit(path, node));
                                }
                                continue;
                            }
                            Visit::Continue => {}
                        }
                    }

                    if self.postorder {
                        stack.push(Step::Exit(path.clone(), node));
                    }
                    self.push_children(&mut stack, &path, node);
                }
                Step::Exit(path, node) => {
                    if visit(&path, node, Order::Post) == Visit::Stop {
                        return false;
                    }
                }
            }
        }
        true
    }

    // pushed in reverse so that they pop as ".", sorted children, "?"
    fn push_children<'a>(&self, stack: &mut Vec<Step<'a>>, path: &Path, node: &'a Node) {
        if self.template {
            if let Some(template) = node.nodes.get(TEMPLATE) {
                stack.push(Step::Enter(path.child(TEMPLATE), template, false));
            }
        }
        for (key, child) in node.nodes.iter().rev() {
            if is_reserved(key) {
                continue;
            }
            stack.push(Step::Enter(path.child(key.as_str()), child, false));
        }
        if self.predicates {
            if let Some(predicates) = node.nodes.get(PREDICATES) {
                stack.push(Step::Enter(path.child(PREDICATES), predicates, false));
            }
        }
    }

    /// Collect every reported `(path, node)` pair
    #[must_use]
    pub fn collect<'a>(&self, root: &'a Node) -> Vec<(Path, &'a Node)> {
        let mut out = Vec::new();
        self.run(root, |path, node, _| {
            out.push((path.clone(), node));
            Visit::Continue
        });
        out
    }
}
