use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Opaque payload attached to a [`Term`](Kind::Term) leaf.
///
/// Stage builders decide what goes in here (a predicate closure, a compiled
/// action, a constant); the builder never inspects it and the runtime
/// downcasts it back to the concrete type it registered.
pub type TermOp = Arc<dyn Any + Send + Sync>;

/// A node in the compiled expression tree.
///
/// `Expression` is a cheap-to-clone handle: cloning shares the underlying
/// node, which is how multi-parent subtrees are wired into every parent
/// without duplication. Nodes are frozen on construction; the compiler
/// assembles operand lists bottom-up and never mutates a node after it
/// exists.
///
/// Equality and hashing are by node identity, not structure. Two
/// separately-built nodes with the same shape compare unequal; a clone of a
/// node compares equal to the original.
#[derive(Clone)]
pub struct Expression {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    kind: Kind,
}

/// The kind of an expression node, with its children where applicable.
///
/// `Implication` holds exactly two operands: the antecedent followed by the
/// consequent. The runtime evaluates the antecedent and, iff it succeeds,
/// the consequent; the overall result is the antecedent's.
pub enum Kind {
    /// Opaque predicate/action leaf created by a per-stage builder.
    Term(TermOp),
    /// All operands must succeed; short-circuits on first failure.
    And(Vec<Expression>),
    /// Operands tried in order; first success wins.
    Or(Vec<Expression>),
    /// Operands evaluated in order unconditionally.
    Chain(Vec<Expression>),
    /// All operands receive the input; no short-circuit.
    Broadcast(Vec<Expression>),
    /// Antecedent gates the consequent.
    Implication(Vec<Expression>),
}

impl Expression {
    /// Create a leaf node with an opaque runtime payload.
    pub fn term(name: impl Into<String>, op: TermOp) -> Self {
        Self::new(name, Kind::Term(op))
    }

    /// Create a conjunction over `operands`.
    pub fn and(name: impl Into<String>, operands: Vec<Expression>) -> Self {
        Self::new(name, Kind::And(operands))
    }

    /// Create a first-success-wins alternative over `operands`.
    pub fn or(name: impl Into<String>, operands: Vec<Expression>) -> Self {
        Self::new(name, Kind::Or(operands))
    }

    /// Create an unconditional sequence over `operands`.
    pub fn chain(name: impl Into<String>, operands: Vec<Expression>) -> Self {
        Self::new(name, Kind::Chain(operands))
    }

    /// Create a fan-out over `operands`.
    pub fn broadcast(name: impl Into<String>, operands: Vec<Expression>) -> Self {
        Self::new(name, Kind::Broadcast(operands))
    }

    /// Create an implication. The two-operand arity is fixed by this
    /// signature; there is no way to build a malformed implication.
    pub fn implication(
        name: impl Into<String>,
        antecedent: Expression,
        consequent: Expression,
    ) -> Self {
        Self::new(name, Kind::Implication(vec![antecedent, consequent]))
    }

    fn new(name: impl Into<String>, kind: Kind) -> Self {
        Expression {
            inner: Arc::new(Inner {
                name: name.into(),
                kind,
            }),
        }
    }

    /// The node's display name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Static label of the node kind, for diagnostics and tests.
    pub fn kind_name(&self) -> &'static str {
        match self.inner.kind {
            Kind::Term(_) => "term",
            Kind::And(_) => "and",
            Kind::Or(_) => "or",
            Kind::Chain(_) => "chain",
            Kind::Broadcast(_) => "broadcast",
            Kind::Implication(_) => "implication",
        }
    }

    /// Whether this node is an operator (anything but a term).
    pub fn is_operation(&self) -> bool {
        !matches!(self.inner.kind, Kind::Term(_))
    }

    /// The node's children. Empty for terms; for implications the slice is
    /// `[antecedent, consequent]`.
    pub fn operands(&self) -> &[Expression] {
        match &self.inner.kind {
            Kind::Term(_) => &[],
            Kind::And(ops)
            | Kind::Or(ops)
            | Kind::Chain(ops)
            | Kind::Broadcast(ops)
            | Kind::Implication(ops) => ops,
        }
    }

    /// The antecedent of an implication node.
    pub fn antecedent(&self) -> Option<&Expression> {
        match &self.inner.kind {
            Kind::Implication(ops) => ops.first(),
            _ => None,
        }
    }

    /// The consequent of an implication node.
    pub fn consequent(&self) -> Option<&Expression> {
        match &self.inner.kind {
            Kind::Implication(ops) => ops.get(1),
            _ => None,
        }
    }

    /// Depth-first pre-order traversal. A subtree shared by several parents
    /// is yielded once per reference.
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.inner), state);
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            Kind::Term(_) => write!(f, "Term({:?})", self.name()),
            Kind::Implication(ops) => write!(
                f,
                "Implication({:?}, {:?}, {:?})",
                self.name(),
                ops[0],
                ops[1]
            ),
            _ => {
                let label = match self.inner.kind {
                    Kind::And(_) => "And",
                    Kind::Or(_) => "Or",
                    Kind::Chain(_) => "Chain",
                    Kind::Broadcast(_) => "Broadcast",
                    _ => unreachable!(),
                };
                write!(f, "{}({:?}, {:?})", label, self.name(), self.operands())
            }
        }
    }
}

/// Pre-order iterator over an expression tree. Uses an explicit stack, so
/// arbitrarily deep trees cannot overflow the call stack.
pub struct Iter<'a> {
    stack: Vec<&'a Expression>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Expression;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.operands().iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn term(name: &str) -> Expression {
        Expression::term(name, Arc::new(()))
    }

    #[test]
    fn test_constructors_and_accessors() {
        let a = term("a");
        let b = term("b");
        let and = Expression::and("both", vec![a.clone(), b.clone()]);

        assert_eq!(and.name(), "both");
        assert_eq!(and.kind_name(), "and");
        assert!(and.is_operation());
        assert!(!a.is_operation());
        assert_eq!(and.operands().len(), 2);
        assert_eq!(and.operands()[0], a);
        assert_eq!(and.operands()[1], b);
        assert!(a.operands().is_empty());
    }

    #[test]
    fn test_implication_accessors() {
        let ante = term("ante");
        let cons = term("cons");
        let imp = Expression::implication("imp", ante.clone(), cons.clone());

        assert_eq!(imp.antecedent(), Some(&ante));
        assert_eq!(imp.consequent(), Some(&cons));
        assert_eq!(imp.operands(), &[ante.clone(), cons.clone()]);

        // Non-implications have neither.
        assert_eq!(ante.antecedent(), None);
        assert_eq!(Expression::or("o", vec![]).consequent(), None);
    }

    #[test]
    fn test_identity_equality() {
        let a = term("same");
        let b = term("same");

        assert_eq!(a, a.clone(), "a clone shares the node and compares equal");
        assert_ne!(a, b, "structurally identical nodes are distinct");
    }

    #[test]
    fn test_identity_hashing() {
        let a = term("a");
        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        assert_eq!(set.len(), 1);

        set.insert(term("a"));
        assert_eq!(set.len(), 2, "a fresh node hashes as a new entry");
    }

    #[test]
    fn test_preorder_iteration() {
        let leaf1 = term("leaf1");
        let leaf2 = term("leaf2");
        let inner = Expression::or("inner", vec![leaf1, leaf2]);
        let leaf3 = term("leaf3");
        let root = Expression::chain("root", vec![inner, leaf3]);

        let names: Vec<&str> = root.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["root", "inner", "leaf1", "leaf2", "leaf3"]);
    }

    #[test]
    fn test_shared_subtree_yielded_per_reference() {
        let shared = term("shared");
        let left = Expression::and("left", vec![shared.clone()]);
        let right = Expression::and("right", vec![shared.clone()]);
        let root = Expression::broadcast("root", vec![left, right]);

        let count = root.iter().filter(|e| e.name() == "shared").count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_term_payload_downcast() {
        let expr = Expression::term("t", Arc::new("payload".to_string()));
        match expr.kind() {
            Kind::Term(op) => {
                let value = op.downcast_ref::<String>().expect("payload type");
                assert_eq!(value, "payload");
            }
            _ => panic!("expected a term"),
        }
    }
}
