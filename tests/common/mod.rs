//! Shared fixtures: an expression tree summed by `Summer` and a linked list
//! measured and flattened by `ListVisitor`.

#![allow(dead_code)]

use std::sync::Arc;

use multivisit::{DispatchError, Slots, Subject, VisitEngine, VisitHandler, Visitable, VisitingMethods};
use once_cell::sync::Lazy;

pub struct Leaf {
    pub value: i64,
}

impl Visitable for Leaf {
    fn slots(slots: &mut Slots<Self>) {
        slots.stored(0, "value", |leaf| &leaf.value);
    }
}

pub struct Node {
    pub left: Arc<dyn Subject>,
    pub right: Arc<dyn Subject>,
}

impl Visitable for Node {
    fn slots(slots: &mut Slots<Self>) {
        slots
            .stored(0, "left", |node| &node.left)
            .stored(1, "right", |node| &node.right);
    }
}

pub fn leaf(value: i64) -> Arc<dyn Subject> {
    Arc::new(Leaf { value })
}

pub fn node(left: Arc<dyn Subject>, right: Arc<dyn Subject>) -> Arc<dyn Subject> {
    Arc::new(Node { left, right })
}

/// Balanced tree whose leaves hold `1..=leaves`
pub fn tree(leaves: i64) -> Arc<dyn Subject> {
    fn build(low: i64, high: i64) -> Arc<dyn Subject> {
        if low == high {
            return leaf(low);
        }
        let mid = low + (high - low) / 2;
        node(build(low, mid), build(mid + 1, high))
    }
    build(1, leaves.max(1))
}

pub static SUM: Lazy<Arc<VisitEngine<Summer, i64>>> =
    Lazy::new(|| Arc::new(VisitEngine::new("sum").expect("Summer has a sum visit")));

pub struct Summer;

impl Summer {
    pub fn sum_leaf(&self, _leaf: &Leaf, value: &i64) -> Result<i64, DispatchError> {
        Ok(*value)
    }

    pub fn sum_node(
        &self,
        _node: &Node,
        left: &Arc<dyn Subject>,
        right: &Arc<dyn Subject>,
    ) -> Result<i64, DispatchError> {
        Ok(SUM.dispatch(self, left.as_ref())? + SUM.dispatch(self, right.as_ref())?)
    }

    /// Sums the right branch on another thread while this one sums the left
    pub fn sum_node_in_parallel(
        self: &Arc<Self>,
        left: &Arc<dyn Subject>,
        right: &Arc<dyn Subject>,
    ) -> Result<i64, DispatchError> {
        let (visit, pending) = SUM.defer(Arc::clone(self), Arc::clone(right));
        let handle = visit.spawn().map_err(|_| DispatchError::Abandoned)?;

        let left = SUM.dispatch(self, left.as_ref())?;
        let right = pending.wait()?;
        handle.join().map_err(|_| DispatchError::Abandoned)?;
        Ok(left + right)
    }
}

impl VisitHandler for Summer {
    fn visiting_methods(methods: &mut VisitingMethods<Self>) {
        methods
            .visit("sum")
            .method("sum_leaf", Self::sum_leaf)
            .method("sum_node", Self::sum_node);
    }
}

pub struct EmptyList;

impl Visitable for EmptyList {}

pub struct ConsList {
    pub head: String,
    pub tail: Arc<dyn Subject>,
}

impl Visitable for ConsList {
    fn slots(slots: &mut Slots<Self>) {
        slots
            .stored(0, "head", |list| &list.head)
            .computed(1, "tail", |list| Arc::clone(&list.tail));
    }
}

pub fn list(items: &[&str]) -> Arc<dyn Subject> {
    items.iter().rev().fold(Arc::new(EmptyList) as Arc<dyn Subject>, |tail, head| {
        Arc::new(ConsList {
            head: head.to_string(),
            tail,
        })
    })
}

pub static LENGTH: Lazy<VisitEngine<ListVisitor, usize>> =
    Lazy::new(|| VisitEngine::new("length").expect("ListVisitor has a length visit"));

pub static TO_VEC: Lazy<VisitEngine<ListVisitor, Vec<String>>> =
    Lazy::new(|| VisitEngine::new("to_vec").expect("ListVisitor has a to_vec visit"));

pub struct ListVisitor;

impl ListVisitor {
    fn length_empty(&self, _list: &EmptyList) -> Result<usize, DispatchError> {
        Ok(0)
    }

    fn length_cons(&self, _list: &ConsList, _head: &String, tail: &Arc<dyn Subject>) -> Result<usize, DispatchError> {
        Ok(1 + LENGTH.dispatch(self, tail.as_ref())?)
    }

    fn to_vec_empty(&self, _list: &EmptyList) -> Result<Vec<String>, DispatchError> {
        Ok(Vec::new())
    }

    fn to_vec_cons(
        &self,
        _list: &ConsList,
        head: &String,
        tail: &Arc<dyn Subject>,
    ) -> Result<Vec<String>, DispatchError> {
        let mut items = vec![head.clone()];
        items.extend(TO_VEC.dispatch(self, tail.as_ref())?);
        Ok(items)
    }
}

impl VisitHandler for ListVisitor {
    fn visiting_methods(methods: &mut VisitingMethods<Self>) {
        methods
            .visit("length")
            .method("length_empty", Self::length_empty)
            .method("length_cons", Self::length_cons);
        methods
            .visit("to_vec")
            .method("to_vec_empty", Self::to_vec_empty)
            .method("to_vec_cons", Self::to_vec_cons);
    }
}
