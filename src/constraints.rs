use crate::{
    ast::{Node, Operator, OperatorKind},
    error::SchemaError,
    evaluation::{ValidatedData, ViolationKind},
    fields::{FieldId, FieldTable},
};
use itertools::Itertools;
use slab::Slab;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::trace;

pub type NodeId = usize;

/// A field operand: the field together with its attribution key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    id: FieldId,
    attrname: String,
}

impl FieldRef {
    #[inline]
    pub fn id(&self) -> FieldId {
        self.id
    }

    #[inline]
    pub fn attrname(&self) -> &str {
        &self.attrname
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Field(FieldRef),
    Node(NodeId),
}

impl Operand {
    /// The field name failures are reported under; nested nodes have none.
    #[inline]
    pub fn attrname(&self) -> Option<&str> {
        match self {
            Self::Field(field) => Some(field.attrname()),
            Self::Node(_) => None,
        }
    }
}

/// A declared AND/OR node, immutable once the schema is built.
#[derive(Clone, Debug)]
pub struct ConstraintNode {
    kind: OperatorKind,
    operands: Vec<Operand>,
    required: bool,
    leaves: usize,
    expression: String,
}

impl ConstraintNode {
    #[inline]
    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    #[inline]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Number of field leaves under the node.
    #[inline]
    pub fn len(&self) -> usize {
        self.leaves
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }
}

impl Display for ConstraintNode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.expression)
    }
}

/// A constraint node that was not satisfied.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{message}")]
pub struct ConstraintViolation {
    pub kind: ViolationKind,
    /// The operand the failure is attributed to.
    pub subject: Operand,
    /// Other operands involved in the failure, in declaration order.
    pub secondary: Vec<Operand>,
    pub message: String,
}

/// The constraint trees of one form type.
#[derive(Clone, Debug, Default)]
pub struct Constraints {
    nodes: Slab<ConstraintNode>,
    roots: Vec<NodeId>,
}

impl Constraints {
    pub(crate) fn new(
        operators: &[Operator],
        fields: &FieldTable,
        required: &[bool],
    ) -> Result<Self, SchemaError> {
        let mut constraints = Self {
            nodes: Slab::with_capacity(operators.len()),
            roots: Vec::with_capacity(operators.len()),
        };
        for operator in operators {
            let (root, _) = constraints.insert_node(operator, fields, required)?;
            constraints.roots.push(root);
        }
        Ok(constraints)
    }

    fn insert_node(
        &mut self,
        operator: &Operator,
        fields: &FieldTable,
        required: &[bool],
    ) -> Result<(NodeId, bool), SchemaError> {
        if operator.operands().is_empty() {
            return Err(SchemaError::EmptyOperator);
        }

        let mut operands = Vec::with_capacity(operator.operands().len());
        let mut any_required = false;
        for operand in operator.operands() {
            match operand {
                Node::Field(name) => {
                    let id = fields.resolve(name)?;
                    let duplicated = operands
                        .iter()
                        .any(|operand| matches!(operand, Operand::Field(field) if field.id == id));
                    if duplicated {
                        return Err(SchemaError::DuplicateOperand(name.to_owned()));
                    }
                    any_required |= required[id.0];
                    operands.push(Operand::Field(FieldRef {
                        id,
                        attrname: name.to_owned(),
                    }));
                }
                Node::Operator(nested) => {
                    let (node_id, nested_required) = self.insert_node(nested, fields, required)?;
                    any_required |= nested_required;
                    operands.push(Operand::Node(node_id));
                }
            }
        }

        let kind = operator.kind();
        let required = match kind {
            OperatorKind::And => operator.required_override().unwrap_or(any_required),
            OperatorKind::Or => operator.required_override().unwrap_or(false),
        };
        let node = ConstraintNode {
            kind,
            operands,
            required,
            leaves: operator.len(),
            expression: operator.to_string(),
        };
        Ok((self.nodes.insert(node), required))
    }

    #[inline]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&ConstraintNode> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Every field operand under the node, at any depth, in declaration order and without repeats.
    pub fn iter_all_operands(&self, id: NodeId) -> Vec<&FieldRef> {
        let mut fields = Vec::new();
        self.collect_fields(&self.nodes[id].operands, &mut fields);
        fields.into_iter().unique_by(|field| field.id).collect()
    }

    /// The fields an operand covers.
    pub fn fields_under(&self, operand: &Operand) -> Vec<FieldId> {
        match operand {
            Operand::Field(field) => vec![field.id],
            Operand::Node(id) => self
                .iter_all_operands(*id)
                .into_iter()
                .map(FieldRef::id)
                .collect(),
        }
    }

    fn collect_fields<'a>(&'a self, operands: &'a [Operand], fields: &mut Vec<&'a FieldRef>) {
        for operand in operands {
            match operand {
                Operand::Field(field) => fields.push(field),
                Operand::Node(id) => self.collect_fields(&self.nodes[*id].operands, fields),
            }
        }
    }

    /// Evaluate a node against the validated data.
    ///
    /// A satisfied OR returns its first satisfied operand holding a present field; every other
    /// success returns `None`.
    pub fn evaluate(
        &self,
        id: NodeId,
        data: &ValidatedData,
    ) -> Result<Option<&Operand>, ConstraintViolation> {
        let node = &self.nodes[id];
        let result = match node.kind {
            OperatorKind::And => self.evaluate_and(node, data),
            OperatorKind::Or => self.evaluate_or(node, data),
        };
        trace!(node = %node, ok = result.is_ok(), "evaluated constraint");
        result
    }

    #[inline]
    fn is_satisfied(&self, operand: &Operand, data: &ValidatedData) -> bool {
        match operand {
            Operand::Field(field) => data.contains_id(field.id),
            Operand::Node(id) => self.evaluate(*id, data).is_ok(),
        }
    }

    /// An OR alternative can only be chosen when it holds at least one present field.
    fn is_chosen(&self, operand: &Operand, data: &ValidatedData) -> bool {
        match operand {
            Operand::Field(field) => data.contains_id(field.id),
            Operand::Node(id) => {
                self.iter_all_operands(*id)
                    .iter()
                    .any(|field| data.contains_id(field.id))
                    && self.evaluate(*id, data).is_ok()
            }
        }
    }

    fn evaluate_or<'a>(
        &'a self,
        node: &'a ConstraintNode,
        data: &ValidatedData,
    ) -> Result<Option<&'a Operand>, ConstraintViolation> {
        if let Some(winner) = node
            .operands
            .iter()
            .find(|operand| self.is_chosen(operand, data))
        {
            return Ok(Some(winner));
        }

        match node.operands.last() {
            Some(last) if node.required => Err(violation(
                node,
                ViolationKind::MissingRequiredField,
                last,
                &[],
            )),
            _ => Ok(None),
        }
    }

    fn evaluate_and<'a>(
        &'a self,
        node: &'a ConstraintNode,
        data: &ValidatedData,
    ) -> Result<Option<&'a Operand>, ConstraintViolation> {
        let (satisfied, unsatisfied): (Vec<&Operand>, Vec<&Operand>) = node
            .operands
            .iter()
            .partition(|operand| self.is_satisfied(operand, data));

        if let (true, Some(missing)) = (node.required, unsatisfied.first()) {
            return Err(violation(
                node,
                ViolationKind::MissingRequiredField,
                missing,
                &[],
            ));
        }

        match satisfied.split_first() {
            Some((first, others)) if !unsatisfied.is_empty() => Err(violation(
                node,
                ViolationKind::IncompleteGroup,
                first,
                others,
            )),
            _ => Ok(None),
        }
    }
}

fn violation(
    node: &ConstraintNode,
    kind: ViolationKind,
    subject: &Operand,
    secondary: &[&Operand],
) -> ConstraintViolation {
    ConstraintViolation {
        kind,
        subject: subject.clone(),
        secondary: secondary.iter().map(|operand| (*operand).clone()).collect(),
        message: format!("Expected logic: {node}"),
    }
}
