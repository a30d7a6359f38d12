//! Structural COMET: a DAG of named COMET sub-models over a raw decision
//! matrix.
//!
//! Every raw criterion becomes a leaf node; each supplied submodel becomes an
//! internal node whose COMET input characteristic values are its parents'
//! output characteristic values. Submodels are built strictly in the order
//! given — a reference to a node that is not registered yet fails, so the
//! registration order is itself a topological order and cycles are
//! unrepresentable. Exactly one submodel carries no output characteristic
//! values: the terminal node, whose preferences are the model's default
//! output.

use std::collections::HashMap;

use nalgebra::DMatrix;
use thiserror::Error;
use tracing::debug;

use crate::comet::{Comet, CometError};
use crate::expert::ExpertFunction;
use crate::validation::{
    validate_cvalue_list, validate_cvalues, validate_matrix_criteria, ValidationError,
};

#[derive(Debug, Error)]
pub enum StructuralError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Comet(#[from] CometError),
    #[error("submodel '{name}' references unbuilt parent '{reference}'")]
    UnbuiltParent { name: String, reference: String },
    #[error("duplicate node name '{0}'")]
    DuplicateName(String),
    #[error("got {names} criteria names for {criteria} criteria")]
    NameCountMismatch { criteria: usize, names: usize },
    #[error("no terminal submodel: exactly one must omit its output characteristic values")]
    NoTerminal,
    #[error("submodels '{first}' and '{second}' both omit output characteristic values")]
    MultipleTerminals { first: String, second: String },
    #[error("terminal submodel '{0}' cannot be a parent")]
    TerminalAsParent(String),
    #[error("submodel '{0}' needs at least one parent")]
    EmptyStructure(String),
    #[error("submodel '{name}': invalid output characteristic values")]
    InvalidOutputCvalues {
        name: String,
        #[source]
        source: ValidationError,
    },
}

/// Reference to a parent node: a raw criterion / node index, or a node name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    Index(usize),
    Name(String),
}

impl From<usize> for NodeRef {
    fn from(index: usize) -> Self {
        NodeRef::Index(index)
    }
}

impl From<&str> for NodeRef {
    fn from(name: &str) -> Self {
        NodeRef::Name(name.to_string())
    }
}

/// Descriptor of one internal node, consumed by [`StructuralComet::new`].
///
/// `cvalues` are the node's *output* characteristic values, used as input
/// landmarks by any node that lists this one as a parent; `None` marks the
/// terminal node. The node's preferences are snapped onto the declared
/// [min, max] range before any dependent consumes them, so the landmarks
/// need not span [0, 1].
pub struct Submodel {
    pub name: String,
    pub structure: Vec<NodeRef>,
    pub cvalues: Option<Vec<f64>>,
    pub expert: ExpertFunction,
}

impl Submodel {
    pub fn new(
        name: impl Into<String>,
        structure: Vec<NodeRef>,
        cvalues: Option<Vec<f64>>,
        expert: ExpertFunction,
    ) -> Self {
        Self {
            name: name.into(),
            structure,
            cvalues,
            expert,
        }
    }
}

#[derive(Debug)]
enum NodeKind {
    /// Raw criterion passthrough.
    Leaf { column: usize },
    /// Identified COMET sub-model over parent node outputs.
    Model { model: Comet, parents: Vec<usize> },
}

#[derive(Debug)]
struct Node {
    name: String,
    kind: NodeKind,
    /// Output characteristic values; None only for the terminal node.
    out_cvalues: Option<Vec<f64>>,
}

/// Preference vectors for every node of one evaluation pass, in registration
/// order, addressable by name or by canonical structure.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralResults {
    entries: Vec<NodeResult>,
    terminal: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeResult {
    pub name: String,
    /// Canonical structure: parent node indices (a leaf's single entry is
    /// its criterion column).
    pub structure: Vec<usize>,
    pub preferences: Vec<f64>,
}

impl StructuralResults {
    pub fn terminal(&self) -> &NodeResult {
        &self.entries[self.terminal]
    }

    pub fn get(&self, name: &str) -> Option<&NodeResult> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get_by_structure(&self, structure: &[usize]) -> Option<&NodeResult> {
        self.entries.iter().find(|e| e.structure == structure)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A built structural model. Node indices are assigned in registration
/// order: criteria leaves first (0..M), then each submodel.
#[derive(Debug)]
pub struct StructuralComet {
    nodes: Vec<Node>,
    name_to_index: HashMap<String, usize>,
    criteria: usize,
    terminal: usize,
}

impl StructuralComet {
    /// Build leaves for every raw criterion, then every submodel in the
    /// order supplied. The caller is responsible for a dependency-respecting
    /// order; a forward or unknown reference fails with `UnbuiltParent`.
    pub fn new(
        criteria_cvalues: Vec<Vec<f64>>,
        criteria_names: Vec<String>,
        submodels: Vec<Submodel>,
    ) -> Result<Self, StructuralError> {
        validate_cvalues(&criteria_cvalues)?;
        if criteria_names.len() != criteria_cvalues.len() {
            return Err(StructuralError::NameCountMismatch {
                criteria: criteria_cvalues.len(),
                names: criteria_names.len(),
            });
        }

        let criteria = criteria_cvalues.len();
        let mut nodes: Vec<Node> = Vec::with_capacity(criteria + submodels.len());
        let mut name_to_index = HashMap::new();

        for (column, (name, cv)) in criteria_names
            .into_iter()
            .zip(criteria_cvalues.into_iter())
            .enumerate()
        {
            if name_to_index.insert(name.clone(), column).is_some() {
                return Err(StructuralError::DuplicateName(name));
            }
            nodes.push(Node {
                name,
                kind: NodeKind::Leaf { column },
                out_cvalues: Some(cv),
            });
        }

        let mut terminal: Option<usize> = None;
        for submodel in submodels {
            let Submodel {
                name,
                structure,
                cvalues,
                expert,
            } = submodel;

            if structure.is_empty() {
                return Err(StructuralError::EmptyStructure(name));
            }

            let mut parents = Vec::with_capacity(structure.len());
            let mut input_cvalues = Vec::with_capacity(structure.len());
            for reference in &structure {
                let parent = match reference {
                    NodeRef::Index(i) if *i < nodes.len() => *i,
                    NodeRef::Index(i) => {
                        return Err(StructuralError::UnbuiltParent {
                            name,
                            reference: i.to_string(),
                        })
                    }
                    NodeRef::Name(n) => match name_to_index.get(n) {
                        Some(&idx) => idx,
                        None => {
                            return Err(StructuralError::UnbuiltParent {
                                name,
                                reference: n.clone(),
                            })
                        }
                    },
                };
                match &nodes[parent].out_cvalues {
                    Some(cv) => input_cvalues.push(cv.clone()),
                    None => {
                        return Err(StructuralError::TerminalAsParent(
                            nodes[parent].name.clone(),
                        ))
                    }
                }
                parents.push(parent);
            }

            match &cvalues {
                Some(cv) => {
                    if let Err(source) = validate_cvalue_list(0, cv) {
                        return Err(StructuralError::InvalidOutputCvalues { name, source });
                    }
                }
                None => {
                    if let Some(first) = terminal {
                        return Err(StructuralError::MultipleTerminals {
                            first: nodes[first].name.clone(),
                            second: name,
                        });
                    }
                    terminal = Some(nodes.len());
                }
            }

            debug!(submodel = %name, parents = parents.len(), "building submodel");
            let model = Comet::new(input_cvalues, expert)?;

            let index = nodes.len();
            if name_to_index.insert(name.clone(), index).is_some() {
                return Err(StructuralError::DuplicateName(name));
            }
            nodes.push(Node {
                name,
                kind: NodeKind::Model { model, parents },
                out_cvalues: cvalues,
            });
        }

        let terminal = terminal.ok_or(StructuralError::NoTerminal)?;
        Ok(Self {
            nodes,
            name_to_index,
            criteria,
            terminal,
        })
    }

    /// Evaluate the terminal node for every row of the raw decision matrix.
    pub fn evaluate(&self, matrix: &DMatrix<f64>) -> Result<Vec<f64>, StructuralError> {
        let outputs = self.evaluate_nodes(matrix)?;
        Ok(outputs[self.terminal].clone())
    }

    /// Evaluate every node (leaves pass their raw column through) and return
    /// all outputs in registration order.
    pub fn evaluate_all(&self, matrix: &DMatrix<f64>) -> Result<StructuralResults, StructuralError> {
        let outputs = self.evaluate_nodes(matrix)?;
        let entries = self
            .nodes
            .iter()
            .zip(outputs)
            .map(|(node, preferences)| NodeResult {
                name: node.name.clone(),
                structure: self.structure_of_node(node),
                preferences,
            })
            .collect();
        Ok(StructuralResults {
            entries,
            terminal: self.terminal,
        })
    }

    fn evaluate_nodes(&self, matrix: &DMatrix<f64>) -> Result<Vec<Vec<f64>>, StructuralError> {
        validate_matrix_criteria(matrix, self.criteria)?;

        let mut outputs: Vec<Vec<f64>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let result = match &node.kind {
                NodeKind::Leaf { column } => matrix.column(*column).iter().copied().collect(),
                NodeKind::Model { model, parents } => {
                    let stacked = DMatrix::from_fn(matrix.nrows(), parents.len(), |row, k| {
                        outputs[parents[k]][row]
                    });
                    let mut preferences = model.evaluate(&stacked)?;
                    // A sub-model's preferences span [0, 1] exactly, while
                    // its declared output landmarks need not. Snap onto the
                    // declared range so dependents always see in-domain
                    // inputs.
                    if let Some(cv) = &node.out_cvalues {
                        let (lo, hi) = (cv[0], cv[cv.len() - 1]);
                        for p in &mut preferences {
                            *p = p.clamp(lo, hi);
                        }
                    }
                    preferences
                }
            };
            outputs.push(result);
        }
        Ok(outputs)
    }

    fn structure_of_node(&self, node: &Node) -> Vec<usize> {
        match &node.kind {
            NodeKind::Leaf { column } => vec![*column],
            NodeKind::Model { parents, .. } => parents.clone(),
        }
    }

    // -- Introspection -----------------------------------------------------

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canonical structure (parent node indices) for a node name.
    pub fn structure_of(&self, name: &str) -> Option<Vec<usize>> {
        self.name_to_index
            .get(name)
            .map(|&i| self.structure_of_node(&self.nodes[i]))
    }

    /// Node name for a canonical structure.
    pub fn name_of(&self, structure: &[usize]) -> Option<&str> {
        self.nodes
            .iter()
            .find(|node| self.structure_of_node(node) == structure)
            .map(|node| node.name.as_str())
    }

    /// Node names in registration order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.name.as_str())
    }

    pub fn terminal_name(&self) -> &str {
        &self.nodes[self.terminal].name
    }

    /// The identified COMET sub-model behind a named internal node, if any.
    pub fn comet(&self, name: &str) -> Option<&Comet> {
        let &index = self.name_to_index.get(name)?;
        match &self.nodes[index].kind {
            NodeKind::Model { model, .. } => Some(model),
            NodeKind::Leaf { .. } => None,
        }
    }
}
