use std::fmt;
use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::NamedType;
use apollo_compiler::ast::OperationType;
use apollo_compiler::executable;
use apollo_compiler::validation::Valid;
use indexmap::IndexMap;
use indexmap::IndexSet;
use parking_lot::Mutex;

use super::IncludeSkip;
use super::SpecError;
use super::TYPENAME;
use crate::context::ExecutionContext;
use crate::field::FieldDescriptor;
use crate::json_ext::Object;
use crate::schema::ExecutableSchema;

/// Child selection nodes, by concrete runtime type then by response key.
pub type TypedChildren = IndexMap<NamedType, IndexMap<Name, SelectionNode>>;

/// A selection an [`Occurrence`] was reached through.
#[derive(Clone, Debug)]
pub enum Guard {
    /// An enclosing field selection.
    Field(Node<executable::Field>),
    InlineFragment(Node<executable::InlineFragment>),
    FragmentSpread(Node<executable::FragmentSpread>),
}

impl Guard {
    fn directives(&self) -> &executable::DirectiveList {
        match self {
            Guard::Field(field) => &field.directives,
            Guard::InlineFragment(inline) => &inline.directives,
            Guard::FragmentSpread(spread) => &spread.directives,
        }
    }

    fn is_included(&self, variables: &Object) -> bool {
        !IncludeSkip::parse(self.directives()).should_skip(variables)
    }
}

/// One AST field selection merged into a [`SelectionNode`], with the path of fragments and
/// enclosing fields it was reached through, outermost first.
#[derive(Clone, Debug)]
pub struct Occurrence {
    field: Node<executable::Field>,
    guards: Vec<Guard>,
}

impl Occurrence {
    pub fn field(&self) -> &Node<executable::Field> {
        &self.field
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// The occurrence is included when its own conditions and the ones of every guard hold.
    pub fn is_included(&self, variables: &Object) -> bool {
        !IncludeSkip::parse(&self.field.directives).should_skip(variables)
            && self.guards.iter().all(|guard| guard.is_included(variables))
    }
}

/// One merged node of the response tree.
///
/// Every field selection of the query that targets the same response key, for the same
/// concrete parent type, merges into one node.
pub struct SelectionNode {
    response_key: Name,
    field_name: Name,
    owner_type: NamedType,
    return_type: ast::Type,
    composite: bool,
    occurrences: Vec<Occurrence>,
    field_definitions: Vec<Arc<FieldDescriptor>>,
    typed_children: TypedChildren,
    // execution id and inclusion decision
    inclusion: Mutex<Option<(u64, bool)>>,
}

impl SelectionNode {
    fn root(root_type: &NamedType) -> Self {
        Self {
            response_key: root_type.clone(),
            field_name: root_type.clone(),
            owner_type: root_type.clone(),
            return_type: ast::Type::NonNullNamed(root_type.clone()),
            composite: true,
            occurrences: Vec::new(),
            field_definitions: Vec::new(),
            typed_children: IndexMap::new(),
            inclusion: Mutex::new(None),
        }
    }

    fn new(field: &executable::Field, owner_type: &NamedType) -> Self {
        Self {
            response_key: field.response_key().clone(),
            field_name: field.name.clone(),
            owner_type: owner_type.clone(),
            return_type: field.ty().clone(),
            composite: !field.selection_set.selections.is_empty(),
            occurrences: Vec::new(),
            field_definitions: Vec::new(),
            typed_children: IndexMap::new(),
            inclusion: Mutex::new(None),
        }
    }

    pub fn response_key(&self) -> &Name {
        &self.response_key
    }

    pub fn field_name(&self) -> &Name {
        &self.field_name
    }

    /// The static type the field was selected on.
    pub fn owner_type(&self) -> &NamedType {
        &self.owner_type
    }

    pub fn return_type(&self) -> &ast::Type {
        &self.return_type
    }

    /// Whether the field has a sub-selection.
    pub fn is_composite(&self) -> bool {
        self.composite
    }

    pub fn is_typename(&self) -> bool {
        self.field_name.as_str() == TYPENAME
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// The distinct AST field selections merged into this node.
    pub fn ast_occurrences(&self) -> Vec<&Node<executable::Field>> {
        let mut fields: Vec<&Node<executable::Field>> = Vec::new();
        for occurrence in &self.occurrences {
            if !fields.iter().any(|known| known.ptr_eq(&occurrence.field)) {
                fields.push(&occurrence.field);
            }
        }
        fields
    }

    /// The distinct fragment spreads that contributed any of the occurrences.
    pub fn spread_occurrences(&self) -> Vec<&Node<executable::FragmentSpread>> {
        let mut spreads: Vec<&Node<executable::FragmentSpread>> = Vec::new();
        for guard in self.occurrences.iter().flat_map(|o| o.guards.iter()) {
            if let Guard::FragmentSpread(spread) = guard {
                if !spreads.iter().any(|known| known.ptr_eq(spread)) {
                    spreads.push(spread);
                }
            }
        }
        spreads
    }

    pub fn field_definitions(&self) -> &[Arc<FieldDescriptor>] {
        &self.field_definitions
    }

    pub(crate) fn descriptor(&self) -> Option<&Arc<FieldDescriptor>> {
        self.field_definitions.first()
    }

    /// The argument literals of the field. Merged occurrences have identical arguments.
    pub(crate) fn arguments(&self) -> &[Node<ast::Argument>] {
        self.occurrences
            .first()
            .map(|occurrence| occurrence.field.arguments.as_slice())
            .unwrap_or_default()
    }

    pub fn typed_children(&self) -> &TypedChildren {
        &self.typed_children
    }

    /// Child nodes applying when the runtime object is of type `concrete`.
    pub fn children(&self, concrete: &str) -> Option<&IndexMap<Name, SelectionNode>> {
        self.typed_children.get(concrete)
    }

    /// Number of distinct response keys selected below this node, over every runtime type.
    pub fn children_count(&self) -> usize {
        self.typed_children
            .values()
            .flat_map(|children| children.keys())
            .collect::<IndexSet<_>>()
            .len()
    }

    /// Whether this node is part of the response of the execution `context`.
    ///
    /// The node is included when at least one of its occurrences is included. The decision
    /// is computed once per execution.
    pub fn included(&self, context: &ExecutionContext) -> bool {
        let mut cached = self.inclusion.lock();
        match *cached {
            Some((execution, included)) if execution == context.id() => included,
            _ => {
                let included = self.evaluate_inclusion(context.variables());
                *cached = Some((context.id(), included));
                included
            }
        }
    }

    fn evaluate_inclusion(&self, variables: &Object) -> bool {
        self.occurrences.is_empty()
            || self
                .occurrences
                .iter()
                .any(|occurrence| occurrence.is_included(variables))
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for (concrete, children) in &self.typed_children {
            writeln!(f, "{:indent$}[{concrete}]", "", indent = indent)?;
            for child in children.values() {
                write!(f, "{:indent$}", "", indent = indent + 2)?;
                if child.response_key != child.field_name {
                    write!(f, "{}: ", child.response_key)?;
                }
                writeln!(
                    f,
                    "{}: {} x{}",
                    child.field_name,
                    child.return_type,
                    child.occurrences.len()
                )?;
                child.write_tree(f, indent + 4)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SelectionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionNode")
            .field("response_key", &self.response_key)
            .field("owner_type", &self.owner_type)
            .field("return_type", &self.return_type)
            .field("occurrences", &self.occurrences.len())
            .field("typed_children", &self.typed_children)
            .finish()
    }
}

/// The merged selection tree of one operation. Built once, executed many times.
#[derive(Debug)]
pub struct SelectionTree {
    root: SelectionNode,
    operation_type: OperationType,
}

impl SelectionTree {
    /// Merges the selections of the operation `operation_name` of `document`.
    ///
    /// `document` must have been validated against the schema of `schema`.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn build(
        schema: &ExecutableSchema,
        document: &Valid<ExecutableDocument>,
        operation_name: Option<&str>,
    ) -> Result<Self, SpecError> {
        let operation = document.operations.get(operation_name).map_err(|_| {
            SpecError::UnknownOperation(operation_name.unwrap_or_default().to_string())
        })?;
        let root_type = schema
            .definitions()
            .root_operation(operation.operation_type)
            .ok_or_else(|| SpecError::MissingRootType(format!("{:?}", operation.operation_type)))?
            .clone();

        let builder = Builder {
            schema,
            document,
            recursion_limit: schema.configuration().execution.recursion_limit,
        };
        let mut root = SelectionNode::root(&root_type);
        root.typed_children.entry(root_type.clone()).or_default();
        builder.collect(
            &operation.selection_set,
            std::slice::from_ref(&root_type),
            &[],
            &mut root.typed_children,
            0,
        )?;
        tracing::trace!(
            "built selection tree with {} root fields",
            root.children_count()
        );
        Ok(Self {
            root,
            operation_type: operation.operation_type,
        })
    }

    pub fn root(&self) -> &SelectionNode {
        &self.root
    }

    pub fn root_type(&self) -> &NamedType {
        &self.root.owner_type
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }
}

impl fmt::Display for SelectionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.write_tree(f, 0)
    }
}

struct Builder<'a> {
    schema: &'a ExecutableSchema,
    document: &'a ExecutableDocument,
    recursion_limit: usize,
}

impl Builder<'_> {
    /// Merges `selection_set` into the buckets of every type in `possible_types`.
    fn collect(
        &self,
        selection_set: &executable::SelectionSet,
        possible_types: &[NamedType],
        guards: &[Guard],
        buckets: &mut TypedChildren,
        depth: usize,
    ) -> Result<(), SpecError> {
        if depth > self.recursion_limit {
            tracing::error!(
                "selection processing recursion limit({}) exceeded",
                self.recursion_limit
            );
            return Err(SpecError::RecursionLimitExceeded);
        }
        for selection in &selection_set.selections {
            match selection {
                executable::Selection::Field(field) => {
                    for concrete in possible_types {
                        let node = buckets
                            .entry(concrete.clone())
                            .or_default()
                            .entry(field.response_key().clone())
                            .or_insert_with(|| SelectionNode::new(field, &selection_set.ty));
                        self.merge_field(node, concrete, field, guards, depth)?;
                    }
                }
                executable::Selection::InlineFragment(inline) => {
                    let narrowed = match &inline.type_condition {
                        Some(condition) => self.narrow(possible_types, condition),
                        None => possible_types.to_vec(),
                    };
                    let guards = with_guard(guards, Guard::InlineFragment(inline.clone()));
                    self.collect(
                        &inline.selection_set,
                        &narrowed,
                        &guards,
                        buckets,
                        depth + 1,
                    )?;
                }
                executable::Selection::FragmentSpread(spread) => {
                    let Some(fragment) = self.document.fragments.get(&spread.fragment_name)
                    else {
                        failfast_debug!("unknown fragment '{}'", spread.fragment_name);
                        continue;
                    };
                    let narrowed = self.narrow(possible_types, fragment.type_condition());
                    let guards = with_guard(guards, Guard::FragmentSpread(spread.clone()));
                    self.collect(
                        &fragment.selection_set,
                        &narrowed,
                        &guards,
                        buckets,
                        depth + 1,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn merge_field(
        &self,
        node: &mut SelectionNode,
        concrete: &NamedType,
        field: &Node<executable::Field>,
        guards: &[Guard],
        depth: usize,
    ) -> Result<(), SpecError> {
        node.occurrences.push(Occurrence {
            field: field.clone(),
            guards: guards.to_vec(),
        });
        if !node.is_typename() {
            match self.schema.descriptor(concrete, &field.name) {
                Some(descriptor) => {
                    if !node
                        .field_definitions
                        .iter()
                        .any(|known| Arc::ptr_eq(known, &descriptor))
                    {
                        node.field_definitions.push(descriptor);
                    }
                }
                None => {
                    failfast_debug!("no field '{}' on type '{}'", field.name, concrete);
                }
            }
        }
        if field.selection_set.selections.is_empty() {
            return Ok(());
        }

        let child_types = self
            .schema
            .possible_types(field.ty().inner_named_type());
        for child_type in &child_types {
            node.typed_children.entry(child_type.clone()).or_default();
        }
        let guards = with_guard(guards, Guard::Field(field.clone()));
        self.collect(
            &field.selection_set,
            &child_types,
            &guards,
            &mut node.typed_children,
            depth + 1,
        )
    }

    fn narrow(&self, possible_types: &[NamedType], condition: &str) -> Vec<NamedType> {
        possible_types
            .iter()
            .filter(|concrete| self.schema.satisfies(concrete, condition))
            .cloned()
            .collect()
    }
}

fn with_guard(guards: &[Guard], guard: Guard) -> Vec<Guard> {
    let mut guards = guards.to_vec();
    guards.push(guard);
    guards
}
