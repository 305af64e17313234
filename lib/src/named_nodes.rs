use oxigraph::model::NamedNodeRef;

pub struct SHACL {
    pub class: NamedNodeRef<'static>,
    pub node: NamedNodeRef<'static>,
    pub property: NamedNodeRef<'static>,
    pub min_count: NamedNodeRef<'static>,
    pub max_count: NamedNodeRef<'static>,
    pub not: NamedNodeRef<'static>,
    pub and_: NamedNodeRef<'static>,
    pub or_: NamedNodeRef<'static>,
    pub node_kind: NamedNodeRef<'static>,
    pub datatype: NamedNodeRef<'static>,
    pub min_exclusive: NamedNodeRef<'static>,
    pub min_inclusive: NamedNodeRef<'static>,
    pub max_exclusive: NamedNodeRef<'static>,
    pub max_inclusive: NamedNodeRef<'static>,
    pub min_length: NamedNodeRef<'static>,
    pub max_length: NamedNodeRef<'static>,
    pub pattern: NamedNodeRef<'static>,
    pub flags: NamedNodeRef<'static>,
    pub has_value: NamedNodeRef<'static>,
    pub in_: NamedNodeRef<'static>, // `in` is a reserved keyword in Rust
    pub closed: NamedNodeRef<'static>,
    pub ignored_properties: NamedNodeRef<'static>,
    pub node_shape: NamedNodeRef<'static>,
    pub property_shape: NamedNodeRef<'static>,
    pub deactivated: NamedNodeRef<'static>,
    pub message: NamedNodeRef<'static>,
    pub name: NamedNodeRef<'static>,

    pub path: NamedNodeRef<'static>,
    pub inverse_path: NamedNodeRef<'static>,
    pub alternative_path: NamedNodeRef<'static>,
    pub zero_or_more_path: NamedNodeRef<'static>,
    pub one_or_more_path: NamedNodeRef<'static>,
    pub zero_or_one_path: NamedNodeRef<'static>,

    pub target_class: NamedNodeRef<'static>,
    pub target_node: NamedNodeRef<'static>,
    pub target_objects_of: NamedNodeRef<'static>,
    pub target_subjects_of: NamedNodeRef<'static>,

    // NodeKind instances
    pub iri: NamedNodeRef<'static>,
    pub literal: NamedNodeRef<'static>,
    pub blank_node: NamedNodeRef<'static>,
    pub blank_node_or_iri: NamedNodeRef<'static>,
    pub blank_node_or_literal: NamedNodeRef<'static>,
    pub iri_or_literal: NamedNodeRef<'static>,

    // Severities
    pub severity: NamedNodeRef<'static>,
    pub info: NamedNodeRef<'static>,
    pub warning: NamedNodeRef<'static>,
    pub violation: NamedNodeRef<'static>,

    // Validation Report
    pub validation_report: NamedNodeRef<'static>,
    pub conforms: NamedNodeRef<'static>,
    pub result: NamedNodeRef<'static>,
    pub validation_result: NamedNodeRef<'static>,
    pub focus_node: NamedNodeRef<'static>,
    pub result_path: NamedNodeRef<'static>,
    pub result_severity: NamedNodeRef<'static>,
    pub result_message: NamedNodeRef<'static>,
    pub source_shape: NamedNodeRef<'static>,
    pub source_constraint_component: NamedNodeRef<'static>,
    pub value: NamedNodeRef<'static>,
    pub detail: NamedNodeRef<'static>,
}

impl SHACL {
    pub fn new() -> Self {
        let n = |s: &'static str| NamedNodeRef::new_unchecked(s);
        SHACL {
            class: n("http://www.w3.org/ns/shacl#class"),
            node: n("http://www.w3.org/ns/shacl#node"),
            property: n("http://www.w3.org/ns/shacl#property"),
            min_count: n("http://www.w3.org/ns/shacl#minCount"),
            max_count: n("http://www.w3.org/ns/shacl#maxCount"),
            not: n("http://www.w3.org/ns/shacl#not"),
            and_: n("http://www.w3.org/ns/shacl#and"),
            or_: n("http://www.w3.org/ns/shacl#or"),
            node_kind: n("http://www.w3.org/ns/shacl#nodeKind"),
            datatype: n("http://www.w3.org/ns/shacl#datatype"),
            min_exclusive: n("http://www.w3.org/ns/shacl#minExclusive"),
            min_inclusive: n("http://www.w3.org/ns/shacl#minInclusive"),
            max_exclusive: n("http://www.w3.org/ns/shacl#maxExclusive"),
            max_inclusive: n("http://www.w3.org/ns/shacl#maxInclusive"),
            min_length: n("http://www.w3.org/ns/shacl#minLength"),
            max_length: n("http://www.w3.org/ns/shacl#maxLength"),
            pattern: n("http://www.w3.org/ns/shacl#pattern"),
            flags: n("http://www.w3.org/ns/shacl#flags"),
            has_value: n("http://www.w3.org/ns/shacl#hasValue"),
            in_: n("http://www.w3.org/ns/shacl#in"),
            closed: n("http://www.w3.org/ns/shacl#closed"),
            ignored_properties: n("http://www.w3.org/ns/shacl#ignoredProperties"),
            node_shape: n("http://www.w3.org/ns/shacl#NodeShape"),
            property_shape: n("http://www.w3.org/ns/shacl#PropertyShape"),
            deactivated: n("http://www.w3.org/ns/shacl#deactivated"),
            message: n("http://www.w3.org/ns/shacl#message"),
            name: n("http://www.w3.org/ns/shacl#name"),
            path: n("http://www.w3.org/ns/shacl#path"),
            inverse_path: n("http://www.w3.org/ns/shacl#inversePath"),
            alternative_path: n("http://www.w3.org/ns/shacl#alternativePath"),
            zero_or_more_path: n("http://www.w3.org/ns/shacl#zeroOrMorePath"),
            one_or_more_path: n("http://www.w3.org/ns/shacl#oneOrMorePath"),
            zero_or_one_path: n("http://www.w3.org/ns/shacl#zeroOrOnePath"),
            target_class: n("http://www.w3.org/ns/shacl#targetClass"),
            target_node: n("http://www.w3.org/ns/shacl#targetNode"),
            target_objects_of: n("http://www.w3.org/ns/shacl#targetObjectsOf"),
            target_subjects_of: n("http://www.w3.org/ns/shacl#targetSubjectsOf"),
            iri: n("http://www.w3.org/ns/shacl#IRI"),
            literal: n("http://www.w3.org/ns/shacl#Literal"),
            blank_node: n("http://www.w3.org/ns/shacl#BlankNode"),
            blank_node_or_iri: n("http://www.w3.org/ns/shacl#BlankNodeOrIRI"),
            blank_node_or_literal: n("http://www.w3.org/ns/shacl#BlankNodeOrLiteral"),
            iri_or_literal: n("http://www.w3.org/ns/shacl#IRIOrLiteral"),
            severity: n("http://www.w3.org/ns/shacl#severity"),
            info: n("http://www.w3.org/ns/shacl#Info"),
            warning: n("http://www.w3.org/ns/shacl#Warning"),
            violation: n("http://www.w3.org/ns/shacl#Violation"),
            validation_report: n("http://www.w3.org/ns/shacl#ValidationReport"),
            conforms: n("http://www.w3.org/ns/shacl#conforms"),
            result: n("http://www.w3.org/ns/shacl#result"),
            validation_result: n("http://www.w3.org/ns/shacl#ValidationResult"),
            focus_node: n("http://www.w3.org/ns/shacl#focusNode"),
            result_path: n("http://www.w3.org/ns/shacl#resultPath"),
            result_severity: n("http://www.w3.org/ns/shacl#resultSeverity"),
            result_message: n("http://www.w3.org/ns/shacl#resultMessage"),
            source_shape: n("http://www.w3.org/ns/shacl#sourceShape"),
            source_constraint_component: n(
                "http://www.w3.org/ns/shacl#sourceConstraintComponent",
            ),
            value: n("http://www.w3.org/ns/shacl#value"),
            detail: n("http://www.w3.org/ns/shacl#detail"),
        }
    }

    /// Builds the IRI of a SHACL Core constraint component, e.g. `sh:MinCountConstraintComponent`.
    pub fn component(name: &str) -> oxigraph::model::NamedNode {
        oxigraph::model::NamedNode::new_unchecked(format!(
            "http://www.w3.org/ns/shacl#{}ConstraintComponent",
            name
        ))
    }
}

/// The `https://cube.link/` vocabulary.
pub struct CUBE {
    pub cube: NamedNodeRef<'static>,
    pub constraint: NamedNodeRef<'static>,
    pub observation: NamedNodeRef<'static>,
    pub observation_constraint: NamedNodeRef<'static>,
}

impl CUBE {
    pub fn new() -> Self {
        CUBE {
            cube: NamedNodeRef::new_unchecked("https://cube.link/Cube"),
            constraint: NamedNodeRef::new_unchecked("https://cube.link/Constraint"),
            observation: NamedNodeRef::new_unchecked("https://cube.link/Observation"),
            observation_constraint: NamedNodeRef::new_unchecked(
                "https://cube.link/observationConstraint",
            ),
        }
    }
}

/// The handful of `schema.org` and OWL terms used for cube metadata and imports.
pub struct SCHEMA {
    pub name: NamedNodeRef<'static>,
    pub description: NamedNodeRef<'static>,
    pub work_example: NamedNodeRef<'static>,
    pub owl_imports: NamedNodeRef<'static>,
}

impl SCHEMA {
    pub fn new() -> Self {
        SCHEMA {
            name: NamedNodeRef::new_unchecked("http://schema.org/name"),
            description: NamedNodeRef::new_unchecked("http://schema.org/description"),
            work_example: NamedNodeRef::new_unchecked("http://schema.org/workExample"),
            owl_imports: NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#imports"),
        }
    }
}

impl Default for SHACL {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for CUBE {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SCHEMA {
    fn default() -> Self {
        Self::new()
    }
}
