//! SPARQL query texts issued by the pipeline.
use oxigraph::model::NamedNode;

const PREFIXES: &str = "PREFIX cube: <https://cube.link/>
PREFIX sh: <http://www.w3.org/ns/shacl#>
PREFIX schema: <http://schema.org/>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
";

/// One step from a shape to a shape nested in it.
const SHAPE_STEP: &str =
    "(sh:property|sh:node|sh:not|sh:qualifiedValueShape|((sh:and|sh:or|sh:xone)/rdf:rest*/rdf:first))";

/// One step inside a property path expression.
const PATH_STEP: &str = "(sh:inversePath|sh:alternativePath|sh:zeroOrMorePath|sh:oneOrMorePath|sh:zeroOrOnePath|rdf:first|rdf:rest)";

/// Binds `?s` to every node describing the shapes below `?constraint`: the shapes themselves,
/// the blank nodes of their property paths and the cells of their lists. Values the shapes
/// merely mention, like `sh:in` members or `sh:class` targets, are never described.
fn constraint_closure() -> String {
    format!(
        "{{
    ?constraint {SHAPE_STEP}* ?s .
  }} UNION {{
    ?constraint {SHAPE_STEP}* ?shape .
    ?shape sh:path/{PATH_STEP}* ?s .
    FILTER(isBlank(?s))
  }} UNION {{
    ?constraint {SHAPE_STEP}* ?shape .
    ?shape ?link ?list .
    FILTER(isBlank(?list))
    ?list rdf:rest* ?s .
  }}"
    )
}

/// The shapes below the cube's `cube:observationConstraint`.
pub fn observation_constraint(cube: &NamedNode) -> String {
    format!(
        "{PREFIXES}CONSTRUCT {{ ?s ?p ?o }} WHERE {{
  {cube} cube:observationConstraint ?constraint .
  {closure}
  ?s ?p ?o .
}}",
        cube = cube,
        closure = constraint_closure()
    )
}

/// The cube node, its constraint shapes and the blank nodes hanging off the cube, leaving out
/// the observation set.
pub fn cube_graph(cube: &NamedNode) -> String {
    format!(
        "{PREFIXES}CONSTRUCT {{ ?s ?p ?o }} WHERE {{
  {{
    BIND({cube} AS ?s)
    ?s ?p ?o .
  }} UNION {{
    {cube} cube:observationConstraint ?constraint .
    {closure}
    ?s ?p ?o .
  }} UNION {{
    {cube} ?link ?s .
    FILTER(?link != cube:observationSet && ?link != cube:observationConstraint)
    FILTER(isBlank(?s))
    ?s ?p ?o .
  }}
}}",
        cube = cube,
        closure = constraint_closure()
    )
}

/// A window of `chunk_size` observations starting at `page_index * chunk_size`, with all their
/// triples. Observations are ordered so consecutive windows do not overlap.
pub fn observation_window(cube: &NamedNode, page_index: u64, chunk_size: u64) -> String {
    let offset = page_index.saturating_mul(chunk_size);
    format!(
        "{PREFIXES}CONSTRUCT {{ ?observation ?p ?o }} WHERE {{
  {{
    SELECT ?observation WHERE {{
      {cube} cube:observationSet/cube:observation ?observation .
    }}
    ORDER BY ?observation
    LIMIT {chunk_size}
    OFFSET {offset}
  }}
  ?observation ?p ?o .
}}",
        cube = cube
    )
}

/// The first observation of the cube.
pub fn first_observation(cube: &NamedNode) -> String {
    observation_window(cube, 0, 1)
}
