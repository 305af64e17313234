//! Shareable links that open a shape graph and a data graph in the SHACL playground.
use crate::rdf::to_turtle;
use oxigraph::model::Graph;
use url::form_urlencoded;
use url::Url;

pub const DEFAULT_PLAYGROUND: &str = "https://shacl-playground.zazuko.com/";

/// Packs both graphs, as Turtle, into the fragment of `base`.
pub fn playground_link(base: &Url, shapes: &Graph, data: &Graph) -> Result<Url, String> {
    let fragment = form_urlencoded::Serializer::new(String::new())
        .append_pair("page", "0")
        .append_pair("shapesGraph", &to_turtle(shapes)?)
        .append_pair("shapesGraphFormat", "text/turtle")
        .append_pair("dataGraph", &to_turtle(data)?)
        .append_pair("dataGraphFormat", "text/turtle")
        .finish();
    let mut link = base.clone();
    link.set_fragment(Some(&fragment));
    Ok(link)
}
