use crate::errors::{ArgusError, ArgusResult};
use crate::node::{NodeId, Pdg};
use serde_json::{Map, Value};

/// Lift an Esprima AST document into the node arena.
///
/// Every scalar-valued key (and `range`/`regex`, and empty lists) lands in
/// the node's attribute bag; every object or non-empty list of objects
/// becomes children in document order, tagged with the key they sat under.
/// Ids come out depth-first pre-order starting at zero, so the transform is
/// reproducible and [`build_json`] can reverse it.
pub fn ast_to_pdg(ast: &Value) -> ArgusResult<Pdg> {
    let obj = ast
        .as_object()
        .ok_or_else(|| ArgusError::MalformedGraph("AST root is not an object".into()))?;
    let mut g = Pdg::new();
    let root = g.add_node("Program", None);
    fill_node(&mut g, root, obj);
    Ok(g)
}

fn fill_node(g: &mut Pdg, node: NodeId, ast: &Map<String, Value>) {
    for (key, value) in ast {
        let scalar = !value.is_array() && !value.is_object();
        if key == "range" || key == "regex" || (key != "type" && scalar) {
            g[node].attributes.insert(key.clone(), value.clone());
        }
        match value {
            Value::Object(obj) => {
                // leadingComments sometimes carry a range *object*
                if key == "range" {
                    g[node].attributes.insert(key.clone(), value.clone());
                } else {
                    create_node(g, node, key, obj, false);
                }
            }
            Value::Array(items) => {
                if items.is_empty() {
                    // e.g. params: [] must survive the round trip
                    g[node].attributes.insert(key.clone(), value.clone());
                }
                for item in items {
                    if let Value::Object(obj) = item {
                        create_node(g, node, key, obj, true);
                    }
                }
            }
            _ => {}
        }
    }
}

fn create_node(g: &mut Pdg, parent: NodeId, body: &str, obj: &Map<String, Value>, in_list: bool) {
    let Some(name) = obj.get("type").and_then(Value::as_str) else {
        // objects without a `type` (e.g. the regex payload) are attributes,
        // never nodes
        return;
    };
    let id = g.add_node(name, Some(parent));
    g[id].body = Some(body.to_owned());
    g[id].body_list = in_list;
    fill_node(g, id, obj);
}

/// Rebuild the parser's JSON document from the arena, the inverse of
/// [`ast_to_pdg`] up to object-key order.
pub fn build_json(g: &Pdg, node: NodeId) -> Value {
    let mut out = Map::new();
    out.insert("type".to_owned(), Value::String(g[node].name.clone()));
    for &child in &g[node].children {
        let sub = build_json(g, child);
        let body = g[child].body.clone().unwrap_or_default();
        if g[child].body_list {
            match out.entry(body).or_insert_with(|| Value::Array(Vec::new())) {
                Value::Array(items) => items.push(sub),
                _ => tracing::warn!("list child under a non-list key"),
            }
        } else {
            out.insert(body, sub);
        }
    }
    for (key, value) in &g[node].attributes {
        out.insert(key.clone(), value.clone());
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_ast() -> Value {
        // var x = 1;
        json!({
            "type": "Program",
            "body": [
                {
                    "type": "VariableDeclaration",
                    "declarations": [
                        {
                            "type": "VariableDeclarator",
                            "id": {"type": "Identifier", "name": "x", "range": [4, 5]},
                            "init": {"type": "Literal", "value": 1, "raw": "1", "range": [8, 9]},
                            "range": [4, 9]
                        }
                    ],
                    "kind": "var",
                    "range": [0, 10]
                }
            ],
            "sourceType": "script",
            "range": [0, 10]
        })
    }

    #[test]
    fn ids_are_preorder_and_unique() {
        let g = ast_to_pdg(&sample_ast()).unwrap();
        let names: Vec<_> = g.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Program",
                "VariableDeclaration",
                "VariableDeclarator",
                "Identifier",
                "Literal"
            ]
        );
        let mut ids: Vec<_> = g.nodes().map(|n| n.id).collect();
        ids.dedup();
        assert_eq!(ids, (0..g.len()).collect::<Vec<_>>());
    }

    #[test]
    fn body_and_body_list_are_recorded() {
        let g = ast_to_pdg(&sample_ast()).unwrap();
        let decl = &g[1];
        assert_eq!(decl.body.as_deref(), Some("body"));
        assert!(decl.body_list);
        let init = &g[4];
        assert_eq!(init.body.as_deref(), Some("init"));
        assert!(!init.body_list);
        assert_eq!(g[1].attr_str("kind"), Some("var"));
    }

    #[test]
    fn round_trip_reproduces_the_document() {
        let ast = sample_ast();
        let g = ast_to_pdg(&ast).unwrap();
        assert_eq!(build_json(&g, g.root()), ast);
    }

    #[test]
    fn empty_lists_and_regex_round_trip() {
        let ast = json!({
            "type": "Program",
            "body": [
                {
                    "type": "ExpressionStatement",
                    "expression": {
                        "type": "Literal",
                        "value": {},
                        "raw": "/a+/",
                        "regex": {"pattern": "a+", "flags": ""},
                        "range": [0, 4]
                    },
                    "range": [0, 5]
                },
                {
                    "type": "FunctionDeclaration",
                    "id": {"type": "Identifier", "name": "f", "range": [15, 16]},
                    "params": [],
                    "body": {"type": "BlockStatement", "body": [], "range": [19, 21]},
                    "range": [6, 21]
                }
            ],
            "sourceType": "script",
            "range": [0, 21]
        });
        let g = ast_to_pdg(&ast).unwrap();
        let rebuilt = build_json(&g, g.root());
        // the regex literal's empty `value` object is not a node, so it is
        // the one key the reverse pass cannot restore
        let mut expected = ast.clone();
        expected["body"][0]["expression"]
            .as_object_mut()
            .unwrap()
            .remove("value");
        assert_eq!(rebuilt, expected);

        let lit = g.nodes().find(|n| n.name == "Literal").unwrap();
        assert_eq!(lit.literal_type(), Some("RegExp"));
        let fun = g.nodes().find(|n| n.name == "FunctionDeclaration").unwrap();
        assert_eq!(fun.attr("params"), Some(&json!([])));
    }
}
