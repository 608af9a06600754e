//! Property tests for tree round-trips, MIME numbering after edits,
//! parameter continuations and transfer encoding safety.

use mailpart::{
    ContentParam, Disposition, EncodeMask, ParamEncodeOptions, ParseOptions, Part, RenderOptions,
    TransferEncoding, parse_message,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Leaf {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Leaf),
    Alternative(Vec<Leaf>),
    Message(Vec<Leaf>),
}

fn leaf() -> impl Strategy<Value = Leaf> {
    prop_oneof![
        "[a-zA-Z0-9 .,éñ\n]{0,300}".prop_map(Leaf::Text),
        prop::collection::vec(any::<u8>(), 0..200).prop_map(Leaf::Binary),
    ]
}

fn node() -> impl Strategy<Value = Node> {
    prop_oneof![
        3 => leaf().prop_map(Node::Leaf),
        1 => prop::collection::vec(leaf(), 1..4).prop_map(Node::Alternative),
    ]
}

fn build_leaf(leaf: &Leaf) -> Part {
    match leaf {
        Leaf::Text(text) => {
            let mut part = Part::with_type("text/plain");
            part.set_charset("utf-8");
            part.set_contents(text.as_str(), TransferEncoding::Binary);
            part
        }
        Leaf::Binary(data) => {
            let mut part = Part::with_type("application/octet-stream");
            part.set_name("file.bin");
            part.set_disposition(Disposition::Attachment);
            part.set_contents(data.clone(), TransferEncoding::Binary);
            part
        }
    }
}

fn build_node(node: &Node) -> Part {
    match node {
        Node::Leaf(leaf) => build_leaf(leaf),
        Node::Alternative(leaves) => {
            let mut alternative = Part::with_type("multipart/alternative");
            for leaf in leaves {
                alternative.add_part(build_leaf(leaf));
            }
            alternative
        }
        Node::Message(leaves) => {
            let body = match leaves.as_slice() {
                [single] => build_leaf(single),
                _ => build_node(&Node::Alternative(leaves.clone())),
            };
            let mut message = Part::with_type("message/rfc822");
            message.add_part(body);
            message
        }
    }
}

fn build_tree(nodes: &[Node]) -> Part {
    let mut root = Part::with_type("multipart/mixed");
    root.set_base_part(true);
    for node in nodes {
        root.add_part(build_node(node));
    }
    root.build_mime_ids();
    root
}

#[derive(Debug, Clone)]
enum Edit {
    Add(Leaf),
    Remove(prop::sample::Index),
    Alter(prop::sample::Index, Node),
}

fn edited_node() -> impl Strategy<Value = Node> {
    prop_oneof![
        3 => node(),
        1 => prop::collection::vec(leaf(), 1..3).prop_map(Node::Message),
    ]
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        leaf().prop_map(Edit::Add),
        any::<prop::sample::Index>().prop_map(Edit::Remove),
        (any::<prop::sample::Index>(), edited_node()).prop_map(|(i, n)| Edit::Alter(i, n)),
    ]
}

fn apply(tree: &mut Part, edit: &Edit) {
    match edit {
        Edit::Add(leaf) => {
            tree.add_part(build_leaf(leaf));
            tree.ensure_mime_ids();
        }
        Edit::Remove(index) => {
            let children = tree.parts().len();
            if children > 1 {
                let id = tree.parts()[index.index(children)].mime_id().cloned().unwrap();
                tree.remove_part(&id).unwrap();
            }
        }
        Edit::Alter(index, node) => {
            let root = tree.mime_id().cloned();
            let ids: Vec<_> = tree
                .content_type_map()
                .into_iter()
                .map(|(id, _)| id)
                .filter(|id| Some(id) != root.as_ref())
                .collect();
            let id = ids[index.index(ids.len())].clone();
            tree.alter_part(&id, build_node(node)).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn edited_tree_ids_match_rebuild_and_reparse(
        nodes in prop::collection::vec(edited_node(), 1..4),
        edits in prop::collection::vec(edit(), 1..4),
    ) {
        let mut tree = build_tree(&nodes);
        for edit in &edits {
            apply(&mut tree, edit);
        }
        let edited = tree.content_type_map();

        let mut rebuilt = tree.clone();
        rebuilt.build_mime_ids();
        prop_assert_eq!(&rebuilt.content_type_map(), &edited);

        let wire = tree.to_bytes(&RenderOptions::new()).unwrap();
        let parsed = parse_message(&wire, &ParseOptions::new()).unwrap();
        prop_assert_eq!(&parsed.content_type_map(), &edited);
    }

    #[test]
    fn rendered_tree_parses_back(nodes in prop::collection::vec(node(), 1..5)) {
        let tree = build_tree(&nodes);
        let wire = tree.to_bytes(&RenderOptions::new()).unwrap();
        let parsed = parse_message(&wire, &ParseOptions::new()).unwrap();

        let map = tree.content_type_map();
        prop_assert_eq!(&parsed.content_type_map(), &map);
        for (id, _) in map {
            let original = tree.get_part(&id).unwrap();
            let copy = parsed.get_part(&id).unwrap();
            prop_assert_eq!(copy.content_type_params(), original.content_type_params());
            prop_assert_eq!(copy.disposition(), original.disposition());
            prop_assert_eq!(copy.disposition_params(), original.disposition_params());
            prop_assert_eq!(copy.contents(), original.contents());
        }
    }

    #[test]
    fn canonical_output_has_no_bare_lf(nodes in prop::collection::vec(node(), 1..4)) {
        let wire = build_tree(&nodes).to_canonical_bytes(&RenderOptions::new()).unwrap();
        for (i, &b) in wire.iter().enumerate() {
            if b == b'\n' {
                prop_assert!(i > 0 && wire[i - 1] == b'\r');
            }
        }
    }

    #[test]
    fn mime_ids_are_idempotent(nodes in prop::collection::vec(node(), 1..5)) {
        let mut tree = build_tree(&nodes);
        let first = tree.content_type_map();
        tree.build_mime_ids();
        prop_assert_eq!(tree.content_type_map(), first);
    }

    #[test]
    fn long_parameter_continuation_round_trips(tail in "[a-zé ü%'*;\"]{180,240}") {
        let value = format!("é{tail}");
        let mut cp = ContentParam::new("attachment");
        cp.params.insert("filename", value.clone());
        let tokens = cp.encode(&ParamEncodeOptions::new());
        prop_assert!(tokens.len() >= 3, "{:?}", tokens);

        let decoded = ContentParam::decode(&format!("attachment; {}", tokens.join("; ")));
        prop_assert_eq!(decoded.params.get("filename"), Some(value.as_str()));
    }

    #[test]
    fn nul_contents_never_7bit_or_8bit(
        mut data in prop::collection::vec(any::<u8>(), 0..100),
        text in any::<bool>(),
        mask in prop::sample::select(vec![
            EncodeMask::SEVEN_BIT,
            EncodeMask::EIGHT_BIT,
            EncodeMask::BINARY,
            EncodeMask::SEVEN_BIT | EncodeMask::EIGHT_BIT,
            EncodeMask::EIGHT_BIT | EncodeMask::BINARY,
        ]),
    ) {
        data.push(0);
        let mut part = Part::with_type(if text { "text/plain" } else { "application/octet-stream" });
        part.set_contents(data, TransferEncoding::Binary);
        let encoding = part.send_transfer_encoding(mask);
        prop_assert!(
            !matches!(encoding, TransferEncoding::SevenBit | TransferEncoding::EightBit),
            "{:?}", encoding
        );
    }
}

#[test]
fn test_sibling_boundaries_are_unique() {
    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        let part = Part::with_type("multipart/mixed");
        assert!(seen.insert(part.boundary().unwrap().to_string()));
    }
}
