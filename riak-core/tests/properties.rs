//! Property-based tests for riak-core

use bytes::Bytes;
use proptest::prelude::*;
use riak_core::multipart;
use riak_core::*;
use serde_json::{json, Value};

fn path_segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

fn tag() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ -]{1,16}"
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn props_link_header_roundtrip(
        entries in prop::collection::vec((path_segment(), path_segment(), tag()), 0..6)
    ) {
        let links: Vec<Link> = entries
            .iter()
            .map(|(bucket, key, rel)| Link::new(format!("/riak/{}/{}", bucket, key), rel.clone()))
            .collect();
        let header = Link::to_header(&links);
        let parsed = Link::parse(&header);
        prop_assert_eq!(&parsed, &links);

        // re-rendering the parsed links reproduces the header
        prop_assert_eq!(Link::to_header(&parsed), header);
    }

    #[test]
    fn props_walk_segment_shape(
        bucket in prop::option::of(path_segment()),
        tag in prop::option::of(path_segment()),
        keep in any::<bool>()
    ) {
        let spec = WalkSpec::new(bucket.as_deref(), tag.as_deref(), keep);
        let segment = spec.to_path_segment();
        let fields: Vec<&str> = segment.split(',').collect();
        prop_assert_eq!(fields.len(), 3);
        prop_assert_eq!(fields[0], bucket.as_deref().unwrap_or("_"));
        prop_assert_eq!(fields[1], tag.as_deref().unwrap_or("_"));
        prop_assert_eq!(fields[2], if keep { "1" } else { "_" });
    }

    #[test]
    fn props_structured_roundtrip(value in json_value()) {
        let registry = SerializerRegistry::default();
        let meta = Meta::new();
        for content_type in ["application/json", "text/yaml"] {
            let payload = Payload::Structured(value.clone());
            let body = registry.serialize(content_type, &meta, &payload).unwrap();
            let back = registry.deserialize(content_type, &meta, &body).unwrap();
            prop_assert_eq!(back, payload);
        }
    }

    #[test]
    fn props_multipart_part_count(
        bodies in prop::collection::vec("[a-zA-Z0-9 {}:\"]{0,40}", 1..8),
        crlf in any::<bool>()
    ) {
        let boundary = "8XZD3w6ttFTHIz6LCmhVxn9Ex0K";
        let mut raw = String::new();
        for body in &bodies {
            raw.push_str(&format!("\r\n--{}\r\nContent-Type: text/plain\r\n\r\n{}", boundary, body));
        }
        raw.push_str(&format!("\r\n--{}--\r\n", boundary));
        if !crlf {
            raw = raw.replace("\r\n", "\n");
        }

        let parsed = multipart::parse(&Bytes::from(raw), boundary);
        prop_assert!(parsed.is_clean());
        let parts = parsed.parts();
        prop_assert_eq!(parts.len(), bodies.len());
        for (part, body) in parts.iter().zip(&bodies) {
            prop_assert_eq!(part.body.as_ref(), body.as_bytes());
        }
    }
}
