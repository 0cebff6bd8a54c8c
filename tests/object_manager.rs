//! Purpose: Dynamic object model synthesis and object queries.
//! Exports: None (integration test module).
//! Role: Validate per-(instance, class) models, schema discovery via OPTIONS, and `filter`.
//! Invariants: No network access; every response is scripted.

mod common;

use common::client;
use serde_json::{Map, Value, json};
use syncano::api::{ErrorKind, Method};
use syncano::models::{FieldValue, Lookup, Manager, Record};

fn objects_of(client: &syncano::api::Client, class: &str) -> Manager {
    client
        .objects()
        .expect("objects")
        .list(
            Lookup::new()
                .kwarg("instance_name", "demo")
                .kwarg("class_name", class),
        )
        .expect("list")
}

fn title_schema() -> Value {
    json!({"actions": {"POST": {
        "title": {"type": "string", "required": true, "max_length": 100},
        "pages": {"type": "integer", "required": false}
    }}})
}

fn kwargs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object")
}

#[test]
fn same_class_pair_shares_one_synthesized_model() {
    let (client, mock) = client();
    mock.push(json!({"objects": [{"id": 1, "title": "Dune"}, {"id": 2, "title": "Emma"}], "next": null}));
    mock.push(title_schema());

    let records: Vec<Record> = objects_of(&client, "books")
        .iterator()
        .collect::<Result<_, _>>()
        .expect("records");

    let first = records[0].as_model().expect("model");
    let second = records[1].as_model().expect("model");
    assert_eq!(first.model_name(), "DemoBooksObject");
    assert_eq!(second.model_name(), "DemoBooksObject");
    assert_eq!(first.get("title").expect("title"), FieldValue::from("Dune"));
    assert_eq!(second.get("id").expect("id"), FieldValue::Integer(2));

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/v1/instances/demo/classes/books/objects/");
    assert_eq!(requests[1].method, Method::Options);
    assert_eq!(requests[1].path, "/v1/instances/demo/classes/books/objects/");
    assert!(client.registry().get_schema("demo", "books").is_some());
}

#[test]
fn different_class_pair_gets_its_own_model() {
    let (client, mock) = client();
    mock.push(json!({"objects": [{"id": 1, "title": "Dune"}], "next": null}));
    mock.push(title_schema());
    mock.push(json!({"objects": [{"id": 1, "born": "1920-10-08"}], "next": null}));
    mock.push(json!({"actions": {"POST": [{"name": "born", "type": "date"}]}}));

    let book: Vec<Record> = objects_of(&client, "books")
        .iterator()
        .collect::<Result<_, _>>()
        .expect("books");
    let author: Vec<Record> = objects_of(&client, "authors")
        .iterator()
        .collect::<Result<_, _>>()
        .expect("authors");

    let book = book[0].as_model().expect("book");
    let author = author[0].as_model().expect("author");
    assert_eq!(book.model_name(), "DemoBooksObject");
    assert_eq!(author.model_name(), "DemoAuthorsObject");
    assert!(book.options().has_field("title"));
    assert!(!author.options().has_field("title"));
    assert!(matches!(author.get("born").expect("born"), FieldValue::Date(_)));
    assert_eq!(mock.request_count(), 4);
}

#[test]
fn objects_without_class_use_the_base_model() {
    let (client, mock) = client();
    let record = client
        .objects()
        .expect("objects")
        .serialize(json!({"id": 3}))
        .expect("record");
    assert_eq!(record.as_model().expect("model").model_name(), "Object");
    assert_eq!(mock.request_count(), 0);
}

#[test]
fn filter_encodes_lookups_as_json_query() {
    let (client, mock) = client();
    mock.push(title_schema());
    mock.push(json!({"objects": [], "next": null}));

    let mut lookups = Map::new();
    lookups.insert("title__startswith".to_string(), json!("Du"));
    lookups.insert("pages__gt".to_string(), json!(100));
    lookups.insert("id".to_string(), json!(4));
    let manager = objects_of(&client, "books").filter(lookups).expect("filter");

    let encoded = manager.query()["query"].as_str().expect("string query");
    let decoded: Value = serde_json::from_str(encoded).expect("json");
    assert_eq!(
        decoded,
        json!({"title": {"_startswith": "Du"}, "pages": {"_gt": 100}, "id": {"_eq": 4}})
    );

    assert_eq!(manager.iterator().count(), 0);
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].params["query"], json!(encoded));
}

#[test]
fn filter_rejects_unknown_fields_and_lookups() {
    let (client, mock) = client();
    mock.push(title_schema());
    let base = objects_of(&client, "books");

    let mut unknown_field = Map::new();
    unknown_field.insert("dummy_field".to_string(), json!(4));
    let err = base.filter(unknown_field).expect_err("field");
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(err.field_name(), Some("dummy_field"));

    let mut unknown_lookup = Map::new();
    unknown_lookup.insert("title__xx".to_string(), json!(4));
    let err = base.filter(unknown_lookup).expect_err("lookup");
    assert_eq!(err.kind(), ErrorKind::Usage);

    assert_eq!(mock.request_count(), 1);
}

#[test]
fn create_uses_the_synthesized_model() {
    let (client, mock) = client();
    mock.push(title_schema());
    mock.push(json!({"id": 5, "title": "Dune", "revision": 1}));

    let model = client
        .objects()
        .expect("objects")
        .create(kwargs(json!({
            "instance_name": "demo",
            "class_name": "books",
            "title": "Dune"
        })))
        .expect("create");

    assert_eq!(model.model_name(), "DemoBooksObject");
    assert!(!model.is_new());
    assert_eq!(model.get("id").expect("id"), FieldValue::Integer(5));

    let requests = mock.requests();
    assert_eq!(requests[1].method, Method::Post);
    assert_eq!(requests[1].path, "/v1/instances/demo/classes/books/objects/");
    assert_eq!(
        requests[1].data,
        Some(syncano::api::Body::Json(json!({"title": "Dune"})))
    );
    assert_eq!(client.registry().last_used_instance().as_deref(), Some("demo"));
}

#[test]
fn field_validation_applies_to_synthesized_models() {
    let (client, mock) = client();
    mock.push(title_schema());

    let err = client
        .objects()
        .expect("objects")
        .create(kwargs(json!({
            "instance_name": "demo",
            "class_name": "books",
            "pages": 12
        })))
        .expect_err("title required");
    assert_eq!(err.kind(), ErrorKind::Field);
    assert_eq!(err.field_name(), Some("title"));
    assert_eq!(mock.request_count(), 1);
}

#[test]
fn pairs_with_colliding_names_keep_their_own_schema() {
    let (client, mock) = client();
    mock.push(json!({"objects": [{"id": 1, "title": "Dune"}], "next": null}));
    mock.push(title_schema());
    mock.push(json!({"objects": [{"id": 1, "price": 12}], "next": null}));
    mock.push(json!({"actions": {"POST": {"price": {"type": "integer"}}}}));

    let list = |instance: &str, class: &str| -> Vec<Record> {
        client
            .objects()
            .expect("objects")
            .list(
                Lookup::new()
                    .kwarg("instance_name", instance)
                    .kwarg("class_name", class),
            )
            .expect("list")
            .iterator()
            .collect::<Result<_, _>>()
            .expect("records")
    };
    let old_books = list("shop", "old_books");
    let books = list("shop_old", "books");

    let old_books = old_books[0].as_model().expect("model");
    let books = books[0].as_model().expect("model");
    assert_ne!(old_books.model_name(), books.model_name());
    assert_eq!(old_books.get("title").expect("title"), FieldValue::from("Dune"));
    assert_eq!(books.get("price").expect("price"), FieldValue::Integer(12));
    assert!(!books.options().has_field("title"));

    let requests = mock.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[3].method, Method::Options);
    assert_eq!(requests[3].path, "/v1/instances/shop_old/classes/books/objects/");
}
