//! Resource save/delete lifecycle: dirty tracking, auto-generated key
//! assignment, and recursive related-entity saves (spec.md §4.7).

mod common;

use std::sync::{Arc, Mutex};

use gom::{EntitySchema, Filter, Property, PropertyFlags, Resource, Value, ValueKind};

fn author_schema() -> EntitySchema {
    EntitySchema::new(
        "author",
        "authors",
        vec![
            Property::new("id", ValueKind::I64)
                .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
            Property::new("name", ValueKind::Text),
        ],
        None,
    )
    .unwrap()
}

fn book_schema() -> EntitySchema {
    EntitySchema::new(
        "book",
        "books",
        vec![
            Property::new("id", ValueKind::I64)
                .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
            Property::new("title", ValueKind::Text),
            Property::new("author_id", ValueKind::Reference).references("authors", "id"),
        ],
        None,
    )
    .unwrap()
}

#[test]
fn new_resource_is_dirty_until_saved() {
    let repo = common::repository_with(vec![author_schema()]);
    repo.automatic_migrate(1, &[author_schema()]).unwrap();

    let mut author = Resource::new("author");
    assert!(!author.is_dirty());
    assert!(!author.is_persisted());

    author.set("name", Value::Text("Ursula".into()));
    assert!(author.is_dirty());

    author.save(&repo).unwrap();
    assert!(author.is_persisted());
    assert!(!author.is_dirty());
}

#[test]
fn second_save_updates_an_already_persisted_row() {
    let repo = common::repository_with(vec![author_schema()]);
    repo.automatic_migrate(1, &[author_schema()]).unwrap();

    let mut author = Resource::new("author");
    author.set("name", Value::Text("Ursula".into()));
    author.save(&repo).unwrap();
    let id = author.get("id").unwrap();

    author.set("name", Value::Text("Ursula K.".into()));
    assert!(author.is_dirty());
    author.save(&repo).unwrap();
    assert!(!author.is_dirty());

    let reloaded = repo
        .find_one("author", Some(Filter::eq("author", "id", id)))
        .unwrap();
    assert_eq!(reloaded.get("name"), Some(Value::Text("Ursula K.".into())));
}

#[test]
fn save_recurses_into_a_related_unsaved_resource() {
    let repo = common::repository_with(vec![author_schema(), book_schema()]);
    repo.automatic_migrate(1, &[author_schema(), book_schema()])
        .unwrap();

    let mut author = Resource::new("author");
    author.set("name", Value::Text("Ursula".into()));
    let author = Arc::new(Mutex::new(author));

    let mut book = Resource::new("book");
    book.set("title", Value::Text("The Dispossessed".into()));
    book.set_related("author_id", Arc::clone(&author));
    book.save(&repo).unwrap();

    assert!(author.lock().unwrap().is_persisted());
    let author_id = match author.lock().unwrap().get("id").unwrap() {
        Value::I64(n) => n,
        other => panic!("expected an i64 id, got {other:?}"),
    };
    assert_eq!(book.get("author_id"), Some(Value::I64(author_id)));

    let reloaded = repo
        .find_one("book", Some(Filter::eq("book", "title", Value::Text("The Dispossessed".into()))))
        .unwrap();
    // The property's declared kind is Reference, so a fetched row reads
    // this slot back as Value::Reference rather than the Value::I64 an
    // in-memory related-entity save assigns it.
    assert_eq!(reloaded.get("author_id"), Some(Value::Reference(author_id)));
}

#[test]
fn delete_is_a_no_op_before_the_first_save() {
    let repo = common::repository_with(vec![author_schema()]);
    repo.automatic_migrate(1, &[author_schema()]).unwrap();

    let mut author = Resource::new("author");
    author.delete(&repo).unwrap();
    assert!(!author.is_persisted());
}

#[test]
fn delete_removes_the_persisted_row() {
    let repo = common::repository_with(vec![author_schema()]);
    repo.automatic_migrate(1, &[author_schema()]).unwrap();

    let mut author = Resource::new("author");
    author.set("name", Value::Text("Ursula".into()));
    author.save(&repo).unwrap();
    let id = author.get("id").unwrap();

    author.delete(&repo).unwrap();
    assert!(!author.is_persisted());

    let err = repo
        .find_one("author", Some(Filter::eq("author", "id", id)))
        .unwrap_err();
    assert!(matches!(err, gom::Error::EmptyResult));
}
