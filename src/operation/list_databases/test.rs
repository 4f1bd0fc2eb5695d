use pretty_assertions::assert_eq;

use crate::{
    bson::doc,
    cmap::RawCommandResponse,
    operation::{decode, ListDatabases, Operation},
    options::CommandOption,
    results::{DatabaseSpecification, ListDatabasesResult},
    sdam::ServerDescription,
    selection_criteria::SelectionCriteria,
};

#[test]
fn build() {
    let op = ListDatabases::new(
        Some(doc! { "name": "test" }),
        vec![
            CommandOption::NameOnly(true),
            CommandOption::AuthorizedDatabases(true),
        ],
    );
    let command = op.build(&ServerDescription::new_testing()).unwrap();

    assert_eq!(command.target_db, "admin");
    assert_eq!(
        command.body,
        doc! {
            "listDatabases": 1,
            "filter": { "name": "test" },
            "nameOnly": true,
            "authorizedDatabases": true,
        }
    );
    assert_eq!(op.selection_criteria(), Some(SelectionCriteria::writable()));
}

#[test]
fn handle_success() {
    let response = RawCommandResponse::with_document(doc! {
        "ok": 1,
        "databases": [
            { "name": "admin", "sizeOnDisk": 8192.0, "empty": false },
            { "name": "test", "sizeOnDisk": 16384_i64, "empty": false },
        ],
        "totalSize": 24576_i64,
    })
    .unwrap();

    let result = decode(
        &ListDatabases::default(),
        &response,
        &ServerDescription::new_testing(),
    )
    .into_result()
    .unwrap();

    assert_eq!(
        result,
        ListDatabasesResult {
            databases: vec![
                DatabaseSpecification {
                    name: "admin".to_string(),
                    size_on_disk: 8192,
                    empty: false,
                },
                DatabaseSpecification {
                    name: "test".to_string(),
                    size_on_disk: 16384,
                    empty: false,
                },
            ],
            total_size: Some(24576),
        }
    );
}

#[test]
fn handle_names_only() {
    let response = RawCommandResponse::with_document(doc! {
        "ok": 1,
        "databases": [{ "name": "admin" }],
    })
    .unwrap();

    let result = decode(
        &ListDatabases::default(),
        &response,
        &ServerDescription::new_testing(),
    )
    .into_result()
    .unwrap();
    assert_eq!(result.databases[0].name, "admin");
    assert_eq!(result.total_size, None);
}
