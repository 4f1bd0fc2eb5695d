use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, from_document, to_document, Bson},
    options::{Acknowledgment, CommandOption, ReadConcern, ReadConcernLevel, WriteConcern},
};

#[test]
fn write_concern_is_acknowledged() {
    assert!(WriteConcern::nodes(1).is_acknowledged());
    assert!(WriteConcern::majority().is_acknowledged());
    assert!(WriteConcern::builder().build().is_acknowledged());
    assert!(!WriteConcern::unacknowledged().is_acknowledged());

    let w_0 = WriteConcern::builder()
        .w(Acknowledgment::Nodes(0))
        .journal(false)
        .build();
    assert!(!w_0.is_acknowledged());

    let journaled = WriteConcern::builder().journal(true).build();
    assert!(journaled.is_acknowledged());
}

#[test]
fn write_concern_validate() {
    let invalid = WriteConcern::builder()
        .w(Acknowledgment::Nodes(0))
        .journal(true)
        .build();
    assert!(invalid.validate().unwrap_err().is_validation_error());

    assert!(WriteConcern::majority().validate().is_ok());
}

#[test]
fn write_concern_to_option() {
    let wc = WriteConcern::builder()
        .w(Acknowledgment::Majority)
        .w_timeout(Duration::from_millis(100))
        .journal(true)
        .build();
    assert_eq!(
        wc.to_option().unwrap(),
        Some(CommandOption::WriteConcern {
            write_concern: doc! { "w": "majority", "wtimeout": 100, "j": true },
            acknowledged: true,
        })
    );
    assert_eq!(WriteConcern::default().to_option().unwrap(), None);
}

#[test]
fn acknowledgment_wire_form() {
    assert_eq!(to_document(&WriteConcern::nodes(0)).unwrap(), doc! { "w": 0 });
    assert_eq!(
        to_document(&WriteConcern::from(Acknowledgment::Custom("myTag".to_string()))).unwrap(),
        doc! { "w": "myTag" }
    );

    let parse = |w: Bson| from_document::<WriteConcern>(doc! { "w": w }).unwrap().w;
    assert_eq!(parse(Bson::Int32(2)), Some(Acknowledgment::Nodes(2)));
    assert_eq!(parse("majority".into()), Some(Acknowledgment::Majority));
    assert_eq!(
        parse("dc1".into()),
        Some(Acknowledgment::Custom("dc1".to_string()))
    );
}

#[test]
fn read_concern_levels() {
    assert_eq!(
        to_document(&ReadConcern::new(ReadConcernLevel::Majority)).unwrap(),
        doc! { "level": "majority" }
    );
    assert_eq!(
        from_document::<ReadConcern>(doc! { "level": "snapshot" })
            .unwrap()
            .level,
        ReadConcernLevel::Snapshot
    );
    assert_eq!(
        from_document::<ReadConcern>(doc! { "level": "future" })
            .unwrap()
            .level,
        ReadConcernLevel::Custom("future".to_string())
    );
    assert_eq!(
        ReadConcern::from(ReadConcernLevel::Custom("future".to_string()))
            .to_option()
            .unwrap(),
        CommandOption::ReadConcern(doc! { "level": "future" })
    );
}
