
use serde::Deserialize;

use crate::{
    bson::{doc, Bson},
    cmap::{Command, RawCommandResponse},
    error::{Error, Result},
    index::IndexModel,
    operation::{Operation, WriteConcernOnlyBody},
    options::CommandOption,
    results::CreateIndexesResult,
    sdam::ServerDescription,
    selection_criteria::SelectionCriteria,
    Namespace,
};

/// A `createIndexes` command.
#[derive(Clone, Debug)]
pub struct CreateIndexes {
    ns: Namespace,
    indexes: Vec<IndexModel>,
    options: Vec<CommandOption>,
}

impl CreateIndexes {
    /// Creates `indexes` on the collection `ns`. Indexes without a name are given one generated
    /// from their keys.
    pub fn new(ns: Namespace, mut indexes: Vec<IndexModel>, options: Vec<CommandOption>) -> Self {
        for index in indexes.iter_mut() {
            index.update_name();
        }
        Self {
            ns,
            indexes,
            options,
        }
    }

    /// The names the indexes will be created with.
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.iter().filter_map(IndexModel::get_name).collect()
    }
}

impl Operation for CreateIndexes {
    type O = CreateIndexesResult;
    const NAME: &'static str = "createIndexes";

    fn validate(&self) -> Result<()> {
        self.ns.validate()?;
        if self.indexes.is_empty() {
            return Err(Error::invalid_argument(
                "createIndexes requires at least one index",
            ));
        }
        Ok(())
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        self.validate()?;

        let indexes = self
            .indexes
            .iter()
            .map(|index| crate::bson::to_document(index).map(Bson::Document))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "indexes": indexes,
        };
        crate::options::apply_all(&self.options, &mut body);

        Ok(Command::new_write(Self::NAME, self.ns.db.clone(), body))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            created_collection_automatically: Option<bool>,
            #[serde(default, rename = "numIndexesBefore")]
            indexes_before: Option<Bson>,
            #[serde(default, rename = "numIndexesAfter")]
            indexes_after: Option<Bson>,
        }

        let write_concern: WriteConcernOnlyBody = response.body()?;
        write_concern.validate()?;

        let response: Response = response.body()?;
        Ok(CreateIndexesResult {
            index_names: self.index_names(),
            created_collection_automatically: response.created_collection_automatically,
            indexes_before: response.indexes_before.as_ref().and_then(crate::bson_util::get_int),
            indexes_after: response.indexes_after.as_ref().and_then(crate::bson_util::get_int),
        })
    }

    fn options(&self) -> &[CommandOption] {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Vec<CommandOption> {
        &mut self.options
    }

    fn is_write(&self) -> bool {
        true
    }

    fn selection_criteria(&self) -> Option<SelectionCriteria> {
        Some(SelectionCriteria::writable())
    }
}
