
use crate::{
    bson::{doc, Document},
    bson_util,
    cmap::{Command, RawCommandResponse},
    error::Result,
    operation::{Operation, WriteConcernOnlyBody},
    options::CommandOption,
    results::FindAndModifyResult,
    sdam::ServerDescription,
    Namespace,
};

/// How a `findAndModify` changes the document it locates.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Modification {
    /// Remove the document.
    Delete,

    /// Replace the document. The replacement must not contain update operators.
    Replace(Document),

    /// Apply an update to the document.
    Update(UpdateModifications),
}

/// The update applied by a find-and-update.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum UpdateModifications {
    /// A document of update operators, such as `{ "$set": { "x": 1 } }`.
    Document(Document),

    /// An aggregation pipeline.
    Pipeline(Vec<Document>),
}

impl From<Document> for UpdateModifications {
    fn from(item: Document) -> Self {
        UpdateModifications::Document(item)
    }
}

impl From<Vec<Document>> for UpdateModifications {
    fn from(item: Vec<Document>) -> Self {
        UpdateModifications::Pipeline(item)
    }
}

/// A `findAndModify` command: atomically locates a single document and removes, replaces or
/// updates it, returning the affected document.
#[derive(Clone, Debug)]
pub struct FindAndModify {
    ns: Namespace,
    query: Document,
    modification: Modification,
    options: Vec<CommandOption>,
}

impl FindAndModify {
    /// Removes the first document in `ns` matching `query`.
    pub fn with_delete(ns: Namespace, query: Document, options: Vec<CommandOption>) -> Self {
        Self::with_modification(ns, query, Modification::Delete, options)
    }

    /// Replaces the first document in `ns` matching `query` with `replacement`.
    pub fn with_replace(
        ns: Namespace,
        query: Document,
        replacement: Document,
        options: Vec<CommandOption>,
    ) -> Self {
        Self::with_modification(ns, query, Modification::Replace(replacement), options)
    }

    /// Updates the first document in `ns` matching `query`.
    pub fn with_update(
        ns: Namespace,
        query: Document,
        update: impl Into<UpdateModifications>,
        options: Vec<CommandOption>,
    ) -> Self {
        Self::with_modification(ns, query, Modification::Update(update.into()), options)
    }

    /// Constructs the command from an explicit [`Modification`].
    pub fn with_modification(
        ns: Namespace,
        query: Document,
        modification: Modification,
        options: Vec<CommandOption>,
    ) -> Self {
        Self {
            ns,
            query,
            modification,
            options,
        }
    }

    /// The namespace this command targets.
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }
}

impl Operation for FindAndModify {
    type O = FindAndModifyResult;
    const NAME: &'static str = "findAndModify";

    fn validate(&self) -> Result<()> {
        self.ns.validate()?;
        match &self.modification {
            Modification::Delete => Ok(()),
            Modification::Replace(replacement) => {
                bson_util::replacement_document_check(replacement)
            }
            Modification::Update(UpdateModifications::Document(update)) => {
                bson_util::update_document_check(update)
            }
            Modification::Update(UpdateModifications::Pipeline(_)) => Ok(()),
        }
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        self.validate()?;

        let mut body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "query": self.query.clone(),
        };

        match &self.modification {
            Modification::Delete => {
                body.insert("remove", true);
            }
            Modification::Replace(replacement) => {
                body.insert("update", replacement.clone());
            }
            Modification::Update(UpdateModifications::Document(update)) => {
                body.insert("update", update.clone());
            }
            Modification::Update(UpdateModifications::Pipeline(pipeline)) => {
                body.insert("update", bson_util::to_bson_array(pipeline));
            }
        }

        crate::options::apply_all(&self.options, &mut body);

        Ok(Command::new_write(Self::NAME, self.ns.db.clone(), body))
    }

    fn handle_response(
        &self,
        response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        let write_concern: WriteConcernOnlyBody = response.body()?;
        write_concern.validate()?;
        response.body()
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
}
